//! Mini-ELF container parser and segment loader.
//!
//! The Mini-ELF format is a compact object container: a 16-byte header,
//! an array of 20-byte program headers, and the raw segment payloads.
//! All integers are little-endian on disk. Parsing works over an
//! in-memory byte slice; the driver reads the file once up front.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::memory::{Memory, MEMSIZE};

/// Magic byte signatures for the container.
pub mod magic {
    /// Header magic: the literal bytes `45 4C 46 00` ("ELF\0") in file order.
    pub const HEADER: [u8; 4] = [0x45, 0x4C, 0x46, 0x00];

    /// Program header magic, read as a little-endian u32.
    pub const PHDR: u32 = 0xDEAD_BEEF;
}

/// Size of the Mini-ELF header on disk.
pub const HEADER_SIZE: usize = 16;

/// Size of one program header on disk.
pub const PHDR_SIZE: usize = 20;

/// The Mini-ELF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    /// Format version.
    pub version: u16,
    /// Virtual address of the first instruction to execute.
    pub entry: u16,
    /// File offset of the program header array.
    pub phdr_start: u16,
    /// Number of program headers.
    pub num_phdr: u16,
    /// File offset of the symbol table, 0 if absent.
    pub symtab: u16,
    /// File offset of the string table, 0 if absent.
    pub strtab: u16,
}

impl ElfHeader {
    /// Parse the header from the front of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(SimError::FileTooSmall {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        // The magic occupies the last four header bytes and is matched
        // as a literal byte sequence, not as an integer.
        if data[12..16] != magic::HEADER {
            return Err(SimError::InvalidMagic {
                expected: format!("{:02X?}", magic::HEADER),
                actual: format!("{:02X?}", &data[12..16]),
            });
        }

        let mut cur = Cursor::new(&data[..12]);
        Ok(Self {
            version: cur.read_u16::<LittleEndian>()?,
            entry: cur.read_u16::<LittleEndian>()?,
            phdr_start: cur.read_u16::<LittleEndian>()?,
            num_phdr: cur.read_u16::<LittleEndian>()?,
            symtab: cur.read_u16::<LittleEndian>()?,
            strtab: cur.read_u16::<LittleEndian>()?,
        })
    }

    /// Re-encode the header into its on-disk form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..2].copy_from_slice(&self.version.to_le_bytes());
        out[2..4].copy_from_slice(&self.entry.to_le_bytes());
        out[4..6].copy_from_slice(&self.phdr_start.to_le_bytes());
        out[6..8].copy_from_slice(&self.num_phdr.to_le_bytes());
        out[8..10].copy_from_slice(&self.symtab.to_le_bytes());
        out[10..12].copy_from_slice(&self.strtab.to_le_bytes());
        out[12..16].copy_from_slice(&magic::HEADER);
        out
    }
}

/// Segment kind carried in `p_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    /// Initialised data.
    Data,
    /// Executable code.
    Code,
    /// Stack reservation.
    Stack,
    /// Unrecognised type value, preserved verbatim.
    Unknown(u16),
}

impl SegmentType {
    fn from_raw(raw: u16) -> Self {
        match raw {
            0 => SegmentType::Data,
            1 => SegmentType::Code,
            2 => SegmentType::Stack,
            other => SegmentType::Unknown(other),
        }
    }

    fn to_raw(self) -> u16 {
        match self {
            SegmentType::Data => 0,
            SegmentType::Code => 1,
            SegmentType::Stack => 2,
            SegmentType::Unknown(other) => other,
        }
    }

    /// Column name used by the program header table.
    pub fn name(&self) -> &'static str {
        match self {
            SegmentType::Data => "DATA",
            SegmentType::Code => "CODE",
            SegmentType::Stack => "STACK",
            SegmentType::Unknown(_) => "UNKNOWN",
        }
    }
}

bitflags::bitflags! {
    /// Segment permission mask carried in `p_flag`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u16 {
        /// Readable.
        const R = 0x4;
        /// Writable.
        const W = 0x2;
        /// Executable.
        const X = 0x1;
    }
}

impl SegmentFlags {
    /// Render the mask as the letters used by the segment table, e.g. `R X`.
    pub fn letters(&self) -> String {
        let mut parts = Vec::new();
        if self.contains(SegmentFlags::R) {
            parts.push("R");
        }
        if self.contains(SegmentFlags::W) {
            parts.push("W");
        }
        if self.contains(SegmentFlags::X) {
            parts.push("X");
        }
        parts.join(" ")
    }
}

/// One Mini-ELF program header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    /// File offset of the segment payload.
    pub offset: u32,
    /// Payload size in bytes.
    pub file_size: u32,
    /// Virtual address the payload is mapped at.
    pub vaddr: u32,
    /// Segment kind.
    pub seg_type: SegmentType,
    /// Permission mask.
    pub flags: SegmentFlags,
}

impl ProgramHeader {
    /// Parse one program header at `offset` within `data`.
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        let end = offset.checked_add(PHDR_SIZE).ok_or(SimError::TruncatedData {
            offset,
            expected: PHDR_SIZE,
            actual: 0,
        })?;
        let raw = data.get(offset..end).ok_or(SimError::TruncatedData {
            offset,
            expected: PHDR_SIZE,
            actual: data.len().saturating_sub(offset),
        })?;

        let mut cur = Cursor::new(raw);
        let p_offset = cur.read_u32::<LittleEndian>()?;
        let p_filesz = cur.read_u32::<LittleEndian>()?;
        let p_vaddr = cur.read_u32::<LittleEndian>()?;
        let p_type = cur.read_u16::<LittleEndian>()?;
        let p_flag = cur.read_u16::<LittleEndian>()?;
        let p_magic = cur.read_u32::<LittleEndian>()?;

        if p_magic != magic::PHDR {
            return Err(SimError::InvalidMagic {
                expected: format!("0x{:08X}", magic::PHDR),
                actual: format!("0x{:08X}", p_magic),
            });
        }

        Ok(Self {
            offset: p_offset,
            file_size: p_filesz,
            vaddr: p_vaddr,
            seg_type: SegmentType::from_raw(p_type),
            flags: SegmentFlags::from_bits_retain(p_flag),
        })
    }

    /// Re-encode the program header into its on-disk form.
    pub fn to_bytes(&self) -> [u8; PHDR_SIZE] {
        let mut out = [0u8; PHDR_SIZE];
        out[0..4].copy_from_slice(&self.offset.to_le_bytes());
        out[4..8].copy_from_slice(&self.file_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.vaddr.to_le_bytes());
        out[12..14].copy_from_slice(&self.seg_type.to_raw().to_le_bytes());
        out[14..16].copy_from_slice(&self.flags.bits().to_le_bytes());
        out[16..20].copy_from_slice(&magic::PHDR.to_le_bytes());
        out
    }
}

/// Copy one segment's payload from the file image into memory.
///
/// The loader never interprets segment contents; `p_type` and `p_flag`
/// only steer the disassembler and driver.
pub fn load_segment(data: &[u8], phdr: &ProgramHeader, mem: &mut Memory) -> Result<()> {
    let vaddr = phdr.vaddr as usize;
    let size = phdr.file_size as usize;

    if vaddr >= MEMSIZE || size > MEMSIZE - vaddr {
        return Err(SimError::SegmentOutOfBounds {
            vaddr: phdr.vaddr,
            size: phdr.file_size,
        });
    }

    let offset = phdr.offset as usize;
    let end = offset.checked_add(size).ok_or(SimError::TruncatedData {
        offset,
        expected: size,
        actual: 0,
    })?;
    let payload = data.get(offset..end).ok_or(SimError::TruncatedData {
        offset,
        expected: size,
        actual: data.len().saturating_sub(offset),
    })?;

    // Bounds were validated above; the write cannot fail.
    let _ = mem.write(vaddr, payload);

    tracing::debug!(
        vaddr = format_args!("0x{:04x}", phdr.vaddr),
        size,
        seg_type = phdr.seg_type.name(),
        "loaded segment"
    );
    Ok(())
}
