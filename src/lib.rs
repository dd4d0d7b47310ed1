//! Y86 Simulator - Mini-ELF Loader, Disassembler, and Interpreter
//!
//! This library loads programs from the compact Mini-ELF container
//! format into a flat 64 KiB virtual address space, renders
//! human-readable views of the container and memory, disassembles code
//! and data segments, and interpreted-executes Y86 programs until they
//! halt or fault.
//!
//! # Components
//!
//! - **Loader** ([`elf`]): header and program header parsing, segment
//!   materialisation into memory
//! - **Decoder** ([`decode`]): raw bytes at the PC to a typed
//!   [`Instruction`](isa::Instruction), with all bounds and encoding
//!   checks
//! - **Disassembler** ([`disasm`]): canonical text for instructions,
//!   code segments, data segments, and read-only string segments
//! - **Executor** ([`exec`], [`interp`]): a stylised fetch →
//!   decode/execute → memory/write-back/PC pipeline with precise
//!   overflow, conditional, and fault semantics
//! - **Dumps** ([`dump`]): header, segment table, memory, and CPU
//!   renderers
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use y86_sim::{load_file, interp::execute};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut image = load_file("program.o")?;
//!     let mut stdout = std::io::stdout().lock();
//!     let (cpu, count) =
//!         execute(&image.header, &mut image.memory, false, &mut stdout)?;
//!     eprintln!("{count} instructions, final status {}", cpu.stat);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]

pub mod cpu;
pub mod decode;
pub mod disasm;
pub mod dump;
pub mod elf;
pub mod error;
pub mod exec;
pub mod interp;
pub mod isa;
pub mod memory;

pub use cpu::{Cpu, Flags, Status};
pub use elf::{ElfHeader, ProgramHeader, SegmentFlags, SegmentType};
pub use error::{Result, SimError};
pub use isa::{Cond, Instruction, OpKind, Register};
pub use memory::{Memory, MEMSIZE};

use std::path::Path;

/// A fully loaded Mini-ELF program: the parsed container plus the
/// materialised memory image.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// The container header.
    pub header: ElfHeader,
    /// All program headers, in file order.
    pub phdrs: Vec<ProgramHeader>,
    /// The memory image with every segment copied in.
    pub memory: Memory,
}

/// Load a Mini-ELF file by path.
///
/// Reads the file and materialises every segment into a fresh memory
/// image.
///
/// # Errors
///
/// Any IO failure, malformed header or program header, or segment that
/// does not fit the address space.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<LoadedImage> {
    let data = std::fs::read(path)?;
    load_bytes(&data)
}

/// Load a Mini-ELF image from a byte slice.
///
/// # Errors
///
/// Malformed header or program header, or a segment that does not fit
/// the address space.
pub fn load_bytes(data: &[u8]) -> Result<LoadedImage> {
    let header = ElfHeader::parse(data)?;
    tracing::debug!(
        version = header.version,
        entry = format_args!("0x{:04x}", header.entry),
        num_phdr = header.num_phdr,
        "parsed header"
    );

    let mut phdrs = Vec::with_capacity(usize::from(header.num_phdr));
    let mut memory = Memory::new();

    for i in 0..usize::from(header.num_phdr) {
        let offset = usize::from(header.phdr_start) + i * elf::PHDR_SIZE;
        let phdr = ProgramHeader::parse(data, offset)?;
        elf::load_segment(data, &phdr, &mut memory)?;
        phdrs.push(phdr);
    }

    Ok(LoadedImage {
        header,
        phdrs,
        memory,
    })
}

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
