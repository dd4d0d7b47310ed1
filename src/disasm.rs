//! Textual rendering of instructions and segments.
//!
//! All renderers build and return `String`s; nothing here writes to
//! stdout. The segment walkers share the decoder with the interpreter,
//! so disassembly depends only on the decoded [`Instruction`] and never
//! on surrounding machine state.

use std::fmt::Write;

use memchr::memchr;

use crate::decode::{decode, DecodeError};
use crate::elf::{ElfHeader, ProgramHeader};
use crate::isa::Instruction;
use crate::memory::Memory;

/// Render one instruction as assembly text, without address or raw
/// bytes.
pub fn disassemble(inst: &Instruction) -> String {
    match inst {
        Instruction::Halt => "halt".to_string(),
        Instruction::Nop => "nop".to_string(),
        Instruction::Ret => "ret".to_string(),
        Instruction::Cmov { cond, ra, rb } => {
            format!("{} {}, {}", cond.cmov_mnemonic(), ra, rb)
        }
        Instruction::Irmovq { rb, value } => format!("irmovq 0x{value:x}, {rb}"),
        Instruction::Rmmovq { ra, rb, disp } => match rb {
            Some(rb) => format!("rmmovq {ra}, 0x{disp:x}({rb})"),
            None => format!("rmmovq {ra}, 0x{disp:x}"),
        },
        Instruction::Mrmovq { ra, rb, disp } => match rb {
            Some(rb) => format!("mrmovq 0x{disp:x}({rb}), {ra}"),
            None => format!("mrmovq 0x{disp:x}, {ra}"),
        },
        Instruction::Opq { op, ra, rb } => format!("{} {}, {}", op.mnemonic(), ra, rb),
        Instruction::Jump { cond, dest } => {
            format!("{} 0x{dest:x}", cond.jump_mnemonic())
        }
        Instruction::Call { dest } => format!("call 0x{dest:x}"),
        Instruction::Pushq { ra } => match ra {
            Some(ra) => format!("pushq {ra}"),
            None => "pushq".to_string(),
        },
        Instruction::Popq { ra } => match ra {
            Some(ra) => format!("popq {ra}"),
            None => "popq".to_string(),
        },
        Instruction::Invalid { .. } => "invalid".to_string(),
    }
}

/// One output line: address, raw bytes padded to ten bytes' width, text.
fn line(addr: u64, raw: &[u8], text: &str) -> String {
    if text.is_empty() {
        format!("  0x{:04x}: {:<20} |\n", addr, hex::encode(raw))
    } else {
        format!("  0x{:04x}: {:<20} |   {}\n", addr, hex::encode(raw), text)
    }
}

/// Disassemble one CODE segment.
///
/// Emits a `.pos` banner, a `_start:` label at the entry point, and one
/// line per instruction. Undecodable bytes produce a single `invalid`
/// line and end the walk.
pub fn disassemble_code(mem: &Memory, phdr: &ProgramHeader, hdr: &ElfHeader) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  .pos 0x{:x} code", phdr.vaddr);

    let mut pc = u64::from(phdr.vaddr);
    let end = u64::from(phdr.vaddr) + u64::from(phdr.file_size);

    while pc < end {
        if pc == u64::from(hdr.entry) {
            out.push_str("_start:\n");
        }
        match decode(mem, pc) {
            Ok(inst) => {
                let size = inst.size() as usize;
                match mem.slice(pc, size) {
                    Some(raw) => out.push_str(&line(pc, raw, &disassemble(&inst))),
                    None => break,
                }
                pc += inst.size();
            }
            Err(DecodeError::Illegal { .. } | DecodeError::OutOfBounds { .. }) => {
                if let Some(raw) = mem.slice(pc, 1) {
                    out.push_str(&line(pc, raw, "invalid"));
                }
                break;
            }
        }
    }

    out
}

/// Disassemble one DATA segment as 8-byte `.quad` groups.
pub fn disassemble_data(mem: &Memory, phdr: &ProgramHeader) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  .pos 0x{:x} data", phdr.vaddr);

    let mut pc = u64::from(phdr.vaddr);
    let end = u64::from(phdr.vaddr) + u64::from(phdr.file_size);

    while pc < end {
        let (quad, raw) = match (mem.load_quad(pc), mem.slice(pc, 8)) {
            (Some(quad), Some(raw)) => (quad, raw),
            _ => break,
        };
        out.push_str(&line(pc, raw, &format!(".quad 0x{quad:x}")));
        pc += 8;
    }

    out
}

/// Disassemble one read-only DATA segment as NUL-terminated strings.
///
/// The raw-byte column wraps at ten bytes per line; continuation lines
/// carry no text. The terminating NUL is part of each string's bytes;
/// a run the segment ends before terminating ends at the segment
/// boundary.
pub fn disassemble_rodata(mem: &Memory, phdr: &ProgramHeader) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  .pos 0x{:x} data", phdr.vaddr);

    let mut pc = u64::from(phdr.vaddr);
    let end = u64::from(phdr.vaddr) + u64::from(phdr.file_size);

    while pc < end {
        let window = match mem.slice(pc, (end - pc) as usize) {
            Some(window) => window,
            None => break,
        };
        let (len, text_end) = match memchr(0, window) {
            Some(nul) => (nul + 1, nul),
            None => (window.len(), window.len()),
        };
        let text = String::from_utf8_lossy(&window[..text_end]).into_owned();

        let mut first = true;
        for (i, chunk) in window[..len].chunks(10).enumerate() {
            let addr = pc + (i * 10) as u64;
            if first {
                out.push_str(&line(addr, chunk, &format!(".string \"{text}\"")));
                first = false;
            } else {
                out.push_str(&line(addr, chunk, ""));
            }
        }

        pc += len as u64;
    }

    out
}
