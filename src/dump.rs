//! Human-readable dumps of the container header, program headers,
//! memory image, and CPU state.
//!
//! Like the disassembler, every renderer returns a `String`; the driver
//! decides where the text goes.

use std::fmt::Write;

use crate::cpu::Cpu;
use crate::elf::{ElfHeader, ProgramHeader};
use crate::isa::Register;
use crate::memory::Memory;

/// Render one row of raw bytes: offset, then two space-separated groups
/// of eight.
fn hex_row(out: &mut String, label: &str, bytes: &[u8]) {
    out.push_str(label);
    for (i, b) in bytes.iter().enumerate() {
        if i == 8 {
            out.push(' ');
        }
        let _ = write!(out, " {b:02x}");
    }
    out.push('\n');
}

/// Render the Mini-ELF header: the 16 raw bytes, then the decoded
/// fields, then a blank separator line.
pub fn dump_header(hdr: &ElfHeader) -> String {
    let mut out = String::new();
    hex_row(&mut out, "00000000 ", &hdr.to_bytes());

    let _ = writeln!(out, "Mini-ELF version {:x}", hdr.version);
    let _ = writeln!(out, "Entry point 0x{:x}", hdr.entry);
    let _ = writeln!(
        out,
        "There are {:x} program headers, starting at offset {} (0x{:x})",
        hdr.num_phdr, hdr.phdr_start, hdr.phdr_start
    );
    if hdr.symtab != 0 {
        let _ = writeln!(
            out,
            "There is a symbol table starting at offset {} (0x{:x})",
            hdr.symtab, hdr.symtab
        );
    } else {
        let _ = writeln!(out, "There is no symbol table present");
    }
    if hdr.strtab != 0 {
        let _ = writeln!(
            out,
            "There is a string table starting at offset {} (0x{:x})",
            hdr.strtab, hdr.strtab
        );
    } else {
        let _ = writeln!(out, "There is no string table present");
    }
    out.push('\n');
    out
}

/// Render the program header table.
pub fn dump_phdrs(phdrs: &[ProgramHeader]) -> String {
    let mut out = String::new();
    out.push_str("Segment   Offset    VirtAddr  FileSize  Type      Flag\n");
    for (i, p) in phdrs.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:02}      0x{:04x}    0x{:04x}    0x{:04x}    {:<10}{}",
            i,
            p.offset,
            p.vaddr,
            p.file_size,
            p.seg_type.name(),
            p.flags.letters()
        );
    }
    out
}

/// Render memory contents from `start` (inclusive) to `end` (exclusive)
/// as 16-byte rows.
pub fn dump_memory(mem: &Memory, start: usize, end: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Contents of memory from {start:04x} to {end:04x}:");

    let mut addr = start;
    while addr < end {
        let row_end = (addr + 16).min(end);
        if let Some(bytes) = mem.slice(addr as u64, row_end - addr) {
            let label = format!("  {addr:04x} ");
            hex_row(&mut out, &label, bytes);
        }
        addr = row_end;
    }
    out
}

/// Render the CPU dump block.
///
/// All values are 16 lowercase hex nibbles; register names are
/// right-aligned so the colons line up across rows.
pub fn dump_cpu(cpu: &Cpu) -> String {
    let mut out = String::new();
    out.push_str("dump of Y86 CPU:\n");
    let _ = writeln!(
        out,
        "{:>6}: {:016x}   flags: SF{} ZF{} OF{}  {}",
        "%rip",
        cpu.pc,
        u8::from(cpu.flags.sf),
        u8::from(cpu.flags.zf),
        u8::from(cpu.flags.of),
        cpu.stat.name()
    );

    let mut regs = Register::ALL.iter().peekable();
    while let Some(first) = regs.next() {
        let _ = write!(out, "{:>6}: {:016x}", first.name(), cpu.reg(*first));
        if let Some(second) = regs.next() {
            let _ = write!(out, "{:>8}: {:016x}", second.name(), cpu.reg(*second));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Status;
    use crate::elf::{SegmentFlags, SegmentType};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dump_header_with_tables() {
        let hdr = ElfHeader {
            version: 1,
            entry: 0x100,
            phdr_start: 16,
            num_phdr: 3,
            symtab: 0x90,
            strtab: 0xA0,
        };
        let text = dump_header(&hdr);
        assert!(text.starts_with(
            "00000000  01 00 00 01 10 00 03 00  90 00 a0 00 45 4c 46 00\n"
        ));
        assert!(text.contains("Mini-ELF version 1\n"));
        assert!(text.contains("Entry point 0x100\n"));
        assert!(text.contains(
            "There are 3 program headers, starting at offset 16 (0x10)\n"
        ));
        assert!(text.contains("There is a symbol table starting at offset 144 (0x90)\n"));
        assert!(text.contains("There is a string table starting at offset 160 (0xa0)\n"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_dump_header_without_tables() {
        let hdr = ElfHeader {
            version: 1,
            entry: 0,
            phdr_start: 16,
            num_phdr: 1,
            symtab: 0,
            strtab: 0,
        };
        let text = dump_header(&hdr);
        assert!(text.contains("There is no symbol table present\n"));
        assert!(text.contains("There is no string table present\n"));
    }

    #[test]
    fn test_dump_phdrs() {
        let phdrs = [
            ProgramHeader {
                offset: 0x40,
                file_size: 0x73,
                vaddr: 0x100,
                seg_type: SegmentType::Code,
                flags: SegmentFlags::R | SegmentFlags::X,
            },
            ProgramHeader {
                offset: 0xB3,
                file_size: 0x10,
                vaddr: 0x200,
                seg_type: SegmentType::Data,
                flags: SegmentFlags::R | SegmentFlags::W,
            },
        ];
        let text = dump_phdrs(&phdrs);
        let expected = "Segment   Offset    VirtAddr  FileSize  Type      Flag\n\
                        \x20 00      0x0040    0x0100    0x0073    CODE      R X\n\
                        \x20 01      0x00b3    0x0200    0x0010    DATA      R W\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_dump_memory_rows() {
        let mut mem = Memory::new();
        mem.write(0x100, &(1..=20u8).collect::<Vec<_>>()).unwrap();
        let text = dump_memory(&mem, 0x100, 0x114);
        let expected = "Contents of memory from 0100 to 0114:\n\
                        \x20 0100  01 02 03 04 05 06 07 08  09 0a 0b 0c 0d 0e 0f 10\n\
                        \x20 0110  11 12 13 14\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_dump_cpu_layout() {
        let mut cpu = Cpu::new(0x100);
        cpu.set_reg(Register::Rax, 0x2A);
        cpu.set_reg(Register::R9, 0xDEAD);
        cpu.stat = Status::Aok;
        let text = dump_cpu(&cpu);
        let expected = "dump of Y86 CPU:\n\
          \x20 %rip: 0000000000000100   flags: SF0 ZF0 OF0  AOK\n\
          \x20 %rax: 000000000000002a    %rcx: 0000000000000000\n\
          \x20 %rdx: 0000000000000000    %rbx: 0000000000000000\n\
          \x20 %rsp: 0000000000000000    %rbp: 0000000000000000\n\
          \x20 %rsi: 0000000000000000    %rdi: 0000000000000000\n\
          \x20  %r8: 0000000000000000     %r9: 000000000000dead\n\
          \x20 %r10: 0000000000000000    %r11: 0000000000000000\n\
          \x20 %r12: 0000000000000000    %r13: 0000000000000000\n\
          \x20 %r14: 0000000000000000\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_dump_cpu_sentinel_pc() {
        let mut cpu = Cpu::new(0);
        cpu.pc = crate::cpu::PC_FAULT;
        cpu.stat = Status::Adr;
        let text = dump_cpu(&cpu);
        assert!(text.contains("%rip: ffffffffffffffff"));
        assert!(text.contains("ADR"));
    }
}
