use criterion::{black_box, criterion_group, criterion_main, Criterion};

use y86_sim::decode::decode;
use y86_sim::elf::ElfHeader;
use y86_sim::interp::execute;
use y86_sim::memory::Memory;

/// irmovq 1000, %rax; irmovq 1, %rcx; loop: subq %rcx, %rax;
/// jne loop; halt
fn countdown_program() -> Vec<u8> {
    let mut program = vec![0x30, 0xF0];
    program.extend_from_slice(&1000u64.to_le_bytes());
    program.extend_from_slice(&[0x30, 0xF1]);
    program.extend_from_slice(&1u64.to_le_bytes());
    program.extend_from_slice(&[0x61, 0x10]);
    program.push(0x74);
    program.extend_from_slice(&20u64.to_le_bytes());
    program.push(0x00);
    program
}

fn bench_execute(c: &mut Criterion) {
    let hdr = ElfHeader {
        version: 1,
        entry: 0,
        phdr_start: 16,
        num_phdr: 0,
        symtab: 0,
        strtab: 0,
    };
    let program = countdown_program();

    c.bench_function("execute_countdown_1000", |b| {
        b.iter(|| {
            let mut mem = Memory::new();
            mem.write(0, &program).unwrap();
            let mut sink = std::io::sink();
            let (cpu, count) = execute(&hdr, &mut mem, false, &mut sink).unwrap();
            black_box((cpu.pc, count))
        });
    });
}

fn bench_decode(c: &mut Criterion) {
    let mut mem = Memory::new();
    mem.write(0, &countdown_program()).unwrap();

    c.bench_function("decode_irmovq", |b| {
        b.iter(|| black_box(decode(&mem, 0).unwrap()));
    });
}

criterion_group!(benches, bench_execute, bench_decode);
criterion_main!(benches);
