//! The execute pipeline: decode/execute and memory/write-back/PC-update.
//!
//! The two stages are separate functions so a tracer can observe the
//! machine between them. [`decode_execute`] computes the ALU result,
//! the A-value, and the branch condition without touching memory;
//! [`memory_wb_pc`] commits stores, loads, register write-back, and the
//! new PC. All arithmetic is explicit two's-complement wrapping; signed
//! overflow is computed from predicates, never from UB.

use crate::cpu::{Cpu, Flags, Status, PC_FAULT};
use crate::isa::{Cond, Instruction, OpKind};
use crate::memory::{Memory, MEMSIZE};

/// Intermediate values carried between the two pipeline stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecValues {
    /// ALU result or computed effective address.
    pub val_e: u64,
    /// The "A" operand: a source register or the old stack pointer.
    pub val_a: u64,
    /// Branch taken / conditional move performed.
    pub cond: bool,
}

/// One store performed by the write-back stage, reported so the driver
/// can log it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWrite {
    /// Target address.
    pub addr: u64,
    /// Value stored.
    pub value: u64,
}

/// Evaluate a condition function against the flags.
pub fn cond_holds(cond: Cond, flags: &Flags) -> bool {
    let Flags { sf, zf, of } = *flags;
    match cond {
        Cond::Always => true,
        Cond::Le => zf || (sf ^ of),
        Cond::L => sf ^ of,
        Cond::E => zf,
        Cond::Ne => !zf,
        Cond::Ge => sf == of,
        Cond::G => !zf && sf == of,
    }
}

/// Apply an ALU operation to `val_b` and `val_a`, returning the result
/// and the flags it produces.
///
/// Operands are signed 64-bit two's-complement. `ADD`/`SUB` wrap;
/// overflow is the signed-overflow predicate. `AND`/`XOR` always clear
/// `OF`.
pub fn alu(op: OpKind, val_b: u64, val_a: u64) -> (u64, Flags) {
    let a = val_a as i64;
    let b = val_b as i64;
    let (result, of) = match op {
        OpKind::Add => b.overflowing_add(a),
        OpKind::Sub => b.overflowing_sub(a),
        OpKind::And => (b & a, false),
        OpKind::Xor => (b ^ a, false),
    };
    let flags = Flags {
        sf: result < 0,
        zf: result == 0,
        of,
    };
    (result as u64, flags)
}

fn addr_fault(cpu: &mut Cpu) {
    cpu.stat = Status::Adr;
    cpu.pc = PC_FAULT;
}

/// Decode/execute stage.
///
/// Computes [`ExecValues`] from the register file and flags. A PC
/// outside the address space faults with `ADR` and the sentinel PC; an
/// invalid instruction records `INS`. Neither memory nor the PC is
/// touched otherwise.
pub fn decode_execute(cpu: &mut Cpu, inst: &Instruction) -> ExecValues {
    let mut vals = ExecValues::default();

    if cpu.pc >= MEMSIZE as u64 {
        addr_fault(cpu);
        return vals;
    }

    match inst {
        Instruction::Halt => cpu.stat = Status::Hlt,
        Instruction::Nop => {}
        Instruction::Cmov { cond, ra, .. } => {
            vals.val_a = cpu.reg(*ra);
            vals.val_e = vals.val_a;
            vals.cond = cond_holds(*cond, &cpu.flags);
        }
        Instruction::Irmovq { value, .. } => vals.val_e = *value,
        Instruction::Rmmovq { ra, rb, disp } => {
            vals.val_a = cpu.reg(*ra);
            vals.val_e = disp.wrapping_add(cpu.reg_opt(*rb));
        }
        Instruction::Mrmovq { rb, disp, .. } => {
            vals.val_e = disp.wrapping_add(cpu.reg_opt(*rb));
        }
        Instruction::Opq { op, ra, rb } => {
            vals.val_a = cpu.reg(*ra);
            let val_b = cpu.reg(*rb);
            let (val_e, flags) = alu(*op, val_b, vals.val_a);
            vals.val_e = val_e;
            cpu.flags = flags;
        }
        Instruction::Jump { cond, .. } => vals.cond = cond_holds(*cond, &cpu.flags),
        Instruction::Call { .. } => vals.val_e = cpu.rsp().wrapping_sub(8),
        Instruction::Ret => {
            vals.val_a = cpu.rsp();
            vals.val_e = cpu.rsp().wrapping_add(8);
        }
        Instruction::Pushq { ra } => {
            vals.val_a = cpu.reg_opt(*ra);
            vals.val_e = cpu.rsp().wrapping_sub(8);
        }
        Instruction::Popq { .. } => {
            vals.val_a = cpu.rsp();
            vals.val_e = cpu.rsp().wrapping_add(8);
        }
        Instruction::Invalid { .. } => cpu.stat = Status::Ins,
    }

    vals
}

/// Memory/write-back/PC-update stage.
///
/// Commits the instruction: stores, loads, register write-back, then
/// the next PC. Every memory access is bounds-checked first; a
/// violation records `ADR` and the sentinel PC and commits nothing
/// else. The one exception is `mrmovq`, whose PC increment lands before
/// the bounds check, so a faulting load keeps the advanced PC.
///
/// Returns the store performed, if any, so the caller can log it.
pub fn memory_wb_pc(
    cpu: &mut Cpu,
    mem: &mut Memory,
    inst: &Instruction,
    vals: ExecValues,
) -> Option<MemoryWrite> {
    let size = inst.size();

    match inst {
        Instruction::Halt => {
            cpu.flags = Flags::default();
            cpu.pc = cpu.pc.wrapping_add(size);
        }
        Instruction::Nop => cpu.pc = cpu.pc.wrapping_add(size),
        Instruction::Cmov { rb, .. } => {
            if vals.cond {
                cpu.set_reg(*rb, vals.val_e);
            }
            cpu.pc = cpu.pc.wrapping_add(size);
        }
        Instruction::Irmovq { rb, .. } => {
            cpu.set_reg(*rb, vals.val_e);
            cpu.pc = cpu.pc.wrapping_add(size);
        }
        Instruction::Opq { rb, .. } => {
            cpu.set_reg(*rb, vals.val_e);
            cpu.pc = cpu.pc.wrapping_add(size);
        }
        Instruction::Rmmovq { .. } => match mem.store_quad(vals.val_e, vals.val_a) {
            Some(()) => {
                cpu.pc = cpu.pc.wrapping_add(size);
                return Some(MemoryWrite {
                    addr: vals.val_e,
                    value: vals.val_a,
                });
            }
            None => addr_fault(cpu),
        },
        Instruction::Mrmovq { ra, .. } => {
            cpu.pc = cpu.pc.wrapping_add(size);
            match mem.load_quad(vals.val_e) {
                Some(value) => cpu.set_reg(*ra, value),
                None => cpu.stat = Status::Adr,
            }
        }
        Instruction::Jump { dest, .. } => {
            cpu.pc = if vals.cond {
                *dest
            } else {
                cpu.pc.wrapping_add(size)
            };
        }
        Instruction::Call { dest } => {
            let ret = cpu.pc.wrapping_add(size);
            match mem.store_quad(vals.val_e, ret) {
                Some(()) => {
                    cpu.set_rsp(vals.val_e);
                    cpu.pc = *dest;
                    return Some(MemoryWrite {
                        addr: vals.val_e,
                        value: ret,
                    });
                }
                None => addr_fault(cpu),
            }
        }
        Instruction::Ret => match mem.load_quad(vals.val_a) {
            Some(ret) => {
                cpu.set_rsp(vals.val_e);
                cpu.pc = ret;
            }
            None => addr_fault(cpu),
        },
        Instruction::Pushq { .. } => match mem.store_quad(vals.val_e, vals.val_a) {
            Some(()) => {
                cpu.set_rsp(vals.val_e);
                cpu.pc = cpu.pc.wrapping_add(size);
                return Some(MemoryWrite {
                    addr: vals.val_e,
                    value: vals.val_a,
                });
            }
            None => addr_fault(cpu),
        },
        Instruction::Popq { ra } => match mem.load_quad(vals.val_a) {
            Some(value) => {
                cpu.set_rsp(vals.val_e);
                cpu.set_reg_opt(*ra, value);
                cpu.pc = cpu.pc.wrapping_add(size);
            }
            None => addr_fault(cpu),
        },
        Instruction::Invalid { .. } => {}
    }

    None
}
