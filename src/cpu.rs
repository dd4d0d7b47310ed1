//! CPU state: register file, program counter, condition flags, status.

use serde::{Deserialize, Serialize};

use crate::isa::Register;

/// PC value installed when an address fault tears down execution.
pub const PC_FAULT: u64 = 0xFFFF_FFFF_FFFF_FFFF;

/// Machine status, the halting reason of the interpreter loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Executing normally.
    Aok,
    /// Stopped by a `halt` instruction.
    Hlt,
    /// Memory access or PC outside the address space.
    Adr,
    /// Illegal opcode, register field, or sub-opcode.
    Ins,
}

impl Status {
    /// Name as printed in the CPU dump block.
    pub fn name(&self) -> &'static str {
        match self {
            Status::Aok => "AOK",
            Status::Hlt => "HLT",
            Status::Adr => "ADR",
            Status::Ins => "INS",
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Aok
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The three condition bits maintained by the ALU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// Sign of the last ALU result.
    pub sf: bool,
    /// Last ALU result was zero.
    pub zf: bool,
    /// Last ALU operation overflowed, signed.
    pub of: bool,
}

/// The complete CPU state.
///
/// Fifteen 64-bit general-purpose registers, a 64-bit program counter,
/// the condition flags, and the status word. Register number 15 is the
/// "no register" encoding: it reads as zero and swallows writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    regs: [u64; 15],
    /// Program counter.
    pub pc: u64,
    /// Condition flags.
    pub flags: Flags,
    /// Machine status.
    pub stat: Status,
}

impl Cpu {
    /// Fresh CPU: all registers and flags zero, `pc` at `entry`, status `AOK`.
    pub fn new(entry: u64) -> Self {
        Self {
            regs: [0; 15],
            pc: entry,
            flags: Flags::default(),
            stat: Status::Aok,
        }
    }

    /// Read a register.
    pub fn reg(&self, r: Register) -> u64 {
        self.regs[r.index()]
    }

    /// Write a register.
    pub fn set_reg(&mut self, r: Register, value: u64) {
        self.regs[r.index()] = value;
    }

    /// Read a possibly-absent register; the absent register reads zero.
    pub fn reg_opt(&self, r: Option<Register>) -> u64 {
        r.map_or(0, |r| self.reg(r))
    }

    /// Write a possibly-absent register; writes to the absent register
    /// are discarded.
    pub fn set_reg_opt(&mut self, r: Option<Register>, value: u64) {
        if let Some(r) = r {
            self.set_reg(r, value);
        }
    }

    /// The stack pointer.
    pub fn rsp(&self) -> u64 {
        self.reg(Register::Rsp)
    }

    /// Update the stack pointer.
    pub fn set_rsp(&mut self, value: u64) {
        self.set_reg(Register::Rsp, value);
    }
}
