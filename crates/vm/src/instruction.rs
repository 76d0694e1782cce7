use core::fmt;

/// One decoded instruction of the simulated CPU.
///
/// EDUCATIONAL PURPOSE: the image stores instructions as raw 3-byte words;
/// the decoder turns each word into this enum so the CPU can `match` on what
/// to do instead of poking at bytes.
///
/// INSTRUCTION CATEGORIES:
/// - ACCUMULATOR: `LoadI`, `Load`, `Store` move values in and out of `acc`
/// - ARITHMETIC: `Add`/`Sub`/`Mul` take a memory operand, the `*I` forms an
///   immediate; all wrap modulo 256
/// - CONTROL FLOW: `Jmp`, `Jz`, `Halt`
/// - SYSTEM: `Print` (console output), `Wait` (block for ticks)
///
/// Addresses are segment-relative: the CPU adds the segment base before
/// touching memory, and the memory manager rejects anything outside the
/// segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Halt,
    Nop,
    /// acc = imm
    LoadI(u8),
    /// acc = M[addr]
    Load(u16),
    /// M[addr] = acc
    Store(u16),
    /// acc = acc + M[addr]
    Add(u16),
    /// acc = acc - M[addr]
    Sub(u16),
    /// acc = acc * M[addr]
    Mul(u16),
    AddI(u8),
    SubI(u8),
    MulI(u8),
    /// Emit acc on the console.
    Print,
    /// Block the process for the given number of scheduler ticks.
    Wait(u16),
    Jmp(u16),
    /// Jump when acc == 0.
    Jz(u16),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Halt => write!(f, "HALT"),
            Instruction::Nop => write!(f, "NOP"),
            Instruction::LoadI(n) => write!(f, "LOADI {}", n),
            Instruction::Load(a) => write!(f, "LOAD 0x{:04x}", a),
            Instruction::Store(a) => write!(f, "STORE 0x{:04x}", a),
            Instruction::Add(a) => write!(f, "ADD 0x{:04x}", a),
            Instruction::Sub(a) => write!(f, "SUB 0x{:04x}", a),
            Instruction::Mul(a) => write!(f, "MUL 0x{:04x}", a),
            Instruction::AddI(n) => write!(f, "ADDI {}", n),
            Instruction::SubI(n) => write!(f, "SUBI {}", n),
            Instruction::MulI(n) => write!(f, "MULI {}", n),
            Instruction::Print => write!(f, "PRINT"),
            Instruction::Wait(t) => write!(f, "WAIT {}", t),
            Instruction::Jmp(a) => write!(f, "JMP 0x{:04x}", a),
            Instruction::Jz(a) => write!(f, "JZ 0x{:04x}", a),
        }
    }
}
