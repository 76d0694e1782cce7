use core::fmt;

/// Every instruction occupies exactly this many bytes:
/// `[opcode, operand_lo, operand_hi]`.
pub const WORD_BYTES: usize = 3;

/// Op-code byte values of the simulated CPU.
///
/// Memory operands (`LOAD`, `STORE`, `ADD`, `SUB`, `MUL`, `JMP`, `JZ`) are
/// relative to the base of the executing process's segment. Immediate
/// operands only use their low byte, except `WAIT` which counts ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Halt = 0x00,
    Nop = 0x01,
    LoadI = 0x10,
    Load = 0x11,
    Store = 0x12,
    Add = 0x20,
    Sub = 0x21,
    Mul = 0x22,
    AddI = 0x23,
    SubI = 0x24,
    MulI = 0x25,
    Print = 0x30,
    Wait = 0x40,
    Jmp = 0x50,
    Jz = 0x51,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Opcode::Halt),
            0x01 => Some(Opcode::Nop),
            0x10 => Some(Opcode::LoadI),
            0x11 => Some(Opcode::Load),
            0x12 => Some(Opcode::Store),
            0x20 => Some(Opcode::Add),
            0x21 => Some(Opcode::Sub),
            0x22 => Some(Opcode::Mul),
            0x23 => Some(Opcode::AddI),
            0x24 => Some(Opcode::SubI),
            0x25 => Some(Opcode::MulI),
            0x30 => Some(Opcode::Print),
            0x40 => Some(Opcode::Wait),
            0x50 => Some(Opcode::Jmp),
            0x51 => Some(Opcode::Jz),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Halt => "HALT",
            Opcode::Nop => "NOP",
            Opcode::LoadI => "LOADI",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::AddI => "ADDI",
            Opcode::SubI => "SUBI",
            Opcode::MulI => "MULI",
            Opcode::Print => "PRINT",
            Opcode::Wait => "WAIT",
            Opcode::Jmp => "JMP",
            Opcode::Jz => "JZ",
        }
    }

    /// Encodes one fixed-width instruction word.
    pub fn encode(self, operand: u16) -> [u8; WORD_BYTES] {
        let [lo, hi] = operand.to_le_bytes();
        [self.as_byte(), lo, hi]
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
