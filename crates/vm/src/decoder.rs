use thiserror::Error;
use types::{ExecutableImage, Opcode, WORD_BYTES};

use crate::instruction::Instruction;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("illegal op-code 0x{opcode:02x}")]
pub struct DecodeError {
    pub opcode: u8,
}

/// Decodes one fixed-width instruction word.
///
/// Immediate forms keep only the operand's low byte; the accumulator is a
/// single byte wide.
pub fn decode(word: [u8; WORD_BYTES]) -> Result<Instruction, DecodeError> {
    let operand = u16::from_le_bytes([word[1], word[2]]);
    let imm = word[1];
    let opcode = Opcode::from_byte(word[0]).ok_or(DecodeError { opcode: word[0] })?;
    Ok(match opcode {
        Opcode::Halt => Instruction::Halt,
        Opcode::Nop => Instruction::Nop,
        Opcode::LoadI => Instruction::LoadI(imm),
        Opcode::Load => Instruction::Load(operand),
        Opcode::Store => Instruction::Store(operand),
        Opcode::Add => Instruction::Add(operand),
        Opcode::Sub => Instruction::Sub(operand),
        Opcode::Mul => Instruction::Mul(operand),
        Opcode::AddI => Instruction::AddI(imm),
        Opcode::SubI => Instruction::SubI(imm),
        Opcode::MulI => Instruction::MulI(imm),
        Opcode::Print => Instruction::Print,
        Opcode::Wait => Instruction::Wait(operand),
        Opcode::Jmp => Instruction::Jmp(operand),
        Opcode::Jz => Instruction::Jz(operand),
    })
}

/// Decodes every word of `image`, pairing each with its segment offset.
pub fn disassemble(image: &ExecutableImage) -> Vec<(usize, Result<Instruction, DecodeError>)> {
    image
        .words()
        .enumerate()
        .map(|(i, word)| (i * WORD_BYTES, decode(word)))
        .collect()
}
