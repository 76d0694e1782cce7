use thiserror::Error;
use types::WORD_BYTES;

use crate::decoder::decode;
use crate::instruction::Instruction;
use crate::memory::{MemoryError, MemoryManager, Segment};
use crate::metering::{MeterResult, Metering};
use crate::registers::Registers;

/// Faults raised while interpreting a process's code. The kernel terminates
/// the faulting process; the CPU itself stays usable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CpuFault {
    #[error("segmentation fault at pc 0x{pc:04x}: address 0x{addr:04x} outside segment [0x{base:04x}, 0x{limit:04x})")]
    Segmentation {
        pc: u16,
        addr: usize,
        base: usize,
        limit: usize,
    },

    #[error("illegal instruction 0x{opcode:02x} at pc 0x{pc:04x}")]
    IllegalInstruction { pc: u16, opcode: u8 },
}

/// What a single instruction asks of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Output(u8),
    Block(u16),
    Halt,
}

/// Why a time slice ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceExit {
    /// The meter ended the slice; the process can run again.
    Preempted,
    /// `WAIT n` executed.
    Blocked(u16),
    Halted,
    Faulted(CpuFault),
}

/// Result of running one time slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    pub executed: usize,
    /// Values printed during the slice, in order.
    pub outputs: Vec<u8>,
    pub exit: SliceExit,
}

/// The simulated processor.
///
/// EDUCATIONAL PURPOSE: a minimal accumulator machine. Each `step` runs the
/// classic instruction cycle:
/// 1. FETCH three bytes at `segment.base + pc` (bounds-checked by the memory manager)
/// 2. DECODE them into an [`Instruction`]
/// 3. EXECUTE: update `acc`, memory or `pc`
///
/// CONTEXT SWITCHING: the CPU holds the registers of whichever process is
/// running. The scheduler loads a process's saved [`Registers`] with
/// [`Cpu::new`], runs a slice, then saves [`Cpu::registers`] back into the
/// PCB. Nothing else about a process lives in the CPU.
///
/// MEMORY SAFETY: every fetch, load and store goes through
/// [`MemoryManager::read`]/[`MemoryManager::write`] with the process's own
/// segment, so a stray address becomes a [`CpuFault::Segmentation`] instead
/// of corrupting a neighbour.
#[derive(Debug)]
pub struct Cpu {
    regs: Registers,
    pub verbose: bool,
}

impl Cpu {
    pub fn new(regs: Registers) -> Self {
        Self { regs, verbose: false }
    }

    pub fn registers(&self) -> Registers {
        self.regs
    }

    fn translate(&self, segment: Segment, rel: usize) -> usize {
        segment.base() + rel
    }

    fn fault(&self, err: MemoryError, segment: Segment, addr: usize) -> CpuFault {
        let (addr, base, limit) = match err {
            MemoryError::SegmentationFault { addr, base, limit } => (addr, base, limit),
            _ => (addr, segment.base(), segment.limit()),
        };
        CpuFault::Segmentation {
            pc: self.regs.pc,
            addr,
            base,
            limit,
        }
    }

    fn load(&self, memory: &MemoryManager, segment: Segment, rel: usize) -> Result<u8, CpuFault> {
        let addr = self.translate(segment, rel);
        memory
            .read(segment, addr)
            .map_err(|e| self.fault(e, segment, addr))
    }

    fn fetch(&self, memory: &MemoryManager, segment: Segment) -> Result<[u8; WORD_BYTES], CpuFault> {
        let mut word = [0u8; WORD_BYTES];
        for (i, byte) in word.iter_mut().enumerate() {
            *byte = self.load(memory, segment, self.regs.pc as usize + i)?;
        }
        Ok(word)
    }

    /// Executes exactly one instruction.
    pub fn step(&mut self, memory: &mut MemoryManager, segment: Segment) -> Result<StepOutcome, CpuFault> {
        self.cycle(memory, segment).map(|(_, outcome)| outcome)
    }

    fn cycle(
        &mut self,
        memory: &mut MemoryManager,
        segment: Segment,
    ) -> Result<(Instruction, StepOutcome), CpuFault> {
        let word = self.fetch(memory, segment)?;
        let instr = decode(word).map_err(|e| CpuFault::IllegalInstruction {
            pc: self.regs.pc,
            opcode: e.opcode,
        })?;
        if self.verbose {
            log::trace!("pc=0x{:04x} acc={} {}", self.regs.pc, self.regs.acc, instr);
        }

        // None when the next word would start past the addressable range
        let mut pc = self.regs.pc.checked_add(WORD_BYTES as u16);
        let outcome = match instr {
            Instruction::Halt => {
                // pc stays on HALT
                pc = Some(self.regs.pc);
                StepOutcome::Halt
            }
            Instruction::Nop => StepOutcome::Continue,
            Instruction::LoadI(n) => {
                self.regs.acc = n;
                StepOutcome::Continue
            }
            Instruction::Load(a) => {
                self.regs.acc = self.load(memory, segment, a as usize)?;
                StepOutcome::Continue
            }
            Instruction::Store(a) => {
                let addr = self.translate(segment, a as usize);
                memory
                    .write(segment, addr, self.regs.acc)
                    .map_err(|e| self.fault(e, segment, addr))?;
                StepOutcome::Continue
            }
            Instruction::Add(a) => {
                let v = self.load(memory, segment, a as usize)?;
                self.regs.acc = self.regs.acc.wrapping_add(v);
                StepOutcome::Continue
            }
            Instruction::Sub(a) => {
                let v = self.load(memory, segment, a as usize)?;
                self.regs.acc = self.regs.acc.wrapping_sub(v);
                StepOutcome::Continue
            }
            Instruction::Mul(a) => {
                let v = self.load(memory, segment, a as usize)?;
                self.regs.acc = self.regs.acc.wrapping_mul(v);
                StepOutcome::Continue
            }
            Instruction::AddI(n) => {
                self.regs.acc = self.regs.acc.wrapping_add(n);
                StepOutcome::Continue
            }
            Instruction::SubI(n) => {
                self.regs.acc = self.regs.acc.wrapping_sub(n);
                StepOutcome::Continue
            }
            Instruction::MulI(n) => {
                self.regs.acc = self.regs.acc.wrapping_mul(n);
                StepOutcome::Continue
            }
            Instruction::Print => StepOutcome::Output(self.regs.acc),
            Instruction::Wait(ticks) => StepOutcome::Block(ticks),
            Instruction::Jmp(a) => {
                pc = Some(a);
                StepOutcome::Continue
            }
            Instruction::Jz(a) => {
                if self.regs.acc == 0 {
                    pc = Some(a);
                }
                StepOutcome::Continue
            }
        };
        self.regs.pc = match pc {
            Some(pc) => pc,
            None => {
                let addr = self.translate(segment, self.regs.pc as usize + WORD_BYTES);
                return Err(CpuFault::Segmentation {
                    pc: self.regs.pc,
                    addr,
                    base: segment.base(),
                    limit: segment.limit(),
                });
            }
        };
        Ok((instr, outcome))
    }

    /// Runs instructions until the process halts, blocks, faults, or `meter`
    /// ends the slice. The meter is only consulted between instructions.
    pub fn run_slice(
        &mut self,
        memory: &mut MemoryManager,
        segment: Segment,
        meter: &mut dyn Metering,
    ) -> Slice {
        let mut executed = 0;
        let mut outputs = Vec::new();
        loop {
            let pc = self.regs.pc;
            let (instr, outcome) = match self.cycle(memory, segment) {
                Ok(done) => done,
                Err(fault) => {
                    return Slice {
                        executed,
                        outputs,
                        exit: SliceExit::Faulted(fault),
                    }
                }
            };
            executed += 1;
            let exit = match outcome {
                StepOutcome::Halt => Some(SliceExit::Halted),
                StepOutcome::Block(ticks) => Some(SliceExit::Blocked(ticks)),
                StepOutcome::Output(v) => {
                    outputs.push(v);
                    None
                }
                StepOutcome::Continue => None,
            };
            if let Some(exit) = exit {
                return Slice { executed, outputs, exit };
            }
            if meter.on_instruction(pc, &instr) == MeterResult::Halt {
                return Slice {
                    executed,
                    outputs,
                    exit: SliceExit::Preempted,
                };
            }
        }
    }
}
