use crate::instruction::Instruction;

/// Outcome returned by metering hooks to indicate whether execution should continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterResult {
    Continue,
    Halt,
}

/// Pluggable accounting hook consulted between op-codes. The scheduler uses
/// it to end a time slice; never consulted mid-instruction.
pub trait Metering: std::fmt::Debug {
    /// Called after an instruction completes.
    fn on_instruction(&mut self, _pc: u16, _instr: &Instruction) -> MeterResult {
        MeterResult::Continue
    }
}

/// Default metering that performs no accounting.
#[derive(Debug, Default)]
pub struct NoopMeter;

impl Metering for NoopMeter {}

/// Ends the slice after `quantum` instructions.
#[derive(Debug)]
pub struct QuantumMeter {
    quantum: usize,
    executed: usize,
}

impl QuantumMeter {
    pub fn new(quantum: usize) -> Self {
        Self { quantum, executed: 0 }
    }

    pub fn executed(&self) -> usize {
        self.executed
    }

    pub fn exhausted(&self) -> bool {
        self.executed >= self.quantum
    }
}

impl Metering for QuantumMeter {
    fn on_instruction(&mut self, _pc: u16, _instr: &Instruction) -> MeterResult {
        self.executed += 1;
        if self.exhausted() {
            MeterResult::Halt
        } else {
            MeterResult::Continue
        }
    }
}
