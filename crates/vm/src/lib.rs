//! The simulated machine: memory manager, instruction decoder and CPU.

pub mod cpu;
pub mod decoder;
pub mod instruction;
pub mod memory;
pub mod metering;
pub mod registers;

pub use cpu::{Cpu, CpuFault, Slice, SliceExit, StepOutcome};
pub use decoder::{decode, disassemble, DecodeError};
pub use instruction::Instruction;
pub use memory::{FreeRegion, MemoryError, MemoryManager, MemoryRow, Segment};
pub use metering::{MeterResult, Metering, NoopMeter, QuantumMeter};
pub use registers::Registers;
