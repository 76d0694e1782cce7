//! The simulated operating system: process table, scheduler, swap and the
//! Host Log, coordinated by [`Kernel`].

pub mod config;
pub mod error;
pub mod host_log;
pub mod kernel;
pub mod pcb;
pub mod scheduler;

pub use config::{Config, ConfigError, SchedulingPolicy};
pub use error::KernelError;
pub use host_log::{HostLog, HostLogEntry};
pub use kernel::{ConsoleLine, Dispatch, DispatchOutcome, Kernel, RunReport};
pub use pcb::{PcbTable, ProcessControlBlock, ProcessState, ProcessView};
pub use scheduler::ReadyQueue;
