use storage::DiskError;
use thiserror::Error;
use types::Pid;
use vm::MemoryError;

use crate::config::ConfigError;
use crate::pcb::ProcessState;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Disk(#[from] DiskError),

    #[error("no live process with pid {0}")]
    UnknownProcess(Pid),

    #[error("process {pid} cannot go from {from} to {to}")]
    InvalidTransition {
        pid: Pid,
        from: ProcessState,
        to: ProcessState,
    },

    #[error("process {pid} is {state}, expected {expected}")]
    WrongState {
        pid: Pid,
        state: ProcessState,
        expected: &'static str,
    },

    #[error("process {pid} still waits {ticks} tick(s)")]
    StillWaiting { pid: Pid, ticks: u16 },

    #[error("swap record `{key}` of process {pid} is missing")]
    MissingSwapRecord { pid: Pid, key: String },
}

impl KernelError {
    /// True when memory could not be found for a load or restore.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, KernelError::Memory(MemoryError::OutOfMemory { .. }))
    }

    pub fn is_disk_full(&self) -> bool {
        matches!(
            self,
            KernelError::Memory(MemoryError::Disk(DiskError::DiskFull { .. }))
                | KernelError::Disk(DiskError::DiskFull { .. })
        )
    }
}
