use core::fmt;
use std::collections::BTreeMap;

use types::Pid;
use vm::{Registers, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    New,
    Ready,
    Running,
    Waiting,
    ResidentOnDisk,
    Terminated,
}

impl ProcessState {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::New => "NEW",
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Waiting => "WAITING",
            ProcessState::ResidentOnDisk => "RESIDENT_ON_DISK",
            ProcessState::Terminated => "TERMINATED",
        }
    }

    /// Legal edges of the process lifecycle. Idle processes (READY or
    /// WAITING) may be swapped out, and every live state may be terminated.
    pub fn can_become(self, next: ProcessState) -> bool {
        use ProcessState::*;
        match (self, next) {
            (Terminated, _) => false,
            (_, Terminated) => true,
            (New, Ready) => true,
            (Ready, Running) => true,
            (Running, Ready | Waiting | ResidentOnDisk) => true,
            (Ready | Waiting, ResidentOnDisk) => true,
            (ResidentOnDisk, Ready) => true,
            (Waiting, Ready) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the kernel knows about one process.
///
/// EDUCATIONAL PURPOSE: the PCB is where a process "lives" while it is not
/// on the CPU. A context switch copies `regs` into the CPU, and copies them
/// back out when the time slice ends. Because `pc` is relative to the
/// segment base, a process can be swapped out and restored at a different
/// address without touching its registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessControlBlock {
    pub pid: Pid,
    pub state: ProcessState,
    pub regs: Registers,
    /// `None` while the process is resident on disk.
    pub segment: Option<Segment>,
    /// Swap record key while the process is resident on disk.
    pub swap_key: Option<String>,
    /// Higher runs first under the priority policy.
    pub priority: u8,
    /// Ticks left before a waiting process becomes ready.
    pub wait_ticks: u16,
    /// Load order.
    pub arrival: u64,
    /// Bytes of the loaded image, code plus data.
    pub image_len: usize,
}

impl ProcessControlBlock {
    pub fn new(pid: Pid, segment: Segment, priority: u8, arrival: u64) -> Self {
        Self {
            pid,
            state: ProcessState::New,
            regs: Registers::new(),
            segment: Some(segment),
            swap_key: None,
            priority,
            wait_ticks: 0,
            arrival,
            image_len: segment.len(),
        }
    }

    pub fn view(&self) -> ProcessView {
        ProcessView {
            pid: self.pid,
            state: self.state,
            priority: self.priority,
            pc: self.regs.pc,
            acc: self.regs.acc,
            segment: self.segment,
            swap_key: self.swap_key.clone(),
            wait_ticks: self.wait_ticks,
            arrival: self.arrival,
            image_len: self.image_len,
        }
    }
}

/// Read-only copy of a PCB for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessView {
    pub pid: Pid,
    pub state: ProcessState,
    pub priority: u8,
    pub pc: u16,
    pub acc: u8,
    pub segment: Option<Segment>,
    pub swap_key: Option<String>,
    pub wait_ticks: u16,
    pub arrival: u64,
    pub image_len: usize,
}

/// Live processes keyed by pid. Terminated processes are removed.
#[derive(Debug, Default)]
pub struct PcbTable {
    entries: BTreeMap<Pid, ProcessControlBlock>,
}

impl PcbTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pcb: ProcessControlBlock) {
        self.entries.insert(pcb.pid, pcb);
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessControlBlock> {
        self.entries.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut ProcessControlBlock> {
        self.entries.get_mut(&pid)
    }

    pub fn remove(&mut self, pid: Pid) -> Option<ProcessControlBlock> {
        self.entries.remove(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.entries.contains_key(&pid)
    }

    /// In pid order.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessControlBlock> + '_ {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ProcessControlBlock> + '_ {
        self.entries.values_mut()
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn views(&self) -> Vec<ProcessView> {
        self.entries.values().map(ProcessControlBlock::view).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::ProcessState::*;

    #[test]
    fn lifecycle_edges() {
        assert!(New.can_become(Ready));
        assert!(!New.can_become(Running));
        assert!(Ready.can_become(Running));
        assert!(Running.can_become(Waiting));
        assert!(Waiting.can_become(Ready));
        assert!(!Waiting.can_become(Running));
        assert!(ResidentOnDisk.can_become(Ready));
        assert!(!ResidentOnDisk.can_become(Running));
        assert!(Waiting.can_become(ResidentOnDisk));
        assert!(New.can_become(Terminated));
        assert!(!Terminated.can_become(Ready));
        assert!(!Terminated.can_become(Terminated));
    }
}
