use core::fmt;
use std::collections::VecDeque;

use compiler::CompileOutput;
use storage::{Disk, DiskError};
use types::{DiagnosticMessage, Diagnostics, ExecutableImage, Pid, Severity, Stage};
use vm::{Cpu, CpuFault, MemoryError, MemoryManager, MemoryRow, QuantumMeter, SliceExit};

use crate::config::Config;
use crate::error::KernelError;
use crate::host_log::{HostLog, HostLogEntry};
use crate::pcb::{PcbTable, ProcessControlBlock, ProcessState, ProcessView};
use crate::scheduler::ReadyQueue;

pub type Result<T> = core::result::Result<T, KernelError>;

/// One value printed by a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleLine {
    pub pid: Pid,
    pub value: u8,
}

/// How a dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No process was ready this tick.
    Idle,
    /// The quantum ran out; the process is back on the ready queue.
    Preempted,
    /// `WAIT 0`: the process gave up the rest of its slice.
    Yielded,
    /// `WAIT n` with `n > 0`.
    Waiting(u16),
    Halted,
    Faulted(CpuFault),
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Idle => f.write_str("idle"),
            DispatchOutcome::Preempted => f.write_str("preempted"),
            DispatchOutcome::Yielded => f.write_str("yielded"),
            DispatchOutcome::Waiting(n) => write!(f, "waiting {} tick(s)", n),
            DispatchOutcome::Halted => f.write_str("halted"),
            DispatchOutcome::Faulted(fault) => write!(f, "faulted: {}", fault),
        }
    }
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub tick: u64,
    pub pid: Option<Pid>,
    /// Op-codes executed during the slice.
    pub executed: usize,
    pub outputs: Vec<u8>,
    pub outcome: DispatchOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub ticks: u64,
    /// True when every process terminated within the tick budget.
    pub completed: bool,
}

/// The simulated operating system.
///
/// EDUCATIONAL PURPOSE: this is the one place where all the moving parts
/// meet. The kernel owns:
/// - the [`MemoryManager`] (all of RAM)
/// - the [`PcbTable`] and the [`ReadyQueue`]
/// - the swap [`Disk`]
/// - the [`HostLog`], the compile/load/fault [`Diagnostics`] and the console
///
/// Nothing else mutates these. Every process state change goes through
/// one private `transition` helper, which checks the lifecycle and writes exactly one
/// Host Log entry.
///
/// SCHEDULING: each [`Kernel::dispatch`] is one tick. It ages waiting
/// processes, brings swapped-out processes back when memory allows, then
/// runs the next ready process for at most `quantum` op-codes.
///
/// MEMORY PRESSURE: when a new image does not fit and swapping is enabled,
/// idle processes are evicted to disk (waiting ones first, then the tail of
/// the ready queue) until it does.
///
/// FAULTS: a segmentation fault or illegal instruction terminates only the
/// faulting process. The kernel logs it and keeps scheduling.
#[derive(Debug)]
pub struct Kernel {
    config: Config,
    memory: MemoryManager,
    disk: Box<dyn Disk>,
    pcbs: PcbTable,
    ready: ReadyQueue,
    /// Disk-resident processes in the order they were swapped out.
    swapped: VecDeque<Pid>,
    host_log: HostLog,
    diagnostics: Diagnostics,
    console: Vec<ConsoleLine>,
    tick: u64,
    next_pid: u32,
    next_arrival: u64,
}

impl Kernel {
    pub fn boot(config: Config, mut disk: Box<dyn Disk>) -> Result<Self> {
        config.validate()?;
        let memory = MemoryManager::new(config.memory_size);
        let stale = memory.discard_stale_swap(disk.as_mut())?;
        let mut kernel = Self {
            memory,
            ready: ReadyQueue::new(config.policy),
            config,
            disk,
            pcbs: PcbTable::new(),
            swapped: VecDeque::new(),
            host_log: HostLog::new(),
            diagnostics: Diagnostics::new(),
            console: Vec::new(),
            tick: 0,
            next_pid: 1,
            next_arrival: 0,
        };
        let message = format!(
            "boot: {} bytes of memory, quantum {}, {} scheduling, swap {}",
            kernel.config.memory_size,
            kernel.config.quantum,
            kernel.config.policy.as_str(),
            if kernel.config.swap { "on" } else { "off" },
        );
        kernel.host_log.append(Severity::Info, None, message);
        if !stale.is_empty() {
            kernel.host_log.append(
                Severity::Warning,
                None,
                format!("discarded {} stale swap record(s)", stale.len()),
            );
        }
        Ok(kernel)
    }

    /// Terminates every live process and hands back the Host Log.
    pub fn shutdown(mut self) -> Result<HostLog> {
        for pid in self.pcbs.pids() {
            self.retire(pid, Severity::Warning, "shutdown")?;
        }
        let message = format!("shutdown after {} tick(s)", self.tick);
        self.host_log.append(Severity::Info, None, message);
        Ok(self.host_log)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn disk(&self) -> &dyn Disk {
        self.disk.as_ref()
    }

    /// Compiles `source`, recording its diagnostics.
    pub fn compile(&mut self, source: &str) -> CompileOutput {
        let output = compiler::compile(source);
        self.diagnostics.extend(output.diagnostics.clone());
        output
    }

    pub fn load(&mut self, image: &ExecutableImage) -> Result<Pid> {
        self.load_with_priority(image, self.config.default_priority)
    }

    /// Places `image` in a fresh segment and makes it READY.
    ///
    /// On failure the error is logged and recorded as a `loader` diagnostic.
    /// Idle processes evicted while making room stay on disk.
    pub fn load_with_priority(&mut self, image: &ExecutableImage, priority: u8) -> Result<Pid> {
        match self.try_load(image, priority) {
            Ok(pid) => Ok(pid),
            Err(e) => {
                self.host_log
                    .append(Severity::Error, None, format!("load failed: {}", e));
                self.diagnostics
                    .error(Stage::Loader, format!("cannot load image: {}", e), None);
                Err(e)
            }
        }
    }

    fn try_load(&mut self, image: &ExecutableImage, priority: u8) -> Result<Pid> {
        let size = image.segment_len();
        if size > self.memory.size() {
            return Err(MemoryError::OutOfMemory {
                requested: size,
                largest_free: self.memory.largest_free(),
            }
            .into());
        }
        let segment = self.allocate_for_load(size)?;
        self.memory.fill(segment, 0)?;
        self.memory.write_slice(segment, segment.base(), image.code())?;

        let pid = Pid::new(self.next_pid);
        self.next_pid += 1;
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        self.pcbs
            .insert(ProcessControlBlock::new(pid, segment, priority, arrival));
        self.host_log.append(
            Severity::Info,
            Some(pid),
            format!("created (NEW): {} bytes at {:?}", size, segment),
        );
        self.transition(pid, ProcessState::Ready, Severity::Info, "loaded")?;
        self.ready.push(pid, priority);
        Ok(pid)
    }

    fn allocate_for_load(&mut self, size: usize) -> Result<vm::Segment> {
        loop {
            let err = match self.memory.allocate(size) {
                Ok(segment) => return Ok(segment),
                Err(e) => e,
            };
            if !matches!(err, MemoryError::OutOfMemory { .. }) || !self.config.swap {
                return Err(err.into());
            }
            let Some(victim) = self.pick_victim() else {
                return Err(err.into());
            };
            self.evict(victim, "memory pressure")?;
        }
    }

    /// Next idle resident process to swap out: waiting processes by pid,
    /// then the tail of the ready queue.
    fn pick_victim(&self) -> Option<Pid> {
        self.pcbs
            .iter()
            .find(|p| p.state == ProcessState::Waiting && p.segment.is_some())
            .map(|p| p.pid)
            .or_else(|| self.ready.last())
    }

    fn pcb(&self, pid: Pid) -> Result<&ProcessControlBlock> {
        self.pcbs.get(pid).ok_or(KernelError::UnknownProcess(pid))
    }

    fn pcb_mut(&mut self, pid: Pid) -> Result<&mut ProcessControlBlock> {
        self.pcbs.get_mut(pid).ok_or(KernelError::UnknownProcess(pid))
    }

    /// Moves `pid` to `to` and records the change.
    fn transition(&mut self, pid: Pid, to: ProcessState, severity: Severity, note: &str) -> Result<()> {
        let pcb = self.pcb_mut(pid)?;
        let from = pcb.state;
        if !from.can_become(to) {
            return Err(KernelError::InvalidTransition { pid, from, to });
        }
        pcb.state = to;
        let message = if note.is_empty() {
            format!("{} -> {}", from, to)
        } else {
            format!("{} -> {}: {}", from, to, note)
        };
        self.host_log.append(severity, Some(pid), message);
        Ok(())
    }

    /// Copies an idle process to disk and releases its segment.
    fn evict(&mut self, pid: Pid, reason: &str) -> Result<()> {
        let pcb = self.pcb(pid)?;
        let state = pcb.state;
        let Some(segment) = pcb.segment else {
            return Err(KernelError::WrongState {
                pid,
                state,
                expected: "resident in memory",
            });
        };
        if !matches!(state, ProcessState::Ready | ProcessState::Waiting) {
            return Err(KernelError::WrongState {
                pid,
                state,
                expected: "READY or WAITING",
            });
        }
        let key = match self.memory.evict(segment, self.disk.as_mut()) {
            Ok(key) => key,
            Err(e) => {
                self.host_log
                    .append(Severity::Warning, Some(pid), format!("swap out failed: {}", e));
                return Err(e.into());
            }
        };
        self.ready.remove(pid);
        self.swapped.push_back(pid);
        let pcb = self.pcb_mut(pid)?;
        pcb.segment = None;
        pcb.swap_key = Some(key.clone());
        let note = format!("{}, {:?} swapped to `{}`", reason, segment, key);
        self.transition(pid, ProcessState::ResidentOnDisk, Severity::Info, &note)
    }

    /// Brings a disk-resident process back into memory as READY.
    fn restore(&mut self, pid: Pid) -> Result<()> {
        let pcb = self.pcb(pid)?;
        let Some(key) = pcb.swap_key.clone() else {
            return Err(KernelError::WrongState {
                pid,
                state: pcb.state,
                expected: "RESIDENT_ON_DISK",
            });
        };
        let priority = pcb.priority;
        match self.memory.restore(&key, self.disk.as_mut()) {
            Ok(segment) => {
                self.swapped.retain(|&p| p != pid);
                let pcb = self.pcb_mut(pid)?;
                pcb.segment = Some(segment);
                pcb.swap_key = None;
                let note = format!("restored from `{}` at {:?}", key, segment);
                self.transition(pid, ProcessState::Ready, Severity::Info, &note)?;
                self.ready.push(pid, priority);
                Ok(())
            }
            Err(MemoryError::Disk(DiskError::NotFound { .. })) => {
                self.retire(pid, Severity::Error, &format!("swap record `{}` is missing", key))?;
                Err(KernelError::MissingSwapRecord { pid, key })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Terminates `pid` and releases whatever it holds.
    fn retire(&mut self, pid: Pid, severity: Severity, note: &str) -> Result<()> {
        self.transition(pid, ProcessState::Terminated, severity, note)?;
        self.ready.remove(pid);
        self.swapped.retain(|&p| p != pid);
        let pcb = self.pcbs.remove(pid).ok_or(KernelError::UnknownProcess(pid))?;
        if let Some(segment) = pcb.segment {
            self.memory.free(segment)?;
        }
        if let Some(key) = pcb.swap_key {
            self.disk.delete(&key)?;
        }
        Ok(())
    }

    /// Kills a live process at an op-code boundary.
    pub fn terminate(&mut self, pid: Pid) -> Result<()> {
        self.pcb(pid)?;
        self.retire(pid, Severity::Warning, "terminated on request")
    }

    /// Evicts an idle process to disk.
    pub fn swap_out(&mut self, pid: Pid) -> Result<()> {
        self.evict(pid, "swap requested")
    }

    /// Restores a disk-resident process whose wait has elapsed.
    pub fn swap_in(&mut self, pid: Pid) -> Result<()> {
        let pcb = self.pcb(pid)?;
        if pcb.state != ProcessState::ResidentOnDisk {
            return Err(KernelError::WrongState {
                pid,
                state: pcb.state,
                expected: "RESIDENT_ON_DISK",
            });
        }
        if pcb.wait_ticks > 0 {
            return Err(KernelError::StillWaiting {
                pid,
                ticks: pcb.wait_ticks,
            });
        }
        self.restore(pid)
    }

    /// Counts down waiting and disk-resident processes, waking resident ones
    /// that reach zero.
    fn advance_waits(&mut self) -> Result<()> {
        let mut woken = Vec::new();
        for pcb in self.pcbs.iter_mut() {
            if !matches!(pcb.state, ProcessState::Waiting | ProcessState::ResidentOnDisk) || pcb.wait_ticks == 0 {
                continue;
            }
            pcb.wait_ticks -= 1;
            if pcb.state == ProcessState::Waiting && pcb.wait_ticks == 0 {
                woken.push((pcb.pid, pcb.priority));
            }
        }
        for (pid, priority) in woken {
            self.transition(pid, ProcessState::Ready, Severity::Info, "wait elapsed")?;
            self.ready.push(pid, priority);
        }
        Ok(())
    }

    /// Restores disk-resident processes in swap order while memory allows.
    fn restore_swapped(&mut self) -> Result<()> {
        let due: Vec<Pid> = self
            .swapped
            .iter()
            .copied()
            .filter(|&pid| self.pcbs.get(pid).is_some_and(|p| p.wait_ticks == 0))
            .collect();
        let mut made_room = false;
        for pid in due {
            match self.restore(pid) {
                Ok(()) => continue,
                Err(e) if e.is_out_of_memory() => {}
                Err(e) => return Err(e),
            }
            // nothing else can run: trade a waiting process for this one, once
            if made_room || !self.ready.is_empty() {
                break;
            }
            made_room = true;
            let waiting = self
                .pcbs
                .iter()
                .find(|p| p.state == ProcessState::Waiting && p.segment.is_some())
                .map(|p| p.pid);
            let Some(victim) = waiting else { break };
            if self.evict(victim, "making room for restore").is_err() {
                break;
            }
            match self.restore(pid) {
                Ok(()) => {}
                Err(e) if e.is_out_of_memory() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Runs one scheduler tick.
    pub fn dispatch(&mut self) -> Result<Dispatch> {
        self.tick += 1;
        self.host_log.set_tick(self.tick);
        self.advance_waits()?;
        self.restore_swapped()?;

        let Some(pid) = self.ready.pop() else {
            return Ok(Dispatch {
                tick: self.tick,
                pid: None,
                executed: 0,
                outputs: Vec::new(),
                outcome: DispatchOutcome::Idle,
            });
        };
        self.transition(pid, ProcessState::Running, Severity::Info, "")?;
        let pcb = self.pcb(pid)?;
        let (regs, priority) = (pcb.regs, pcb.priority);
        let Some(segment) = pcb.segment else {
            return Err(KernelError::WrongState {
                pid,
                state: pcb.state,
                expected: "resident in memory",
            });
        };

        let mut cpu = Cpu::new(regs);
        cpu.verbose = log::log_enabled!(log::Level::Trace);
        let mut meter = QuantumMeter::new(self.config.quantum);
        let slice = cpu.run_slice(&mut self.memory, segment, &mut meter);
        self.pcb_mut(pid)?.regs = cpu.registers();
        log::debug!("pid {} ran {} op-code(s): {:?}", pid, slice.executed, slice.exit);

        for &value in &slice.outputs {
            self.console.push(ConsoleLine { pid, value });
            self.host_log
                .append(Severity::Info, Some(pid), format!("output {}", value));
        }

        let outcome = match slice.exit {
            SliceExit::Halted => {
                self.retire(pid, Severity::Info, "halted")?;
                DispatchOutcome::Halted
            }
            SliceExit::Preempted => {
                self.transition(pid, ProcessState::Ready, Severity::Info, "quantum expired")?;
                self.ready.push(pid, priority);
                DispatchOutcome::Preempted
            }
            SliceExit::Blocked(0) => {
                self.transition(pid, ProcessState::Ready, Severity::Info, "yield")?;
                self.ready.push(pid, priority);
                DispatchOutcome::Yielded
            }
            SliceExit::Blocked(ticks) => {
                self.pcb_mut(pid)?.wait_ticks = ticks;
                let note = format!("wait {} tick(s)", ticks);
                self.transition(pid, ProcessState::Waiting, Severity::Info, &note)?;
                DispatchOutcome::Waiting(ticks)
            }
            SliceExit::Faulted(fault) => {
                log::warn!("pid {} faulted: {}", pid, fault);
                self.retire(pid, Severity::Error, &fault.to_string())?;
                self.diagnostics.error(
                    Stage::Kernel,
                    format!("process {} terminated: {}", pid, fault),
                    None,
                );
                DispatchOutcome::Faulted(fault)
            }
        };
        Ok(Dispatch {
            tick: self.tick,
            pid: Some(pid),
            executed: slice.executed,
            outputs: slice.outputs,
            outcome,
        })
    }

    /// Dispatches until no process is left or `max_ticks` ticks have passed.
    pub fn run(&mut self, max_ticks: u64) -> Result<RunReport> {
        let start = self.tick;
        while !self.pcbs.is_empty() && self.tick - start < max_ticks {
            self.dispatch()?;
        }
        Ok(RunReport {
            ticks: self.tick - start,
            completed: self.pcbs.is_empty(),
        })
    }

    pub fn has_live_processes(&self) -> bool {
        !self.pcbs.is_empty()
    }

    pub fn process(&self, pid: Pid) -> Option<ProcessView> {
        self.pcbs.get(pid).map(ProcessControlBlock::view)
    }

    /// Live processes in pid order.
    pub fn list_processes(&self) -> Vec<ProcessView> {
        self.pcbs.views()
    }

    /// Ready pids in the order they would be dispatched.
    pub fn ready_queue(&self) -> Vec<Pid> {
        self.ready.pids()
    }

    pub fn memory_snapshot(&self) -> Vec<MemoryRow> {
        self.memory.snapshot_rows(self.config.row_width)
    }

    pub fn host_log(&self) -> &HostLog {
        &self.host_log
    }

    pub fn host_log_snapshot(&self) -> Vec<HostLogEntry> {
        self.host_log.snapshot()
    }

    /// Diagnostics of one stage, or all of them for `None`, in emission order.
    pub fn diagnostics_snapshot(&self, stage: Option<Stage>) -> Vec<DiagnosticMessage> {
        match stage {
            Some(stage) => self.diagnostics.by_stage(stage).cloned().collect(),
            None => self.diagnostics.iter().cloned().collect(),
        }
    }

    pub fn console(&self) -> &[ConsoleLine] {
        &self.console
    }
}
