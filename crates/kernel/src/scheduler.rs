use std::cmp::Reverse;
use std::collections::VecDeque;

use types::Pid;

use crate::config::SchedulingPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    pid: Pid,
    priority: u8,
    /// Order in which the entry joined the queue.
    stamp: u64,
}

impl Entry {
    /// Larger sorts first under the priority policy.
    fn rank(&self) -> (u8, Reverse<u64>, Reverse<Pid>) {
        (self.priority, Reverse(self.stamp), Reverse(self.pid))
    }
}

/// READY processes waiting for the CPU.
///
/// Under `fifo` the queue is plain round robin. Under `priority` the highest
/// priority is served first; equal priorities keep round-robin order, with
/// the pid as the final tie-break.
#[derive(Debug)]
pub struct ReadyQueue {
    policy: SchedulingPolicy,
    entries: VecDeque<Entry>,
    next_stamp: u64,
}

impl ReadyQueue {
    pub fn new(policy: SchedulingPolicy) -> Self {
        Self {
            policy,
            entries: VecDeque::new(),
            next_stamp: 0,
        }
    }

    pub fn push(&mut self, pid: Pid, priority: u8) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.entries.push_back(Entry { pid, priority, stamp });
    }

    fn best(&self) -> Option<usize> {
        match self.policy {
            SchedulingPolicy::Fifo => (!self.entries.is_empty()).then_some(0),
            SchedulingPolicy::Priority => self
                .entries
                .iter()
                .enumerate()
                .max_by_key(|(_, e)| e.rank())
                .map(|(i, _)| i),
        }
    }

    /// Takes the next process to run.
    pub fn pop(&mut self) -> Option<Pid> {
        let idx = self.best()?;
        self.entries.remove(idx).map(|e| e.pid)
    }

    /// The process that would be dispatched last.
    pub fn last(&self) -> Option<Pid> {
        match self.policy {
            SchedulingPolicy::Fifo => self.entries.back().map(|e| e.pid),
            SchedulingPolicy::Priority => self.entries.iter().min_by_key(|e| e.rank()).map(|e| e.pid),
        }
    }

    pub fn remove(&mut self, pid: Pid) -> bool {
        match self.entries.iter().position(|e| e.pid == pid) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.entries.iter().any(|e| e.pid == pid)
    }

    /// Queued pids in dispatch order.
    pub fn pids(&self) -> Vec<Pid> {
        let mut entries: Vec<Entry> = self.entries.iter().copied().collect();
        if self.policy == SchedulingPolicy::Priority {
            entries.sort_by_key(|e| Reverse(e.rank()));
        }
        entries.into_iter().map(|e| e.pid).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
