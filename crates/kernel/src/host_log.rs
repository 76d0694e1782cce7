use core::fmt;

use types::{Pid, Severity};

/// Log target used when mirroring entries to the `log` facade.
pub const LOG_TARGET: &str = "hostlog";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLogEntry {
    /// Strictly increasing, starting at 0.
    pub seq: u64,
    /// Scheduler tick at which the entry was written.
    pub tick: u64,
    pub severity: Severity,
    pub pid: Option<Pid>,
    pub message: String,
}

impl fmt::Display for HostLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = match self.pid {
            Some(pid) => format!("pid{}", pid),
            None => "kernel".to_string(),
        };
        write!(
            f,
            "#{:04} t={:<4} {:<6} {:<7} {}",
            self.seq,
            self.tick,
            who,
            self.severity.to_string(),
            self.message
        )
    }
}

/// Append-only record of kernel events, in the order they happened.
#[derive(Debug, Clone, Default)]
pub struct HostLog {
    entries: Vec<HostLogEntry>,
    tick: u64,
}

impl HostLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps subsequent entries with `tick`.
    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    pub fn append(&mut self, severity: Severity, pid: Option<Pid>, message: impl Into<String>) -> u64 {
        let entry = HostLogEntry {
            seq: self.entries.len() as u64,
            tick: self.tick,
            severity,
            pid,
            message: message.into(),
        };
        match severity {
            Severity::Info => log::info!(target: LOG_TARGET, "{}", entry),
            Severity::Warning => log::warn!(target: LOG_TARGET, "{}", entry),
            Severity::Error => log::error!(target: LOG_TARGET, "{}", entry),
        }
        let seq = entry.seq;
        self.entries.push(entry);
        seq
    }

    pub fn snapshot(&self) -> Vec<HostLogEntry> {
        self.entries.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostLogEntry> + '_ {
        self.entries.iter()
    }

    /// Entries about `pid`, in order.
    pub fn for_pid(&self, pid: Pid) -> impl Iterator<Item = &HostLogEntry> + '_ {
        self.entries.iter().filter(move |e| e.pid == Some(pid))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_follow_append_order() {
        let mut log = HostLog::new();
        assert_eq!(log.append(Severity::Info, None, "boot"), 0);
        log.set_tick(3);
        assert_eq!(log.append(Severity::Error, Some(Pid::new(2)), "fault"), 1);

        let entries = log.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].tick, 3);
        assert_eq!(log.for_pid(Pid::new(2)).count(), 1);
    }

    #[test]
    fn display_is_one_line() {
        let entry = HostLogEntry {
            seq: 7,
            tick: 2,
            severity: Severity::Info,
            pid: Some(Pid::new(1)),
            message: "output 42".into(),
        };
        let text = entry.to_string();
        assert!(text.starts_with("#0007 t=2"));
        assert!(text.contains("pid1"));
        assert!(text.ends_with("output 42"));
    }
}
