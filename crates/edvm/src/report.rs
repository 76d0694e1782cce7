use colored::Colorize;
use kernel::{Kernel, RunReport};
use serde::Serialize;
use types::{DiagnosticMessage, Severity};

pub fn print_diagnostics<'a>(origin: &str, diagnostics: impl Iterator<Item = &'a DiagnosticMessage>) {
    for d in diagnostics {
        let severity = match d.severity {
            Severity::Error => d.severity.to_string().red().bold(),
            Severity::Warning => d.severity.to_string().yellow().bold(),
            Severity::Info => d.severity.to_string().cyan(),
        };
        match d.position {
            Some(pos) => println!("{}:{}: {} [{}] {}", origin, pos, severity, d.source, d.text),
            None => println!("{}: {} [{}] {}", origin, severity, d.source, d.text),
        }
    }
}

pub fn print_text(kernel: &Kernel, run: &RunReport) {
    let status = if run.completed {
        "all processes finished".green()
    } else {
        "tick budget exhausted".yellow()
    };
    println!("{} after {} tick(s): {}", "run".bold(), run.ticks, status);

    println!();
    println!("{}", "Console".bold().blue());
    for line in kernel.console() {
        println!("  pid{:<4} {}", line.pid, line.value);
    }

    println!();
    println!("{}", "Diagnostics".bold().blue());
    print_diagnostics("  edvm", kernel.diagnostics_snapshot(None).iter());

    println!();
    println!("{}", "Host log".bold().blue());
    for entry in kernel.host_log().iter() {
        let text = entry.to_string();
        match entry.severity {
            Severity::Error => println!("  {}", text.red()),
            Severity::Warning => println!("  {}", text.yellow()),
            Severity::Info => println!("  {}", text),
        }
    }

    println!();
    println!("{}", "Processes".bold().blue());
    let processes = kernel.list_processes();
    if processes.is_empty() {
        println!("  (none)");
    }
    for p in processes {
        let place = match (&p.segment, &p.swap_key) {
            (Some(seg), _) => format!("{:?}", seg),
            (None, Some(key)) => format!("disk `{}`", key),
            (None, None) => "-".to_string(),
        };
        println!(
            "  pid{:<4} {:<16} prio {:<3} pc 0x{:04x} acc {:<3} {:>5}B {}",
            p.pid,
            p.state.to_string(),
            p.priority,
            p.pc,
            p.acc,
            p.image_len,
            place
        );
    }

    println!();
    println!("{}", "Memory".bold().blue());
    for row in kernel.memory_snapshot() {
        let cells: Vec<String> = row.values.iter().map(|v| format!("{:02x}", v)).collect();
        println!("  {} {}", row.label().dimmed(), cells.join(" "));
    }
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub ticks: u64,
    pub completed: bool,
    pub console: Vec<ConsoleJson>,
    pub diagnostics: Vec<String>,
    pub host_log: Vec<LogJson>,
    pub processes: Vec<ProcessJson>,
    pub memory: Vec<MemoryRowJson>,
}

#[derive(Debug, Serialize)]
pub struct ConsoleJson {
    pub pid: u32,
    pub value: u8,
}

#[derive(Debug, Serialize)]
pub struct LogJson {
    pub seq: u64,
    pub tick: u64,
    pub severity: String,
    pub pid: Option<u32>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessJson {
    pub pid: u32,
    pub state: String,
    pub priority: u8,
    pub pc: u16,
    pub acc: u8,
    pub base: Option<usize>,
    pub limit: Option<usize>,
    pub swap_key: Option<String>,
    pub image_len: usize,
}

#[derive(Debug, Serialize)]
pub struct MemoryRowJson {
    pub label: String,
    pub values: Vec<u8>,
}

impl Summary {
    pub fn of(kernel: &Kernel, run: &RunReport) -> Self {
        Self {
            ticks: run.ticks,
            completed: run.completed,
            console: kernel
                .console()
                .iter()
                .map(|l| ConsoleJson {
                    pid: l.pid.as_u32(),
                    value: l.value,
                })
                .collect(),
            diagnostics: kernel
                .diagnostics_snapshot(None)
                .iter()
                .map(ToString::to_string)
                .collect(),
            host_log: kernel
                .host_log()
                .iter()
                .map(|e| LogJson {
                    seq: e.seq,
                    tick: e.tick,
                    severity: e.severity.to_string(),
                    pid: e.pid.map(|p| p.as_u32()),
                    message: e.message.clone(),
                })
                .collect(),
            processes: kernel
                .list_processes()
                .into_iter()
                .map(|p| ProcessJson {
                    pid: p.pid.as_u32(),
                    state: p.state.to_string(),
                    priority: p.priority,
                    pc: p.pc,
                    acc: p.acc,
                    base: p.segment.map(|s| s.base()),
                    limit: p.segment.map(|s| s.limit()),
                    swap_key: p.swap_key,
                    image_len: p.image_len,
                })
                .collect(),
            memory: kernel
                .memory_snapshot()
                .into_iter()
                .map(|row| MemoryRowJson {
                    label: row.label(),
                    values: row.values,
                })
                .collect(),
        }
    }
}
