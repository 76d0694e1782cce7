//! edvm - compile and run toy programs on the simulated kernel
//!
//! Commands:
//! - `edvm compile <file> [-o out.img]` - check a program and emit its image
//! - `edvm run <file>...` - load programs into one kernel and run them
//! - `edvm inspect <image>` - list the instructions of an image

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use kernel::{Config, Kernel};
use storage::{Disk, FileDisk, MemoryDisk};
use types::ExecutableImage;

mod report;

#[derive(Parser, Debug)]
#[command(name = "edvm", version, about = "Educational VM: toy compiler and simulated kernel", long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file and print its diagnostics
    Compile {
        file: PathBuf,

        /// Write the serialized image here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile, load and run one or more source files
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Kernel configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Keep swapped processes in this directory instead of in memory
        #[arg(short, long)]
        disk: Option<PathBuf>,

        /// Stop after this many scheduler ticks
        #[arg(long, default_value_t = 10_000)]
        max_ticks: u64,

        /// Trace every executed op-code
        #[arg(long)]
        trace: bool,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Decode a serialized image
    Inspect { image: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    let trace = matches!(cli.command, Commands::Run { trace: true, .. });
    init_logging(cli.verbose, trace);

    if let Err(e) = run(cli.command) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, trace: bool) {
    let filter = match (verbose, trace) {
        (_, true) => "trace",
        (0, _) => "warn",
        (1, _) => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Compile { file, output } => compile_file(&file, output.as_deref()),
        Commands::Run {
            files,
            config,
            disk,
            max_ticks,
            trace: _,
            format,
        } => run_files(&files, config.as_deref(), disk.as_deref(), max_ticks, format),
        Commands::Inspect { image } => inspect_image(&image),
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn compile_file(file: &Path, output: Option<&Path>) -> Result<()> {
    let source = read_source(file)?;
    let out = compiler::compile(&source);
    report::print_diagnostics(&file.display().to_string(), out.diagnostics.iter());

    let Some(image) = out.image else {
        anyhow::bail!(
            "{} failed to compile ({} error(s))",
            file.display(),
            out.diagnostics.error_count()
        );
    };
    println!(
        "{} {} word(s), {} data byte(s), segment {} bytes",
        "compiled".green().bold(),
        image.word_count(),
        image.data_len(),
        image.segment_len()
    );
    for (i, word) in image.words().enumerate() {
        println!("  {:04x}: {}", i * types::WORD_BYTES, hex::encode(word));
    }

    if let Some(path) = output {
        fs::write(path, image.to_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn open_disk(dir: Option<&Path>, capacity: Option<usize>) -> Result<Box<dyn Disk>> {
    Ok(match (dir, capacity) {
        (Some(dir), Some(cap)) => Box::new(
            FileDisk::open(dir)
                .with_context(|| format!("failed to open disk at {}", dir.display()))?
                .with_capacity(cap),
        ),
        (Some(dir), None) => Box::new(
            FileDisk::open(dir).with_context(|| format!("failed to open disk at {}", dir.display()))?,
        ),
        (None, Some(cap)) => Box::new(MemoryDisk::with_capacity(cap)),
        (None, None) => Box::new(MemoryDisk::new()),
    })
}

fn run_files(
    files: &[PathBuf],
    config: Option<&Path>,
    disk: Option<&Path>,
    max_ticks: u64,
    format: Format,
) -> Result<()> {
    let config = match config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let disk = open_disk(disk, config.disk_capacity)?;
    let mut kernel = Kernel::boot(config, disk)?;

    for file in files {
        let source = read_source(file)?;
        let out = kernel.compile(&source);
        let Some(image) = out.image else {
            log::warn!("{} failed to compile, skipping", file.display());
            continue;
        };
        match kernel.load(&image) {
            Ok(pid) => log::info!("loaded {} as pid {}", file.display(), pid),
            Err(e) => log::warn!("could not load {}: {}", file.display(), e),
        }
    }

    let run = kernel.run(max_ticks)?;
    match format {
        Format::Text => report::print_text(&kernel, &run),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report::Summary::of(&kernel, &run))?),
    }
    kernel.shutdown()?;
    Ok(())
}

fn inspect_image(path: &Path) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let image = ExecutableImage::from_bytes(&bytes)
        .with_context(|| format!("{} is not an image", path.display()))?;
    println!(
        "{} {} word(s), {} data byte(s)",
        path.display().to_string().bold(),
        image.word_count(),
        image.data_len()
    );
    for (offset, decoded) in vm::disassemble(&image) {
        match decoded {
            Ok(instr) => println!("  {:04x}: {}", offset, instr),
            Err(e) => println!("  {:04x}: {}", offset, e.to_string().red()),
        }
    }
    Ok(())
}
