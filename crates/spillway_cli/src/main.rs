//! Spillway CLI
//!
//! Command-line front end for the spillway stream buffer.
//!
//! # Commands
//!
//! - `pipe` - Copy stdin to stdout through a buffer that spills to disk
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::pipe::{OutputFormat, PipeOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Spillway command-line tools.
#[derive(Parser)]
#[command(name = "spillway")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy stdin to stdout through a spilling buffer
    Pipe {
        /// Directory for spill files (defaults to the system temp dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Segment size in bytes
        #[arg(long, default_value = "65536")]
        segment_size: usize,

        /// Initial number of segment slots
        #[arg(long, default_value = "1024")]
        segment_count: usize,

        /// Segments kept in memory ahead of the reader
        #[arg(short, long, default_value = "10")]
        window: usize,

        /// Maintenance period in milliseconds
        #[arg(long, default_value = "200")]
        period_ms: u64,

        /// Maximum backing file size in bytes
        #[arg(long, default_value = "10000000")]
        file_size: u64,

        /// Maximum number of live backing files
        #[arg(long, default_value = "65536")]
        file_limit: usize,

        /// Keep everything in memory
        #[arg(long)]
        no_files: bool,

        /// Keep consumed backing files
        #[arg(long)]
        keep_files: bool,

        /// Back up every byte to disk and keep all files
        #[arg(long)]
        backup_all: bool,

        /// Pause after each chunk written to stdout, in milliseconds
        #[arg(long, default_value = "0")]
        delay_ms: u64,

        /// Read size for the stdout side in bytes
        #[arg(long, default_value = "65536")]
        chunk: usize,

        /// Status report format on stderr (text, json, none)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Data goes to stdout, so logs go to stderr.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Pipe {
            dir,
            segment_size,
            segment_count,
            window,
            period_ms,
            file_size,
            file_limit,
            no_files,
            keep_files,
            backup_all,
            delay_ms,
            chunk,
            format,
        } => {
            let options = PipeOptions {
                dir: dir.unwrap_or_else(std::env::temp_dir),
                segment_size,
                segment_count,
                window,
                period_ms,
                file_size,
                file_limit,
                use_files: !no_files,
                delete_files: !keep_files,
                backup_all,
                delay_ms,
                chunk,
                format: format.parse::<OutputFormat>()?,
            };
            commands::pipe::run(&options)?;
        }
        Commands::Version => {
            println!("Spillway CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Spillway Core v{}", spillway_core::VERSION);
        }
    }

    Ok(())
}
