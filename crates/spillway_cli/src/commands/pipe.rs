//! Pipe command implementation.

use spillway_core::{BufferConfig, BufferStatus, Pump, ReaderSource, SpillBuffer};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const PUMP_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Status report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
    /// No report.
    None,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "none" => Ok(Self::None),
            other => Err(format!("unknown format {other:?} (text, json, none)")),
        }
    }
}

/// Options for the pipe command.
#[derive(Debug, Clone)]
pub struct PipeOptions {
    /// Parent directory for spill files.
    pub dir: PathBuf,
    /// Segment size in bytes.
    pub segment_size: usize,
    /// Initial number of segment slots.
    pub segment_count: usize,
    /// Window size in segments.
    pub window: usize,
    /// Maintenance period in milliseconds.
    pub period_ms: u64,
    /// Maximum backing file size.
    pub file_size: u64,
    /// Maximum number of live backing files.
    pub file_limit: usize,
    /// Spill to disk.
    pub use_files: bool,
    /// Delete consumed files.
    pub delete_files: bool,
    /// Keep a full backup on disk.
    pub backup_all: bool,
    /// Pause after each chunk written out.
    pub delay_ms: u64,
    /// Read size on the output side.
    pub chunk: usize,
    /// Status report format.
    pub format: OutputFormat,
}

impl PipeOptions {
    fn config(&self) -> BufferConfig {
        BufferConfig::new()
            .buffer_dir(&self.dir)
            .segment_size(self.segment_size)
            .segment_count(self.segment_count)
            .window_size(self.window)
            .maintenance_period(Duration::from_millis(self.period_ms))
            .file_size(self.file_size)
            .file_limit(self.file_limit)
            .use_files(self.use_files)
            .delete_files(self.delete_files)
            .backup_all(self.backup_all)
    }
}

/// Runs the pipe command on stdin and stdout.
pub fn run(options: &PipeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = io::stdout();
    let mut output = stdout.lock();
    let status = transfer(options, io::stdin(), &mut output)?;

    match options.format {
        OutputFormat::Json => eprintln!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Text => print_text_output(&status),
        OutputFormat::None => {}
    }
    Ok(())
}

/// Copies `input` to `output` through a spill buffer.
///
/// Upstream read errors are logged and skipped; an output error aborts the
/// transfer.
pub fn transfer<R, W>(
    options: &PipeOptions,
    input: R,
    output: &mut W,
) -> Result<BufferStatus, Box<dyn std::error::Error>>
where
    R: Read + Send + 'static,
    W: Write,
{
    let buffer = Arc::new(SpillBuffer::new(options.config())?);
    if let Some(dir) = buffer.backing_dir() {
        info!(dir = %dir.display(), "spilling to disk");
    }
    let pump = Pump::start(Arc::clone(&buffer), Arc::new(ReaderSource::new(input)))?;

    let delay = Duration::from_millis(options.delay_ms);
    let mut scratch = vec![0u8; options.chunk.max(1)];
    loop {
        match buffer.read(&mut scratch) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = output.write_all(&scratch[..n]) {
                    buffer.close(false);
                    stop_pump(pump);
                    return Err(e.into());
                }
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
            Err(e) => warn!(error = %e, "upstream read failed, continuing"),
        }
    }
    output.flush()?;
    stop_pump(pump);

    Ok(buffer.status())
}

fn stop_pump(pump: Pump) {
    if !pump.shutdown(PUMP_STOP_TIMEOUT) {
        warn!("input pump still blocked on read");
    }
}

fn print_text_output(status: &BufferStatus) {
    eprintln!("Spillway Pipe Summary");
    eprintln!("=====================");
    eprintln!();
    eprintln!("Throughput:");
    eprintln!("  Bytes in:   {}", format_size(status.bytes_in));
    eprintln!("  Bytes out:  {}", format_size(status.bytes_out));
    eprintln!("  In rate:    {}/s", format_size(status.bytes_in_per_sec as u64));
    eprintln!("  Out rate:   {}/s", format_size(status.bytes_out_per_sec as u64));
    eprintln!();
    eprintln!("Segments:");
    eprintln!("  Size:       {}", format_size(status.segment_size as u64));
    eprintln!("  Capacity:   {} ({} growths)", status.capacity, status.growths);
    eprintln!("  High water: {}", status.segments_high_water);
    eprintln!("  Window:     {}", status.window_size);
    eprintln!();
    eprintln!("Disk:");
    match &status.backing_dir {
        Some(dir) => eprintln!("  Directory:  {}", dir.display()),
        None => eprintln!("  Directory:  (memory only)"),
    }
    eprintln!(
        "  Files:      {} live, {} peak, {} limit",
        status.file_count, status.file_high_water, status.file_limit
    );
    eprintln!("  Flushes:    {}", status.flushes);
    eprintln!("  Reloads:    {}", status.reloads);
    eprintln!();
    eprintln!("Health: {:?}", status.health);
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
