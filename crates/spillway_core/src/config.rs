//! Buffer configuration.

use crate::error::{BufferError, BufferResult};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`SpillBuffer`](crate::SpillBuffer).
///
/// The buffer takes its configuration by value. Changing a `BufferConfig`
/// after the buffer was built has no effect on the live buffer.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Size of a single segment in bytes.
    pub segment_size: usize,

    /// Initial number of slots in the segment array.
    pub segment_count: usize,

    /// Number of segments, starting at the read position, kept in memory.
    pub window_size: usize,

    /// Period of the background maintenance sweep.
    pub maintenance_period: Duration,

    /// Maximum size of a single backing file before a new one is opened.
    pub file_size: u64,

    /// Maximum number of live backing files.
    pub file_limit: usize,

    /// Whether segments outside the window may spill to disk.
    pub use_files: bool,

    /// Whether backing files are deleted once fully consumed.
    pub delete_files: bool,

    /// Back up every byte to disk and keep all files.
    ///
    /// Forces `use_files`, disables `delete_files`, and ignores `file_limit`.
    pub backup_all: bool,

    /// Base directory. Each buffer spills into a unique subdirectory of it.
    pub buffer_dir: PathBuf,

    /// Number of attempts to reload a payload whose file is missing.
    pub reload_attempts: u32,

    /// Upper bound of the randomized pause between reload attempts.
    pub reload_backoff: Duration,

    /// How long a hard shutdown waits for maintenance to stop.
    pub shutdown_timeout: Duration,

    /// Array utilization percentage reported as yellow health (0 = off).
    pub yellow_level: u8,

    /// Array utilization percentage reported as red health (0 = off).
    pub red_level: u8,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            segment_size: 128_000,
            segment_count: 128_000,
            window_size: 10,
            maintenance_period: Duration::from_millis(200),
            file_size: 10_000_000, // 10 MB
            file_limit: 65_536,
            use_files: true,
            delete_files: true,
            backup_all: false,
            buffer_dir: std::env::temp_dir().join("spillway"),
            reload_attempts: 10,
            reload_backoff: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(10),
            yellow_level: 80,
            red_level: 100,
        }
    }
}

impl BufferConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the segment size in bytes.
    #[must_use]
    pub const fn segment_size(mut self, size: usize) -> Self {
        self.segment_size = size;
        self
    }

    /// Sets the initial number of segment slots.
    #[must_use]
    pub const fn segment_count(mut self, count: usize) -> Self {
        self.segment_count = count;
        self
    }

    /// Sets the consumer window size in segments.
    #[must_use]
    pub const fn window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// Sets the maintenance period.
    #[must_use]
    pub const fn maintenance_period(mut self, period: Duration) -> Self {
        self.maintenance_period = period;
        self
    }

    /// Sets the maximum backing file size in bytes.
    #[must_use]
    pub const fn file_size(mut self, size: u64) -> Self {
        self.file_size = size;
        self
    }

    /// Sets the maximum number of live backing files.
    #[must_use]
    pub const fn file_limit(mut self, limit: usize) -> Self {
        self.file_limit = limit;
        self
    }

    /// Enables or disables spilling to disk.
    #[must_use]
    pub const fn use_files(mut self, value: bool) -> Self {
        self.use_files = value;
        self
    }

    /// Sets whether consumed backing files are deleted.
    #[must_use]
    pub const fn delete_files(mut self, value: bool) -> Self {
        self.delete_files = value;
        self
    }

    /// Sets whether every byte is backed up to disk.
    #[must_use]
    pub const fn backup_all(mut self, value: bool) -> Self {
        self.backup_all = value;
        self
    }

    /// Sets the base directory for backing files.
    #[must_use]
    pub fn buffer_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.buffer_dir = dir.into();
        self
    }

    /// Sets the reload retry policy.
    #[must_use]
    pub const fn reload_policy(mut self, attempts: u32, backoff: Duration) -> Self {
        self.reload_attempts = attempts;
        self.reload_backoff = backoff;
        self
    }

    /// Sets how long a hard shutdown waits for maintenance.
    #[must_use]
    pub const fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the yellow and red health levels (percent, 0 disables).
    #[must_use]
    pub const fn health_levels(mut self, yellow: u8, red: u8) -> Self {
        self.yellow_level = yellow;
        self.red_level = red;
        self
    }

    /// Returns whether files are used once `backup_all` is applied.
    #[must_use]
    pub const fn effective_use_files(&self) -> bool {
        self.use_files || self.backup_all
    }

    /// Returns whether files are deleted once `backup_all` is applied.
    #[must_use]
    pub const fn effective_delete_files(&self) -> bool {
        self.delete_files && !self.backup_all
    }

    /// Largest number of bytes the backing files may hold.
    ///
    /// The segment array never grows past this many bytes.
    #[must_use]
    pub fn max_disk_bytes(&self) -> u64 {
        self.file_size.saturating_mul(self.file_limit as u64)
    }

    /// Checks that the configuration can drive a buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> BufferResult<()> {
        if self.segment_size == 0 {
            return Err(BufferError::invalid_config("segment_size must be positive"));
        }
        if self.segment_count < 2 {
            return Err(BufferError::invalid_config("segment_count must be at least 2"));
        }
        if self.window_size == 0 {
            return Err(BufferError::invalid_config("window_size must be positive"));
        }
        if self.maintenance_period.is_zero() {
            return Err(BufferError::invalid_config(
                "maintenance_period must be positive",
            ));
        }
        if self.file_size == 0 {
            return Err(BufferError::invalid_config("file_size must be positive"));
        }
        if self.file_limit == 0 {
            return Err(BufferError::invalid_config("file_limit must be positive"));
        }
        if self.reload_attempts == 0 {
            return Err(BufferError::invalid_config("reload_attempts must be positive"));
        }
        if self.yellow_level > 100 || self.red_level > 100 {
            return Err(BufferError::invalid_config(
                "health levels must be percentages (0-100)",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = BufferConfig::default();
        assert_eq!(config.segment_size, 128_000);
        assert_eq!(config.window_size, 10);
        assert!(config.use_files);
        assert!(config.delete_files);
        assert!(!config.backup_all);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = BufferConfig::new()
            .segment_size(64)
            .segment_count(8)
            .window_size(2)
            .file_size(256)
            .file_limit(4)
            .use_files(false);

        assert_eq!(config.segment_size, 64);
        assert_eq!(config.segment_count, 8);
        assert_eq!(config.window_size, 2);
        assert_eq!(config.max_disk_bytes(), 1024);
        assert!(!config.effective_use_files());
    }

    #[test]
    fn backup_all_overrides_file_flags() {
        let config = BufferConfig::new()
            .use_files(false)
            .delete_files(true)
            .backup_all(true);

        assert!(config.effective_use_files());
        assert!(!config.effective_delete_files());
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(BufferConfig::new().segment_size(0).validate().is_err());
        assert!(BufferConfig::new().segment_count(1).validate().is_err());
        assert!(BufferConfig::new().window_size(0).validate().is_err());
        assert!(BufferConfig::new()
            .maintenance_period(Duration::ZERO)
            .validate()
            .is_err());
        assert!(BufferConfig::new().file_limit(0).validate().is_err());
        assert!(BufferConfig::new().health_levels(120, 0).validate().is_err());

        let err = BufferConfig::new().file_size(0).validate().unwrap_err();
        assert!(matches!(err, BufferError::InvalidConfig { .. }));
    }
}
