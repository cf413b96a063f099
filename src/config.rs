use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::SortError;

/// Tuning parameters for one sort run. Input and output paths are passed to
/// the driver separately; everything here shapes how the work is done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortConfig {
    pub temp_directory: PathBuf,
    pub chunk_size_mb: usize,
    pub sorter_count: usize,
    pub channel_capacity: usize,
    pub hdd_mode: bool,
    pub max_fan_in: usize,
    pub verbose: bool,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            temp_directory: PathBuf::from("temp_chunks"),
            chunk_size_mb: DEFAULT_CHUNK_SIZE_MB,
            sorter_count: default_sorter_count(DEFAULT_CHUNK_SIZE_MB),
            channel_capacity: default_channel_capacity(DEFAULT_CHUNK_SIZE_MB),
            hdd_mode: true,
            max_fan_in: DEFAULT_MAX_FAN_IN,
            verbose: false,
        }
    }
}

impl SortConfig {
    pub fn from_file(path: &Path) -> Result<Self, SortError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|err| SortError::Config(format!("invalid config file: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &Path) -> Result<(), SortError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|err| SortError::Config(format!("config serialization failed: {err}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SortError> {
        if self.chunk_size_mb == 0 {
            return Err(SortError::Config("chunk size must be positive".into()));
        }
        if self.channel_capacity == 0 {
            return Err(SortError::Config("channel capacity must be positive".into()));
        }
        if self.sorter_count == 0 {
            return Err(SortError::Config("sorter count must be positive".into()));
        }
        if self.max_fan_in < MIN_MAX_FAN_IN {
            return Err(SortError::Config(format!(
                "max fan-in must be at least {MIN_MAX_FAN_IN}"
            )));
        }
        Ok(())
    }

    pub fn chunk_size_bytes(&self) -> usize {
        self.chunk_size_mb * BYTES_PER_MB
    }

    pub fn io_permits(&self) -> usize {
        if self.hdd_mode {
            HDD_IO_PERMITS
        } else {
            SSD_IO_PERMITS
        }
    }
}

/// Wide chunks get a fixed pool of four sorters; narrow chunks scale with
/// the machine, leaving two cores for the reader and writer.
pub fn default_sorter_count(chunk_size_mb: usize) -> usize {
    if chunk_size_mb >= LARGE_CHUNK_THRESHOLD_MB {
        LARGE_CHUNK_SORTER_COUNT
    } else {
        cpu_count().saturating_sub(2).max(1)
    }
}

pub fn default_channel_capacity(chunk_size_mb: usize) -> usize {
    if chunk_size_mb >= LARGE_CHUNK_THRESHOLD_MB {
        LARGE_CHUNK_CHANNEL_CAPACITY
    } else {
        SMALL_CHUNK_CHANNEL_CAPACITY
    }
}

/// Clamps a requested sorter-thread count to `[1, cpu_count - 1]`.
pub fn clamp_sorter_count(requested: usize) -> usize {
    requested.max(1).min(cpu_count().saturating_sub(1).max(1))
}

fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        let config = SortConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size_mb, 200);
        assert_eq!(config.max_fan_in, 15);
        assert!(config.hdd_mode);
    }

    #[test]
    fn validation_rejects_zero_parameters() {
        let mut config = SortConfig::default();
        config.chunk_size_mb = 0;
        assert!(config.validate().is_err());

        let mut config = SortConfig::default();
        config.channel_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = SortConfig::default();
        config.sorter_count = 0;
        assert!(config.validate().is_err());

        let mut config = SortConfig::default();
        config.max_fan_in = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn wide_chunks_use_fixed_pipeline_defaults() {
        assert_eq!(default_sorter_count(200), 4);
        assert_eq!(default_sorter_count(1024), 4);
        assert_eq!(default_channel_capacity(200), 2);
        assert_eq!(default_channel_capacity(50), 4);
        // Narrow-chunk sorter count depends on the machine but never drops
        // below one.
        assert!(default_sorter_count(50) >= 1);
    }

    #[test]
    fn clamped_count_stays_in_bounds() {
        assert_eq!(clamp_sorter_count(0), 1);
        assert!(clamp_sorter_count(usize::MAX) >= 1);
    }

    #[test]
    fn config_round_trips_through_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = SortConfig::default();
        config.chunk_size_mb = 64;
        config.hdd_mode = false;
        config.to_file(&path).unwrap();

        let loaded = SortConfig::from_file(&path).unwrap();
        assert_eq!(loaded.chunk_size_mb, 64);
        assert!(!loaded.hdd_mode);
        assert_eq!(loaded.max_fan_in, config.max_fan_in);
    }

    #[test]
    fn permit_count_follows_disk_mode() {
        let mut config = SortConfig::default();
        assert_eq!(config.io_permits(), 1);
        config.hdd_mode = false;
        assert_eq!(config.io_permits(), 100);
    }
}
