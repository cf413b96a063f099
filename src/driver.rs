use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::SortConfig;
use crate::constants::*;
use crate::error::SortError;
use crate::merger::Merger;
use crate::splitter::Splitter;
use crate::utils;

/// Final counters for one completed sort run.
#[derive(Debug, Clone, Default)]
pub struct SortStats {
    pub lines_read: u64,
    pub lines_dropped: u64,
    pub bytes_read: u64,
    pub chunks_created: usize,
    pub merge_passes: usize,
    pub split_time_ms: u64,
    pub merge_time_ms: u64,
    pub total_time_ms: u64,
    pub peak_rss_mb: u64,
    pub avg_mb_per_s: f64,
}

/// Orchestrates split-then-merge and owns the temp directory for the run.
pub struct SortDriver {
    config: SortConfig,
    shutdown: Arc<AtomicBool>,
}

impl SortDriver {
    pub fn new(config: SortConfig) -> Self {
        Self {
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_shutdown_signal(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Sorts `input` into `output`. The temp directory is wiped and
    /// recreated on entry and removed again on every exit path.
    pub async fn process(&self, input: &Path, output: &Path) -> Result<SortStats, SortError> {
        self.config.validate()?;
        if !input.exists() {
            return Err(SortError::Config(format!(
                "input file not found: {}",
                input.display()
            )));
        }

        if self.config.verbose {
            info!(config = ?self.config, "effective configuration");
        }

        prepare_temp_dir(&self.config.temp_directory)?;
        let result = self.run_phases(input, output).await;
        if let Err(err) = fs::remove_dir_all(&self.config.temp_directory) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(error = %err, "failed to remove temp directory");
            }
        }
        result
    }

    async fn run_phases(&self, input: &Path, output: &Path) -> Result<SortStats, SortError> {
        let start = Instant::now();

        let peak_rss = Arc::new(AtomicU64::new(0));
        let sampler_stop = Arc::new(AtomicBool::new(false));
        let sampler = tokio::spawn(sample_peak_rss(peak_rss.clone(), sampler_stop.clone()));

        let outcome = self.split_then_merge(input, output).await;

        sampler_stop.store(true, Ordering::Relaxed);
        let _ = sampler.await;

        let (split_stats, merge_passes, split_time, merge_time) = outcome?;
        let elapsed = start.elapsed();

        let elapsed_s = elapsed.as_secs_f64();
        let mb_read = split_stats.bytes_read as f64 / BYTES_PER_MB as f64;
        let stats = SortStats {
            lines_read: split_stats.lines_read,
            lines_dropped: split_stats.lines_dropped,
            bytes_read: split_stats.bytes_read,
            chunks_created: split_stats.chunks_created,
            merge_passes,
            split_time_ms: split_time.as_millis() as u64,
            merge_time_ms: merge_time.as_millis() as u64,
            total_time_ms: elapsed.as_millis() as u64,
            peak_rss_mb: peak_rss.load(Ordering::Relaxed) / BYTES_PER_MB as u64,
            avg_mb_per_s: if elapsed_s > 0.0 { mb_read / elapsed_s } else { 0.0 },
        };

        if let Err(err) = write_stats_file(&stats, elapsed) {
            warn!(error = %err, "failed to persist run stats");
        }

        Ok(stats)
    }

    async fn split_then_merge(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<(crate::splitter::SplitStats, usize, Duration, Duration), SortError> {
        info!(
            input = %input.display(),
            chunk_size_mb = self.config.chunk_size_mb,
            sorters = self.config.sorter_count,
            hdd_mode = self.config.hdd_mode,
            "starting sort"
        );

        let split_start = Instant::now();
        let splitter = Splitter::new(&self.config, self.shutdown.clone());
        let (runs, split_stats) = splitter
            .split(input, &self.config.temp_directory)
            .await?;
        let split_time = split_start.elapsed();

        let merge_start = Instant::now();
        let merger = Merger::new(self.config.max_fan_in, self.shutdown.clone());
        let merge_passes = merger
            .merge(runs, output, &self.config.temp_directory)
            .await?;
        let merge_time = merge_start.elapsed();

        Ok((split_stats, merge_passes, split_time, merge_time))
    }
}

/// Wipes any debris from a previous run and starts fresh.
fn prepare_temp_dir(temp_dir: &Path) -> Result<(), SortError> {
    match fs::remove_dir_all(temp_dir) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    fs::create_dir_all(temp_dir).map_err(|err| {
        SortError::Config(format!(
            "cannot create temp directory {}: {err}",
            temp_dir.display()
        ))
    })
}

async fn sample_peak_rss(peak: Arc<AtomicU64>, stop: Arc<AtomicBool>) {
    let mut interval = tokio::time::interval(Duration::from_millis(RSS_SAMPLE_INTERVAL_MS));
    while !stop.load(Ordering::Relaxed) {
        interval.tick().await;
        peak.fetch_max(utils::process_rss_bytes(), Ordering::Relaxed);
    }
}

/// One line, `elapsed;peak_rss_mb;avg_mb_per_s`, consumed by the benchmark
/// harness.
fn write_stats_file(stats: &SortStats, elapsed: Duration) -> io::Result<()> {
    let line = format!(
        "{:.2};{};{:.1}\n",
        elapsed.as_secs_f64(),
        stats.peak_rss_mb,
        stats.avg_mb_per_s
    );
    fs::write(STATS_FILE_NAME, line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn driver_config(dir: &Path) -> SortConfig {
        SortConfig {
            temp_directory: dir.join("temp"),
            chunk_size_mb: 1,
            sorter_count: 2,
            channel_capacity: 2,
            hdd_mode: true,
            ..SortConfig::default()
        }
    }

    #[tokio::test]
    async fn temp_directory_is_removed_after_success() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.txt");
        let output = dir.path().join("output.txt");
        fs::write(&input, "2. B\n1. A\n").unwrap();

        let config = driver_config(dir.path());
        let temp = config.temp_directory.clone();
        let driver = SortDriver::new(config);
        driver.process(&input, &output).await.unwrap();

        assert!(!temp.exists());
        assert_eq!(fs::read_to_string(&output).unwrap(), "1. A\n2. B\n");
    }

    #[tokio::test]
    async fn temp_directory_is_removed_after_cancellation() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.txt");
        let output = dir.path().join("output.txt");
        fs::write(&input, "2. B\n1. A\n").unwrap();

        let config = driver_config(dir.path());
        let temp = config.temp_directory.clone();
        let driver =
            SortDriver::new(config).with_shutdown_signal(Arc::new(AtomicBool::new(true)));
        let result = driver.process(&input, &output).await;

        assert!(matches!(result, Err(SortError::Cancelled)));
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn missing_input_is_a_config_error() {
        let dir = tempdir().unwrap();
        let config = driver_config(dir.path());
        let driver = SortDriver::new(config);
        let result = driver
            .process(&dir.path().join("absent.txt"), &dir.path().join("out.txt"))
            .await;
        assert!(matches!(result, Err(SortError::Config(_))));
    }

    #[tokio::test]
    async fn stats_reflect_the_run() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.txt");
        let output = dir.path().join("output.txt");
        fs::write(&input, "InvalidLine\n1. First\n\n123 NoDot\n2. Second\n").unwrap();

        let config = driver_config(dir.path());
        let driver = SortDriver::new(config);
        let stats = driver.process(&input, &output).await.unwrap();

        assert_eq!(stats.lines_read, 5);
        assert_eq!(stats.lines_dropped, 3);
        assert_eq!(stats.chunks_created, 1);
        assert_eq!(stats.merge_passes, 1);
        assert!(stats.bytes_read > 0);
    }
}
