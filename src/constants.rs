pub const BYTES_PER_KB: usize = 1024;
pub const BYTES_PER_MB: usize = 1024 * 1024;
pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

pub const DEFAULT_CHUNK_SIZE_MB: usize = 200;
pub const DEFAULT_MAX_FAN_IN: usize = 15;
pub const MIN_MAX_FAN_IN: usize = 2;

/// Chunk sizes at or above this threshold switch the pipeline to the
/// wide-chunk defaults (fixed sorter pool, shorter queues).
pub const LARGE_CHUNK_THRESHOLD_MB: usize = 200;
pub const LARGE_CHUNK_SORTER_COUNT: usize = 4;
pub const LARGE_CHUNK_CHANNEL_CAPACITY: usize = 2;
pub const SMALL_CHUNK_CHANNEL_CAPACITY: usize = 4;

pub const INPUT_BUFFER_SIZE: usize = BYTES_PER_MB;
pub const CHUNK_WRITE_BUFFER_SIZE: usize = 4 * BYTES_PER_MB;
pub const MERGE_READ_BUFFER_SIZE: usize = 4 * BYTES_PER_MB;
pub const MERGE_WRITE_BUFFER_SIZE: usize = 16 * BYTES_PER_MB;

/// Fixed per-row overhead charged to the chunk byte estimate on top of the
/// line length. Line storage is 8-bit, so the line itself counts once.
pub const ROW_ESTIMATE_OVERHEAD_BYTES: usize = 20;
/// Fresh row lists are pre-sized to chunk_size_bytes / this divisor.
pub const ROW_LIST_PRESIZE_DIVISOR: usize = 50;

pub const HDD_IO_PERMITS: usize = 1;
pub const SSD_IO_PERMITS: usize = 100;

pub const CHUNK_FILE_PREFIX: &str = "chunk_";
pub const PASS_FILE_PREFIX: &str = "pass";
pub const RUN_FILE_EXTENSION: &str = "tmp";

pub const STATS_FILE_NAME: &str = "last_run_stats.txt";
pub const RSS_SAMPLE_INTERVAL_MS: u64 = 200;

/// The merge loop polls the cancellation flag once per this many rows.
pub const CANCEL_CHECK_INTERVAL_ROWS: usize = 4096;
