use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SortConfig;
use crate::constants::*;
use crate::error::SortError;
use crate::row::{self, Row};

/// A batch of parsed rows bounded by the chunk byte estimate. The index is
/// assigned by the reader in read order and names the run file on disk.
pub struct Chunk {
    pub index: usize,
    pub rows: Vec<Row>,
}

/// Counters accumulated by the reader while carving the input.
#[derive(Debug, Default, Clone)]
pub struct SplitStats {
    pub lines_read: u64,
    pub lines_dropped: u64,
    pub bytes_read: u64,
    pub chunks_created: usize,
}

/// Split phase: a pipelined reader, a pool of in-memory sorters, and a run
/// writer, connected by two bounded queues.
///
/// ```text
/// Reader ──► sort_queue ──► N Sorters ──► write_queue ──► Writer
/// ```
///
/// Reader and writer share a semaphore of I/O permits; with a single permit
/// (HDD mode) reads and writes never overlap, which keeps spinning-disk head
/// motion sequential.
pub struct Splitter {
    chunk_size_bytes: usize,
    sorter_count: usize,
    channel_capacity: usize,
    io_permits: usize,
    shutdown: Arc<AtomicBool>,
}

impl Splitter {
    pub fn new(config: &SortConfig, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            chunk_size_bytes: config.chunk_size_bytes(),
            sorter_count: config.sorter_count,
            channel_capacity: config.channel_capacity,
            io_permits: config.io_permits(),
            shutdown,
        }
    }

    /// Carves `input` into sorted runs under `temp_dir`. The returned paths
    /// are sorted by file name; their concatenation holds every parsable
    /// input line exactly once.
    pub async fn split(
        &self,
        input: &Path,
        temp_dir: &Path,
    ) -> Result<(Vec<PathBuf>, SplitStats), SortError> {
        let permits = Arc::new(Semaphore::new(self.io_permits));
        let (sort_tx, sort_rx) = mpsc::channel::<Chunk>(self.channel_capacity);
        let sort_rx = Arc::new(Mutex::new(sort_rx));
        let (write_tx, write_rx) = mpsc::channel::<Chunk>(self.channel_capacity);

        let reader: JoinHandle<Result<SplitStats, SortError>> = tokio::spawn(read_input(
            input.to_path_buf(),
            self.chunk_size_bytes,
            sort_tx,
            permits.clone(),
            self.shutdown.clone(),
        ));

        let mut sorters = Vec::with_capacity(self.sorter_count);
        for _ in 0..self.sorter_count {
            sorters.push(tokio::spawn(sort_chunks(
                sort_rx.clone(),
                write_tx.clone(),
                self.shutdown.clone(),
            )));
        }
        // The writer sees the queue close once every sorter has dropped its
        // sender clone.
        drop(write_tx);

        let writer: JoinHandle<Result<Vec<PathBuf>, SortError>> = tokio::spawn(write_runs(
            temp_dir.to_path_buf(),
            write_rx,
            permits,
            self.shutdown.clone(),
        ));

        let mut outcomes: Vec<Result<(), SortError>> = Vec::new();

        let reader_result = join_stage(reader).await;
        for sorter in sorters {
            outcomes.push(join_stage(sorter).await);
        }
        let writer_result = join_stage(writer).await;

        let stats = match reader_result {
            Ok(stats) => Some(stats),
            Err(err) => {
                outcomes.push(Err(err));
                None
            }
        };
        let paths = match writer_result {
            Ok(paths) => Some(paths),
            Err(err) => {
                outcomes.push(Err(err));
                None
            }
        };

        // The stage that failed first carries the real cause; stages that
        // merely observed a dropped channel report PipelineClosed.
        if let Some(err) = pick_error(outcomes) {
            return Err(err);
        }

        let mut paths = paths.expect("writer succeeded");
        let mut stats = stats.expect("reader succeeded");
        paths.sort();
        stats.chunks_created = paths.len();

        info!(
            chunks = paths.len(),
            lines = stats.lines_read,
            dropped = stats.lines_dropped,
            "split phase complete"
        );
        Ok((paths, stats))
    }
}

async fn join_stage<T>(handle: JoinHandle<Result<T, SortError>>) -> Result<T, SortError> {
    match handle.await {
        Ok(result) => result,
        Err(_) => Err(SortError::PipelineClosed),
    }
}

fn pick_error(outcomes: Vec<Result<(), SortError>>) -> Option<SortError> {
    let mut secondary = None;
    for outcome in outcomes {
        match outcome {
            Ok(()) => {}
            Err(err) if err.is_secondary() => secondary = Some(err),
            Err(err) => return Some(err),
        }
    }
    secondary
}

/// Reader stage: parses lines into rows, flushes a chunk whenever the byte
/// estimate crosses the cap. Holds the I/O permit while reading and lets go
/// of it for the duration of each (possibly blocking) queue push.
async fn read_input(
    input: PathBuf,
    chunk_size_bytes: usize,
    sort_tx: mpsc::Sender<Chunk>,
    permits: Arc<Semaphore>,
    shutdown: Arc<AtomicBool>,
) -> Result<SplitStats, SortError> {
    let file = File::open(&input)?;
    advise_sequential(&file);
    let mut reader = BufReader::with_capacity(INPUT_BUFFER_SIZE, file);

    let presize = chunk_size_bytes / ROW_LIST_PRESIZE_DIVISOR;
    let mut rows: Vec<Row> = Vec::with_capacity(presize);
    let mut estimate = 0usize;
    let mut index = 0usize;
    let mut stats = SplitStats::default();
    let mut line = String::new();

    let mut permit = permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| SortError::PipelineClosed)?;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            return Err(SortError::Cancelled);
        }

        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        stats.bytes_read += n as u64;
        stats.lines_read += 1;

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        if line.is_empty() {
            stats.lines_dropped += 1;
            continue;
        }

        match row::parse_parts(&line) {
            Some((number, text_offset)) => {
                let owned = std::mem::take(&mut line);
                estimate += owned.len() + ROW_ESTIMATE_OVERHEAD_BYTES;
                rows.push(Row::from_parts(number, owned, text_offset));
            }
            None => {
                stats.lines_dropped += 1;
                continue;
            }
        }

        if estimate >= chunk_size_bytes {
            let chunk = Chunk {
                index,
                rows: std::mem::replace(&mut rows, Vec::with_capacity(presize)),
            };
            index += 1;
            estimate = 0;
            debug!(chunk = chunk.index, rows = chunk.rows.len(), "chunk filled");

            drop(permit);
            sort_tx
                .send(chunk)
                .await
                .map_err(|_| SortError::PipelineClosed)?;
            permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| SortError::PipelineClosed)?;
        }
    }

    drop(permit);
    if !rows.is_empty() {
        let chunk = Chunk { index, rows };
        sort_tx
            .send(chunk)
            .await
            .map_err(|_| SortError::PipelineClosed)?;
    }

    Ok(stats)
}

/// Sorter stage: pops chunks off the shared queue and sorts the rows in
/// place. Unstable sort is fine; order among fully equal lines is
/// unspecified.
async fn sort_chunks(
    sort_rx: Arc<Mutex<mpsc::Receiver<Chunk>>>,
    write_tx: mpsc::Sender<Chunk>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), SortError> {
    loop {
        let chunk = {
            let mut rx = sort_rx.lock().await;
            rx.recv().await
        };
        let Some(mut chunk) = chunk else {
            return Ok(());
        };
        if shutdown.load(Ordering::Relaxed) {
            return Err(SortError::Cancelled);
        }

        chunk.rows.sort_unstable();
        debug!(chunk = chunk.index, rows = chunk.rows.len(), "chunk sorted");

        write_tx
            .send(chunk)
            .await
            .map_err(|_| SortError::PipelineClosed)?;
    }
}

/// Writer stage: one run file per sorted chunk, written under an I/O permit.
async fn write_runs(
    temp_dir: PathBuf,
    mut write_rx: mpsc::Receiver<Chunk>,
    permits: Arc<Semaphore>,
    shutdown: Arc<AtomicBool>,
) -> Result<Vec<PathBuf>, SortError> {
    let mut paths = Vec::new();

    while let Some(chunk) = write_rx.recv().await {
        if shutdown.load(Ordering::Relaxed) {
            return Err(SortError::Cancelled);
        }

        let permit = permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SortError::PipelineClosed)?;

        let path = temp_dir.join(format!(
            "{}{:03}.{}",
            CHUNK_FILE_PREFIX, chunk.index, RUN_FILE_EXTENSION
        ));
        if let Err(err) = write_chunk(&path, &chunk) {
            let _ = std::fs::remove_file(&path);
            return Err(err.into());
        }
        debug!(path = %path.display(), rows = chunk.rows.len(), "run written");
        paths.push(path);

        drop(permit);
    }

    Ok(paths)
}

fn write_chunk(path: &Path, chunk: &Chunk) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(CHUNK_WRITE_BUFFER_SIZE, file);
    for row in &chunk.rows {
        writer.write_all(row.line().as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

#[cfg(unix)]
fn advise_sequential(file: &File) {
    use std::os::unix::io::AsRawFd;
    // Advisory only; the return value is ignored.
    unsafe {
        libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL);
    }
}

#[cfg(not(unix))]
fn advise_sequential(_file: &File) {}
