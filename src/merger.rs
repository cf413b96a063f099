use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{self, AtomicBool};
use std::sync::Arc;

use tracing::{debug, info};

use crate::chunk_stream::ChunkStream;
use crate::constants::*;
use crate::error::SortError;
use crate::row::Row;

/// Merge phase: collapses a set of sorted runs into one sorted file.
///
/// When the run count exceeds the fan-in bound, the set is reduced in
/// cascading passes of bounded K-way merges; intermediate outputs are named
/// `passP_partQ.tmp` and every consumed file is deleted as soon as its batch
/// completes.
pub struct Merger {
    max_fan_in: usize,
    shutdown: Arc<AtomicBool>,
}

/// Heap entry for the K-way merge. The stream index participates in the
/// ordering only to keep it total; rows with equal keys may drain from
/// either stream.
struct MergeEntry {
    row: Row,
    source: usize,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row
            .cmp(&other.row)
            .then_with(|| self.source.cmp(&other.source))
    }
}

impl Merger {
    pub fn new(max_fan_in: usize, shutdown: Arc<AtomicBool>) -> Self {
        debug_assert!(max_fan_in >= MIN_MAX_FAN_IN);
        Self {
            max_fan_in,
            shutdown,
        }
    }

    /// Merges `runs` into `final_path`, deleting consumed inputs and
    /// intermediates. An empty run set produces an empty output file.
    /// Returns the number of merge passes performed.
    pub async fn merge(
        &self,
        mut runs: Vec<PathBuf>,
        final_path: &Path,
        temp_dir: &Path,
    ) -> Result<usize, SortError> {
        if runs.is_empty() {
            File::create(final_path)?;
            return Ok(0);
        }

        let mut pass = 1usize;
        while runs.len() > self.max_fan_in {
            info!(pass, runs = runs.len(), fan_in = self.max_fan_in, "cascade pass");
            let mut next = Vec::with_capacity(runs.len() / self.max_fan_in + 1);

            for (part, batch) in runs.chunks(self.max_fan_in).enumerate() {
                let out = temp_dir.join(format!(
                    "{}{}_part{}.{}",
                    PASS_FILE_PREFIX, pass, part, RUN_FILE_EXTENSION
                ));
                self.merge_batch(batch, &out)?;
                for run in batch {
                    fs::remove_file(run)?;
                }
                next.push(out);
            }

            runs = next;
            pass += 1;
            tokio::task::yield_now().await;
        }

        self.merge_batch(&runs, final_path)?;
        for run in &runs {
            fs::remove_file(run)?;
        }
        sweep_pass_files(temp_dir)?;

        info!(passes = pass, output = %final_path.display(), "merge phase complete");
        Ok(pass)
    }

    fn merge_batch(&self, inputs: &[PathBuf], output: &Path) -> Result<(), SortError> {
        let result = self.merge_batch_inner(inputs, output);
        if result.is_err() {
            // The half-written output is debris either way.
            let _ = fs::remove_file(output);
        }
        result
    }

    fn merge_batch_inner(&self, inputs: &[PathBuf], output: &Path) -> Result<(), SortError> {
        let mut streams = Vec::with_capacity(inputs.len());
        for path in inputs {
            streams.push(ChunkStream::open(path, MERGE_READ_BUFFER_SIZE)?);
        }

        let mut heap = BinaryHeap::with_capacity(streams.len());
        for (source, stream) in streams.iter_mut().enumerate() {
            if let Some(row) = stream.next_row()? {
                heap.push(Reverse(MergeEntry { row, source }));
            }
        }

        let file = File::create(output)?;
        let mut writer = BufWriter::with_capacity(MERGE_WRITE_BUFFER_SIZE, file);
        let mut written = 0usize;

        while let Some(Reverse(entry)) = heap.pop() {
            if written % CANCEL_CHECK_INTERVAL_ROWS == 0
                && self.shutdown.load(atomic::Ordering::Relaxed)
            {
                return Err(SortError::Cancelled);
            }

            write_line(&mut writer, &entry.row)?;
            written += 1;

            if let Some(row) = streams[entry.source].next_row()? {
                heap.push(Reverse(MergeEntry {
                    row,
                    source: entry.source,
                }));
            }
        }

        writer.flush()?;
        debug!(inputs = inputs.len(), rows = written, output = %output.display(), "batch merged");
        Ok(())
    }
}

fn write_line(writer: &mut BufWriter<File>, row: &Row) -> io::Result<()> {
    writer.write_all(row.line().as_bytes())?;
    writer.write_all(b"\n")
}

/// Removes any leftover `passN_*` intermediates; on the success path they
/// are already gone and this is a no-op.
fn sweep_pass_files(temp_dir: &Path) -> Result<(), SortError> {
    for entry in fs::read_dir(temp_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let is_pass_file = name
            .strip_prefix(PASS_FILE_PREFIX)
            .map(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            .unwrap_or(false);
        if is_pass_file {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
