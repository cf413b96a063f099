use thiserror::Error;

/// Errors surfaced by the sort pipeline, grouped by source.
///
/// Per-line parse failures are not represented here; unparsable lines are
/// skipped and counted, never fatal.
#[derive(Error, Debug)]
pub enum SortError {
    /// Invalid parameters or unusable paths, detected before any work starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// Fatal I/O failure in a pipeline stage, including resource exhaustion
    /// (disk full, open-file limit).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The shared cancellation flag was observed set.
    #[error("operation cancelled")]
    Cancelled,

    /// A queue peer disappeared mid-pipeline. The stage that failed first
    /// carries the root cause; this variant marks the stages that observed
    /// the closed channel.
    #[error("pipeline channel closed unexpectedly")]
    PipelineClosed,
}

impl SortError {
    /// True for the secondary error a stage reports when its neighbour
    /// already failed; used to pick the most informative error to surface.
    pub fn is_secondary(&self) -> bool {
        matches!(self, SortError::PipelineClosed)
    }
}
