pub mod chunk_stream;
pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod merger;
pub mod row;
pub mod splitter;
pub mod utils;

pub use chunk_stream::ChunkStream;
pub use config::SortConfig;
pub use driver::{SortDriver, SortStats};
pub use error::SortError;
pub use row::Row;

use std::path::Path;

/// Sorts `input` into `output` with the given configuration.
pub async fn sort_file(
    input: &Path,
    output: &Path,
    config: SortConfig,
) -> Result<SortStats, SortError> {
    SortDriver::new(config).process(input, output).await
}
