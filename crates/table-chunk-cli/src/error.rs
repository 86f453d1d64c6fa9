use table_chunk_core::{ChunkError, ConfigError};

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Failed to load configuration: {source}"))]
    Config { source: ConfigError },

    #[snafu(display("Records file not found or not accessible: {path}"))]
    RecordsMissing {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Records file {path} does not hold chunk records: {source}"))]
    RecordsParse {
        path: String,
        source: serde_json::Error,
    },

    #[snafu(display("Failed to encode output: {source}"))]
    Encode { source: serde_json::Error },

    #[snafu(display("{source}"))]
    Chunk {
        #[snafu(source(from(ChunkError, Box::new)))]
        source: Box<ChunkError>,
    },

    #[snafu(display("Integrity check found {issues} issue(s) in {chunks} chunk(s)"))]
    IntegrityFailed { issues: usize, chunks: usize },
}
