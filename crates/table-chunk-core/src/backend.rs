//! Backend capabilities used by chunks.
//!
//! A chunk never talks to a file format directly. Metadata comes from a
//! [`TableBackend`] (`open(path, table) -> columns, row count, unique id`),
//! and row data from a [`ChunkReader`]. Both are injected through
//! [`crate::ChunkContext`], so the chunk model stays agnostic of the
//! underlying columnar format.
//!
//! [`parquet_file::ParquetBackend`] is the implementation shipped with this
//! crate.

use std::{fmt, io, path::Path};

use arrow::error::ArrowError;
use arrow_array::RecordBatch;
use snafu::prelude::*;

use crate::chunk::{ColumnSet, UniqueId};

pub mod parquet_file;

/// Metadata of one table as found in a live file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableInfo {
    /// Names of the columns available in the table.
    pub columns: ColumnSet,
    /// Total number of rows in the table.
    pub row_count: u64,
    /// Content-derived identity of the file.
    pub unique_id: UniqueId,
}

/// Errors produced by backend implementations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    /// The file does not exist.
    #[snafu(display("File not found: {path}"))]
    NotFound {
        /// Path that was not found.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Any other I/O failure while reading the file.
    #[snafu(display("I/O error at {path}: {source}"))]
    Io {
        /// Path where the I/O error occurred.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The file is not a readable Parquet file.
    #[snafu(display("Parquet error for {path}: {source}"))]
    Parquet {
        /// Path of the file being decoded.
        path: String,
        /// Error emitted by the Parquet reader.
        source: parquet::errors::ParquetError,
    },

    /// Decoding record batches failed.
    #[snafu(display("Arrow read error for {path}: {source}"))]
    Arrow {
        /// Path of the file being decoded.
        path: String,
        /// Error emitted while decoding batches.
        source: ArrowError,
    },

    /// The file does not contain the requested table.
    #[snafu(display("Table {table} not found in {path} (file holds {available})"))]
    TableNotFound {
        /// Path of the file that was opened.
        path: String,
        /// Requested table name.
        table: String,
        /// Name of the table the file actually holds.
        available: String,
    },
}

/// Convenience alias for backend results.
pub type BackendResult<T> = Result<T, BackendError>;

/// Metadata capability: everything a chunk needs to resolve itself.
///
/// Implementations must be shareable across the bulk-resolution worker pool.
pub trait TableBackend: fmt::Debug + Send + Sync {
    /// Whether a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Open `table_name` inside the file at `path` and report its metadata.
    fn open(&self, path: &Path, table_name: &str) -> BackendResult<TableInfo>;
}

/// What a downstream reader needs to materialize a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadRequest<'a> {
    /// Path of the backing file.
    pub path: &'a Path,
    /// Table inside the file.
    pub table_name: &'a str,
    /// Columns to project; `None` reads every column.
    pub column_set: Option<&'a ColumnSet>,
    /// First row to read (inclusive).
    pub entry_start: u64,
    /// Row to stop at (exclusive).
    pub entry_stop: u64,
}

impl ReadRequest<'_> {
    /// Number of rows covered by the request.
    pub fn num_rows(&self) -> u64 {
        self.entry_stop.saturating_sub(self.entry_start)
    }
}

/// Row-data capability: turns a [`ReadRequest`] into in-memory batches.
pub trait ChunkReader: Send + Sync {
    /// Read the requested rows and columns.
    fn read(&self, request: &ReadRequest<'_>) -> BackendResult<Vec<RecordBatch>>;
}
