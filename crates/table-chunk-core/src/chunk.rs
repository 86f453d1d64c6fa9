//! Chunk descriptors.
//!
//! A [`Chunk`] references the row range `[entry_start, entry_stop)` of a named
//! table inside one file. It can be created from partial information (just a
//! path, or a record written by an earlier job stage) and completes itself
//! lazily:
//!
//! - `unique_id`, `column_set` and `row_count` are optional. Reading any of
//!   them when it is unknown triggers one metadata fetch through the injected
//!   [`TableBackend`], and that fetch fills all three.
//! - Values supplied at construction always win over fetched ones.
//! - Chunks are never mutated after construction. Slicing and overriding
//!   produce new chunks that inherit whatever the parent already knows.
//!
//! Lazy resolution stores the fetched metadata in a [`OnceLock`]. Concurrent
//! *first* access from several threads is memory-safe but may fetch more than
//! once; resolve a chunk before sharing it across threads.

use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::backend::{ChunkReader, ReadRequest, TableBackend, TableInfo};
use crate::error::{
    ChunkResult, InvalidRangeSnafu, InvalidSliceSnafu, ReadSnafu, SourceUnavailableSnafu,
};

/// Set of column names. Ordered so serialized output is deterministic.
pub type ColumnSet = BTreeSet<String>;

/// Content-derived identity of a specific version of a file.
///
/// Used to detect that a file changed after a chunk describing it was
/// created.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UniqueId(pub String);

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of the table a chunk reads from: `(unique_id, table_name)`.
///
/// Two chunks over different row ranges of the same file and table have the
/// same key. Use it explicitly when de-duplicating by source.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    /// Identity of the backing file.
    pub unique_id: UniqueId,
    /// Table inside the file.
    pub table_name: String,
}

/// Explicit overrides applied by [`Chunk::with_overrides`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkOverrides {
    /// Replacement start entry.
    pub entry_start: Option<u64>,
    /// Replacement stop entry.
    pub entry_stop: Option<u64>,
    /// Replacement column set.
    pub column_set: Option<ColumnSet>,
}

impl ChunkOverrides {
    /// Override the entry range.
    pub fn with_range(mut self, entry_start: u64, entry_stop: u64) -> Self {
        self.entry_start = Some(entry_start);
        self.entry_stop = Some(entry_stop);
        self
    }

    /// Override the column set.
    pub fn with_column_set(mut self, columns: ColumnSet) -> Self {
        self.column_set = Some(columns);
        self
    }
}

/// A contiguous row range of a named table inside a file.
///
/// Equality needs the file's unique id, which may require I/O, so `Chunk`
/// does not implement `PartialEq` or `Hash`. De-duplicate on [`Chunk::key`].
#[derive(Clone, Debug)]
pub struct Chunk {
    path: PathBuf,
    table_name: String,
    unique_id: Option<UniqueId>,
    column_set: Option<ColumnSet>,
    row_count: Option<u64>,
    entry_start: Option<u64>,
    entry_stop: Option<u64>,
    fetched: OnceLock<TableInfo>,
    backend: Arc<dyn TableBackend>,
}

/// Builder for [`Chunk`]; stores only what it is given.
#[derive(Clone, Debug)]
pub struct ChunkBuilder {
    path: PathBuf,
    table_name: String,
    backend: Arc<dyn TableBackend>,
    unique_id: Option<UniqueId>,
    column_set: Option<ColumnSet>,
    row_count: Option<u64>,
    entry_start: Option<u64>,
    entry_stop: Option<u64>,
}

impl ChunkBuilder {
    /// Start describing `table_name` inside the file at `path`.
    pub fn new(
        path: impl Into<PathBuf>,
        table_name: impl Into<String>,
        backend: Arc<dyn TableBackend>,
    ) -> Self {
        Self {
            path: path.into(),
            table_name: table_name.into(),
            backend,
            unique_id: None,
            column_set: None,
            row_count: None,
            entry_start: None,
            entry_stop: None,
        }
    }

    /// Use another table name.
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Assert the identity of the backing file.
    pub fn unique_id(mut self, unique_id: UniqueId) -> Self {
        self.unique_id = Some(unique_id);
        self
    }

    /// Declare the available columns.
    pub fn column_set<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.column_set = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Declare the table's total row count.
    pub fn row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    /// Set the first entry covered by the chunk.
    pub fn entry_start(mut self, entry_start: u64) -> Self {
        self.entry_start = Some(entry_start);
        self
    }

    /// Set the entry the chunk stops at (exclusive).
    pub fn entry_stop(mut self, entry_stop: u64) -> Self {
        self.entry_stop = Some(entry_stop);
        self
    }

    /// Set both ends of the entry range.
    pub fn entry_range(self, entry_start: u64, entry_stop: u64) -> Self {
        self.entry_start(entry_start).entry_stop(entry_stop)
    }

    /// Build an unresolved chunk. No I/O happens.
    pub fn build(self) -> Chunk {
        Chunk {
            path: self.path,
            table_name: self.table_name,
            unique_id: self.unique_id,
            column_set: self.column_set,
            row_count: self.row_count,
            entry_start: self.entry_start,
            entry_stop: self.entry_stop,
            fetched: OnceLock::new(),
            backend: self.backend,
        }
    }

    /// Build the chunk and resolve its metadata immediately.
    pub fn build_resolved(self) -> ChunkResult<Chunk> {
        let chunk = self.build();
        chunk.resolve()?;
        Ok(chunk)
    }
}

impl Chunk {
    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the table inside the file.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Backend used to resolve this chunk.
    pub fn backend(&self) -> &Arc<dyn TableBackend> {
        &self.backend
    }

    /// First entry covered by the chunk; `0` when unset.
    pub fn entry_start(&self) -> u64 {
        self.entry_start.unwrap_or(0)
    }

    /// Same as [`Chunk::entry_start`].
    pub fn offset(&self) -> u64 {
        self.entry_start()
    }

    /// Entry the chunk stops at; the table's row count when unset.
    pub fn entry_stop(&self) -> ChunkResult<u64> {
        match self.entry_stop {
            Some(stop) => Ok(stop),
            None => self.row_count(),
        }
    }

    /// Start entry as it was declared, without defaulting.
    pub fn declared_entry_start(&self) -> Option<u64> {
        self.entry_start
    }

    /// Stop entry as it was declared, without defaulting.
    pub fn declared_entry_stop(&self) -> Option<u64> {
        self.entry_stop
    }

    /// Identity of the backing file, resolving it if needed.
    pub fn unique_id(&self) -> ChunkResult<&UniqueId> {
        match &self.unique_id {
            Some(id) => Ok(id),
            None => Ok(&self.fetch()?.unique_id),
        }
    }

    /// Available columns, resolving them if needed.
    pub fn column_set(&self) -> ChunkResult<&ColumnSet> {
        match &self.column_set {
            Some(columns) => Ok(columns),
            None => Ok(&self.fetch()?.columns),
        }
    }

    /// Total rows of the table, resolving it if needed.
    pub fn row_count(&self) -> ChunkResult<u64> {
        match self.row_count {
            Some(rows) => Ok(rows),
            None => Ok(self.fetch()?.row_count),
        }
    }

    /// Identity if already known. Never performs I/O.
    pub fn known_unique_id(&self) -> Option<&UniqueId> {
        self.unique_id
            .as_ref()
            .or_else(|| self.fetched.get().map(|info| &info.unique_id))
    }

    /// Columns if already known. Never performs I/O.
    pub fn known_column_set(&self) -> Option<&ColumnSet> {
        self.column_set
            .as_ref()
            .or_else(|| self.fetched.get().map(|info| &info.columns))
    }

    /// Row count if already known. Never performs I/O.
    pub fn known_row_count(&self) -> Option<u64> {
        self.row_count
            .or_else(|| self.fetched.get().map(|info| info.row_count))
    }

    /// Whether identity, columns and row count are all known.
    pub fn is_resolved(&self) -> bool {
        self.known_unique_id().is_some()
            && self.known_column_set().is_some()
            && self.known_row_count().is_some()
    }

    /// Fill every unknown metadata field with a single read of the file.
    ///
    /// A no-op when everything is already known.
    pub fn resolve(&self) -> ChunkResult<()> {
        if !self.is_resolved() {
            self.fetch()?;
        }
        Ok(())
    }

    fn fetch(&self) -> ChunkResult<&TableInfo> {
        if let Some(info) = self.fetched.get() {
            return Ok(info);
        }

        debug!("fetching table metadata for {self}");
        let info = self
            .backend
            .open(&self.path, &self.table_name)
            .context(SourceUnavailableSnafu {
                path: self.path.display().to_string(),
                table: self.table_name.clone(),
            })?;

        Ok(self.fetched.get_or_init(|| info))
    }

    /// Number of entries covered: `entry_stop - entry_start`.
    pub fn len(&self) -> ChunkResult<u64> {
        let start = self.entry_start();
        let stop = self.entry_stop()?;
        stop.checked_sub(start).context(InvalidRangeSnafu {
            path: self.path.display().to_string(),
            entry_start: start,
            entry_stop: stop,
        })
    }

    /// Whether the chunk covers no entries.
    pub fn is_empty(&self) -> ChunkResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Source identity of this chunk; resolves the unique id if needed.
    pub fn key(&self) -> ChunkResult<ChunkKey> {
        Ok(ChunkKey {
            unique_id: self.unique_id()?.clone(),
            table_name: self.table_name.clone(),
        })
    }

    /// Whether both chunks read from the same version of the same table,
    /// regardless of their row ranges.
    pub fn same_source(&self, other: &Chunk) -> ChunkResult<bool> {
        Ok(self.key()? == other.key()?)
    }

    /// New chunk covering local entries `[start, stop)` of this one.
    ///
    /// Requires `start <= stop <= self.len()`.
    pub fn slice(&self, start: u64, stop: u64) -> ChunkResult<Chunk> {
        let len = self.len()?;
        ensure!(
            start <= stop && stop <= len,
            InvalidSliceSnafu {
                path: self.path.display().to_string(),
                start,
                stop,
                len,
            }
        );
        Ok(self.slice_unchecked(start, stop))
    }

    /// Slice without bounds checks; callers know the length already.
    pub(crate) fn slice_unchecked(&self, start: u64, stop: u64) -> Chunk {
        let offset = self.offset();
        self.with_overrides(ChunkOverrides::default().with_range(offset + start, offset + stop))
    }

    /// New chunk with the given overrides; everything else, known or not, is
    /// inherited.
    pub fn with_overrides(&self, overrides: ChunkOverrides) -> Chunk {
        Chunk {
            path: self.path.clone(),
            table_name: self.table_name.clone(),
            unique_id: self.known_unique_id().cloned(),
            column_set: overrides
                .column_set
                .or_else(|| self.known_column_set().cloned()),
            row_count: self.known_row_count(),
            entry_start: overrides.entry_start.or(self.entry_start),
            entry_stop: overrides.entry_stop.or(self.entry_stop),
            fetched: OnceLock::new(),
            backend: Arc::clone(&self.backend),
        }
    }

    /// The tuple a downstream reader needs. Resolves `entry_stop` if unset.
    ///
    /// Only an explicitly declared column set restricts the projection.
    pub fn read_request(&self) -> ChunkResult<ReadRequest<'_>> {
        Ok(ReadRequest {
            path: &self.path,
            table_name: &self.table_name,
            column_set: self.column_set.as_ref(),
            entry_start: self.entry_start(),
            entry_stop: self.entry_stop()?,
        })
    }

    /// Materialize the covered rows through `reader`.
    pub fn read_batches(
        &self,
        reader: &dyn ChunkReader,
    ) -> ChunkResult<Vec<arrow_array::RecordBatch>> {
        let request = self.read_request()?;
        reader.read(&request).context(ReadSnafu {
            path: self.path.display().to_string(),
        })
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if let Some(id) = self.known_unique_id() {
            write!(f, "({id})")?;
        }
        write!(f, ":{}", self.table_name)?;
        if let Some(rows) = self.known_row_count() {
            write!(f, "[0,{rows})")?;
        }
        if let (Some(start), Some(stop)) = (self.entry_start, self.entry_stop) {
            write!(f, " -> [{start},{stop})")?;
        }
        Ok(())
    }
}
