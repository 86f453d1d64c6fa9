//! Plain serializable forms of a chunk.
//!
//! [`ChunkRecord`] is the persisted shape of a [`Chunk`]: unknown fields are
//! written as `null` (`uuid`) or left out (everything else), and both `null`
//! and a missing key read back as "unknown". Converting a chunk to a record
//! and back keeps exactly the same known/unknown pattern.
//!
//! JSON layout example:
//!
//! ```json
//! {"path":"data/a.parquet","name":"Events","uuid":null,"num_entries":1200,"entry_start":0}
//! ```
//!
//! [`TaskRecord`] is what an upstream scheduler hands over for a single unit
//! of work.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::TableBackend;
use crate::chunk::{Chunk, ChunkBuilder, UniqueId};

/// Serialized form of a [`Chunk`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Path of the backing file.
    pub path: String,
    /// Table name.
    pub name: String,
    /// File identity, `null` when unknown.
    #[serde(default)]
    pub uuid: Option<UniqueId>,
    /// Column names, sorted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<String>>,
    /// Total rows of the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_entries: Option<u64>,
    /// Declared start entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_start: Option<u64>,
    /// Declared stop entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_stop: Option<u64>,
}

/// A unit of work handed over by an external task scheduler.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    /// Path of the file to process.
    pub filename: String,
    /// Identity of the file as seen by the scheduler.
    pub file_identifier: UniqueId,
    /// Table inside the file.
    pub table_name: String,
    /// First entry to process.
    pub entry_start: u64,
    /// Entry to stop at (exclusive).
    pub entry_stop: u64,
}

impl Chunk {
    /// Snapshot everything currently known, without I/O.
    pub fn to_record(&self) -> ChunkRecord {
        ChunkRecord {
            path: self.path().display().to_string(),
            name: self.table_name().to_string(),
            uuid: self.known_unique_id().cloned(),
            branches: self
                .known_column_set()
                .map(|columns| columns.iter().cloned().collect()),
            num_entries: self.known_row_count(),
            entry_start: self.declared_entry_start(),
            entry_stop: self.declared_entry_stop(),
        }
    }

    /// Rebuild a chunk from a record; unknown fields stay unresolved.
    pub fn from_record(record: ChunkRecord, backend: Arc<dyn TableBackend>) -> Chunk {
        let mut builder = ChunkBuilder::new(record.path, record.name, backend);
        if let Some(uuid) = record.uuid {
            builder = builder.unique_id(uuid);
        }
        if let Some(columns) = record.branches {
            builder = builder.column_set(columns);
        }
        if let Some(rows) = record.num_entries {
            builder = builder.row_count(rows);
        }
        if let Some(start) = record.entry_start {
            builder = builder.entry_start(start);
        }
        if let Some(stop) = record.entry_stop {
            builder = builder.entry_stop(stop);
        }
        builder.build()
    }

    /// Describe the unit of work in `task`.
    pub fn from_task(task: &TaskRecord, backend: Arc<dyn TableBackend>) -> Chunk {
        ChunkBuilder::new(&task.filename, &task.table_name, backend)
            .unique_id(task.file_identifier.clone())
            .entry_range(task.entry_start, task.entry_stop)
            .build()
    }
}
