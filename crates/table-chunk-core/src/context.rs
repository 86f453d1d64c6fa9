//! Explicit wiring of backend and configuration.
//!
//! Every chunk needs a backend to resolve itself and a table name when the
//! caller gives none. [`ChunkContext`] carries both so nothing depends on
//! process-wide defaults.

use std::{path::PathBuf, sync::Arc};

use crate::backend::{TableBackend, parquet_file::ParquetBackend};
use crate::chunk::{Chunk, ChunkBuilder};
use crate::config::ChunkConfig;
use crate::record::{ChunkRecord, TaskRecord};

/// Backend plus configuration used to create chunks.
#[derive(Clone, Debug)]
pub struct ChunkContext {
    backend: Arc<dyn TableBackend>,
    config: ChunkConfig,
}

impl ChunkContext {
    /// Combine a backend and a configuration.
    pub fn new(backend: Arc<dyn TableBackend>, config: ChunkConfig) -> Self {
        Self { backend, config }
    }

    /// Context reading local Parquet files.
    pub fn parquet(config: ChunkConfig) -> Self {
        let backend = ParquetBackend::new(
            config.default_table_name.clone(),
            config.read_batch_size,
        );
        Self::new(Arc::new(backend), config)
    }

    /// Backend handed to every chunk.
    pub fn backend(&self) -> &Arc<dyn TableBackend> {
        &self.backend
    }

    /// Active configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Start describing the default table of the file at `path`.
    pub fn chunk(&self, path: impl Into<PathBuf>) -> ChunkBuilder {
        ChunkBuilder::new(
            path,
            self.config.default_table_name.clone(),
            Arc::clone(&self.backend),
        )
    }

    /// Rebuild a chunk from its serialized form.
    pub fn from_record(&self, record: ChunkRecord) -> Chunk {
        Chunk::from_record(record, Arc::clone(&self.backend))
    }

    /// Describe the unit of work handed over by a scheduler.
    pub fn from_task(&self, task: &TaskRecord) -> Chunk {
        Chunk::from_task(task, Arc::clone(&self.backend))
    }
}
