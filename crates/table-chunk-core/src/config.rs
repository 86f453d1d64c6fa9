//! Configuration injected into [`crate::ChunkContext`].
//!
//! JSON layout example (every key optional):
//!
//! ```json
//! {"default_table_name": "Events", "max_workers": 8, "read_batch_size": 8192}
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Table name used when none is given.
pub const DEFAULT_TABLE_NAME: &str = "Events";

/// Default number of rows per decoded record batch.
pub const DEFAULT_READ_BATCH_SIZE: usize = 8192;

/// Errors raised while loading or validating a [`ChunkConfig`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[snafu(display("Failed to read config file {path}: {source}"))]
    Read {
        /// Path of the configuration file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for [`ChunkConfig`].
    #[snafu(display("Failed to parse config {origin}: {source}"))]
    Parse {
        /// Where the JSON came from (a path or `<string>`).
        origin: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The configuration parsed but holds unusable values.
    #[snafu(display("Invalid config: {detail}"))]
    Invalid {
        /// What is wrong.
        detail: String,
    },
}

/// Settings shared by every chunk created through a context.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkConfig {
    /// Table name for chunks created without one.
    pub default_table_name: String,
    /// Upper bound on metadata worker threads; `0` picks twice the available
    /// parallelism.
    pub max_workers: usize,
    /// Rows per decoded record batch when reading chunks.
    pub read_batch_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            default_table_name: DEFAULT_TABLE_NAME.to_string(),
            max_workers: 0,
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
        }
    }
}

impl ChunkConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ChunkConfig = serde_json::from_str(json).context(ParseSnafu {
            origin: "<string>".to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path).context(ReadSnafu {
            path: origin.clone(),
        })?;
        let config: ChunkConfig = serde_json::from_str(&text).context(ParseSnafu { origin })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no operation can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            !self.default_table_name.trim().is_empty(),
            InvalidSnafu {
                detail: "default_table_name must not be empty".to_string(),
            }
        );
        ensure!(
            self.read_batch_size > 0,
            InvalidSnafu {
                detail: "read_batch_size must be positive".to_string(),
            }
        );
        Ok(())
    }

    /// Effective worker cap for bulk resolution.
    pub fn worker_cap(&self) -> usize {
        if self.max_workers > 0 {
            return self.max_workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .saturating_mul(2)
            .max(1)
    }

    /// Use another default table name.
    pub fn with_default_table_name(mut self, name: impl Into<String>) -> Self {
        self.default_table_name = name.into();
        self
    }

    /// Use another worker cap.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }
}
