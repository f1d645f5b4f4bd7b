//! Store configuration, loadable from TOML.
//!
//! ```toml
//! chunk_size = 1000
//! ceiling = 20
//! parts_namespace = "METALPARTS"
//! component_marker = "METALCOMP"
//! slot_capacity = 16384
//! ```
//!
//! Every key is optional; missing keys take the defaults above.

use std::path::{Path, PathBuf};

use chunkcodec::{
    chunk_namespace, info_namespace, ChunkCodec, DEFAULT_CEILING, DEFAULT_CHUNK_SIZE,
};
use serde::{Deserialize, Serialize};
use slotstore::{validate_namespace, DEFAULT_SLOT_CAPACITY};
use thiserror::Error;

use crate::records::{COMPONENT_MARKER, PARTS_NAMESPACE};

/// Worst-case UTF-8 width of one character.
const MAX_CHAR_BYTES: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Characters per chunk.
    pub chunk_size: usize,
    /// Maximum number of chunk slots per record.
    pub ceiling: usize,
    /// Base namespace of the part-list chunk set.
    pub parts_namespace: String,
    /// Namespace whose slot marks an entity as a takeoff component.
    pub component_marker: String,
    /// Per-slot byte capacity of the host.
    pub slot_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            ceiling: DEFAULT_CEILING,
            parts_namespace: PARTS_NAMESPACE.to_string(),
            component_marker: COMPONENT_MARKER.to_string(),
            slot_capacity: DEFAULT_SLOT_CAPACITY,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: StoreConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks that the chunk set layout is usable on the configured host.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.ceiling == 0 {
            return Err(ConfigError::Invalid(
                "chunk_size and ceiling must be at least 1".to_string(),
            ));
        }

        // the longest names the layout will ever register
        let names = [
            self.component_marker.clone(),
            info_namespace(&self.parts_namespace),
            chunk_namespace(&self.parts_namespace, self.ceiling - 1),
        ];
        for name in &names {
            validate_namespace(name).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        // one text value of chunk_size characters must fit one slot
        let worst_chunk = 2 + self.chunk_size.saturating_mul(MAX_CHAR_BYTES);
        if worst_chunk > self.slot_capacity {
            return Err(ConfigError::Invalid(format!(
                "chunk_size {} may need {} bytes per slot, slot_capacity is {}",
                self.chunk_size, worst_chunk, self.slot_capacity
            )));
        }
        Ok(())
    }

    pub fn codec(&self) -> Result<ChunkCodec, ConfigError> {
        ChunkCodec::new(self.chunk_size, self.ceiling)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
