//! Store construction from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use domain::ports::{KeyValueStore, MemoryStore, StorageError};
use serde::Deserialize;

use crate::file_store::FileStore;

/// Which storage adapter to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    File,
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackendKind,

    /// Directory for the file backend; one directory per user profile.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_backend() -> StorageBackendKind {
    StorageBackendKind::File
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Opens the configured store.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    let store: Arc<dyn KeyValueStore> = match config.backend {
        StorageBackendKind::File => Arc::new(FileStore::open(&config.data_dir)?),
        StorageBackendKind::Memory => {
            tracing::warn!("Using in-memory storage; registrations will not survive restart");
            Arc::new(MemoryStore::new())
        }
    };
    tracing::info!(
        backend = ?config.backend,
        data_dir = %config.data_dir.display(),
        "Storage opened"
    );
    Ok(store)
}
