//! Persistence layer for the Club Portal client.
//!
//! This crate contains:
//! - Storage configuration and store construction
//! - A durable file-per-key implementation of the `KeyValueStore` port

pub mod file_store;
pub mod store;

pub use file_store::FileStore;
pub use store::{open_store, StorageBackendKind, StorageConfig};
