//! Shared utilities and common types for the Club Portal workspace.
//!
//! This crate provides common functionality used across all other crates:
//! - Timestamp formatting and parsing (ISO 8601 and compact issue dates)
//! - Common validation logic for identifiers and namespaces

pub mod time;
pub mod validation;
