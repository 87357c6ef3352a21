//! Domain layer for the Club Portal registration core.
//!
//! This crate contains:
//! - Domain models (Registration, QR payloads, sync queue entries)
//! - Ports to storage, the portal backend, cameras and QR renderers
//! - Business logic services (codec, registration store, attendance marker,
//!   scanner session)

pub mod models;
pub mod ports;
pub mod services;
