//! Pathdex Server Library
//!
//! HTTP server and reconciliation engine for the path catalog.
//!
//! # Overview
//!
//! The server maintains a versioned catalog of file paths observed in a
//! content-addressed game archive. The archive's lookup tables store
//! hashes, never names, so knowledge arrives in fragments:
//!
//! - **Ingest**: reconciliation cycles fold per-version index snapshots
//!   into the catalog, promoting partial sightings to confirmed entries
//! - **Uploads**: players submit literal path strings, which can name or
//!   promote entries the indexes already proved to exist
//! - **API**: upload confirmation, per-segment statistics, and a
//!   plain-text export of every known path
//!
//! All writes run under a single bounded-wait lock; reads go straight
//! to storage.
//!
//! # Framework Stack
//!
//! - **Axum**: HTTP surface
//! - **SQLx**: PostgreSQL storage with runtime queries and migrations
//! - **Tokio / Tower**: async runtime and middleware

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;

// Re-export commonly used types
pub use error::{AppError, ServerResult};
