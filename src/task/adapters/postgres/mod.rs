//! `PostgreSQL` adapter for task storage.
//!
//! Tasks are stored as JSON payloads. Creation time and version stamp are
//! mirrored into integer nanosecond columns so range scans and version
//! checks keep full precision.

mod models;
mod schema;
mod store;

pub use store::{PostgresTaskStore, TaskPgPool};
