//! taskdb: an embeddable task-tracking database.
//!
//! The crate stores task records and free-text comments for a continuous
//! build scheduler. Many readers and writers can share a store without
//! external locking: writes are versioned and stale writes are rejected, and
//! independent consumers can follow changes through bounded cursors.
//!
//! # Architecture
//!
//! taskdb follows hexagonal architecture principles:
//!
//! - **Domain**: Pure data and rules with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for storage
//! - **Adapters**: Concrete implementations of ports (in-memory, `PostgreSQL`,
//!   files)
//!
//! # Modules
//!
//! - [`task`]: Task records, stores, change feed, retries and batch codecs
//! - [`comment`]: Task, task spec and commit comments
//! - [`config`]: Store configuration
//! - [`telemetry`]: Tracing subscriber setup for embedding binaries

pub mod comment;
pub mod config;
pub mod task;
pub mod telemetry;
