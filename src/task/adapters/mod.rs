//! Store adapters for the task module.
//!
//! Each backing implements the [`TaskStore`] port with the same optimistic
//! concurrency contract and shares the change-feed registry in
//! [`modified`].
//!
//! # Available Adapters
//!
//! - [`memory::InMemoryTaskStore`]: thread-safe in-memory storage
//! - [`postgres::PostgresTaskStore`]: `PostgreSQL` persistence using Diesel
//!
//! [`TaskStore`]: crate::task::ports::TaskStore

pub mod memory;
pub mod modified;
pub mod postgres;
pub mod versioning;
