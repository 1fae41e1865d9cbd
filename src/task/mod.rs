//! Task tracking.
//!
//! Tasks carry an immutable identity and mutable execution state. Writers
//! coordinate through optimistic concurrency: every write is checked
//! against the version stamp the writer last read. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Batch serialisation in [`codec`]
//! - Retry and reconciliation services in [`services`]

pub mod adapters;
pub mod codec;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
