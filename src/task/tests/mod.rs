//! Unit tests for the task module.
//!
//! Tests are organised by concern: the task record, backend reconciliation,
//! tag derivation, the change-feed registry, batch codecs and the retry
//! loops.
