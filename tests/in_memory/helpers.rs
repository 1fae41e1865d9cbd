//! Shared fixtures for in-memory store integration tests.

use rstest::fixture;
use taskdb::config::TaskStoreConfig;
use taskdb::task::adapters::memory::InMemoryTaskStore;

/// Provides a fresh store with the default configuration.
#[fixture]
pub fn store() -> InMemoryTaskStore {
    InMemoryTaskStore::with_config(&TaskStoreConfig::default())
}
