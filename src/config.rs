//! Store configuration.
//!
//! # Examples
//!
//! ```
//! use taskdb::config::TaskStoreConfig;
//!
//! let config = TaskStoreConfig::default();
//! assert_eq!(config.max_modified_tasks_users, 10);
//!
//! let parsed = TaskStoreConfig::from_json_str(r#"{"max_modified_tasks_users": 3}"#)
//!     .expect("valid configuration");
//! assert_eq!(parsed.max_modified_tasks_users, 3);
//! assert_eq!(parsed.decoder_workers, 10);
//! ```

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Tuning knobs shared by every task store backing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskStoreConfig {
    /// Maximum number of concurrently registered modified-task cursors.
    pub max_modified_tasks_users: usize,
    /// Seconds a cursor may go unpolled before it is reclaimed; `None` keeps
    /// cursors until they are stopped explicitly.
    pub modified_tasks_idle_timeout_secs: Option<u64>,
    /// Size of the task decoder worker pool.
    pub decoder_workers: usize,
}

impl Default for TaskStoreConfig {
    fn default() -> Self {
        Self {
            max_modified_tasks_users: 10,
            modified_tasks_idle_timeout_secs: Some(10 * 60),
            decoder_workers: 10,
        }
    }
}

impl TaskStoreConfig {
    /// Configuration whose cursors are never reclaimed implicitly.
    ///
    /// The cursor ceiling is then a hard limit for the store's lifetime.
    #[must_use]
    pub fn persistent_cursors() -> Self {
        Self {
            modified_tasks_idle_timeout_secs: None,
            ..Self::default()
        }
    }

    /// Configuration with a small cursor table and quick reclamation.
    ///
    /// Useful for resource-constrained embedders.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            max_modified_tasks_users: 4,
            modified_tasks_idle_timeout_secs: Some(60),
            decoder_workers: 2,
        }
    }

    /// Parses a JSON configuration document; missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns the parse error for malformed JSON or mistyped values.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Returns the cursor idle timeout.
    #[must_use]
    pub fn modified_tasks_idle_timeout(&self) -> Option<TimeDelta> {
        self.modified_tasks_idle_timeout_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(TimeDelta::try_seconds)
    }
}
