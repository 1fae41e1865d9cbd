//! Domain model for task tracking.
//!
//! Tasks are plain records with an immutable identity and mutable state.
//! Reconciliation against execution backend reports and tag derivation live
//! here too, free of any storage concern.

mod error;
mod ids;
mod swarming;
mod tags;
mod task;

pub use error::{ParseTaskStatusError, SwarmingError, TaskValidationError};
pub use ids::{TaskId, TrackingId};
pub use swarming::{
    OutputsRef, SWARMING_TAG_ALLOW_MILO, SWARMING_TAG_DIMENSION_PREFIX, SWARMING_TAG_ID,
    SWARMING_TAG_NAME, SWARMING_TAG_PARENT_TASK_ID, SWARMING_TAG_PRIORITY, SWARMING_TAG_REPO,
    SWARMING_TAG_RETRY_OF, SWARMING_TAG_REVISION, SwarmingState, SwarmingTags,
    SwarmingTaskResult, parse_swarming_timestamp,
};
pub use tags::{TaskTags, tags_for_task};
pub use task::{Task, TaskStatus, sort_by_created};
