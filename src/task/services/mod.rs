//! Application services built on the task store port.
//!
//! The retry helpers are the supported way to read, modify and write tasks:
//! they repeat the whole cycle when a concurrent writer wins the race.

mod retry;
mod swarming;

pub use retry::{NUM_RETRIES, update_task_with_retries, update_with_retries};
pub use swarming::{SwarmingSyncError, update_store_from_swarming_task};
