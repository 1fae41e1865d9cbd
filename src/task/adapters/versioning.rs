//! Version stamp rules shared by the store backings.

use crate::task::{
    domain::{Task, TaskId, TaskValidationError},
    ports::{TaskStoreError, TaskStoreResult},
};
use chrono::{DateTime, TimeDelta, Utc};

/// Returns the stamp for the next write: the current time, or one
/// nanosecond past the previous stamp when the clock has not advanced.
#[must_use]
pub fn next_stamp(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    previous
        .and_then(|last| last.checked_add_signed(TimeDelta::nanoseconds(1)))
        .map_or(now, |floor| floor.max(now))
}

/// Checks a write against the stored version of the same task.
///
/// A fresh insert must not carry a stamp; an update must carry exactly the
/// stored stamp and respect the status lifecycle.
///
/// # Errors
///
/// Returns [`TaskStoreError::ConcurrentUpdate`] for a stale or unexpected
/// stamp and [`TaskStoreError::Validation`] for a status regression.
pub fn check_write(id: &TaskId, stored: Option<&Task>, incoming: &Task) -> TaskStoreResult<()> {
    let Some(stored) = stored else {
        return match incoming.db_modified {
            None => Ok(()),
            Some(_) => Err(TaskStoreError::ConcurrentUpdate(id.clone())),
        };
    };
    if stored.db_modified != incoming.db_modified {
        return Err(TaskStoreError::ConcurrentUpdate(id.clone()));
    }
    if !stored.status.can_transition_to(incoming.status) {
        return Err(TaskValidationError::InvalidStatusTransition {
            task: id.clone(),
            from: stored.status,
            to: incoming.status,
        }
        .into());
    }
    Ok(())
}
