//! Bounded registry of modified-task cursors shared by every store backing.
//!
//! Each cursor accumulates the tasks written since its last poll. The table
//! is capped; cursors that go unpolled for longer than the configured idle
//! timeout are reclaimed lazily when a new cursor is registered or a write is
//! recorded.
//!
//! Stores may record commits out of order. Each cursor remembers the newest
//! version stamp it has queued per task and ignores anything not newer, so a
//! consumer never sees a task move backwards.

use crate::config::TaskStoreConfig;
use crate::task::{
    domain::{Task, TaskId, TrackingId},
    ports::{TaskStoreError, TaskStoreResult},
};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Registry of change-feed cursors.
#[derive(Debug)]
pub struct ModifiedTasks {
    max_users: usize,
    idle_timeout: Option<TimeDelta>,
    cursors: Mutex<HashMap<TrackingId, Cursor>>,
}

#[derive(Debug)]
struct Cursor {
    last_polled: DateTime<Utc>,
    order: Vec<TaskId>,
    pending: HashMap<TaskId, Task>,
    newest: HashMap<TaskId, DateTime<Utc>>,
}

impl Cursor {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_polled: now,
            order: Vec::new(),
            pending: HashMap::new(),
            newest: HashMap::new(),
        }
    }

    fn push(&mut self, id: &TaskId, task: &Task) {
        let Some(stamp) = task.db_modified else {
            return;
        };
        match self.newest.get_mut(id) {
            Some(newest) if *newest >= stamp => {
                debug!(task_id = %id, "ignored out-of-order task record");
                return;
            }
            Some(newest) => *newest = stamp,
            None => {
                self.newest.insert(id.clone(), stamp);
            }
        }
        match self.pending.get_mut(id) {
            Some(pending) => pending.clone_from(task),
            None => {
                self.pending.insert(id.clone(), task.clone());
                self.order.push(id.clone());
            }
        }
    }

    fn drain(&mut self) -> Vec<Task> {
        let mut pending = std::mem::take(&mut self.pending);
        std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|id| pending.remove(&id))
            .collect()
    }
}

impl ModifiedTasks {
    /// Creates an empty registry sized by `config`.
    #[must_use]
    pub fn new(config: &TaskStoreConfig) -> Self {
        Self {
            max_users: config.max_modified_tasks_users,
            idle_timeout: config.modified_tasks_idle_timeout(),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a cursor and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::TooManyUsers`] when the table is full after
    /// reclaiming idle cursors.
    pub fn start_tracking(&self, now: DateTime<Utc>) -> TaskStoreResult<TrackingId> {
        let mut cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        self.evict_idle(&mut cursors, now);
        if cursors.len() >= self.max_users {
            return Err(TaskStoreError::TooManyUsers {
                max: self.max_users,
            });
        }
        let id = TrackingId::generate();
        cursors.insert(id.clone(), Cursor::new(now));
        debug!(cursor = %id, users = cursors.len(), "registered modified-tasks cursor");
        Ok(id)
    }

    /// Returns and clears the tasks recorded for a cursor.
    ///
    /// A task written several times since the last poll is returned once,
    /// carrying its latest value, at the position of its first write.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::UnknownId`] for an unregistered cursor.
    pub fn take(&self, id: &TrackingId, now: DateTime<Utc>) -> TaskStoreResult<Vec<Task>> {
        let mut cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        let cursor = cursors
            .get_mut(id)
            .ok_or_else(|| TaskStoreError::UnknownId(id.clone()))?;
        cursor.last_polled = now;
        Ok(cursor.drain())
    }

    /// Removes a cursor.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::UnknownId`] for an unregistered cursor.
    pub fn stop_tracking(&self, id: &TrackingId) -> TaskStoreResult<()> {
        let mut cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        cursors
            .remove(id)
            .map(|_| debug!(cursor = %id, "released modified-tasks cursor"))
            .ok_or_else(|| TaskStoreError::UnknownId(id.clone()))
    }

    /// Appends committed tasks to every registered cursor.
    ///
    /// Tasks without an identifier or version stamp are skipped; stores only
    /// record tasks they have committed. A record that is not newer than one
    /// a cursor already queued or delivered for the same task is dropped.
    pub fn record(&self, tasks: &[Task], now: DateTime<Utc>) {
        let mut cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        self.evict_idle(&mut cursors, now);
        for cursor in cursors.values_mut() {
            for task in tasks {
                if let Some(id) = task.id.as_ref() {
                    cursor.push(id, task);
                }
            }
        }
    }

    /// Returns the number of registered cursors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when no cursor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cursor.
    pub fn clear(&self) {
        self.cursors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn evict_idle(&self, cursors: &mut HashMap<TrackingId, Cursor>, now: DateTime<Utc>) {
        let Some(timeout) = self.idle_timeout else {
            return;
        };
        cursors.retain(|id, cursor| {
            let keep = now.signed_duration_since(cursor.last_polled) <= timeout;
            if !keep {
                info!(cursor = %id, "reclaimed idle modified-tasks cursor");
            }
            keep
        });
    }
}
