//! In-memory task store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::{Clock, DefaultClock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::config::TaskStoreConfig;
use crate::task::{
    adapters::{
        modified::ModifiedTasks,
        versioning::{check_write, next_stamp},
    },
    domain::{Task, TaskId, TrackingId},
    ports::{TaskStore, TaskStoreError, TaskStoreResult},
};

/// Thread-safe in-memory task store.
///
/// Cloning yields another handle onto the same tasks and cursors.
pub struct InMemoryTaskStore<C = DefaultClock>
where
    C: Clock + Send + Sync,
{
    state: Arc<RwLock<InMemoryTaskState>>,
    modified: Arc<ModifiedTasks>,
    clock: Arc<C>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<TaskId, Task>,
    created_index: BTreeMap<(DateTime<Utc>, u64), TaskId>,
    index_keys: HashMap<TaskId, (DateTime<Utc>, u64)>,
    next_seq: u64,
    last_stamp: Option<DateTime<Utc>>,
    closed: bool,
}

impl InMemoryTaskState {
    fn ensure_open(&self) -> TaskStoreResult<()> {
        if self.closed {
            Err(TaskStoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn index(&mut self, id: &TaskId, created: DateTime<Utc>) {
        let seq = match self.index_keys.get(id) {
            Some(&(previous, _)) if previous == created => return,
            Some(&(previous, seq)) => {
                self.created_index.remove(&(previous, seq));
                seq
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                seq
            }
        };
        self.created_index.insert((created, seq), id.clone());
        self.index_keys.insert(id.clone(), (created, seq));
    }
}

impl InMemoryTaskStore<DefaultClock> {
    /// Creates an empty store with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&TaskStoreConfig::default())
    }

    /// Creates an empty store with the given configuration.
    #[must_use]
    pub fn with_config(config: &TaskStoreConfig) -> Self {
        Self::with_clock(Arc::new(DefaultClock), config)
    }
}

impl Default for InMemoryTaskStore<DefaultClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for InMemoryTaskStore<C>
where
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            modified: Arc::clone(&self.modified),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> InMemoryTaskStore<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty store stamping writes with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<C>, config: &TaskStoreConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryTaskState::default())),
            modified: Arc::new(ModifiedTasks::new(config)),
            clock,
        }
    }

    fn read(&self) -> TaskStoreResult<RwLockReadGuard<'_, InMemoryTaskState>> {
        let state = self
            .state
            .read()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))?;
        state.ensure_open()?;
        Ok(state)
    }

    fn ensure_open(&self) -> TaskStoreResult<()> {
        self.read().map(drop)
    }

    fn write(&self) -> TaskStoreResult<RwLockWriteGuard<'_, InMemoryTaskState>> {
        let state = self
            .state
            .write()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))?;
        state.ensure_open()?;
        Ok(state)
    }
}

/// Copies the prepared tasks and stamps them, checking each against the
/// stored version. Nothing is committed here.
fn stage(
    state: &InMemoryTaskState,
    tasks: &[Task],
    stamp: DateTime<Utc>,
) -> TaskStoreResult<Vec<(TaskId, Task)>> {
    let mut seen = HashSet::with_capacity(tasks.len());
    let mut staged = Vec::with_capacity(tasks.len());
    for task in tasks {
        let mut copy = task.clone();
        let id = copy.id.get_or_insert_with(TaskId::generate).clone();
        if !seen.insert(id.clone()) {
            return Err(TaskStoreError::ConcurrentUpdate(id));
        }
        check_write(&id, state.tasks.get(&id), &copy)?;
        copy.db_modified = Some(stamp);
        staged.push((id, copy));
    }
    Ok(staged)
}

#[async_trait]
impl<C> TaskStore for InMemoryTaskStore<C>
where
    C: Clock + Send + Sync,
{
    async fn assign_id(&self, task: &mut Task) -> TaskStoreResult<()> {
        self.ensure_open()?;
        if let Some(id) = task.id.as_ref() {
            return Err(TaskStoreError::IdAlreadyAssigned(id.clone()));
        }
        task.id = Some(TaskId::generate());
        Ok(())
    }

    async fn put_tasks(&self, tasks: &mut [Task]) -> TaskStoreResult<()> {
        self.ensure_open()?;
        for task in tasks.iter() {
            task.validate()?;
        }

        let mut state = self.write()?;
        let now = self.clock.utc();
        let stamp = next_stamp(state.last_stamp, now);
        let staged = stage(&state, tasks, stamp).inspect_err(|err| {
            debug!(error = %err, "rejected task write");
        })?;

        for (id, task) in &staged {
            if let Some(created) = task.created {
                state.index(id, created);
            }
            state.tasks.insert(id.clone(), task.clone());
        }
        state.last_stamp = Some(stamp);

        let committed: Vec<Task> = staged.into_iter().map(|(_, task)| task).collect();
        self.modified.record(&committed, now);
        drop(state);

        for (task, written) in tasks.iter_mut().zip(&committed) {
            task.id.clone_from(&written.id);
            task.db_modified = written.db_modified;
        }
        debug!(count = committed.len(), stamp = %stamp, "committed tasks");
        Ok(())
    }

    async fn get_task_by_id(&self, id: &TaskId) -> TaskStoreResult<Option<Task>> {
        let state = self.read()?;
        Ok(state.tasks.get(id).cloned())
    }

    async fn get_tasks_from_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TaskStoreResult<Vec<Task>> {
        let state = self.read()?;
        if start >= end {
            return Ok(Vec::new());
        }
        let tasks = state
            .created_index
            .range((start, 0)..(end, 0))
            .filter_map(|(_, id)| state.tasks.get(id).cloned())
            .collect();
        Ok(tasks)
    }

    async fn start_tracking_modified_tasks(&self) -> TaskStoreResult<TrackingId> {
        self.ensure_open()?;
        self.modified.start_tracking(self.clock.utc())
    }

    async fn get_modified_tasks(&self, id: &TrackingId) -> TaskStoreResult<Vec<Task>> {
        self.ensure_open()?;
        self.modified.take(id, self.clock.utc())
    }

    async fn stop_tracking_modified_tasks(&self, id: &TrackingId) -> TaskStoreResult<()> {
        self.ensure_open()?;
        self.modified.stop_tracking(id)
    }

    async fn close(&self) -> TaskStoreResult<()> {
        let mut state = self.write()?;
        *state = InMemoryTaskState {
            closed: true,
            ..InMemoryTaskState::default()
        };
        self.modified.clear();
        debug!("closed in-memory task store");
        Ok(())
    }
}
