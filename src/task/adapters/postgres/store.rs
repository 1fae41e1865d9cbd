//! `PostgreSQL` task store implementation.

use super::{
    models::{NewTaskRow, TaskRow},
    schema::tasks,
};
use crate::config::TaskStoreConfig;
use crate::task::{
    adapters::{
        modified::ModifiedTasks,
        versioning::{check_write, next_stamp},
    },
    domain::{Task, TaskId, TaskStatus, TrackingId},
    ports::{TaskStore, TaskStoreError, TaskStoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::Error as DieselError;
use mockable::{Clock, DefaultClock};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// `PostgreSQL` connection pool type used by the task store.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

const CREATE_TASKS_SQL: &str =
    include_str!("../../../../migrations/2026-10-19-000000_create_tasks/up.sql");

/// `PostgreSQL`-backed task store.
///
/// Version checks run inside a transaction holding row locks on every
/// written task, so two writers racing on one stamp cannot both commit. The
/// change feed is kept in process and only observes writes made through
/// this handle and its clones.
///
/// Every clone shares one pool; [`TaskStore::close`] releases it for all of
/// them. Calls already running keep their connection until they finish.
pub struct PostgresTaskStore<C = DefaultClock>
where
    C: Clock + Send + Sync,
{
    pool: Arc<RwLock<Option<TaskPgPool>>>,
    modified: Arc<ModifiedTasks>,
    clock: Arc<C>,
}

impl<C> Clone for PostgresTaskStore<C>
where
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            modified: Arc::clone(&self.modified),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl PostgresTaskStore<DefaultClock> {
    /// Creates a store from a `PostgreSQL` connection pool.
    #[must_use]
    pub fn new(pool: TaskPgPool) -> Self {
        Self::with_config(pool, &TaskStoreConfig::default())
    }

    /// Creates a store with the given configuration.
    #[must_use]
    pub fn with_config(pool: TaskPgPool, config: &TaskStoreConfig) -> Self {
        Self::with_clock(pool, Arc::new(DefaultClock), config)
    }
}

impl<C> PostgresTaskStore<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a store stamping writes with `clock`.
    #[must_use]
    pub fn with_clock(pool: TaskPgPool, clock: Arc<C>, config: &TaskStoreConfig) -> Self {
        Self {
            pool: Arc::new(RwLock::new(Some(pool))),
            modified: Arc::new(ModifiedTasks::new(config)),
            clock,
        }
    }

    /// Returns the connection pool, or `None` once the store is closed.
    #[must_use]
    pub fn connection_pool(&self) -> Option<TaskPgPool> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Creates the `tasks` table and its indices when missing.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Persistence`] when the DDL fails.
    pub async fn ensure_schema(&self) -> TaskStoreResult<()> {
        self.run_blocking(|connection| {
            connection.batch_execute(CREATE_TASKS_SQL)?;
            Ok(())
        })
        .await?;
        info!("task schema ready");
        Ok(())
    }

    fn live_pool(&self) -> TaskStoreResult<TaskPgPool> {
        self.connection_pool().ok_or(TaskStoreError::Closed)
    }

    fn ensure_open(&self) -> TaskStoreResult<()> {
        self.live_pool().map(drop)
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.live_pool()?;
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskStoreError::persistence)?
    }
}

impl From<DieselError> for TaskStoreError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

#[async_trait]
impl<C> TaskStore for PostgresTaskStore<C>
where
    C: Clock + Send + Sync + 'static,
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

        let now = self.clock.utc();
        let incoming = tasks.to_vec();
        let committed = self
            .run_blocking(move |connection| {
                connection.transaction::<_, TaskStoreError, _>(|tx| write_batch(tx, incoming, now))
            })
            .await
            .inspect_err(|err| debug!(error = %err, "rejected task write"))?;

        self.modified.record(&committed, now);
        for (task, written) in tasks.iter_mut().zip(&committed) {
            task.id.clone_from(&written.id);
            task.db_modified = written.db_modified;
        }
        debug!(count = committed.len(), "committed tasks");
        Ok(())
    }

    async fn get_task_by_id(&self, id: &TaskId) -> TaskStoreResult<Option<Task>> {
        let key = id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = tasks::table
                .find(key)
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn get_tasks_from_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TaskStoreResult<Vec<Task>> {
        if start >= end {
            self.ensure_open()?;
            return Ok(Vec::new());
        }
        let start_ns = nanos_clamped(start);
        let end_ns = nanos_clamped(end);
        self.run_blocking(move |connection| {
            tasks::table
                .filter(tasks::created_ns.ge(start_ns))
                .filter(tasks::created_ns.lt(end_ns))
                .order((tasks::created_ns.asc(), tasks::seq.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)?
                .into_iter()
                .map(row_to_task)
                .collect()
        })
        .await
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
        let released = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(TaskStoreError::Closed)?;
        drop(released);
        self.modified.clear();
        debug!("closed postgres task store");
        Ok(())
    }
}

/// Writes a batch inside an open transaction and returns the committed
/// tasks in input order.
fn write_batch(
    connection: &mut PgConnection,
    mut batch: Vec<Task>,
    now: DateTime<Utc>,
) -> TaskStoreResult<Vec<Task>> {
    let mut seen = HashSet::with_capacity(batch.len());
    for task in &mut batch {
        let id = task.id.get_or_insert_with(TaskId::generate).clone();
        if !seen.insert(id.clone()) {
            return Err(TaskStoreError::ConcurrentUpdate(id));
        }
    }

    let keys: Vec<String> = seen.iter().map(|id| id.as_str().to_owned()).collect();
    let stored: HashMap<TaskId, Task> = tasks::table
        .filter(tasks::id.eq_any(keys))
        .order(tasks::id.asc())
        .for_update()
        .select(TaskRow::as_select())
        .load::<TaskRow>(connection)?
        .into_iter()
        .map(|row| row_to_task(row).map(|task| (TaskId::new(row_id(&task)), task)))
        .collect::<TaskStoreResult<_>>()?;

    let last_ns: Option<i64> = tasks::table
        .select(diesel::dsl::max(tasks::db_modified_ns))
        .first(connection)?;
    let stamp = next_stamp(last_ns.map(DateTime::from_timestamp_nanos), now);

    for task in &mut batch {
        let id = TaskId::new(row_id(task));
        let previous = stored.get(&id);
        check_write(&id, previous, task)?;
        task.db_modified = Some(stamp);
        let row = to_row(&id, task)?;

        if previous.is_some() {
            diesel::update(tasks::table.find(row.id.clone()))
                .set(&row)
                .execute(connection)?;
        } else {
            let inserted = diesel::insert_into(tasks::table)
                .values(&row)
                .on_conflict_do_nothing()
                .execute(connection)?;
            if inserted == 0 {
                return Err(TaskStoreError::ConcurrentUpdate(id));
            }
        }
    }
    Ok(batch)
}

fn row_id(task: &Task) -> String {
    task.id
        .as_ref()
        .map(|id| id.as_str().to_owned())
        .unwrap_or_default()
}

fn to_row(id: &TaskId, task: &Task) -> TaskStoreResult<NewTaskRow> {
    let payload = serde_json::to_value(task).map_err(TaskStoreError::persistence)?;
    Ok(NewTaskRow {
        id: id.as_str().to_owned(),
        created_ns: task.created.map_or(0, nanos_clamped),
        db_modified_ns: task.db_modified.map_or(0, nanos_clamped),
        status: task.status.as_str().to_owned(),
        payload,
    })
}

/// Rebuilds a task from its row; the `status` column wins over the payload.
fn row_to_task(row: TaskRow) -> TaskStoreResult<Task> {
    let TaskRow {
        id,
        status,
        payload,
    } = row;
    let mut task =
        serde_json::from_value::<Task>(payload).map_err(TaskStoreError::persistence)?;
    task.id = Some(TaskId::new(id));
    task.status = TaskStatus::try_from(status.as_str()).map_err(TaskStoreError::persistence)?;
    Ok(task)
}

/// Nanoseconds since the epoch, saturating outside the representable range.
fn nanos_clamped(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt().unwrap_or_else(|| {
        if at < DateTime::UNIX_EPOCH {
            i64::MIN
        } else {
            i64::MAX
        }
    })
}
