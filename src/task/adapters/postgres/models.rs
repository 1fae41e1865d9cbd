//! Diesel row models for task persistence.

use super::schema::tasks;
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for task records; the integer columns only serve
/// filtering and ordering.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    pub id: String,
    /// Lifecycle status, authoritative over the payload's copy.
    pub status: String,
    /// Serialised task.
    pub payload: Value,
}

/// Insert model for task records; `seq` is assigned by the database.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    /// Task identifier.
    pub id: String,
    /// Creation time in nanoseconds.
    pub created_ns: i64,
    /// Version stamp in nanoseconds.
    pub db_modified_ns: i64,
    /// Lifecycle status.
    pub status: String,
    /// Serialised task.
    pub payload: Value,
}
