//! Applying backend reports to tasks held by the in-memory store.

use super::helpers::store;
use chrono::{DateTime, TimeZone, Utc};
use rstest::{fixture, rstest};
use taskdb::task::{
    adapters::memory::InMemoryTaskStore,
    domain::{SwarmingError, SwarmingTaskResult, Task, TaskId, TaskStatus, TaskTags, tags_for_task},
    ports::{TaskStore, TaskStoreError},
    services::{SwarmingSyncError, update_store_from_swarming_task},
};

#[fixture]
fn created() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

async fn stored_task(store: &InMemoryTaskStore, created: DateTime<Utc>) -> Task {
    let mut task = Task::new("Build-Debian", "https://repo.example/skia.git", created)
        .with_revision("deadbeef");
    store.put_task(&mut task).await.expect("insert succeeds");
    task
}

fn report_for(task: &Task, state: &str) -> SwarmingTaskResult {
    let tags = tags_for_task(&TaskTags {
        name: task.name.clone(),
        id: task.id.clone().expect("stored task has an id"),
        priority: 0.8,
        repo: task.repo.clone(),
        retry_of: None,
        revision: task.revision.clone(),
        dimensions: vec![("os".to_owned(), "Debian".to_owned())],
        parent_task_ids: Vec::new(),
    });
    SwarmingTaskResult {
        task_id: "swarm-1".to_owned(),
        state: state.to_owned(),
        created_ts: Some("2026-10-19T12:00:00".to_owned()),
        started_ts: Some("2026-10-19T12:01:00".to_owned()),
        tags,
        ..SwarmingTaskResult::default()
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn report_updates_the_stored_task(store: InMemoryTaskStore, created: DateTime<Utc>) {
    let task = stored_task(&store, created).await;
    let id = task.id.clone().expect("stored task has an id");

    let changed = update_store_from_swarming_task(&store, &report_for(&task, "RUNNING"))
        .await
        .expect("sync succeeds");

    assert!(changed);
    let stored = store
        .get_task_by_id(&id)
        .await
        .expect("read succeeds")
        .expect("task exists");
    assert_eq!(stored.status, TaskStatus::Running);
    assert_eq!(stored.swarming_task_id.as_deref(), Some("swarm-1"));
    assert_ne!(stored.db_modified, task.db_modified);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_report_does_not_write(store: InMemoryTaskStore, created: DateTime<Utc>) {
    let task = stored_task(&store, created).await;
    let id = task.id.clone().expect("stored task has an id");
    let report = report_for(&task, "RUNNING");
    update_store_from_swarming_task(&store, &report)
        .await
        .expect("first sync succeeds");
    let cursor = store
        .start_tracking_modified_tasks()
        .await
        .expect("free cursor slot");
    let before = store.get_task_by_id(&id).await.expect("read succeeds");

    let changed = update_store_from_swarming_task(&store, &report)
        .await
        .expect("second sync succeeds");

    assert!(!changed);
    assert_eq!(store.get_task_by_id(&id).await.expect("read succeeds"), before);
    assert!(
        store
            .get_modified_tasks(&cursor)
            .await
            .expect("known cursor")
            .is_empty()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn report_without_id_tag_is_rejected(store: InMemoryTaskStore, created: DateTime<Utc>) {
    let task = stored_task(&store, created).await;
    let mut report = report_for(&task, "RUNNING");
    report.tags.retain(|tag| !tag.starts_with("sk_id:"));

    let result = update_store_from_swarming_task(&store, &report).await;

    assert!(matches!(
        result,
        Err(SwarmingSyncError::Swarming(SwarmingError::MissingTag { .. }))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn report_for_unknown_task_is_rejected(store: InMemoryTaskStore, created: DateTime<Utc>) {
    let mut task = Task::new("Build-Debian", "repo", created);
    task.id = Some(TaskId::generate());

    let result = update_store_from_swarming_task(&store, &report_for(&task, "PENDING")).await;

    assert!(matches!(
        result,
        Err(SwarmingSyncError::Store(TaskStoreError::NotFound(_)))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn contradicting_report_leaves_task_untouched(
    store: InMemoryTaskStore,
    created: DateTime<Utc>,
) {
    let task = stored_task(&store, created).await;
    let id = task.id.clone().expect("stored task has an id");
    let mut renamed = task.clone();
    renamed.name = "Test-Android".to_owned();

    let result = update_store_from_swarming_task(&store, &report_for(&renamed, "RUNNING")).await;

    assert!(matches!(
        result,
        Err(SwarmingSyncError::Swarming(SwarmingError::IdentityMismatch { field: "Name", .. }))
    ));
    assert_eq!(
        store.get_task_by_id(&id).await.expect("read succeeds"),
        Some(task)
    );
}
