//! Read-modify-write loops against a real backing.

use super::{RetryError, make_task, plus_nanos};
use chrono::{DateTime, Utc};
use eyre::{ensure, eyre};
use taskdb::task::{
    domain::{Task, TaskId, TaskStatus},
    ports::{TaskStore, TaskStoreError},
    services::{NUM_RETRIES, update_task_with_retries, update_with_retries},
};

fn id_of(task: &Task) -> eyre::Result<TaskId> {
    task.id.clone().ok_or_else(|| eyre!("task has no id"))
}

async fn fetch<S: TaskStore + ?Sized>(store: &S, id: &TaskId) -> eyre::Result<Task> {
    store
        .get_task_by_id(id)
        .await?
        .ok_or_else(|| eyre!("task {id} missing"))
}

/// Lists the tasks created from `begin` onwards.
async fn created_since<S: TaskStore + ?Sized>(
    store: &S,
    begin: DateTime<Utc>,
) -> eyre::Result<Vec<Task>> {
    Ok(store
        .get_tasks_from_date_range(begin, plus_nanos(Utc::now(), 3))
        .await?)
}

/// No conflicts: no-op, insert, then update plus insert.
pub async fn update_with_retries_simple<S: TaskStore + ?Sized>(store: &S) -> eyre::Result<()> {
    let begin = Utc::now();

    let nothing: Vec<Task> =
        update_with_retries(store, async || Ok::<_, RetryError>(Vec::new())).await?;
    ensure!(nothing.is_empty(), "no-op wrote {} tasks", nothing.len());

    let created = update_with_retries(store, async || {
        let mut t1 = make_task(None, &["a", "b", "c", "d"]);
        store.assign_id(&mut t1).await?;
        t1.created = Some(plus_nanos(Utc::now(), 1));
        Ok::<_, RetryError>(vec![t1])
    })
    .await?;
    let t1 = created.first().ok_or_else(|| eyre!("insert returned nothing"))?;
    let t1_id = id_of(t1)?;

    let written = update_with_retries(store, async || {
        let mut current = fetch(store, &t1_id)
            .await
            .map_err(|_| RetryError::Caller)?;
        current.status = TaskStatus::Running;
        let created_at = current.created.unwrap_or(begin);
        let t2 = make_task(Some(plus_nanos(created_at, 1)), &["e", "f"]);
        Ok::<_, RetryError>(vec![current, t2])
    })
    .await?;
    let [updated, t2] = <[Task; 2]>::try_from(written).map_err(|_| eyre!("expected two tasks"))?;
    ensure!(updated.id.as_ref() == Some(&t1_id), "first task is not t1");
    ensure!(updated.status == TaskStatus::Running, "t1 not running");
    ensure!(t2.commits == ["e", "f"], "unexpected t2 commits {:?}", t2.commits);

    ensure!(fetch(store, &t1_id).await? == updated, "stored t1 differs");
    ensure!(fetch(store, &id_of(&t2)?).await? == t2, "stored t2 differs");

    let stored = created_since(store, begin).await?;
    ensure!(
        stored == [updated, t2],
        "unexpected tasks in range: {}",
        stored.len()
    );
    Ok(())
}

/// Two conflicting attempts followed by a successful one.
pub async fn update_with_retries_success<S: TaskStore + ?Sized>(store: &S) -> eyre::Result<()> {
    let begin = Utc::now();
    let mut t1 = make_task(Some(plus_nanos(begin, 1)), &["a", "b", "c", "d"]);
    store.put_task(&mut t1).await?;
    let mut t1_cached = t1.clone();
    t1.status = TaskStatus::Running;
    store.put_task(&mut t1).await?;
    let t1_id = id_of(&t1)?;

    let mut calls = 0;
    let written = update_with_retries(store, async || {
        calls += 1;
        if calls >= 3 {
            t1_cached = fetch(store, &t1_id).await.map_err(|_| RetryError::Caller)?;
        }
        t1_cached.status = TaskStatus::Success;
        let t2 = make_task(Some(plus_nanos(begin, 2)), &["e", "f"]);
        Ok::<_, RetryError>(vec![t1_cached.clone(), t2])
    })
    .await?;
    ensure!(calls == 3, "expected 3 attempts, saw {calls}");

    let [updated, t2] = <[Task; 2]>::try_from(written).map_err(|_| eyre!("expected two tasks"))?;
    ensure!(updated.id.as_ref() == Some(&t1_id), "first task is not t1");
    ensure!(updated.status == TaskStatus::Success, "t1 not successful");
    ensure!(t2.commits == ["e", "f"], "unexpected t2 commits {:?}", t2.commits);
    ensure!(fetch(store, &t1_id).await? == updated, "stored t1 differs");
    ensure!(fetch(store, &id_of(&t2)?).await? == t2, "stored t2 differs");

    let stored = created_since(store, begin).await?;
    ensure!(
        stored == [updated, t2],
        "unexpected tasks in range: {}",
        stored.len()
    );
    Ok(())
}

/// An error from the update function ends the loop without writing.
pub async fn update_with_retries_error_in_func<S: TaskStore + ?Sized>(
    store: &S,
) -> eyre::Result<()> {
    let begin = Utc::now();
    let mut calls = 0;

    let result = update_with_retries(store, async || {
        calls += 1;
        Err::<Vec<Task>, _>(RetryError::Caller)
    })
    .await;

    ensure!(
        matches!(result, Err(RetryError::Caller)),
        "caller error lost: {result:?}"
    );
    ensure!(calls == 1, "expected 1 attempt, saw {calls}");
    ensure!(created_since(store, begin).await?.is_empty(), "tasks written");
    Ok(())
}

/// A validation failure from the store ends the loop without retrying.
pub async fn update_with_retries_error_in_put_tasks<S: TaskStore + ?Sized>(
    store: &S,
) -> eyre::Result<()> {
    let begin = Utc::now();
    let mut calls = 0;

    let result = update_with_retries(store, async || {
        calls += 1;
        Ok::<_, RetryError>(vec![make_task(None, &["a", "b"])])
    })
    .await;

    let message = result.err().map(|err| err.to_string()).unwrap_or_default();
    ensure!(
        message.contains("Created not set"),
        "unexpected error message {message:?}"
    );
    ensure!(calls == 1, "expected 1 attempt, saw {calls}");
    ensure!(created_since(store, begin).await?.is_empty(), "tasks written");
    Ok(())
}

/// Every attempt conflicts; nothing is written.
pub async fn update_with_retries_exhausted<S: TaskStore + ?Sized>(store: &S) -> eyre::Result<()> {
    let begin = Utc::now();
    let mut t1 = make_task(Some(plus_nanos(begin, 1)), &["a", "b", "c", "d"]);
    store.put_task(&mut t1).await?;
    let mut t1_cached = t1.clone();
    t1.status = TaskStatus::Running;
    store.put_task(&mut t1).await?;

    let mut calls = 0;
    let result = update_with_retries(store, async || {
        calls += 1;
        t1_cached.status = TaskStatus::Success;
        let t2 = make_task(Some(plus_nanos(begin, 2)), &["e", "f"]);
        Ok::<_, RetryError>(vec![t1_cached.clone(), t2])
    })
    .await;

    ensure!(
        result.as_ref().is_err_and(RetryError::is_concurrent_update),
        "expected a concurrent update, got {result:?}"
    );
    ensure!(calls == NUM_RETRIES, "expected {NUM_RETRIES} attempts, saw {calls}");

    let stored = created_since(store, begin).await?;
    ensure!(stored == [t1], "unexpected tasks in range: {}", stored.len());
    Ok(())
}

/// Single-task update without conflicts.
pub async fn update_task_with_retries_simple<S: TaskStore + ?Sized>(
    store: &S,
) -> eyre::Result<()> {
    let begin = Utc::now();
    let mut t1 = make_task(None, &["a", "b", "c", "d"]);
    store.assign_id(&mut t1).await?;
    t1.created = Some(plus_nanos(Utc::now(), 1));
    store.put_task(&mut t1).await?;
    let t1_id = id_of(&t1)?;

    let updated = update_task_with_retries(store, &t1_id, async |task: &mut Task| {
        task.status = TaskStatus::Running;
        Ok::<_, RetryError>(())
    })
    .await?;

    ensure!(updated.id.as_ref() == Some(&t1_id), "wrong task updated");
    ensure!(updated.status == TaskStatus::Running, "t1 not running");
    ensure!(updated.db_modified != t1.db_modified, "stamp unchanged");
    ensure!(fetch(store, &t1_id).await? == updated, "stored t1 differs");
    ensure!(
        created_since(store, begin).await? == [updated],
        "unexpected tasks in range"
    );
    Ok(())
}

/// Background writes make the first two attempts conflict.
pub async fn update_task_with_retries_success<S: TaskStore + ?Sized>(
    store: &S,
) -> eyre::Result<()> {
    let begin = Utc::now();
    let mut t1 = make_task(Some(plus_nanos(begin, 1)), &["a", "b", "c", "d"]);
    store.put_task(&mut t1).await?;
    let t1_id = id_of(&t1)?;

    let mut calls = 0;
    let updated = update_task_with_retries(store, &t1_id, async |task: &mut Task| {
        calls += 1;
        if calls < 3 {
            t1.commits.push(format!("z{calls}"));
            store.put_task(&mut t1).await?;
        }
        task.status = TaskStatus::Success;
        Ok::<_, RetryError>(())
    })
    .await?;

    ensure!(calls == 3, "expected 3 attempts, saw {calls}");
    ensure!(updated.id.as_ref() == Some(&t1_id), "wrong task updated");
    ensure!(updated.status == TaskStatus::Success, "t1 not successful");
    ensure!(
        updated.commits == ["a", "b", "c", "d", "z1", "z2"],
        "background writes lost: {:?}",
        updated.commits
    );
    ensure!(fetch(store, &t1_id).await? == updated, "stored t1 differs");
    ensure!(
        created_since(store, begin).await? == [updated],
        "unexpected tasks in range"
    );
    Ok(())
}

/// An error from the update function leaves the task as it was.
pub async fn update_task_with_retries_error_in_func<S: TaskStore + ?Sized>(
    store: &S,
) -> eyre::Result<()> {
    let begin = Utc::now();
    let mut t1 = make_task(Some(plus_nanos(begin, 1)), &["a", "b", "c", "d"]);
    store.put_task(&mut t1).await?;
    let t1_id = id_of(&t1)?;

    let mut calls = 0;
    let result = update_task_with_retries(store, &t1_id, async |task: &mut Task| {
        calls += 1;
        task.status = TaskStatus::Success;
        Err(RetryError::Caller)
    })
    .await;

    ensure!(
        matches!(result, Err(RetryError::Caller)),
        "caller error lost: {result:?}"
    );
    ensure!(calls == 1, "expected 1 attempt, saw {calls}");
    ensure!(fetch(store, &t1_id).await? == t1, "task changed");
    ensure!(
        created_since(store, begin).await? == [t1],
        "unexpected tasks in range"
    );
    Ok(())
}

/// Every attempt loses to a background write.
pub async fn update_task_with_retries_exhausted<S: TaskStore + ?Sized>(
    store: &S,
) -> eyre::Result<()> {
    let begin = Utc::now();
    let mut t1 = make_task(Some(plus_nanos(begin, 1)), &["a", "b", "c", "d"]);
    store.put_task(&mut t1).await?;
    let t1_id = id_of(&t1)?;

    let mut calls = 0;
    let result = update_task_with_retries(store, &t1_id, async |task: &mut Task| {
        calls += 1;
        t1.commits.push(format!("z{calls}"));
        store.put_task(&mut t1).await?;
        task.status = TaskStatus::Success;
        Ok::<_, RetryError>(())
    })
    .await;

    ensure!(
        result.as_ref().is_err_and(RetryError::is_concurrent_update),
        "expected a concurrent update, got {result:?}"
    );
    ensure!(calls == NUM_RETRIES, "expected {NUM_RETRIES} attempts, saw {calls}");
    let stored = fetch(store, &t1_id).await?;
    ensure!(stored == t1, "stored task differs from the last background write");
    ensure!(stored.status == TaskStatus::Pending, "status changed");
    ensure!(
        created_since(store, begin).await? == [t1],
        "unexpected tasks in range"
    );
    Ok(())
}

/// A missing task is reported without calling the update function.
pub async fn update_task_with_retries_not_found<S: TaskStore + ?Sized>(
    store: &S,
) -> eyre::Result<()> {
    let mut t1 = make_task(Some(Utc::now()), &["a", "b", "c", "d"]);
    store.assign_id(&mut t1).await?;
    let t1_id = id_of(&t1)?;

    let mut calls = 0;
    let result = update_task_with_retries(store, &t1_id, async |_: &mut Task| {
        calls += 1;
        Ok::<_, RetryError>(())
    })
    .await;

    ensure!(
        matches!(
            result,
            Err(RetryError::Store(TaskStoreError::NotFound(_)))
        ),
        "expected not found, got {result:?}"
    );
    ensure!(calls == 0, "update function called {calls} times");
    Ok(())
}
