//! Store contract checks against the in-memory backing.

use super::helpers::store;
use crate::conformance::store as checks;
use rstest::rstest;
use taskdb::task::{adapters::memory::InMemoryTaskStore, ports::TaskStore};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn basic_flow(store: InMemoryTaskStore) -> eyre::Result<()> {
    checks::basic_flow(&store).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn too_many_users(store: InMemoryTaskStore) -> eyre::Result<()> {
    checks::too_many_users(&store).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_update(store: InMemoryTaskStore) -> eyre::Result<()> {
    checks::concurrent_update(&store).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn write_rules(store: InMemoryTaskStore) -> eyre::Result<()> {
    checks::write_rules(&store).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reads_are_detached(store: InMemoryTaskStore) -> eyre::Result<()> {
    checks::reads_are_detached(&store).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn clones_share_state(store: InMemoryTaskStore) -> eyre::Result<()> {
    let other = store.clone();
    let cursor = other.start_tracking_modified_tasks().await?;
    let mut task = crate::conformance::make_task(Some(chrono::Utc::now()), &["a"]);

    store.put_task(&mut task).await?;

    let seen = other.get_modified_tasks(&cursor).await?;
    eyre::ensure!(seen == [task], "clone missed the write");
    Ok(())
}
