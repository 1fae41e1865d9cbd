//! Store contract checks against the `PostgreSQL` backing.

use super::helpers::test_store;
use crate::conformance::store as checks;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn basic_flow() -> eyre::Result<()> {
    let Some(db) = test_store().await? else {
        return Ok(());
    };
    checks::basic_flow(&db.store).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn too_many_users() -> eyre::Result<()> {
    let Some(db) = test_store().await? else {
        return Ok(());
    };
    checks::too_many_users(&db.store).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_update() -> eyre::Result<()> {
    let Some(db) = test_store().await? else {
        return Ok(());
    };
    checks::concurrent_update(&db.store).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn write_rules() -> eyre::Result<()> {
    let Some(db) = test_store().await? else {
        return Ok(());
    };
    checks::write_rules(&db.store).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reads_are_detached() -> eyre::Result<()> {
    let Some(db) = test_store().await? else {
        return Ok(());
    };
    checks::reads_are_detached(&db.store).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn schema_setup_is_idempotent() -> eyre::Result<()> {
    let Some(db) = test_store().await? else {
        return Ok(());
    };
    db.store.ensure_schema().await?;
    checks::closes(&db.store).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn close_releases_the_pool() -> eyre::Result<()> {
    let Some(db) = test_store().await? else {
        return Ok(());
    };
    let clone = db.store.clone();
    eyre::ensure!(clone.connection_pool().is_some(), "open store has no pool");
    checks::closes(&db.store).await?;
    eyre::ensure!(
        clone.connection_pool().is_none(),
        "closed store still holds its pool"
    );
    Ok(())
}
