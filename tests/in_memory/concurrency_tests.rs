//! Racing writers against one in-memory store.

use super::helpers::store;
use crate::conformance::make_task;
use chrono::Utc;
use rstest::rstest;
use std::collections::HashSet;
use taskdb::task::{
    adapters::memory::InMemoryTaskStore,
    codec::{JsonTaskCodec, TaskCodec, TaskDecoder},
    domain::{Task, TaskStatus},
    ports::{TaskStore, TaskStoreError},
};
use tokio::task::JoinSet;

const WRITERS: usize = 8;

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exactly_one_stale_writer_wins(store: InMemoryTaskStore) {
    let mut task = make_task(Some(Utc::now()), &["a"]);
    store.put_task(&mut task).await.expect("insert succeeds");

    let mut writers = JoinSet::new();
    for index in 0..WRITERS {
        let handle = store.clone();
        let mut copy = task.clone();
        copy.commits.push(format!("writer-{index}"));
        writers.spawn(async move { handle.put_task(&mut copy).await.map(|()| copy) });
    }

    let mut winners = Vec::new();
    let mut conflicts = 0;
    while let Some(joined) = writers.join_next().await {
        match joined.expect("writer finished") {
            Ok(written) => winners.push(written),
            Err(TaskStoreError::ConcurrentUpdate(_)) => conflicts += 1,
            Err(other) => panic!("unexpected store error: {other}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, WRITERS - 1);
    let id = task.id.clone().expect("stored task has an id");
    let stored = store.get_task_by_id(&id).await.expect("read succeeds");
    assert_eq!(stored.as_ref(), winners.first());
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_all_reach_the_feed(store: InMemoryTaskStore) {
    let cursor = store
        .start_tracking_modified_tasks()
        .await
        .expect("free cursor slot");

    let mut writers = JoinSet::new();
    for index in 0..WRITERS {
        let handle = store.clone();
        writers.spawn(async move {
            let mut batch: Vec<Task> = (0..10)
                .map(|offset| make_task(Some(Utc::now()), &[format!("w{index}-{offset}").as_str()]))
                .collect();
            handle.put_tasks(&mut batch).await.map(|()| batch)
        });
    }
    let mut written = HashSet::new();
    while let Some(joined) = writers.join_next().await {
        let batch = joined.expect("writer finished").expect("insert succeeds");
        written.extend(batch.into_iter().filter_map(|task| task.id));
    }

    let seen: Vec<Task> = store.get_modified_tasks(&cursor).await.expect("known cursor");
    let seen_ids: HashSet<_> = seen.iter().filter_map(|task| task.id.clone()).collect();
    assert_eq!(seen.len(), WRITERS * 10);
    assert_eq!(seen_ids, written);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn decoded_snapshot_can_be_written_back(store: InMemoryTaskStore) {
    let start = Utc::now();
    let mut batch: Vec<Task> = (0..20)
        .map(|offset| make_task(Some(Utc::now()), &[format!("c{offset}").as_str()]))
        .collect();
    store.put_tasks(&mut batch).await.expect("insert succeeds");

    let snapshot = store
        .get_tasks_from_date_range(start, Utc::now() + chrono::TimeDelta::seconds(1))
        .await
        .expect("range read succeeds");
    let mut decoder = TaskDecoder::new();
    for task in &snapshot {
        assert!(decoder.process(JsonTaskCodec.encode(task).expect("encodable")));
    }
    let mut decoded = decoder.result().expect("decodable");
    for task in &mut decoded {
        task.status = TaskStatus::Running;
    }

    store
        .put_tasks(&mut decoded)
        .await
        .expect("decoded tasks carry current stamps");
    assert_eq!(decoded.len(), batch.len());
}
