//! Scheduled import passes.

mod common;

use anisync::clients::FetchOutcome;
use anisync::config::SchedulerConfig;
use anisync::domain::{ContentKind, ExternalId};
use anisync::scheduler::{ScheduledImport, Scheduler};
use anisync::services::{ImportRunner, UpsertEngine};
use common::{ScriptedSource, media, memory_store, options, page};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn job() -> ScheduledImport {
    ScheduledImport {
        kinds: ContentKind::ALL.to_vec(),
        pages: 1,
        per_page: 50,
    }
}

fn config(enabled: bool) -> SchedulerConfig {
    SchedulerConfig {
        enabled,
        cron_expression: "0 0 3 * * *".to_string(),
        pages: 1,
    }
}

#[tokio::test]
async fn run_once_imports_every_kind_and_records_sync() {
    let dir = tempfile::tempdir().unwrap();
    let store = memory_store().await;
    let source = ScriptedSource::new()
        .with_page(1, FetchOutcome::Page(page(1, 1, vec![media(7, "Frieren")])))
        .with_page(1, FetchOutcome::Page(page(1, 1, vec![media(7, "Frieren")])));
    let runner = ImportRunner::new(source, UpsertEngine::new(store.clone()), options(dir.path()))
        .with_store(store.clone());

    let scheduler = Scheduler::new(
        Arc::new(runner),
        job(),
        config(true),
        CancellationToken::new(),
    );

    let summaries = scheduler.run_once().await;
    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.counters.imported == 1));

    for kind in ContentKind::ALL {
        assert_eq!(store.count_titles(kind).await.unwrap(), 1);
        assert!(
            store
                .get_title_by_external_id(ExternalId::new(7), kind)
                .await
                .unwrap()
                .is_some()
        );
        let state = store.get_sync_state(kind).await.unwrap().unwrap();
        assert_eq!(state.last_run_imported, 1);
    }
}

#[tokio::test]
async fn run_once_after_stop_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ImportRunner::new(
        ScriptedSource::new(),
        UpsertEngine::new(memory_store().await),
        options(dir.path()),
    );
    let scheduler = Scheduler::new(
        Arc::new(runner),
        job(),
        config(true),
        CancellationToken::new(),
    );

    scheduler.stop().await;
    assert!(!scheduler.is_running().await);
    assert!(scheduler.run_once().await.is_empty());
}

#[tokio::test]
async fn disabled_scheduler_returns_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ImportRunner::new(
        ScriptedSource::new(),
        UpsertEngine::new(memory_store().await),
        options(dir.path()),
    );
    let scheduler = Scheduler::new(
        Arc::new(runner),
        job(),
        config(false),
        CancellationToken::new(),
    );

    scheduler.start().await.unwrap();
    assert!(!scheduler.is_running().await);
}

#[tokio::test]
async fn start_runs_until_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ImportRunner::new(
        ScriptedSource::new(),
        UpsertEngine::new(memory_store().await),
        options(dir.path()),
    );
    let scheduler = Arc::new(Scheduler::new(
        Arc::new(runner),
        job(),
        config(true),
        CancellationToken::new(),
    ));

    let handle = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.start().await }
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while !scheduler.is_running().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("scheduler never started");

    scheduler.stop().await;

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap()
        .unwrap();
    assert!(!scheduler.is_running().await);
}
