mod common;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use common::{FakeLibrary, authorized, gate, indices, source};
use rust_photo_gallery::config::LoadMoreOptions;
use rust_photo_gallery::events::{FetchOutcome, PermissionState, ScrollMetrics, ViewportSignal};
use rust_photo_gallery::tasks::fetcher::PageFetcher;
use rust_photo_gallery::tasks::load_more::{self, LoadMoreController};

const VISIBLE: ViewportSignal = ViewportSignal::Sentinel {
    intersection_ratio: 1.0,
};

fn loaded(received: usize, offset: usize, has_more: bool) -> FetchOutcome {
    FetchOutcome::Loaded {
        received,
        appended: received,
        offset,
        has_more,
        total_count: 100,
    }
}

async fn drain(mut rx: mpsc::Receiver<FetchOutcome>) -> Vec<FetchOutcome> {
    let mut out = Vec::new();
    while let Some(outcome) = rx.recv().await {
        out.push(outcome);
    }
    out
}

#[tokio::test]
async fn burst_of_signals_starts_a_single_fetch() {
    let library = Arc::new(FakeLibrary::with_assets(100));
    let fetcher = PageFetcher::new(authorized(), Arc::new(source(library.clone())), 300);
    fetcher.fetch_initial(30).await;

    let (signal_tx, signal_rx) = mpsc::channel(16);
    let (outcome_tx, outcome_rx) = mpsc::channel(16);
    for _ in 0..10 {
        signal_tx.send(VISIBLE).await.unwrap();
    }
    drop(signal_tx);

    let controller = LoadMoreController::new(fetcher.clone(), 30, LoadMoreOptions::default());
    load_more::run(controller, signal_rx, outcome_tx, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(drain(outcome_rx).await, vec![loaded(30, 60, true)]);
    assert_eq!(library.enumerations(), 2);
    assert_eq!(indices(&fetcher.snapshot().photos), (0..60).collect::<Vec<_>>());
}

#[tokio::test]
async fn one_signal_never_pages_past_one_page() {
    let library = Arc::new(FakeLibrary::with_assets(300));
    let fetcher = PageFetcher::new(authorized(), Arc::new(source(library.clone())), 300);
    fetcher.fetch_initial(30).await;

    let (signal_tx, signal_rx) = mpsc::channel(4);
    let (outcome_tx, outcome_rx) = mpsc::channel(4);
    signal_tx
        .send(ViewportSignal::Scroll(ScrollMetrics {
            scroll_top: 900.0,
            scroll_height: 1500.0,
            client_height: 500.0,
        }))
        .await
        .unwrap();
    drop(signal_tx);

    let controller = LoadMoreController::new(fetcher.clone(), 30, LoadMoreOptions::default());
    load_more::run(controller, signal_rx, outcome_tx, CancellationToken::new())
        .await
        .unwrap();

    let outcomes = drain(outcome_rx).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(library.enumerations(), 2);
    assert_eq!(fetcher.offset(), 60);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn each_fresh_signal_loads_the_next_page() {
    let library = Arc::new(FakeLibrary::with_assets(100));
    let fetcher = PageFetcher::new(authorized(), Arc::new(source(library.clone())), 300);
    fetcher.fetch_initial(30).await;

    let (signal_tx, signal_rx) = mpsc::channel(4);
    let (outcome_tx, mut outcome_rx) = mpsc::channel(4);
    let controller = LoadMoreController::new(fetcher.clone(), 30, LoadMoreOptions::default());
    let driver = tokio::spawn(load_more::run(
        controller,
        signal_rx,
        outcome_tx,
        CancellationToken::new(),
    ));

    for expected in [loaded(30, 60, true), loaded(30, 90, true), loaded(10, 100, false)] {
        signal_tx.send(VISIBLE).await.unwrap();
        assert_eq!(outcome_rx.recv().await, Some(expected));
    }
    drop(signal_tx);
    driver.await.unwrap().unwrap();

    assert!(outcome_rx.recv().await.is_none());
    assert_eq!(library.enumerations(), 4);
    assert_eq!(indices(&fetcher.snapshot().photos), (0..100).collect::<Vec<_>>());
}

#[tokio::test]
async fn signals_far_from_the_bottom_do_nothing() {
    let library = Arc::new(FakeLibrary::with_assets(100));
    let fetcher = PageFetcher::new(authorized(), Arc::new(source(library.clone())), 300);
    fetcher.fetch_initial(30).await;

    let (signal_tx, signal_rx) = mpsc::channel(16);
    let (outcome_tx, outcome_rx) = mpsc::channel(16);
    for scroll_top in [0.0, 500.0, 1000.0] {
        signal_tx
            .send(ViewportSignal::Scroll(ScrollMetrics {
                scroll_top,
                scroll_height: 5000.0,
                client_height: 800.0,
            }))
            .await
            .unwrap();
    }
    drop(signal_tx);

    let controller = LoadMoreController::new(fetcher.clone(), 30, LoadMoreOptions::default());
    load_more::run(controller, signal_rx, outcome_tx, CancellationToken::new())
        .await
        .unwrap();

    assert!(drain(outcome_rx).await.is_empty());
    assert_eq!(library.enumerations(), 1);
    assert_eq!(fetcher.offset(), 30);
}

#[tokio::test]
async fn missing_permission_is_forwarded() {
    let library = Arc::new(FakeLibrary::with_assets(100));
    let gate = gate(PermissionState::Denied, PermissionState::Denied);
    let fetcher = PageFetcher::new(gate, Arc::new(source(library.clone())), 300);

    let (signal_tx, signal_rx) = mpsc::channel(4);
    let (outcome_tx, outcome_rx) = mpsc::channel(4);
    signal_tx.send(VISIBLE).await.unwrap();
    drop(signal_tx);

    let controller = LoadMoreController::new(fetcher, 30, LoadMoreOptions::default());
    load_more::run(controller, signal_rx, outcome_tx, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        drain(outcome_rx).await,
        vec![FetchOutcome::NeedsPermission { denied: true }]
    );
    assert_eq!(library.enumerations(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn driver_stops_when_the_session_closes() {
    let library = Arc::new(FakeLibrary::with_assets(100));
    let fetcher = PageFetcher::new(authorized(), Arc::new(source(library)), 300);

    let (_signal_tx, signal_rx) = mpsc::channel(4);
    let (outcome_tx, _outcome_rx) = mpsc::channel(4);
    let controller = LoadMoreController::new(fetcher.clone(), 30, LoadMoreOptions::default());
    let driver = tokio::spawn(load_more::run(
        controller,
        signal_rx,
        outcome_tx,
        CancellationToken::new(),
    ));

    fetcher.close();
    driver.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn driver_stops_on_cancellation() {
    let library = Arc::new(FakeLibrary::with_assets(100));
    let fetcher = PageFetcher::new(authorized(), Arc::new(source(library)), 300);

    let (_signal_tx, signal_rx) = mpsc::channel(4);
    let (outcome_tx, _outcome_rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let controller = LoadMoreController::new(fetcher.clone(), 30, LoadMoreOptions::default());
    let driver = tokio::spawn(load_more::run(controller, signal_rx, outcome_tx, cancel.clone()));

    cancel.cancel();
    driver.await.unwrap().unwrap();
    assert!(!fetcher.is_closed());
}
