use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::LoadMoreOptions;
use crate::events::{FetchOutcome, ViewportSignal};
use crate::tasks::fetcher::{Fetch, PageFetcher};

/// Turns the continuous near-bottom signal into discrete `fetch_more` calls.
///
/// The near-bottom decision and the fetcher's latch happen in the same
/// synchronous call, so a burst of signals yields a single request. Every
/// fetch answers a fresh signal; the render layer re-emits one after it lays
/// out new rows.
pub struct LoadMoreController {
    fetcher: PageFetcher,
    page_size: usize,
    options: LoadMoreOptions,
}

impl LoadMoreController {
    pub fn new(fetcher: PageFetcher, page_size: usize, options: LoadMoreOptions) -> Self {
        Self {
            fetcher,
            page_size,
            options,
        }
    }

    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }

    #[must_use]
    pub fn is_near_bottom(&self, signal: &ViewportSignal) -> bool {
        match signal {
            ViewportSignal::Scroll(metrics) => {
                metrics.distance_to_bottom() < self.options.threshold_px
            }
            ViewportSignal::Sentinel { intersection_ratio } => {
                *intersection_ratio >= self.options.sentinel_ratio
            }
        }
    }

    /// Evaluate one signal. Returns the fetch if one was started or resolved
    /// to something the caller must act on; dropped triggers return `None`.
    pub fn on_signal(&self, signal: ViewportSignal) -> Option<Fetch> {
        if !self.is_near_bottom(&signal) {
            return None;
        }
        match self.fetcher.fetch_more(self.page_size) {
            Fetch::Done(FetchOutcome::Skipped(reason)) => {
                trace!(?reason, "load-more trigger dropped");
                None
            }
            fetch => Some(fetch),
        }
    }
}

/// Drives a [`LoadMoreController`] from a stream of viewport signals and
/// forwards every outcome.
pub async fn run(
    controller: LoadMoreController,
    mut signals: Receiver<ViewportSignal>,
    outcomes: Sender<FetchOutcome>,
    cancel: CancellationToken,
) -> Result<()> {
    let fetcher = controller.fetcher().clone();
    let mut pending: JoinSet<FetchOutcome> = JoinSet::new();
    let mut signals_open = true;

    loop {
        select! {
            _ = cancel.cancelled() => break,

            _ = fetcher.closed() => {
                debug!("gallery session closed; stopping load-more driver");
                break;
            }

            maybe_signal = signals.recv(), if signals_open => {
                match maybe_signal {
                    Some(signal) => {
                        if let Some(fetch) = controller.on_signal(signal) {
                            pending.spawn(fetch.into_future());
                        }
                    }
                    None => {
                        signals_open = false;
                        if pending.is_empty() {
                            break;
                        }
                    }
                }
            }

            Some(joined) = pending.join_next() => {
                let outcome = joined.unwrap_or_else(|err| {
                    warn!("load-more task failed: {err}");
                    FetchOutcome::Failed
                });
                if outcomes.send(outcome).await.is_err() {
                    debug!("outcome receiver dropped");
                }
                if !signals_open && pending.is_empty() {
                    break;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{PermissionState, ScrollMetrics};
    use crate::permission::{PermissionGate, StaticAuthorizationStore};
    use crate::source::EmptyAssetSource;
    use std::sync::Arc;

    fn controller() -> LoadMoreController {
        let gate = PermissionGate::new(Arc::new(StaticAuthorizationStore::new(
            PermissionState::Authorized,
            PermissionState::Authorized,
        )));
        let fetcher = PageFetcher::new(gate, Arc::new(EmptyAssetSource), 100);
        LoadMoreController::new(fetcher, 30, LoadMoreOptions::default())
    }

    #[test]
    fn scroll_threshold_is_exclusive() {
        let c = controller();
        let at = |scroll_top| {
            ViewportSignal::Scroll(ScrollMetrics {
                scroll_top,
                scroll_height: 1000.0,
                client_height: 600.0,
            })
        };
        assert!(!c.is_near_bottom(&at(100.0)));
        assert!(!c.is_near_bottom(&at(200.0)));
        assert!(c.is_near_bottom(&at(201.0)));
        assert!(c.is_near_bottom(&at(400.0)));
    }

    #[test]
    fn sentinel_uses_intersection_ratio() {
        let c = controller();
        assert!(!c.is_near_bottom(&ViewportSignal::Sentinel {
            intersection_ratio: 0.05
        }));
        assert!(c.is_near_bottom(&ViewportSignal::Sentinel {
            intersection_ratio: 0.1
        }));
    }

    #[tokio::test]
    async fn far_from_bottom_never_fetches() {
        let c = controller();
        let fetch = c.on_signal(ViewportSignal::Sentinel {
            intersection_ratio: 0.0,
        });
        assert!(fetch.is_none());
        assert!(!c.fetcher().is_in_flight());
    }
}
