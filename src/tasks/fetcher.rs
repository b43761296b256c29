//! Client-side pagination over an [`AssetSource`].
//!
//! Rules:
//! - At most one page request is outstanding per session. The latch is taken
//!   synchronously when `fetch_initial` / `fetch_more` accepts a request and
//!   released by the completion path, or by the latch token's `Drop` if the
//!   task is torn down. A panicking source call is reconciled as a failure.
//! - `offset` advances by the number of items actually returned. Items at
//!   library positions an earlier page already covered are not appended again.
//! - An empty page ends pagination for the session.
//! - A failed first fetch surfaces the permission UI; a failed load-more is
//!   logged and leaves `has_more` untouched.
//! - Closing the session only flips the liveness flag. Outstanding source
//!   calls run to completion and their results are dropped.

use std::future::IntoFuture;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::events::{AssetSlice, FetchOutcome, PageRequest, Photo, SkipReason};
use crate::permission::PermissionGate;
use crate::source::AssetSource;
use crate::window::PhotoWindow;

/// Render-facing view of the gallery session.
#[derive(Debug, Clone, Default)]
pub struct GallerySnapshot {
    pub photos: Vec<Photo>,
    /// The initial page is outstanding.
    pub loading: bool,
    /// A load-more page is outstanding.
    pub loading_more: bool,
    pub has_more: bool,
    pub offset: usize,
    pub total_count: usize,
    pub needs_permission: bool,
    pub permission_denied: bool,
}

impl GallerySnapshot {
    /// Show the "end of photos" footer.
    #[must_use]
    pub fn end_of_photos(&self) -> bool {
        !self.has_more && !self.photos.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Initial,
    More,
}

#[derive(Debug, Clone, Copy)]
struct Latch {
    ticket: u64,
    phase: Phase,
}

#[derive(Debug)]
struct FetchState {
    window: PhotoWindow,
    offset: usize,
    has_more: bool,
    total_count: usize,
    /// Successful fetches since the last reset.
    completed: usize,
    /// One past the highest library position already appended.
    next_index: usize,
    needs_permission: bool,
    permission_denied: bool,
    in_flight: Option<Latch>,
    next_ticket: u64,
}

impl FetchState {
    fn new(max_window: usize) -> Self {
        Self {
            window: PhotoWindow::with_capacity(max_window),
            offset: 0,
            has_more: true,
            total_count: 0,
            completed: 0,
            next_index: 0,
            needs_permission: false,
            permission_denied: false,
            in_flight: None,
            next_ticket: 0,
        }
    }

    fn reset(&mut self) {
        self.window.reset();
        self.offset = 0;
        self.has_more = true;
        self.total_count = 0;
        self.completed = 0;
        self.next_index = 0;
        self.needs_permission = false;
        self.permission_denied = false;
    }

    fn acquire(&mut self, phase: Phase) -> u64 {
        self.next_ticket += 1;
        self.in_flight = Some(Latch {
            ticket: self.next_ticket,
            phase,
        });
        self.next_ticket
    }

    fn release(&mut self, ticket: u64) {
        if self.in_flight.is_some_and(|latch| latch.ticket == ticket) {
            self.in_flight = None;
        }
    }

    fn permission_required(&mut self, denied: bool) -> FetchOutcome {
        self.needs_permission = true;
        self.permission_denied = denied;
        FetchOutcome::NeedsPermission { denied }
    }
}

struct Session {
    gate: PermissionGate,
    source: Arc<dyn AssetSource>,
    state: Mutex<FetchState>,
    alive: CancellationToken,
}

impl Session {
    fn lock(&self) -> MutexGuard<'_, FetchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reconcile(
        &self,
        ticket: u64,
        request: PageRequest,
        first: bool,
        result: Result<AssetSlice, Error>,
    ) -> FetchOutcome {
        let mut state = self.lock();
        state.release(ticket);

        if self.alive.is_cancelled() {
            debug!(offset = request.offset, "session closed; discarding page");
            return FetchOutcome::Discarded;
        }

        match result {
            Ok(AssetSlice {
                mut items,
                total_count,
            }) => {
                if items.len() > request.count {
                    warn!(
                        requested = request.count,
                        returned = items.len(),
                        "source over-delivered; truncating page"
                    );
                    items.truncate(request.count);
                }
                let received = items.len();
                let next_index = state.next_index;
                items.retain(|photo| photo.sequence_index >= next_index);
                if let Some(last) = items.last() {
                    state.next_index = last.sequence_index + 1;
                }
                let appended = items.len();
                if appended < received {
                    debug!(
                        skipped = received - appended,
                        "positions already covered by an earlier page"
                    );
                }
                state.window.append(items);
                state.offset += received;
                state.total_count = total_count;
                state.has_more = received > 0 && state.offset < total_count;
                state.completed += 1;
                state.needs_permission = false;
                state.permission_denied = false;
                info!(
                    received,
                    appended,
                    offset = state.offset,
                    total = total_count,
                    has_more = state.has_more,
                    window = state.window.len(),
                    trimmed = state.window.trimmed(),
                    "page loaded"
                );
                FetchOutcome::Loaded {
                    received,
                    appended,
                    offset: state.offset,
                    has_more: state.has_more,
                    total_count,
                }
            }
            Err(err) if first => {
                warn!("error loading photos: {err}");
                state.has_more = false;
                state.permission_required(false)
            }
            Err(err) => {
                warn!(offset = request.offset, "error loading more photos: {err}");
                FetchOutcome::Failed
            }
        }
    }
}

/// Releases the in-flight latch if the fetch task ends without reconciling.
struct LatchToken {
    session: Arc<Session>,
    ticket: u64,
}

impl Drop for LatchToken {
    fn drop(&mut self) {
        self.session.lock().release(self.ticket);
    }
}

/// A fetch trigger: either already resolved, or running on the runtime.
///
/// Await it to obtain the [`FetchOutcome`]. Dropping a started fetch does not
/// stop it.
#[derive(Debug)]
pub enum Fetch {
    Started(JoinHandle<FetchOutcome>),
    Done(FetchOutcome),
}

impl Fetch {
    #[must_use]
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

impl IntoFuture for Fetch {
    type Output = FetchOutcome;
    type IntoFuture = BoxFuture<'static, FetchOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Started(handle) => async move {
                handle.await.unwrap_or_else(|err| {
                    warn!("fetch task failed: {err}");
                    FetchOutcome::Failed
                })
            }
            .boxed(),
            Self::Done(outcome) => futures::future::ready(outcome).boxed(),
        }
    }
}

/// Pagination controller for one gallery session. Cloning shares the session.
///
/// `fetch_initial` and `fetch_more` spawn onto the current Tokio runtime.
#[derive(Clone)]
pub struct PageFetcher {
    session: Arc<Session>,
}

impl PageFetcher {
    pub fn new(gate: PermissionGate, source: Arc<dyn AssetSource>, max_window: usize) -> Self {
        Self {
            session: Arc::new(Session {
                gate,
                source,
                state: Mutex::new(FetchState::new(max_window)),
                alive: CancellationToken::new(),
            }),
        }
    }

    /// Reset the window and offset, then request the first page.
    pub fn fetch_initial(&self, page_size: usize) -> Fetch {
        let mut state = self.session.lock();
        if let Some(skip) = self.precheck(&state, page_size) {
            return Fetch::Done(FetchOutcome::Skipped(skip));
        }
        state.reset();
        let status = self.session.gate.check_status();
        if !status.is_granted() {
            debug!(?status, "initial fetch short-circuited by permission gate");
            state.has_more = false;
            return Fetch::Done(state.permission_required(status.is_blocked()));
        }
        self.start(
            state,
            Phase::Initial,
            PageRequest {
                offset: 0,
                count: page_size,
            },
        )
    }

    /// Request the next page if none is outstanding, more items exist and
    /// access is granted.
    pub fn fetch_more(&self, page_size: usize) -> Fetch {
        let mut state = self.session.lock();
        if let Some(skip) = self.precheck(&state, page_size) {
            return Fetch::Done(FetchOutcome::Skipped(skip));
        }
        let status = self.session.gate.check_status();
        if !status.is_granted() {
            debug!(?status, "load-more short-circuited by permission gate");
            return Fetch::Done(state.permission_required(status.is_blocked()));
        }
        if !state.has_more {
            return Fetch::Done(FetchOutcome::Skipped(SkipReason::Exhausted));
        }
        let offset = state.offset;
        self.start(
            state,
            Phase::More,
            PageRequest {
                offset,
                count: page_size,
            },
        )
    }

    fn precheck(&self, state: &FetchState, page_size: usize) -> Option<SkipReason> {
        if self.session.alive.is_cancelled() {
            Some(SkipReason::Closed)
        } else if state.in_flight.is_some() {
            Some(SkipReason::InFlight)
        } else if page_size == 0 {
            Some(SkipReason::ZeroCount)
        } else {
            None
        }
    }

    fn start(
        &self,
        mut state: MutexGuard<'_, FetchState>,
        phase: Phase,
        request: PageRequest,
    ) -> Fetch {
        let ticket = state.acquire(phase);
        let first = state.completed == 0;
        drop(state);

        debug!(
            offset = request.offset,
            count = request.count,
            ?phase,
            "fetch accepted"
        );
        let token = LatchToken {
            session: Arc::clone(&self.session),
            ticket,
        };
        let call = AssertUnwindSafe(self.session.source.load_slice(request)).catch_unwind();
        Fetch::Started(tokio::spawn(async move {
            let result = call.await.unwrap_or_else(|_| {
                Err(Error::Transport(format!(
                    "source call panicked at offset {}",
                    request.offset
                )))
            });
            let outcome = token.session.reconcile(ticket, request, first, result);
            drop(token);
            outcome
        }))
    }

    /// Mark the session dead; later completions are discarded.
    pub fn close(&self) {
        self.session.alive.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.session.alive.is_cancelled()
    }

    /// Resolves once the session is closed.
    pub async fn closed(&self) {
        self.session.alive.cancelled().await;
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.session.lock().in_flight.is_some()
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.session.lock().offset
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.session.lock().has_more
    }

    #[must_use]
    pub fn snapshot(&self) -> GallerySnapshot {
        let state = self.session.lock();
        let phase = state.in_flight.map(|latch| latch.phase);
        GallerySnapshot {
            photos: state.window.as_slice().to_vec(),
            loading: phase == Some(Phase::Initial),
            loading_more: phase == Some(Phase::More),
            has_more: state.has_more,
            offset: state.offset,
            total_count: state.total_count,
            needs_permission: state.needs_permission,
            permission_denied: state.permission_denied,
        }
    }
}
