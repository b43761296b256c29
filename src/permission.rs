//! Authorization lifecycle for library access.
//!
//! The host platform owns the real authorization store; [`PermissionGate`]
//! keeps the session's cached copy and makes sure at most one consent prompt
//! is ever on screen.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::{debug, info};

use crate::config::PermissionOptions;
use crate::events::PermissionState;

/// Host-side authorization store.
pub trait AuthorizationStore: Send + Sync + 'static {
    /// Current status. Must never show UI.
    fn status(&self) -> PermissionState;

    /// Show the user-facing consent prompt and resolve with the answer.
    fn prompt(&self) -> BoxFuture<'static, PermissionState>;
}

type SharedPrompt = Shared<BoxFuture<'static, PermissionState>>;

#[derive(Default)]
struct GateState {
    resolved: Option<PermissionState>,
    pending: Option<SharedPrompt>,
}

#[derive(Clone)]
pub struct PermissionGate {
    store: Arc<dyn AuthorizationStore>,
    state: Arc<Mutex<GateState>>,
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("status", &self.check_status())
            .finish()
    }
}

impl PermissionGate {
    pub fn new(store: Arc<dyn AuthorizationStore>) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(GateState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current authorization; never prompts and never mutates the cache.
    #[must_use]
    pub fn check_status(&self) -> PermissionState {
        if let Some(resolved) = self.lock().resolved {
            return resolved;
        }
        self.store.status()
    }

    /// Resolve the authorization, prompting at most once per session.
    ///
    /// Concurrent callers while a prompt is showing await the same answer.
    /// A terminal state returns immediately.
    pub async fn request_access(&self) -> PermissionState {
        let prompt = {
            let mut state = self.lock();
            if let Some(resolved) = state.resolved {
                return resolved;
            }
            let current = self.store.status();
            if current.is_terminal() {
                state.resolved = Some(current);
                return current;
            }
            match &state.pending {
                Some(pending) => {
                    debug!("joining pending consent prompt");
                    pending.clone()
                }
                None => {
                    info!("requesting photo library access");
                    let pending = self.store.prompt().shared();
                    state.pending = Some(pending.clone());
                    pending
                }
            }
        };

        let answer = prompt.clone().await;

        let mut state = self.lock();
        if state
            .pending
            .as_ref()
            .is_some_and(|pending| pending.ptr_eq(&prompt))
        {
            state.pending = None;
            if answer.is_terminal() {
                info!(status = ?answer, "photo library access resolved");
                state.resolved = Some(answer);
            }
        }
        state.resolved.unwrap_or(answer)
    }
}

/// Store with fixed answers, for hosts without a consent dialog.
#[derive(Debug)]
pub struct StaticAuthorizationStore {
    current: Arc<Mutex<PermissionState>>,
    response: PermissionState,
    prompts: AtomicUsize,
}

impl StaticAuthorizationStore {
    pub fn new(initial: PermissionState, response: PermissionState) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
            response,
            prompts: AtomicUsize::new(0),
        }
    }

    /// How many times the prompt was shown.
    #[must_use]
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl From<PermissionOptions> for StaticAuthorizationStore {
    fn from(options: PermissionOptions) -> Self {
        Self::new(options.initial.into(), options.prompt_response.into())
    }
}

impl AuthorizationStore for StaticAuthorizationStore {
    fn status(&self) -> PermissionState {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prompt(&self) -> BoxFuture<'static, PermissionState> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let response = self.response;
        let current = Arc::clone(&self.current);
        async move {
            let mut current = current.lock().unwrap_or_else(PoisonError::into_inner);
            if !current.is_terminal() {
                *current = response;
            }
            *current
        }
        .boxed()
    }
}
