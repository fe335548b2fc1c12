//! Observable state of one itinerary generation.
//!
//! A session moves through
//! `Idle → FetchingContext → Requesting → Streaming → {Completed | Failed}`
//! exactly once. Observers either poll/await snapshots through a `watch`
//! channel or subscribe to the ordered `SessionUpdate` feed.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::PlannerError;

const DEFAULT_UPDATE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    FetchingContext,
    Requesting,
    Streaming,
    Completed,
    Failed,
}

impl Phase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::FetchingContext | Self::Requesting | Self::Streaming
        )
    }

    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Idle, Self::FetchingContext)
            | (Self::FetchingContext, Self::Requesting)
            | (Self::Requesting, Self::Streaming)
            | (Self::Streaming, Self::Completed) => true,
            (current, Self::Failed) => !current.is_terminal(),
            _ => false,
        }
    }

    /// Short progress line a UI can show while waiting for text.
    #[must_use]
    pub const fn progress_text(self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::FetchingContext => "Checking weather and prices...",
            Self::Requesting => "Asking the planner...",
            Self::Streaming => "Writing your itinerary...",
            Self::Completed => "Done",
            Self::Failed => "Generation failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FetchingContext => "fetching_context",
            Self::Requesting => "requesting",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub accumulated_text: String,
    pub error_detail: Option<String>,
}

impl SessionSnapshot {
    const fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            accumulated_text: String::new(),
            error_detail: None,
        }
    }
}

/// One change to a session, in the order it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Entered a non-failed phase.
    Phase(Phase),
    /// A fragment was appended to the accumulated text.
    Fragment(String),
    /// Entered `Failed` with the given detail.
    Failed(String),
}

struct Inner {
    state: watch::Sender<SessionSnapshot>,
    updates: broadcast::Sender<SessionUpdate>,
    cancel: CancellationToken,
}

/// Cheaply cloneable handle; all clones observe and control the same session.
#[derive(Clone)]
pub struct GenerationSession {
    inner: Arc<Inner>,
}

impl Default for GenerationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GenerationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("GenerationSession")
            .field("phase", &state.phase)
            .field("text_len", &state.accumulated_text.len())
            .field("error_detail", &state.error_detail)
            .field("cancelled", &self.inner.cancel.is_cancelled())
            .finish()
    }
}

impl GenerationSession {
    #[must_use]
    pub fn new() -> Self {
        Self::with_update_capacity(DEFAULT_UPDATE_CAPACITY)
    }

    /// Subscribers that fall more than `capacity` updates behind receive
    /// `RecvError::Lagged` and should resynchronise from `snapshot()`.
    #[must_use]
    pub fn with_update_capacity(capacity: usize) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::idle());
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                state,
                updates,
                cancel: CancellationToken::new(),
            }),
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.state.borrow().phase
    }

    #[must_use]
    pub fn accumulated_text(&self) -> String {
        self.inner.state.borrow().accumulated_text.clone()
    }

    #[must_use]
    pub fn error_detail(&self) -> Option<String> {
        self.inner.state.borrow().error_detail.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Latest-value view of the session.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    /// Ordered feed of every update applied after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.inner.updates.subscribe()
    }

    /// Requests cancellation. The running generation closes its connection
    /// and the session ends in `Failed`.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Resolves with the final snapshot once the session is terminal.
    pub async fn wait_for_terminal(&self) -> SessionSnapshot {
        let mut rx = self.watch();
        let result = rx.wait_for(|s| s.phase.is_terminal()).await;
        match result {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot(),
        }
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    fn publish(&self, update: SessionUpdate) {
        // No subscribers is fine.
        let _ = self.inner.updates.send(update);
    }

    /// Claims the session for a new generation (`Idle → FetchingContext`).
    pub(crate) fn try_begin(&self) -> Result<(), PlannerError> {
        let mut outcome = Ok(());
        self.inner.state.send_if_modified(|s| match s.phase {
            Phase::Idle => {
                s.phase = Phase::FetchingContext;
                true
            }
            phase if phase.is_terminal() => {
                outcome = Err(PlannerError::SessionFinished);
                false
            }
            _ => {
                outcome = Err(PlannerError::GenerationActive);
                false
            }
        });
        if outcome.is_ok() {
            info!(phase = %Phase::FetchingContext, "Generation started");
            self.publish(SessionUpdate::Phase(Phase::FetchingContext));
        }
        outcome
    }

    /// Moves to `next` if it is a legal forward step. `Failed` goes through `fail`.
    pub(crate) fn advance(&self, next: Phase) -> bool {
        if next == Phase::Failed {
            return false;
        }
        let moved = self.inner.state.send_if_modified(|s| {
            if s.phase.can_transition_to(next) {
                s.phase = next;
                true
            } else {
                false
            }
        });
        if moved {
            info!(phase = %next, "Generation phase changed");
            self.publish(SessionUpdate::Phase(next));
        }
        moved
    }

    /// Appends a fragment; ignored outside `Streaming`.
    pub(crate) fn append(&self, fragment: &str) -> bool {
        if fragment.is_empty() {
            return false;
        }
        let appended = self.inner.state.send_if_modified(|s| {
            if s.phase == Phase::Streaming {
                s.accumulated_text.push_str(fragment);
                true
            } else {
                false
            }
        });
        if appended {
            self.publish(SessionUpdate::Fragment(fragment.to_string()));
        }
        appended
    }

    pub(crate) fn fail(&self, error: &PlannerError) -> bool {
        let detail = error.to_string();
        let failed = self.inner.state.send_if_modified(|s| {
            if s.phase.is_terminal() {
                false
            } else {
                s.phase = Phase::Failed;
                s.error_detail = Some(detail.clone());
                true
            }
        });
        if failed {
            self.publish(SessionUpdate::Failed(detail));
        }
        failed
    }
}
