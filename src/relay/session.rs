//! Relay sessions
//!
//! A session is the lifetime of one viewer's streaming response. It is owned
//! by the task serving that viewer; the registry keeps a handle to it only so
//! it can be listed and stopped from the control endpoints.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::LifecycleScope;
use crate::error::RelayError;
use crate::protocol::SessionInfo;
use crate::relay::lifecycle::StreamLifecycle;
use crate::relay::pump::SessionEnd;

/// Per-session state machine.
///
/// `Idle -> Streaming -> StoppedBy*`; every stopped state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Streaming,
    StoppedByClient,
    StoppedByControl,
    StoppedByUpstreamFatal,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::Streaming)
    }
}

impl From<SessionEnd> for SessionState {
    fn from(end: SessionEnd) -> Self {
        match end {
            SessionEnd::Client => SessionState::StoppedByClient,
            SessionEnd::Control => SessionState::StoppedByControl,
            SessionEnd::UpstreamFatal => SessionState::StoppedByUpstreamFatal,
        }
    }
}

/// The stop conditions a relay loop watches
#[derive(Clone, Debug)]
pub struct RelayControl {
    token: CancellationToken,
    lifecycle: Option<StreamLifecycle>,
}

impl RelayControl {
    /// `lifecycle` is observed only when given (shared scope)
    pub fn new(token: CancellationToken, lifecycle: Option<StreamLifecycle>) -> Self {
        Self { token, lifecycle }
    }

    pub fn should_run(&self) -> bool {
        !self.token.is_cancelled() && self.lifecycle.as_ref().map_or(true, |l| l.is_active())
    }

    /// Resolves when the relay must stop
    pub async fn stopped(&self) {
        match &self.lifecycle {
            Some(lifecycle) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = lifecycle.stopped() => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

struct SessionEntry {
    token: CancellationToken,
    state: Mutex<SessionState>,
    frames_sent: Arc<AtomicU64>,
}

/// All live sessions of this process
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, Arc<SessionEntry>>>,
    lifecycle: StreamLifecycle,
    scope: LifecycleScope,
}

impl SessionRegistry {
    pub fn new(lifecycle: StreamLifecycle, scope: LifecycleScope) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            lifecycle,
            scope,
        }
    }

    pub fn scope(&self) -> LifecycleScope {
        self.scope
    }

    /// Register a new session in the `Idle` state
    pub fn open(&self) -> RelaySession {
        let id = Uuid::new_v4();
        let entry = Arc::new(SessionEntry {
            token: CancellationToken::new(),
            state: Mutex::new(SessionState::Idle),
            frames_sent: Arc::new(AtomicU64::new(0)),
        });
        self.sessions.insert(id, entry.clone());
        tracing::debug!(session = %id, "Session opened");

        let lifecycle = match self.scope {
            LifecycleScope::Shared => Some(self.lifecycle.clone()),
            LifecycleScope::Session => None,
        };

        RelaySession {
            id,
            control: RelayControl::new(entry.token.clone(), lifecycle),
            entry,
            sessions: self.sessions.clone(),
        }
    }

    /// Cancel a single session
    pub fn stop(&self, id: Uuid) -> Result<(), RelayError> {
        let entry = self
            .sessions
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(RelayError::SessionNotFound(id))?;
        entry.token.cancel();
        Ok(())
    }

    /// Cancel every session
    pub fn stop_all(&self) -> usize {
        let mut count = 0;
        for entry in self.sessions.iter() {
            entry.value().token.cancel();
            count += 1;
        }
        count
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn snapshot(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|e| SessionInfo {
                id: *e.key(),
                state: *e.value().state.lock(),
                frames_sent: e.value().frames_sent.load(Ordering::Relaxed),
            })
            .collect()
    }
}

/// Handle to one live session. Dropping it unregisters the session.
pub struct RelaySession {
    id: Uuid,
    control: RelayControl,
    entry: Arc<SessionEntry>,
    sessions: Arc<DashMap<Uuid, Arc<SessionEntry>>>,
}

impl RelaySession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn control(&self) -> RelayControl {
        self.control.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.entry.state.lock()
    }

    /// Counter the writer bumps for every part it emits
    pub fn frame_counter(&self) -> Arc<AtomicU64> {
        self.entry.frames_sent.clone()
    }

    pub fn frames_sent(&self) -> u64 {
        self.entry.frames_sent.load(Ordering::Relaxed)
    }

    /// Move `Idle -> Streaming`
    pub fn begin(&self) {
        let mut state = self.entry.state.lock();
        if *state == SessionState::Idle {
            *state = SessionState::Streaming;
            tracing::info!(session = %self.id, "Viewer streaming");
        }
    }

    /// Record the terminal state. Later calls are ignored.
    pub fn finish(&self, end: SessionEnd) -> SessionState {
        let mut state = self.entry.state.lock();
        if !state.is_terminal() {
            *state = end.into();
            tracing::info!(
                session = %self.id,
                state = ?*state,
                frames = self.frames_sent(),
                "Viewer session ended"
            );
        }
        *state
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
    }
}
