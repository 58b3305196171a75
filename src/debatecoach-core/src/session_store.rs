//! Per-user debate sessions.
//!
//! Each session id owns one slot holding at most one [`DebateSession`]. Every
//! operation locks that slot for its whole duration, including the completion
//! call, so concurrent calls on one session run one after another while
//! different sessions never contend. Slots exist only for sessions with a
//! debate: lookups never create one and a reset removes it.
//!
//! Lock order is slot, then map; the map lock is never held while waiting
//! for a slot.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::DebateError;
use crate::orchestrator::{DebateOrchestrator, DebateSession, DebateState, Turn};
use crate::participant::Side;

type Slot = Arc<Mutex<Option<DebateSession>>>;

/// Holds the active debate of every session.
pub struct SessionStore {
    orchestrator: DebateOrchestrator,
    slots: Mutex<HashMap<String, Slot>>,
}

impl SessionStore {
    pub fn new(orchestrator: DebateOrchestrator) -> Self {
        Self {
            orchestrator,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn orchestrator(&self) -> &DebateOrchestrator {
        &self.orchestrator
    }

    async fn lookup(&self, session_id: &str) -> Option<Slot> {
        self.slots.lock().await.get(session_id).cloned()
    }

    /// Whether `slot` is still the one registered for `session_id`.
    async fn is_registered(&self, session_id: &str, slot: &Slot) -> bool {
        self.slots
            .lock()
            .await
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Start a debate, replacing any debate the session already had.
    pub async fn start(
        &self,
        session_id: &str,
        topic: &str,
        user_side: Side,
    ) -> Result<DebateSession, DebateError> {
        let session = self.orchestrator.start(topic, user_side)?;

        loop {
            let slot = self
                .slots
                .lock()
                .await
                .entry(session_id.to_string())
                .or_default()
                .clone();
            let mut guard = slot.lock().await;

            // A reset may have unregistered the slot while we waited for it.
            if !self.is_registered(session_id, &slot).await {
                continue;
            }

            if let Some(previous) = guard.replace(session.clone()) {
                info!(session_id, previous = %previous.topic(), "debate superseded");
            }
            return Ok(session);
        }
    }

    /// Play the current round of the session's debate.
    pub async fn advance(
        &self,
        session_id: &str,
        user_text: Option<&str>,
    ) -> Result<Turn, DebateError> {
        let not_found = || DebateError::SessionNotFound(session_id.to_string());
        let slot = self.lookup(session_id).await.ok_or_else(not_found)?;
        let mut guard = slot.lock().await;
        let session = guard.as_mut().ok_or_else(not_found)?;

        self.orchestrator.advance_turn(session, user_text).await
    }

    /// Produce (or return the already produced) verdict.
    pub async fn evaluate(&self, session_id: &str) -> Result<Turn, DebateError> {
        let not_found = || DebateError::SessionNotFound(session_id.to_string());
        let slot = self.lookup(session_id).await.ok_or_else(not_found)?;
        let mut guard = slot.lock().await;
        let session = guard.as_mut().ok_or_else(not_found)?;

        self.orchestrator.evaluate(session).await
    }

    /// Discard the session's debate. Returns whether there was one.
    pub async fn reset(&self, session_id: &str) -> bool {
        let Some(slot) = self.lookup(session_id).await else {
            return false;
        };
        let mut guard = slot.lock().await;
        let discarded = guard.take().is_some();

        let mut slots = self.slots.lock().await;
        if slots
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, &slot))
        {
            slots.remove(session_id);
        }
        drop(slots);
        drop(guard);

        if discarded {
            info!(session_id, "debate reset");
        }
        discarded
    }

    pub async fn state(&self, session_id: &str) -> DebateState {
        self.snapshot(session_id)
            .await
            .map(|session| session.state())
            .unwrap_or(DebateState::NotStarted)
    }

    /// A copy of the session's debate as it stands.
    pub async fn snapshot(&self, session_id: &str) -> Option<DebateSession> {
        let slot = self.lookup(session_id).await?;
        let guard = slot.lock().await;
        guard.clone()
    }
}
