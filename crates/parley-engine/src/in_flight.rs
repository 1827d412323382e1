//! Per-conversation turn lock.
//!
//! At most one turn per conversation id runs at a time. A second turn for an
//! id already in flight is rejected, not queued.

use parley_shared::error::{ParleyError, ParleyResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct InFlightTurns {
    active: Arc<Mutex<HashSet<String>>>,
}

impl InFlightTurns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `conversation_id` until the returned guard is dropped
    pub fn acquire(&self, conversation_id: &str) -> ParleyResult<TurnGuard> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(conversation_id.to_string()) {
            warn!("Rejected concurrent turn for conversation {}", conversation_id);
            return Err(ParleyError::TurnInFlight(conversation_id.to_string()));
        }
        Ok(TurnGuard {
            active: Arc::clone(&self.active),
            conversation_id: conversation_id.to_string(),
        })
    }

    pub fn is_active(&self, conversation_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(conversation_id)
    }

    pub fn len(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases the conversation id on drop, including on cancellation
#[derive(Debug)]
pub struct TurnGuard {
    active: Arc<Mutex<HashSet<String>>>,
    conversation_id: String,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.conversation_id);
    }
}
