//! Conversation context and the context merger.
//!
//! The merger never mutates the previous context: each turn yields a new
//! value and the old `currentUnderstanding` becomes `previousUnderstanding`.
//! Merge policy is turn-local replacement; the extractor carries unresolved
//! fields forward itself.

use crate::ambiguity::AmbiguityType;
use crate::error::{ParleyError, ParleyResult};
use crate::state_machine::ConversationState;
use crate::understanding::Understanding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One question/answer pair, append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationExchange {
    pub question: String,
    pub answer: String,
    /// Ambiguity the question was about, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asked_about: Option<AmbiguityType>,
    /// Set when the answer made that ambiguity disappear
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_ambiguity_type: Option<AmbiguityType>,
    pub answered_at: DateTime<Utc>,
}

impl ClarificationExchange {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            asked_about: None,
            resolved_ambiguity_type: None,
            answered_at: Utc::now(),
        }
    }

    pub fn about(mut self, kind: Option<AmbiguityType>) -> Self {
        self.asked_about = kind;
        self
    }
}

/// Per-turn audit row read by the health monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    pub turn_number: u32,
    /// State after this turn's transition
    pub state: ConversationState,
    pub confidence: f64,
    pub ambiguity_types: Vec<AmbiguityType>,
    /// Subjects of the questions asked this turn
    #[serde(default)]
    pub asked_about: Vec<AmbiguityType>,
    /// Full question texts, used to map answers back to ambiguities
    #[serde(default)]
    pub questions: Vec<String>,
}

impl TurnRecord {
    pub fn ambiguity_count(&self) -> usize {
        self.ambiguity_types.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub conversation_id: String,
    pub turn_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_understanding: Option<Understanding>,
    pub current_understanding: Understanding,
    #[serde(default)]
    pub clarification_history: Vec<ClarificationExchange>,
    #[serde(default)]
    pub user_preferences: BTreeMap<String, String>,
    #[serde(default)]
    pub state: ConversationState,
    #[serde(default)]
    pub turn_log: Vec<TurnRecord>,
}

pub fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Context for the first turn of a conversation
pub fn start_context(
    conversation_id: Option<String>,
    candidate: Understanding,
) -> ConversationContext {
    let conversation_id = conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(new_conversation_id);
    ConversationContext {
        conversation_id,
        turn_number: 1,
        previous_understanding: None,
        current_understanding: candidate,
        clarification_history: Vec::new(),
        user_preferences: BTreeMap::new(),
        state: ConversationState::Discovery,
        turn_log: Vec::new(),
    }
}

/// Fold this turn's candidate understanding into a new context value.
pub fn merge_context(
    previous: Option<&ConversationContext>,
    candidate: Understanding,
    exchange: Option<ClarificationExchange>,
) -> ParleyResult<ConversationContext> {
    let Some(prev) = previous else {
        let mut ctx = start_context(None, candidate);
        ctx.clarification_history.extend(exchange);
        return Ok(ctx);
    };

    let turn_number = prev
        .turn_number
        .checked_add(1)
        .ok_or_else(|| ParleyError::invariant("turn number overflow"))?;

    let mut clarification_history = prev.clarification_history.clone();
    clarification_history.extend(exchange);

    Ok(ConversationContext {
        conversation_id: prev.conversation_id.clone(),
        turn_number,
        previous_understanding: Some(prev.current_understanding.clone()),
        current_understanding: candidate,
        clarification_history,
        user_preferences: prev.user_preferences.clone(),
        state: prev.state,
        turn_log: prev.turn_log.clone(),
    })
}

impl ConversationContext {
    /// Check a caller-supplied context before building on it
    pub fn validate(&self) -> ParleyResult<()> {
        if self.conversation_id.trim().is_empty() {
            return Err(ParleyError::invariant("conversationId is empty"));
        }
        if self.turn_number == 0 {
            return Err(ParleyError::invariant("turnNumber must be at least 1"));
        }
        if self.turn_log.len() != self.turn_number as usize {
            return Err(ParleyError::invariant(format!(
                "turnNumber {} does not match {} recorded turns",
                self.turn_number,
                self.turn_log.len()
            )));
        }
        for (i, record) in self.turn_log.iter().enumerate() {
            if record.turn_number as usize != i + 1 {
                return Err(ParleyError::invariant(format!(
                    "turn log out of sequence at position {} (turn {})",
                    i + 1,
                    record.turn_number
                )));
            }
        }
        if let Some(last) = self.turn_log.last() {
            if last.state != self.state {
                return Err(ParleyError::invariant(format!(
                    "state {} does not match last recorded state {}",
                    self.state, last.state
                )));
            }
        }
        // Re-validating catches hand-edited confidences and duplicate types
        let revalidated = self
            .current_understanding
            .clone()
            .validated()
            .map_err(|e| ParleyError::invariant(format!("current understanding: {}", e)))?;
        if revalidated.ambiguities.len() != self.current_understanding.ambiguities.len() {
            return Err(ParleyError::invariant("current understanding has duplicate ambiguities"));
        }
        Ok(())
    }

    /// Types present now that the previous understanding did not have
    pub fn new_ambiguity_types(&self) -> Vec<AmbiguityType> {
        let current = self.current_understanding.ambiguity_types();
        match &self.previous_understanding {
            None => current,
            Some(prev) => current
                .into_iter()
                .filter(|kind| !prev.has_ambiguity(*kind))
                .collect(),
        }
    }

    /// Ambiguity a previously asked question was about
    pub fn ambiguity_for_question(&self, question: &str) -> Option<AmbiguityType> {
        let wanted = question.trim();
        self.turn_log.iter().rev().find_map(|record| {
            record
                .questions
                .iter()
                .position(|q| q.trim() == wanted)
                .and_then(|i| record.asked_about.get(i).copied())
        })
    }
}
