//! Per-turn results returned to callers.

use crate::ambiguity::AmbiguityType;
use crate::clarify::{ClarificationQuestion, QuestionPriority, QuestionType};
use crate::context::ConversationContext;
use crate::health::ConversationHealth;
use crate::state_machine::ConversationState;
use crate::understanding::Understanding;
use serde::{Deserialize, Serialize};

/// Generic question used when nothing better is available
pub const FALLBACK_QUESTION: &str =
    "Could you tell me a bit more about what you're looking for, who it's for, \
     and when you need it?";

/// Terminal signal for the caller, separate from the state label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Keep talking to the user
    #[default]
    Continue,
    /// Hand off to the recommendation step
    Ready,
    /// Conversation is stuck past the turn ceiling; hand off to a human
    Escalate,
    /// Extraction failed; a generic clarifying question was produced
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceSummary {
    pub overall: f64,
    pub ready_to_recommend: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub response: String,
    pub understanding: Understanding,
    pub needs_clarification: bool,
    pub clarification_questions: Vec<ClarificationQuestion>,
    pub context: ConversationContext,
    pub confidence: ConfidenceSummary,
    pub health: ConversationHealth,
    pub outcome: TurnOutcome,
    /// Edges the state machine took this turn
    #[serde(default)]
    pub transitions: Vec<(ConversationState, ConversationState)>,
    /// Ambiguity resolved by the answer this turn responded to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_ambiguity_type: Option<AmbiguityType>,
}

pub fn fallback_question() -> ClarificationQuestion {
    ClarificationQuestion {
        question: FALLBACK_QUESTION.to_string(),
        question_type: QuestionType::OpenEnded,
        options: None,
        priority: QuestionPriority::High,
        reasoning: "request could not be analysed; asking for the essentials".to_string(),
        ambiguity_type: AmbiguityType::None,
    }
}

impl TurnResponse {
    /// Safe clarification turn that leaves `context` as it was
    pub fn fallback(context: ConversationContext) -> Self {
        Self {
            response: format!(
                "Sorry, I couldn't quite work that out. {}",
                FALLBACK_QUESTION
            ),
            understanding: context.current_understanding.clone(),
            needs_clarification: true,
            clarification_questions: vec![fallback_question()],
            confidence: ConfidenceSummary {
                overall: crate::understanding::FALLBACK_CONFIDENCE,
                ready_to_recommend: false,
            },
            health: ConversationHealth::healthy(0.0),
            outcome: TurnOutcome::Degraded,
            transitions: Vec::new(),
            resolved_ambiguity_type: None,
            context,
        }
    }

    pub fn ready_for_recommendations(&self) -> bool {
        self.confidence.ready_to_recommend
    }
}

/// Result of answering a clarification question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationResponse {
    pub response: String,
    pub updated_understanding: Understanding,
    pub needs_more_clarification: bool,
    pub next_questions: Vec<ClarificationQuestion>,
    pub context: ConversationContext,
    pub ready_for_recommendations: bool,
    pub health: ConversationHealth,
    pub outcome: TurnOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_ambiguity_type: Option<AmbiguityType>,
}

impl From<TurnResponse> for ClarificationResponse {
    fn from(turn: TurnResponse) -> Self {
        Self {
            response: turn.response,
            updated_understanding: turn.understanding,
            needs_more_clarification: turn.needs_clarification,
            next_questions: turn.clarification_questions,
            context: turn.context,
            ready_for_recommendations: turn.confidence.ready_to_recommend,
            health: turn.health,
            outcome: turn.outcome,
            resolved_ambiguity_type: turn.resolved_ambiguity_type,
        }
    }
}
