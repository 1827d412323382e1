//! Conversation state machine.
//!
//! discovery → clarification → confirmation → specification, with
//! clarification re-entered whenever the request becomes unclear again.
//! Transitions outside the edge set are invariant violations.

use crate::error::{ParleyError, ParleyResult};
use serde::{Deserialize, Serialize};

/// Above this ambiguity score the user must be asked something
pub const AMBIGUITY_THRESHOLD: f64 = 0.3;
/// Minimum confidence to move on to confirmation
pub const CONFIRM_CONFIDENCE: f64 = 0.7;
/// Confidence strictly above this (with no ambiguities) means ready
pub const READY_CONFIDENCE: f64 = 0.8;

/// Upper bound on edges walked in a single turn
const MAX_STEPS_PER_TURN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Discovery,
    Clarification,
    Confirmation,
    Specification,
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovery => write!(f, "discovery"),
            Self::Clarification => write!(f, "clarification"),
            Self::Confirmation => write!(f, "confirmation"),
            Self::Specification => write!(f, "specification"),
        }
    }
}

impl ConversationState {
    /// Whether `self → to` is an allowed edge (staying put is always allowed)
    pub fn can_transition_to(self, to: ConversationState) -> bool {
        use ConversationState::*;
        if self == to {
            return true;
        }
        matches!(
            (self, to),
            (Discovery, Clarification)
                | (Discovery, Confirmation)
                | (Clarification, Confirmation)
                | (Confirmation, Clarification)
                | (Confirmation, Specification)
                | (Specification, Clarification)
        )
    }

    /// Has the conversation reached at least confirmation
    pub fn past_confirmation(self) -> bool {
        matches!(self, Self::Confirmation | Self::Specification)
    }
}

/// Reject any edge outside the allowed set
pub fn validate_transition(from: ConversationState, to: ConversationState) -> ParleyResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ParleyError::InvalidTransition { from, to })
    }
}

/// Signals the machine evaluates once per turn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionInput {
    /// Overall ambiguity score (S)
    pub ambiguity_score: f64,
    /// `currentUnderstanding.confidence.overall` (C)
    pub confidence: f64,
    pub ambiguity_count: usize,
    /// A type appeared this turn that the previous understanding did not have
    pub new_ambiguity: bool,
}

impl TransitionInput {
    /// `C > 0.8 AND ambiguities == 0`
    pub fn ready(&self) -> bool {
        self.confidence > READY_CONFIDENCE && self.ambiguity_count == 0
    }

    fn unclear(&self) -> bool {
        self.ambiguity_score > AMBIGUITY_THRESHOLD || self.confidence < CONFIRM_CONFIDENCE
    }

    fn clear_enough(&self) -> bool {
        self.ambiguity_score <= AMBIGUITY_THRESHOLD && self.confidence >= CONFIRM_CONFIDENCE
    }
}

/// Result of one turn's evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub from: ConversationState,
    pub to: ConversationState,
    /// Every edge taken this turn, in order
    pub path: Vec<(ConversationState, ConversationState)>,
    pub ready_for_recommendations: bool,
}

impl TransitionOutcome {
    pub fn changed(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Single rule application; `None` when the state is stable
fn step(state: ConversationState, input: &TransitionInput) -> Option<ConversationState> {
    use ConversationState::*;
    match state {
        Discovery => {
            if input.unclear() {
                Some(Clarification)
            } else {
                Some(Confirmation)
            }
        }
        Clarification => {
            if input.clear_enough() && !input.new_ambiguity {
                Some(Confirmation)
            } else {
                None
            }
        }
        Confirmation => {
            if input.ready() {
                Some(Specification)
            } else if input.unclear() || input.new_ambiguity {
                Some(Clarification)
            } else {
                None
            }
        }
        Specification => {
            // a confidence drop reopens clarification like a new ambiguity does
            if input.new_ambiguity || input.unclear() {
                Some(Clarification)
            } else {
                None
            }
        }
    }
}

/// Walk allowed edges from `current` until no rule fires.
///
/// Stops as soon as clarification is entered: the user has to answer before
/// the conversation can move again.
pub fn evaluate(
    current: ConversationState,
    input: &TransitionInput,
) -> ParleyResult<TransitionOutcome> {
    let mut state = current;
    let mut path = Vec::new();

    for _ in 0..MAX_STEPS_PER_TURN {
        let Some(next) = step(state, input) else {
            break;
        };
        validate_transition(state, next)?;
        path.push((state, next));
        state = next;
        if state == ConversationState::Clarification {
            break;
        }
    }

    Ok(TransitionOutcome {
        from: current,
        to: state,
        path,
        ready_for_recommendations: input.ready(),
    })
}
