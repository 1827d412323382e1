//! Conversation health monitor.
//!
//! Reads the turn log and flags conversations that are going in circles:
//! the same subject asked about twice in a row without going away, or too
//! many turns without reaching confirmation.

use crate::ambiguity::AmbiguityType;
use crate::context::{ConversationContext, TurnRecord};
use crate::state_machine::ConversationState;
use serde::{Deserialize, Serialize};

/// Turns allowed before a conversation that never reached confirmation is stuck
pub const DEFAULT_TURN_CEILING: u32 = 6;

const CONFIDENCE_WEIGHT: f64 = 0.6;
const AMBIGUITY_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StuckReason {
    /// Same ambiguity asked about in consecutive clarification turns
    RepeatedSubject(AmbiguityType),
    /// Turn ceiling passed before confirmation
    TurnCeiling,
}

/// What the caller should do about a stuck conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intervention {
    DirectMultipleChoice,
    HumanHandoff,
}

impl Intervention {
    pub fn message(&self) -> &'static str {
        match self {
            Self::DirectMultipleChoice => "ask a single direct multiple-choice question",
            Self::HumanHandoff => "offer to connect to a human",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationHealth {
    pub progress_score: f64,
    pub stuck_indicator: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stuck_reason: Option<StuckReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_intervention: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervention: Option<Intervention>,
}

impl ConversationHealth {
    pub fn healthy(progress_score: f64) -> Self {
        Self {
            progress_score,
            stuck_indicator: false,
            stuck_reason: None,
            recommended_intervention: None,
            intervention: None,
        }
    }

    fn stuck(progress_score: f64, reason: StuckReason) -> Self {
        let intervention = match reason {
            StuckReason::RepeatedSubject(_) => Intervention::DirectMultipleChoice,
            StuckReason::TurnCeiling => Intervention::HumanHandoff,
        };
        Self {
            progress_score,
            stuck_indicator: true,
            stuck_reason: Some(reason),
            recommended_intervention: Some(intervention.message().to_string()),
            intervention: Some(intervention),
        }
    }

    pub fn needs_handoff(&self) -> bool {
        self.intervention == Some(Intervention::HumanHandoff)
    }
}

/// Confidence gain and ambiguity reduction since the first turn, in [0, 1].
///
/// Zero for a single-turn log; rises as confidence rises and ambiguity falls.
pub fn progress_score(turns: &[TurnRecord]) -> f64 {
    let (Some(first), Some(last)) = (turns.first(), turns.last()) else {
        return 0.0;
    };
    if turns.len() < 2 {
        return 0.0;
    }

    let confidence_gain = (last.confidence - first.confidence).max(0.0);
    let first_count = first.ambiguity_count();
    let ambiguity_drop = if first_count == 0 {
        0.0
    } else {
        let dropped = first_count.saturating_sub(last.ambiguity_count());
        dropped as f64 / first_count as f64
    };

    (CONFIDENCE_WEIGHT * confidence_gain + AMBIGUITY_WEIGHT * ambiguity_drop).clamp(0.0, 1.0)
}

/// Subject asked about in both of the last two clarification turns and
/// still ambiguous in both
pub fn repeated_subject(turns: &[TurnRecord]) -> Option<AmbiguityType> {
    let [.., prev, last] = turns else {
        return None;
    };
    if prev.state != ConversationState::Clarification
        || last.state != ConversationState::Clarification
    {
        return None;
    }
    last.asked_about.iter().copied().find(|kind| {
        prev.asked_about.contains(kind)
            && prev.ambiguity_types.contains(kind)
            && last.ambiguity_types.contains(kind)
    })
}

/// Assess the conversation after this turn's record has been appended
pub fn assess(context: &ConversationContext, turn_ceiling: u32) -> ConversationHealth {
    let progress = progress_score(&context.turn_log);

    // handoff outranks another direct question
    if context.turn_number > turn_ceiling && !context.state.past_confirmation() {
        return ConversationHealth::stuck(progress, StuckReason::TurnCeiling);
    }
    if let Some(kind) = repeated_subject(&context.turn_log) {
        return ConversationHealth::stuck(progress, StuckReason::RepeatedSubject(kind));
    }
    ConversationHealth::healthy(progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(
        turn: u32,
        state: ConversationState,
        confidence: f64,
        types: &[AmbiguityType],
        asked: &[AmbiguityType],
    ) -> TurnRecord {
        TurnRecord {
            turn_number: turn,
            state,
            confidence,
            ambiguity_types: types.to_vec(),
            asked_about: asked.to_vec(),
            questions: Vec::new(),
        }
    }

    #[test]
    fn test_progress_zero_at_start() {
        let q = AmbiguityType::QuantityScope;
        let turns = vec![record(1, ConversationState::Clarification, 0.5, &[q], &[])];
        assert_eq!(progress_score(&turns), 0.0);
        assert_eq!(progress_score(&[]), 0.0);
    }

    #[test]
    fn test_progress_rises_with_confidence_and_fewer_ambiguities() {
        let a = AmbiguityType::QuantityScope;
        let b = AmbiguityType::BudgetInterpretation;
        let turns = vec![
            record(1, ConversationState::Clarification, 0.6, &[a, b], &[a, b]),
            record(2, ConversationState::Specification, 0.82, &[], &[]),
        ];
        assert_relative_eq!(progress_score(&turns), 0.6 * 0.22 + 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_progress_never_negative() {
        let a = AmbiguityType::QuantityScope;
        let b = AmbiguityType::TimelineUrgency;
        let turns = vec![
            record(1, ConversationState::Clarification, 0.8, &[a], &[a]),
            record(2, ConversationState::Clarification, 0.4, &[a, b], &[a]),
        ];
        assert_eq!(progress_score(&turns), 0.0);
    }

    #[test]
    fn test_repeated_subject_requires_it_to_stay_ambiguous() {
        let b = AmbiguityType::BudgetInterpretation;
        let stuck = vec![
            record(1, ConversationState::Clarification, 0.5, &[b], &[b]),
            record(2, ConversationState::Clarification, 0.5, &[b], &[b]),
        ];
        assert_eq!(repeated_subject(&stuck), Some(b));

        let resolved_between = vec![
            record(1, ConversationState::Clarification, 0.5, &[b], &[b]),
            record(2, ConversationState::Clarification, 0.5, &[], &[]),
        ];
        assert_eq!(repeated_subject(&resolved_between), None);
    }

    #[test]
    fn test_ceiling_wins_over_repeated_subject() {
        let b = AmbiguityType::BudgetInterpretation;
        let mut ctx = crate::context::start_context(
            Some("conv-ceiling".into()),
            crate::understanding::Understanding::placeholder("mugs"),
        );
        ctx.state = ConversationState::Clarification;
        ctx.turn_number = DEFAULT_TURN_CEILING + 1;
        ctx.turn_log = (1..=ctx.turn_number)
            .map(|turn| record(turn, ConversationState::Clarification, 0.5, &[b], &[b]))
            .collect();
        assert_eq!(repeated_subject(&ctx.turn_log), Some(b));

        let health = assess(&ctx, DEFAULT_TURN_CEILING);
        assert_eq!(health.stuck_reason, Some(StuckReason::TurnCeiling));
        assert_eq!(health.intervention, Some(Intervention::HumanHandoff));
        assert!(health.needs_handoff());

        ctx.turn_number = DEFAULT_TURN_CEILING;
        ctx.turn_log.pop();
        let health = assess(&ctx, DEFAULT_TURN_CEILING);
        assert_eq!(health.stuck_reason, Some(StuckReason::RepeatedSubject(b)));
    }
}
