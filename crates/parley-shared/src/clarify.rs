//! Clarification question selection.
//!
//! Turns ranked ambiguities into at most `max_questions` concrete questions.
//! Question shape is a fixed lookup on the ambiguity type; priority labels are
//! fixed thresholds on the priority score.

use crate::ambiguity::{AmbiguityType, ScoredAmbiguity};
use crate::error::{ParleyError, ParleyResult};
use serde::{Deserialize, Serialize};

/// Default question budget per turn
pub const DEFAULT_MAX_QUESTIONS: usize = 3;

/// Priority score at or above which a question is "high"
pub const HIGH_PRIORITY_SCORE: f64 = 60.0;
/// Priority score at or above which a question is "medium"
pub const MEDIUM_PRIORITY_SCORE: f64 = 30.0;

/// Escape option appended to forced multiple-choice questions
pub const OTHER_OPTION: &str = "Something else";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    OpenEnded,
    MultipleChoice,
    YesNo,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPriority {
    High,
    Medium,
    Low,
}

impl QuestionPriority {
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_PRIORITY_SCORE {
            Self::High
        } else if score >= MEDIUM_PRIORITY_SCORE {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationQuestion {
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub priority: QuestionPriority,
    pub reasoning: String,
    /// Subject of the question
    pub ambiguity_type: AmbiguityType,
}

impl ClarificationQuestion {
    /// Options only on multiple choice, reasoning never empty
    pub fn validate(&self) -> ParleyResult<()> {
        if self.reasoning.trim().is_empty() {
            return Err(ParleyError::validation("question reasoning is empty"));
        }
        match (self.question_type, &self.options) {
            (QuestionType::MultipleChoice, Some(opts)) if !opts.is_empty() => Ok(()),
            (QuestionType::MultipleChoice, _) => {
                Err(ParleyError::validation("multiple choice question without options"))
            }
            (_, Some(_)) => Err(ParleyError::validation(
                "options present on a non multiple choice question",
            )),
            (_, None) => Ok(()),
        }
    }
}

/// Fixed type lookup.
///
/// Exactly one interpretation means we are verifying an assumption.
pub fn question_type_for(kind: AmbiguityType, interpretation_count: usize) -> QuestionType {
    if interpretation_count == 1 || kind == AmbiguityType::None {
        return QuestionType::YesNo;
    }
    match kind {
        AmbiguityType::BudgetInterpretation
        | AmbiguityType::QualityExpectation
        | AmbiguityType::CustomizationExtent => {
            if interpretation_count >= 2 {
                QuestionType::MultipleChoice
            } else {
                QuestionType::OpenEnded
            }
        }
        AmbiguityType::QuantityScope | AmbiguityType::TimelineUrgency => QuestionType::Range,
        AmbiguityType::ProductCategory | AmbiguityType::RecipientSpecification => {
            QuestionType::OpenEnded
        }
        AmbiguityType::None => QuestionType::YesNo,
    }
}

fn question_text(scored: &ScoredAmbiguity, question_type: QuestionType) -> String {
    let a = &scored.ambiguity;
    match question_type {
        QuestionType::YesNo => match a.possible_interpretations.first() {
            Some(assumption) => format!("Just to confirm: {}?", assumption.trim_end_matches('?')),
            None => format!("Is my understanding of the {} correct?", a.kind.label()),
        },
        QuestionType::MultipleChoice => match a.kind {
            AmbiguityType::BudgetInterpretation => "How should I read your budget?".to_string(),
            AmbiguityType::QualityExpectation => "What quality level are you after?".to_string(),
            AmbiguityType::CustomizationExtent => {
                "How much customization do you need?".to_string()
            }
            other => format!("Which {} did you mean?", other.label()),
        },
        QuestionType::Range => match a.kind {
            AmbiguityType::QuantityScope => {
                "Roughly how many units do you need (a range is fine)?".to_string()
            }
            AmbiguityType::TimelineUrgency => {
                "When do you need these by, earliest and latest date?".to_string()
            }
            other => format!("What range works for the {}?", other.label()),
        },
        QuestionType::OpenEnded => match a.kind {
            AmbiguityType::ProductCategory => {
                "What kind of product do you have in mind?".to_string()
            }
            AmbiguityType::RecipientSpecification => {
                "Who will be receiving these?".to_string()
            }
            other => format!("Could you tell me more about the {}?", other.label()),
        },
    }
}

fn reasoning(scored: &ScoredAmbiguity) -> String {
    let a = &scored.ambiguity;
    let mut text = format!(
        "{} impact, {} to resolve (priority {:.0})",
        a.impact, a.resolution_urgency, scored.priority
    );
    if !a.description.trim().is_empty() {
        text.push_str(": ");
        text.push_str(a.description.trim());
    }
    text
}

/// Build the question for one scored ambiguity
pub fn build_question(scored: &ScoredAmbiguity) -> ClarificationQuestion {
    let a = &scored.ambiguity;
    let question_type = question_type_for(a.kind, a.possible_interpretations.len());
    let options = match question_type {
        QuestionType::MultipleChoice => Some(a.possible_interpretations.clone()),
        _ => None,
    };
    ClarificationQuestion {
        question: question_text(scored, question_type),
        question_type,
        options,
        priority: QuestionPriority::from_score(scored.priority),
        reasoning: reasoning(scored),
        ambiguity_type: a.kind,
    }
}

/// Top `max_questions` ambiguities as questions, highest priority first.
///
/// `ranked` must already be ordered by the analyzer.
pub fn select_questions(
    ranked: &[ScoredAmbiguity],
    max_questions: usize,
) -> Vec<ClarificationQuestion> {
    ranked
        .iter()
        .take(max_questions)
        .map(build_question)
        .collect()
}

/// Stock choices for subjects that have a natural small set of answers
fn standard_choices(kind: AmbiguityType) -> &'static [&'static str] {
    match kind {
        AmbiguityType::BudgetInterpretation => &["Total for the order", "Per item"],
        AmbiguityType::QuantityScope => &["Under 50", "50 to 250", "250 to 1,000", "Over 1,000"],
        AmbiguityType::TimelineUrgency => {
            &["Rush (within a week)", "Standard (2-4 weeks)", "Flexible"]
        }
        AmbiguityType::QualityExpectation => &["Economy", "Standard", "Premium"],
        AmbiguityType::CustomizationExtent => {
            &["Logo only", "Logo and brand colors", "Fully custom design"]
        }
        AmbiguityType::ProductCategory
        | AmbiguityType::RecipientSpecification
        | AmbiguityType::None => &[],
    }
}

/// One direct multiple-choice question about the top ambiguity.
///
/// Used when the same subject keeps coming back: open questions are not
/// working, so offer concrete choices plus an escape option. Choices come
/// from the extractor's interpretations when it gave at least two, else from
/// the stock list for the subject. `None` when there is nothing to choose
/// between, so the caller keeps its regular question.
pub fn select_direct_question(ranked: &[ScoredAmbiguity]) -> Option<ClarificationQuestion> {
    let top = ranked.first()?;
    let a = &top.ambiguity;
    let mut options: Vec<String> = if a.possible_interpretations.len() >= 2 {
        a.possible_interpretations.clone()
    } else {
        standard_choices(a.kind).iter().map(|s| s.to_string()).collect()
    };
    if options.len() < 2 {
        return None;
    }
    options.push(OTHER_OPTION.to_string());

    let label = a.kind.label();
    Some(ClarificationQuestion {
        question: format!("Let's settle the {}. Which of these is closest?", label),
        question_type: QuestionType::MultipleChoice,
        options: Some(options),
        priority: QuestionPriority::High,
        reasoning: format!("{} asked repeatedly without resolution; {}", label, reasoning(top)),
        ambiguity_type: a.kind,
    })
}
