//! Shared types and deterministic decision logic for Parley.
//!
//! Everything here is synchronous and free of I/O: the engine crate feeds it
//! validated extractor output and gets back scores, states and questions.

pub mod ambiguity;
pub mod clarify;
pub mod context;
pub mod error;
pub mod health;
pub mod narrator;
pub mod patterns;
pub mod state_machine;
pub mod turn;
pub mod understanding;

pub use ambiguity::{Ambiguity, AmbiguityAnalysis, AmbiguityType, Impact, ResolutionUrgency};
pub use clarify::{ClarificationQuestion, QuestionPriority, QuestionType};
pub use context::{ClarificationExchange, ConversationContext, TurnRecord};
pub use error::{ErrorCategory, ParleyError, ParleyResult};
pub use health::ConversationHealth;
pub use state_machine::ConversationState;
pub use turn::{ClarificationResponse, TurnOutcome, TurnResponse};
pub use understanding::{Confidence, Understanding};
