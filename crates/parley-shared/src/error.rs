//! Error types for Parley.
//!
//! Two families matter to callers: recoverable failures ("ask the user
//! something") and corruption ("this conversation's state is broken").

use crate::state_machine::ConversationState;
use thiserror::Error;

/// How a caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The turn failed but the conversation can continue from the old context
    Recoverable,
    /// The supplied context violates an invariant; do not continue with it
    Corrupted,
}

#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("State invariant violated: {0}")]
    StateInvariant(String),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: ConversationState,
        to: ConversationState,
    },

    #[error("Conversation {0} already has a turn in flight")]
    TurnInFlight(String),

    #[error("Turn timed out after {0}ms")]
    TurnTimeout(u64),
}

impl ParleyError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ParleyError::StateInvariant(_) | ParleyError::InvalidTransition { .. } => {
                ErrorCategory::Corrupted
            }
            _ => ErrorCategory::Recoverable,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::Recoverable
    }

    pub fn code(&self) -> i32 {
        match self {
            ParleyError::Extraction(_) => -32010,
            ParleyError::Validation(_) => -32011,
            ParleyError::StateInvariant(_) => -32020,
            ParleyError::InvalidTransition { .. } => -32021,
            ParleyError::TurnInFlight(_) => -32030,
            ParleyError::TurnTimeout(_) => -32031,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ParleyError::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        ParleyError::StateInvariant(msg.into())
    }
}

pub type ParleyResult<T> = Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_errors_are_corrupted() {
        let err = ParleyError::InvalidTransition {
            from: ConversationState::Discovery,
            to: ConversationState::Specification,
        };
        assert_eq!(err.category(), ErrorCategory::Corrupted);
        assert!(!err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "Invalid transition: discovery -> specification"
        );
    }

    #[test]
    fn test_validation_is_recoverable() {
        let err = ParleyError::validation("unknown impact");
        assert!(err.is_recoverable());
        assert_eq!(err.code(), -32011);
    }
}
