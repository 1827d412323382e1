//! Turn orchestration.
//!
//! Flow per turn:
//! 1. Extraction fan-out (understanding, context analysis, business insight)
//! 2. Ambiguity analysis and context merge
//! 3. State machine, question selection, health check
//! 4. Response
//!
//! The extractor is reached only through `UnderstandingExtractor` so tests
//! can script it with `FakeExtractor`.

pub mod engine;
pub mod extraction;
pub mod extractor;

pub use engine::{AnalysisServices, ConversationEngine};
pub use extraction::RetryPolicy;
pub use extractor::{
    BusinessInsight, ContextInsight, ExtractionRequest, ExtractorError, FakeExtractor, FakeReply,
    UnderstandingExtractor,
};
