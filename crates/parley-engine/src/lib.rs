//! Parley engine: async turn orchestration over `parley-shared`.

pub mod config;
pub mod in_flight;
pub mod logging;
pub mod orchestrator;

pub use config::EngineConfig;
pub use in_flight::{InFlightTurns, TurnGuard};
pub use orchestrator::{
    AnalysisServices, ConversationEngine, ExtractionRequest, ExtractorError, FakeExtractor,
    UnderstandingExtractor,
};
