//! Understanding extractor trait abstraction.
//!
//! The natural-language analysis is an external capability. This trait is the
//! seam the engine calls through:
//! - production wires a model-backed implementation
//! - tests use `FakeExtractor` with scripted responses
//!
//! Implementations return raw JSON; the engine owns validation.

use async_trait::async_trait;
use parley_shared::context::ClarificationExchange;
use parley_shared::patterns::{EventType, Industry, RecipientType};
use parley_shared::understanding::Understanding;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractorError {
    #[error("service error: {0}")]
    Service(String),

    #[error("timed out")]
    Timeout,

    #[error("malformed output: {0}")]
    Malformed(String),

    #[error("not supported by this extractor")]
    Unsupported,
}

/// Everything the extractor may use for one turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_understanding: Option<Understanding>,
    #[serde(default)]
    pub history: Vec<ClarificationExchange>,
}

/// Industry / event / recipient classification from the auxiliary analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContextInsight {
    #[serde(default)]
    pub industry: Industry,
    #[serde(default)]
    pub event_type: EventType,
    #[serde(default)]
    pub recipient_type: RecipientType,
}

impl ContextInsight {
    /// Keyword fallback when the auxiliary analysis is unavailable
    pub fn detect(text: &str) -> Self {
        Self {
            industry: Industry::detect(text),
            event_type: EventType::detect(text),
            recipient_type: RecipientType::detect(text),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BusinessInsight {
    pub summary: String,
    #[serde(default)]
    pub suggested_products: Vec<String>,
}

#[async_trait]
pub trait UnderstandingExtractor: Send + Sync {
    /// Candidate understanding for this turn, as raw JSON
    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<serde_json::Value, ExtractorError>;

    /// Industry / event / recipient classification, as raw JSON
    async fn analyze_context(&self, _query: &str) -> Result<serde_json::Value, ExtractorError> {
        Err(ExtractorError::Unsupported)
    }

    /// Short business-oriented note about the request, as raw JSON
    async fn business_insight(
        &self,
        _query: &str,
        _prior: Option<&Understanding>,
    ) -> Result<serde_json::Value, ExtractorError> {
        Err(ExtractorError::Unsupported)
    }
}

// ============================================================================
// Fake Extractor (Testing)
// ============================================================================

/// Scripted reply for one `extract` call
#[derive(Debug, Clone)]
pub enum FakeReply {
    Value(serde_json::Value),
    Error(ExtractorError),
    /// Sleep before answering, to exercise timeouts
    Delayed(Duration, serde_json::Value),
    /// Raw model text, parsed the way a model-backed extractor would
    Raw(String),
}

/// Fake extractor for deterministic testing.
///
/// Replies are consumed in order; once the script runs out the last reply
/// repeats.
pub struct FakeExtractor {
    script: Mutex<VecDeque<FakeReply>>,
    last: Mutex<Option<FakeReply>>,
    context_reply: Option<serde_json::Value>,
    insight_reply: Option<serde_json::Value>,
    extract_calls: AtomicUsize,
    requests: Mutex<Vec<ExtractionRequest>>,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            context_reply: None,
            insight_reply: None,
            extract_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, value: serde_json::Value) -> Self {
        self.push(FakeReply::Value(value))
    }

    pub fn fail(self, error: ExtractorError) -> Self {
        self.push(FakeReply::Error(error))
    }

    pub fn delayed(self, delay: Duration, value: serde_json::Value) -> Self {
        self.push(FakeReply::Delayed(delay, value))
    }

    pub fn raw(self, text: impl Into<String>) -> Self {
        self.push(FakeReply::Raw(text.into()))
    }

    pub fn with_context(mut self, value: serde_json::Value) -> Self {
        self.context_reply = Some(value);
        self
    }

    pub fn with_insight(mut self, value: serde_json::Value) -> Self {
        self.insight_reply = Some(value);
        self
    }

    fn push(self, reply: FakeReply) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
        self
    }

    /// Number of `extract` calls made so far
    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    /// Requests seen by `extract`, in call order
    pub fn requests(&self) -> Vec<ExtractionRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn next_reply(&self) -> Option<FakeReply> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(reply) = script.pop_front() {
            *last = Some(reply.clone());
            Some(reply)
        } else {
            last.clone()
        }
    }
}

impl Default for FakeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse model text into JSON; anything unparseable is `Malformed`
pub fn parse_raw(text: &str) -> Result<serde_json::Value, ExtractorError> {
    serde_json::from_str(text.trim()).map_err(|e| ExtractorError::Malformed(e.to_string()))
}

#[async_trait]
impl UnderstandingExtractor for FakeExtractor {
    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<serde_json::Value, ExtractorError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        match self.next_reply() {
            Some(FakeReply::Value(v)) => Ok(v),
            Some(FakeReply::Error(e)) => Err(e),
            Some(FakeReply::Delayed(delay, v)) => {
                tokio::time::sleep(delay).await;
                Ok(v)
            }
            Some(FakeReply::Raw(text)) => parse_raw(&text),
            None => Err(ExtractorError::Service("no scripted reply".to_string())),
        }
    }

    async fn analyze_context(&self, _query: &str) -> Result<serde_json::Value, ExtractorError> {
        self.context_reply.clone().ok_or(ExtractorError::Unsupported)
    }

    async fn business_insight(
        &self,
        _query: &str,
        _prior: Option<&Understanding>,
    ) -> Result<serde_json::Value, ExtractorError> {
        self.insight_reply.clone().ok_or(ExtractorError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fake_repeats_last_reply() {
        let fake = FakeExtractor::new()
            .fail(ExtractorError::Timeout)
            .reply(json!({"ok": true}));
        let req = ExtractionRequest::default();
        assert_eq!(fake.extract(&req).await, Err(ExtractorError::Timeout));
        assert_eq!(fake.extract(&req).await, Ok(json!({"ok": true})));
        assert_eq!(fake.extract(&req).await, Ok(json!({"ok": true})));
        assert_eq!(fake.extract_calls(), 3);
    }

    #[tokio::test]
    async fn test_raw_text_that_is_not_json_is_malformed() {
        let fake = FakeExtractor::new().raw("Sure! Here it is: {oops").raw(" {\"ok\": 1} ");
        let req = ExtractionRequest::default();
        assert!(matches!(fake.extract(&req).await, Err(ExtractorError::Malformed(_))));
        assert_eq!(fake.extract(&req).await, Ok(json!({"ok": 1})));
    }

    #[test]
    fn test_context_insight_detect() {
        let insight = ContextInsight::detect("thank-you gifts for our clients at the bank");
        assert_eq!(insight.industry, Industry::Finance);
        assert_eq!(insight.event_type, EventType::ClientAppreciation);
        assert_eq!(insight.recipient_type, RecipientType::Clients);
    }

    #[test]
    fn test_context_insight_rejects_extra_fields() {
        let raw = json!({"industry": "retail", "sentiment": "happy"});
        assert!(serde_json::from_value::<ContextInsight>(raw).is_err());
    }
}
