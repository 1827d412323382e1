//! Extraction calls with timeout, bounded retry and schema validation.
//!
//! Transport failures (service error, timeout, malformed output) are retried
//! with exponential backoff and end in `ParleyError::Extraction`. Schema
//! violations get their own, smaller retry budget and end in
//! `ParleyError::Validation`.

use super::extractor::{
    BusinessInsight, ContextInsight, ExtractionRequest, ExtractorError, UnderstandingExtractor,
};
use crate::config::ExtractionConfig;
use parley_shared::error::{ParleyError, ParleyResult};
use parley_shared::understanding::Understanding;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Backoff never grows past this
const MAX_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub call_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub validation_retries: u32,
}

impl From<&ExtractionConfig> for RetryPolicy {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            call_timeout: config.call_timeout(),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            validation_retries: config.validation_retries,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ExtractionConfig::default())
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): base, 2×base, 4×base...
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

async fn call_once(
    extractor: &dyn UnderstandingExtractor,
    request: &ExtractionRequest,
    call_timeout: Duration,
) -> Result<serde_json::Value, ExtractorError> {
    match timeout(call_timeout, extractor.extract(request)).await {
        Ok(result) => result,
        Err(_) => Err(ExtractorError::Timeout),
    }
}

/// Extract and validate this turn's candidate understanding.
pub async fn extract_understanding(
    extractor: &dyn UnderstandingExtractor,
    request: &ExtractionRequest,
    policy: &RetryPolicy,
) -> ParleyResult<Understanding> {
    let mut transport_failures = 0u32;
    let mut validation_failures = 0u32;

    loop {
        let error = match call_once(extractor, request, policy.call_timeout).await {
            Ok(value) => match Understanding::from_value(value) {
                Ok(understanding) => {
                    debug!(
                        confidence = understanding.confidence.overall,
                        ambiguities = understanding.ambiguities.len(),
                        "extraction validated"
                    );
                    return Ok(understanding);
                }
                Err(e) => {
                    validation_failures += 1;
                    if validation_failures > policy.validation_retries {
                        warn!(
                            "Extractor output rejected after {} attempts: {}",
                            validation_failures, e
                        );
                        return Err(e);
                    }
                    warn!("Extractor output failed validation, retrying: {}", e);
                    continue;
                }
            },
            Err(ExtractorError::Unsupported) => {
                return Err(ParleyError::Extraction(ExtractorError::Unsupported.to_string()));
            }
            Err(e) => e,
        };

        transport_failures += 1;
        if transport_failures >= policy.max_attempts {
            warn!("Extraction gave up after {} attempts: {}", transport_failures, error);
            return Err(ParleyError::Extraction(error.to_string()));
        }
        let delay = policy.backoff(transport_failures);
        warn!(
            "Extraction attempt {}/{} failed ({}), retrying in {}ms",
            transport_failures,
            policy.max_attempts,
            error,
            delay.as_millis()
        );
        sleep(delay).await;
    }
}

/// Industry / event / recipient for the query.
///
/// The auxiliary analysis is best effort: any failure falls back to keyword
/// detection over the query text.
pub async fn fetch_context(
    extractor: &dyn UnderstandingExtractor,
    query: &str,
    call_timeout: Duration,
) -> ContextInsight {
    let parsed = match timeout(call_timeout, extractor.analyze_context(query)).await {
        Ok(Ok(value)) => serde_json::from_value::<ContextInsight>(value).map_err(|e| e.to_string()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(ExtractorError::Timeout.to_string()),
    };
    match parsed {
        Ok(insight) => insight,
        Err(reason) => {
            debug!("context analysis unavailable ({}), using keyword detection", reason);
            ContextInsight::detect(query)
        }
    }
}

/// Business note for the query; `None` when unavailable
pub async fn fetch_business_insight(
    extractor: &dyn UnderstandingExtractor,
    query: &str,
    prior: Option<&Understanding>,
    call_timeout: Duration,
) -> Option<BusinessInsight> {
    match timeout(call_timeout, extractor.business_insight(query, prior)).await {
        Ok(Ok(value)) => match serde_json::from_value::<BusinessInsight>(value) {
            Ok(insight) => Some(insight),
            Err(e) => {
                debug!("business insight rejected: {}", e);
                None
            }
        },
        Ok(Err(e)) => {
            debug!("business insight unavailable: {}", e);
            None
        }
        Err(_) => {
            debug!("business insight timed out");
            None
        }
    }
}
