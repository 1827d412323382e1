//! Structured understanding of a user's request.
//!
//! The extractor's dynamic JSON is parsed into these records with unknown
//! fields denied, then range-checked. Anything that does not fit the schema is
//! a validation failure; nothing is silently coerced.

use crate::ambiguity::{Ambiguity, AmbiguityType};
use crate::error::{ParleyError, ParleyResult};
use crate::patterns::{EventType, Industry, RecipientType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Confidence below this is reported as "low" in fallback turns
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Rush,
    #[default]
    Standard,
    Flexible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Budget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub per_item: bool,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub approximate: bool,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Timeline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub flexible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Confidence {
    pub overall: f64,
    pub intent: f64,
    pub context: f64,
    pub specifications: f64,
}

impl Confidence {
    pub fn uniform(value: f64) -> Self {
        Self {
            overall: value,
            intent: value,
            context: value,
            specifications: value,
        }
    }

    fn fields(&self) -> [(&'static str, f64); 4] {
        [
            ("overall", self.overall),
            ("intent", self.intent),
            ("context", self.context),
            ("specifications", self.specifications),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Understanding {
    pub primary_intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(default)]
    pub product_categories: Vec<String>,
    #[serde(default)]
    pub industry_context: Industry,
    #[serde(default)]
    pub event_type: EventType,
    #[serde(default)]
    pub recipient_type: RecipientType,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Budget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
    #[serde(default)]
    pub ambiguities: Vec<Ambiguity>,
    pub confidence: Confidence,
}

impl Understanding {
    /// Minimal understanding used when extraction produced nothing usable
    pub fn placeholder(query: &str) -> Self {
        let intent = query.trim();
        Self {
            primary_intent: if intent.is_empty() {
                "unspecified request".to_string()
            } else {
                intent.to_string()
            },
            product_type: None,
            product_categories: Vec::new(),
            industry_context: Industry::Unknown,
            event_type: EventType::Unknown,
            recipient_type: RecipientType::Unknown,
            attributes: BTreeMap::new(),
            quantity: None,
            budget: None,
            timeline: None,
            ambiguities: Vec::new(),
            confidence: Confidence::uniform(FALLBACK_CONFIDENCE),
        }
    }

    /// Parse and validate raw extractor output
    pub fn from_value(value: serde_json::Value) -> ParleyResult<Self> {
        let parsed: Understanding = serde_json::from_value(value)
            .map_err(|e| ParleyError::validation(format!("understanding schema: {}", e)))?;
        parsed.validated()
    }

    /// Range-check confidences, strip `none` markers and zero-confidence
    /// entries, dedupe by type.
    pub fn validated(mut self) -> ParleyResult<Self> {
        if self.primary_intent.trim().is_empty() {
            return Err(ParleyError::validation("primaryIntent is empty"));
        }
        for (name, value) in self.confidence.fields() {
            check_unit_range(&format!("confidence.{}", name), value)?;
        }
        for a in &self.ambiguities {
            check_unit_range(&format!("ambiguity[{}].confidence", a.kind), a.confidence)?;
        }
        if let Some(budget) = &self.budget {
            if let Some(amount) = budget.amount {
                if !amount.is_finite() || amount < 0.0 {
                    return Err(ParleyError::validation(format!(
                        "budget.amount out of range: {}",
                        amount
                    )));
                }
            }
        }

        // zero-confidence entries carry no ambiguity and would score as none
        let mut seen = HashSet::new();
        self.ambiguities.retain(|a| {
            a.kind != AmbiguityType::None && a.confidence > 0.0 && seen.insert(a.kind)
        });
        Ok(self)
    }

    /// `C > 0.8 AND no ambiguities`
    pub fn ready_for_recommendations(&self) -> bool {
        self.confidence.overall > crate::state_machine::READY_CONFIDENCE
            && self.ambiguities.is_empty()
    }

    pub fn ambiguity_types(&self) -> Vec<AmbiguityType> {
        self.ambiguities.iter().map(|a| a.kind).collect()
    }

    pub fn has_ambiguity(&self, kind: AmbiguityType) -> bool {
        self.ambiguities.iter().any(|a| a.kind == kind)
    }
}

fn check_unit_range(field: &str, value: f64) -> ParleyResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParleyError::validation(format!(
            "{} must be within [0,1], got {}",
            field, value
        )))
    }
}
