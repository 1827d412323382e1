//! Ambiguity types and the ambiguity analyzer.
//!
//! Pure function scoring with test-locked behavior: the same ambiguity list
//! always produces the same ranking and the same overall score.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Closed set of ambiguity kinds the extractor may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityType {
    ProductCategory,
    QuantityScope,
    BudgetInterpretation,
    TimelineUrgency,
    QualityExpectation,
    CustomizationExtent,
    RecipientSpecification,
    /// Marker for "nothing ambiguous"; stripped at the validation boundary
    None,
}

impl AmbiguityType {
    /// Short human label used in questions and reasoning
    pub fn label(&self) -> &'static str {
        match self {
            Self::ProductCategory => "product category",
            Self::QuantityScope => "quantity",
            Self::BudgetInterpretation => "budget",
            Self::TimelineUrgency => "timeline",
            Self::QualityExpectation => "quality level",
            Self::CustomizationExtent => "customization",
            Self::RecipientSpecification => "recipients",
            Self::None => "request",
        }
    }
}

impl std::fmt::Display for AmbiguityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ProductCategory => "product_category",
            Self::QuantityScope => "quantity_scope",
            Self::BudgetInterpretation => "budget_interpretation",
            Self::TimelineUrgency => "timeline_urgency",
            Self::QualityExpectation => "quality_expectation",
            Self::CustomizationExtent => "customization_extent",
            Self::RecipientSpecification => "recipient_specification",
            Self::None => "none",
        };
        write!(f, "{}", s)
    }
}

/// How much an ambiguity affects the eventual recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    pub fn weight(&self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// How soon an ambiguity must be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionUrgency {
    Critical,
    Important,
    Helpful,
}

impl ResolutionUrgency {
    pub fn weight(&self) -> u8 {
        match self {
            Self::Critical => 3,
            Self::Important => 2,
            Self::Helpful => 1,
        }
    }
}

impl std::fmt::Display for ResolutionUrgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Important => write!(f, "important"),
            Self::Helpful => write!(f, "helpful"),
        }
    }
}

/// A detected unclear aspect of the user's request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Ambiguity {
    #[serde(rename = "type")]
    pub kind: AmbiguityType,
    pub description: String,
    #[serde(default)]
    pub possible_interpretations: Vec<String>,
    pub confidence: f64,
    pub impact: Impact,
    pub resolution_urgency: ResolutionUrgency,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl Ambiguity {
    pub fn new(
        kind: AmbiguityType,
        description: impl Into<String>,
        confidence: f64,
        impact: Impact,
        resolution_urgency: ResolutionUrgency,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            possible_interpretations: Vec::new(),
            confidence,
            impact,
            resolution_urgency,
            evidence: Vec::new(),
        }
    }

    pub fn with_interpretations<I, S>(mut self, interpretations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.possible_interpretations = interpretations.into_iter().map(Into::into).collect();
        self
    }

    /// `impact × urgency × confidence × 10`, in [0, 90]
    pub fn priority(&self) -> f64 {
        let raw = f64::from(self.impact.weight())
            * f64::from(self.resolution_urgency.weight())
            * self.confidence
            * 10.0;
        raw.clamp(0.0, 90.0)
    }
}

/// An ambiguity with its computed priority and original emission index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredAmbiguity {
    pub ambiguity: Ambiguity,
    pub priority: f64,
    pub emission_index: usize,
}

/// Output of the analyzer for one turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbiguityAnalysis {
    /// Highest priority first
    pub clarification_priority: Vec<ScoredAmbiguity>,
    pub overall_ambiguity_score: f64,
}

impl AmbiguityAnalysis {
    pub fn is_empty(&self) -> bool {
        self.clarification_priority.is_empty()
    }
}

/// `Σ(impact × confidence) / (n × 3)`, clamped to [0, 1]; 0 when empty
pub fn overall_ambiguity_score(ambiguities: &[Ambiguity]) -> f64 {
    if ambiguities.is_empty() {
        return 0.0;
    }
    let weighted: f64 = ambiguities
        .iter()
        .map(|a| f64::from(a.impact.weight()) * a.confidence)
        .sum();
    let denom = ambiguities.len() as f64 * 3.0;
    (weighted / denom).clamp(0.0, 1.0)
}

/// Score and rank one turn's ambiguities.
///
/// Ties keep the extractor's emission order (`sort_by` is stable).
pub fn analyze(ambiguities: &[Ambiguity]) -> AmbiguityAnalysis {
    let mut ranked: Vec<ScoredAmbiguity> = ambiguities
        .iter()
        .enumerate()
        .map(|(emission_index, a)| ScoredAmbiguity {
            ambiguity: a.clone(),
            priority: a.priority(),
            emission_index,
        })
        .collect();

    ranked.sort_by(|a, b| b.priority.total_cmp(&a.priority));

    let overall_ambiguity_score = overall_ambiguity_score(ambiguities);
    debug!(
        count = ranked.len(),
        score = overall_ambiguity_score,
        "ambiguity analysis complete"
    );

    AmbiguityAnalysis {
        clarification_priority: ranked,
        overall_ambiguity_score,
    }
}
