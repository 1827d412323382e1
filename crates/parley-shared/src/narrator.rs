//! User-facing response text for a turn.
//!
//! Pinned templates - same inputs always produce the same text.

use crate::clarify::ClarificationQuestion;
use crate::patterns::{EventType, Industry, PatternProfile};
use crate::understanding::Understanding;

/// One-line restatement of what we understood so far
pub fn summarize(understanding: &Understanding) -> String {
    let mut parts = Vec::new();
    if let Some(q) = understanding.quantity {
        parts.push(format!("{}", q));
    }
    match &understanding.product_type {
        Some(p) => parts.push(p.clone()),
        None => parts.push(understanding.primary_intent.clone()),
    }
    if understanding.event_type != EventType::Unknown {
        parts.push(format!("for a {}", event_label(understanding.event_type)));
    }
    if let Some(budget) = &understanding.budget {
        if let Some(amount) = budget.amount {
            let approx = if budget.approximate { "around " } else { "" };
            let scope = if budget.per_item { " per item" } else { " total" };
            parts.push(format!("at {}{:.0} {}{}", approx, amount, budget.currency, scope));
        }
    }
    parts.join(" ")
}

pub fn event_label(event: EventType) -> &'static str {
    match event {
        EventType::Conference => "conference",
        EventType::TradeShow => "trade show",
        EventType::EmployeeAppreciation => "employee appreciation event",
        EventType::ClientAppreciation => "client appreciation event",
        EventType::Onboarding => "onboarding program",
        EventType::ProductLaunch => "product launch",
        EventType::Holiday => "holiday campaign",
        EventType::Fundraiser => "fundraiser",
        EventType::TeamBuilding => "team building event",
        EventType::Unknown => "event",
    }
}

fn profile_hint(understanding: &Understanding) -> Option<String> {
    if understanding.industry_context == Industry::Unknown
        && understanding.event_type == EventType::Unknown
    {
        return None;
    }
    let profile = PatternProfile::lookup(understanding.industry_context, understanding.event_type);
    let products = profile.preferred_products.iter().take(2).cloned().collect::<Vec<_>>();
    if products.is_empty() {
        return None;
    }
    Some(format!("Similar requests often go with {}.", products.join(" or ")))
}

/// Response while we still need answers
pub fn narrate_clarification(
    understanding: &Understanding,
    questions: &[ClarificationQuestion],
) -> String {
    let mut text = format!("Got it: {}.", summarize(understanding));
    if let Some(hint) = profile_hint(understanding) {
        text.push(' ');
        text.push_str(&hint);
    }
    match questions {
        [] => {}
        [only] => {
            text.push(' ');
            text.push_str(&only.question);
        }
        many => {
            text.push_str(" A few quick questions:");
            for (i, q) in many.iter().enumerate() {
                text.push_str(&format!("\n{}. {}", i + 1, q.question));
            }
        }
    }
    text
}

pub fn narrate_confirmation(understanding: &Understanding) -> String {
    format!(
        "Let me make sure I have this right: {}. Does that sound correct?",
        summarize(understanding)
    )
}

pub fn narrate_ready(
    understanding: &Understanding,
    insight: Option<&str>,
    suggested_products: &[String],
) -> String {
    let mut text = format!(
        "Great, I have what I need: {}. Pulling together recommendations now.",
        summarize(understanding)
    );
    if let Some(insight) = insight.filter(|s| !s.trim().is_empty()) {
        text.push(' ');
        text.push_str(insight.trim());
    }
    let suggestions: Vec<&str> = suggested_products
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    match suggestions.as_slice() {
        [] => {}
        [only] => text.push_str(&format!(" You might also consider {}.", only)),
        [init @ .., last] => text.push_str(&format!(
            " You might also consider {} or {}.",
            init.join(", "),
            last
        )),
    }
    text
}

pub fn narrate_handoff() -> String {
    "We've gone back and forth a few times without pinning this down. \
     Would you like me to connect you with someone from our team?"
        .to_string()
}
