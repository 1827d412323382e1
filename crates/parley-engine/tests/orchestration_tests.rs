//! End-to-end turn tests against a scripted extractor.
//!
//! Covers the full turn pipeline: fan-out, validation, merge, state walk,
//! question selection, health, and the failure paths (degrade, validation
//! error, timeout, concurrent turn, corrupted context).

use parley_engine::config::EngineConfig;
use parley_engine::orchestrator::{
    AnalysisServices, ConversationEngine, ExtractorError, FakeExtractor,
};
use parley_shared::ambiguity::AmbiguityType;
use parley_shared::clarify::{QuestionType, OTHER_OPTION};
use parley_shared::error::{ErrorCategory, ParleyError};
use parley_shared::health::StuckReason;
use parley_shared::narrator::narrate_handoff;
use parley_shared::state_machine::ConversationState;
use parley_shared::turn::{TurnOutcome, FALLBACK_QUESTION};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Helpers
// ============================================================================

fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.extraction.timeout_ms = 1_000;
    config.extraction.backoff_base_ms = 1;
    config.extraction.turn_timeout_ms = 5_000;
    config
}

fn engine_with(fake: Arc<FakeExtractor>, config: EngineConfig) -> ConversationEngine {
    ConversationEngine::new(AnalysisServices::new(fake), config)
}

fn understanding(confidence: f64, ambiguities: Value) -> Value {
    json!({
        "primaryIntent": "branded water bottles for a conference",
        "productType": "water bottle",
        "quantity": 250,
        "confidence": {
            "overall": confidence,
            "intent": confidence,
            "context": confidence,
            "specifications": confidence
        },
        "ambiguities": ambiguities
    })
}

fn budget() -> Value {
    json!({
        "type": "budget_interpretation",
        "description": "$5000 could be total or per item",
        "possibleInterpretations": ["$5000 total", "$5000 per item"],
        "confidence": 0.8,
        "impact": "high",
        "resolutionUrgency": "critical"
    })
}

fn quantity() -> Value {
    json!({
        "type": "quantity_scope",
        "description": "attendee count not confirmed",
        "confidence": 0.7,
        "impact": "medium",
        "resolutionUrgency": "important"
    })
}

fn ambiguity_of(kind: &str) -> Value {
    json!({
        "type": kind,
        "description": "unclear",
        "confidence": 0.9,
        "impact": "high",
        "resolutionUrgency": "critical"
    })
}

// ============================================================================
// Happy paths
// ============================================================================

#[tokio::test]
async fn test_clear_first_turn_is_ready() {
    let fake = Arc::new(
        FakeExtractor::new()
            .reply(understanding(0.85, json!([])))
            .with_insight(json!({
                "summary": "Steel bottles hold up well as conference swag.",
                "suggestedProducts": ["lanyards", "tote bags"]
            })),
    );
    let engine = engine_with(fake, fast_config());

    let turn = engine
        .process_turn("250 steel water bottles for our conference", None)
        .await
        .unwrap();

    assert_eq!(turn.context.state, ConversationState::Specification);
    assert_eq!(turn.outcome, TurnOutcome::Ready);
    assert!(turn.ready_for_recommendations());
    assert!(!turn.needs_clarification);
    assert!(turn.clarification_questions.is_empty());
    assert_eq!(turn.context.turn_number, 1);
    assert!(turn.response.contains("Steel bottles hold up well"));
    assert!(turn.response.contains("You might also consider lanyards or tote bags."));
    assert!(turn.context.validate().is_ok());
}

#[tokio::test]
async fn test_answer_resolves_budget_and_reaches_specification() {
    let fake = Arc::new(
        FakeExtractor::new()
            .reply(understanding(0.6, json!([budget(), quantity()])))
            .reply(understanding(0.82, json!([]))),
    );
    let engine = engine_with(fake.clone(), fast_config());

    let first = engine.process_turn("water bottles, budget $5000", None).await.unwrap();
    assert_eq!(first.context.state, ConversationState::Clarification);
    assert!(first.needs_clarification);
    assert_eq!(first.clarification_questions.len(), 2);
    assert_eq!(
        first.clarification_questions[0].ambiguity_type,
        AmbiguityType::BudgetInterpretation
    );
    assert!(!first.ready_for_recommendations());

    let question = first.clarification_questions[0].question.clone();
    let answer = engine
        .process_clarification_answer("$5000 total, about $20 each", &question, &first.context)
        .await
        .unwrap();

    assert_eq!(answer.context.state, ConversationState::Specification);
    assert!(answer.ready_for_recommendations);
    assert!(!answer.needs_more_clarification);
    assert!(answer.next_questions.is_empty());
    assert_eq!(answer.outcome, TurnOutcome::Ready);
    assert_eq!(answer.context.turn_number, 2);
    assert_eq!(answer.resolved_ambiguity_type, Some(AmbiguityType::BudgetInterpretation));

    let exchange = &answer.context.clarification_history[0];
    assert_eq!(exchange.question, question);
    assert_eq!(exchange.asked_about, Some(AmbiguityType::BudgetInterpretation));
    assert_eq!(exchange.resolved_ambiguity_type, Some(AmbiguityType::BudgetInterpretation));
    assert_eq!(
        answer.context.user_preferences.get("budget_interpretation").map(String::as_str),
        Some("$5000 total, about $20 each")
    );
    assert!(answer.health.progress_score > 0.0);

    // the extractor sees the prior understanding and the new answer
    let requests = fake.requests();
    assert!(requests[0].prior_understanding.is_none());
    assert!(requests[1].prior_understanding.is_some());
    assert_eq!(requests[1].history.len(), 1);
    assert_eq!(requests[1].query, "$5000 total, about $20 each");
}

#[tokio::test]
async fn test_answer_state_path_walks_two_edges() {
    let fake = Arc::new(
        FakeExtractor::new()
            .reply(understanding(0.6, json!([budget(), quantity()])))
            .reply(understanding(0.82, json!([]))),
    );
    let engine = engine_with(fake, fast_config());

    let first = engine.process_turn("water bottles", None).await.unwrap();
    assert_eq!(
        first.transitions,
        vec![(ConversationState::Discovery, ConversationState::Clarification)]
    );
    let second = engine.process_turn("it's $5000 total", Some(&first.context)).await.unwrap();
    assert_eq!(
        second.transitions,
        vec![
            (ConversationState::Clarification, ConversationState::Confirmation),
            (ConversationState::Confirmation, ConversationState::Specification),
        ]
    );
}

#[tokio::test]
async fn test_confidence_drop_after_specification_asks_again() {
    let fake = Arc::new(
        FakeExtractor::new()
            .reply(understanding(0.9, json!([])))
            .reply(understanding(0.4, json!([]))),
    );
    let engine = engine_with(fake, fast_config());

    let first = engine.process_turn("300 enamel pins", None).await.unwrap();
    assert_eq!(first.context.state, ConversationState::Specification);

    let second = engine
        .process_turn("actually, not sure anymore", Some(&first.context))
        .await
        .unwrap();
    assert_eq!(second.context.state, ConversationState::Clarification);
    assert_eq!(second.outcome, TurnOutcome::Continue);
    assert!(second.needs_clarification);
    assert_eq!(second.clarification_questions.len(), 1);
    assert_eq!(second.clarification_questions[0].question, FALLBACK_QUESTION);
}

#[tokio::test]
async fn test_turn_number_increments_once_per_turn() {
    let fake = Arc::new(FakeExtractor::new().reply(understanding(0.5, json!([quantity()]))));
    let engine = engine_with(fake, fast_config());

    let mut turn = engine.process_turn("bottles", None).await.unwrap();
    let id = turn.context.conversation_id.clone();
    for expected in 2..=4u32 {
        turn = engine.process_turn("still not sure", Some(&turn.context)).await.unwrap();
        assert_eq!(turn.context.turn_number, expected);
        assert_eq!(turn.context.turn_log.len(), expected as usize);
        assert_eq!(turn.context.conversation_id, id);
    }
}

// ============================================================================
// Stuck conversations
// ============================================================================

#[tokio::test]
async fn test_repeated_budget_question_switches_to_direct_choice() {
    let fake = Arc::new(FakeExtractor::new().reply(understanding(0.5, json!([budget()]))));
    let engine = engine_with(fake, fast_config());

    let mut turn = engine.process_turn("bottles, $5000", None).await.unwrap();
    assert!(!turn.health.stuck_indicator);
    for _ in 0..2 {
        let question = turn.clarification_questions[0].question.clone();
        let answer = engine
            .process_clarification_answer("not sure yet", &question, &turn.context)
            .await
            .unwrap();
        assert!(answer.resolved_ambiguity_type.is_none());
        turn = engine.process_turn("not sure yet", Some(&answer.context)).await.unwrap();
    }

    assert!(turn.health.stuck_indicator);
    assert_eq!(
        turn.health.stuck_reason,
        Some(StuckReason::RepeatedSubject(AmbiguityType::BudgetInterpretation))
    );
    assert!(turn.health.recommended_intervention.as_deref().is_some_and(|s| !s.is_empty()));
    assert_eq!(turn.clarification_questions.len(), 1);
    let direct = &turn.clarification_questions[0];
    assert_eq!(direct.question_type, QuestionType::MultipleChoice);
    assert!(direct.options.as_ref().is_some_and(|o| o.iter().any(|s| s == OTHER_OPTION)));
    assert_eq!(turn.outcome, TurnOutcome::Continue);
}

#[tokio::test]
async fn test_turn_ceiling_escalates() {
    let fake = Arc::new(
        FakeExtractor::new()
            .reply(understanding(0.4, json!([ambiguity_of("product_category")])))
            .reply(understanding(0.4, json!([ambiguity_of("timeline_urgency")])))
            .reply(understanding(0.4, json!([ambiguity_of("recipient_specification")]))),
    );
    let mut config = fast_config();
    config.health.turn_ceiling = 2;
    let engine = engine_with(fake, config);

    let first = engine.process_turn("gifts", None).await.unwrap();
    let second = engine.process_turn("for an event", Some(&first.context)).await.unwrap();
    assert_eq!(second.outcome, TurnOutcome::Continue);

    let third = engine.process_turn("soon", Some(&second.context)).await.unwrap();
    assert_eq!(third.outcome, TurnOutcome::Escalate);
    assert_eq!(third.health.stuck_reason, Some(StuckReason::TurnCeiling));
    assert!(third.health.needs_handoff());
    assert_eq!(third.response, narrate_handoff());
}

// ============================================================================
// Failure paths
// ============================================================================

#[tokio::test]
async fn test_extraction_exhaustion_degrades_first_turn() {
    let fake = Arc::new(FakeExtractor::new().fail(ExtractorError::Service("model offline".into())));
    let engine = engine_with(fake.clone(), fast_config());

    let turn = engine.process_turn("some gifts", None).await.unwrap();

    assert_eq!(turn.outcome, TurnOutcome::Degraded);
    assert!(turn.needs_clarification);
    assert!(turn.confidence.overall <= 0.1);
    assert!(!turn.ready_for_recommendations());
    assert_eq!(turn.clarification_questions[0].question, FALLBACK_QUESTION);
    assert_eq!(turn.context.turn_number, 1);
    assert!(turn.context.validate().is_ok());
    assert_eq!(fake.extract_calls(), 3);
    assert!(engine.in_flight().is_empty());
}

#[tokio::test]
async fn test_extraction_exhaustion_keeps_existing_context() {
    let fake = Arc::new(
        FakeExtractor::new()
            .reply(understanding(0.6, json!([quantity()])))
            .fail(ExtractorError::Timeout),
    );
    let engine = engine_with(fake, fast_config());

    let first = engine.process_turn("bottles", None).await.unwrap();
    let second = engine.process_turn("about 300", Some(&first.context)).await.unwrap();

    assert_eq!(second.outcome, TurnOutcome::Degraded);
    assert_eq!(second.context, first.context);
    assert!(second.needs_clarification);
}

#[tokio::test]
async fn test_schema_violation_rejected_after_one_retry() {
    let mut bad = understanding(0.6, json!([]));
    bad["sentiment"] = json!("excited");
    let fake = Arc::new(FakeExtractor::new().reply(bad));
    let engine = engine_with(fake.clone(), fast_config());

    let err = engine.process_turn("bottles", None).await.unwrap_err();

    assert!(matches!(err, ParleyError::Validation(_)));
    assert_eq!(err.category(), ErrorCategory::Recoverable);
    assert_eq!(fake.extract_calls(), 2);
}

#[tokio::test]
async fn test_unknown_enum_value_is_validation_error() {
    let mut bad = understanding(0.6, json!([]));
    bad["ambiguities"] = json!([{
        "type": "color_preference",
        "description": "unclear",
        "confidence": 0.5,
        "impact": "low",
        "resolutionUrgency": "helpful"
    }]);
    let fake = Arc::new(FakeExtractor::new().reply(bad));
    let engine = engine_with(fake, fast_config());

    let err = engine.process_turn("bottles", None).await.unwrap_err();
    assert!(matches!(err, ParleyError::Validation(_)));
}

#[tokio::test]
async fn test_turn_timeout_leaves_context_untouched() {
    let fake = Arc::new(
        FakeExtractor::new()
            .reply(understanding(0.6, json!([quantity()])))
            .delayed(Duration::from_millis(300), understanding(0.9, json!([]))),
    );
    let mut config = fast_config();
    config.extraction.turn_timeout_ms = 50;
    let engine = engine_with(fake, config);

    let first = engine.process_turn("bottles", None).await.unwrap();
    let snapshot = first.context.clone();

    let err = engine.process_turn("300 of them", Some(&first.context)).await.unwrap_err();

    assert!(matches!(err, ParleyError::TurnTimeout(50)));
    assert!(err.is_recoverable());
    assert_eq!(first.context, snapshot);
    assert!(engine.in_flight().is_empty());
}

#[tokio::test]
async fn test_concurrent_turn_for_same_conversation_rejected() {
    let fake = Arc::new(
        FakeExtractor::new()
            .reply(understanding(0.6, json!([quantity()])))
            .delayed(Duration::from_millis(200), understanding(0.6, json!([quantity()]))),
    );
    let engine = Arc::new(engine_with(fake, fast_config()));

    let first = engine.process_turn("bottles", None).await.unwrap();
    let context = first.context.clone();

    let slow = {
        let engine = Arc::clone(&engine);
        let context = context.clone();
        tokio::spawn(async move { engine.process_turn("about 300", Some(&context)).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(engine.in_flight().is_active(&context.conversation_id));

    let err = engine.process_turn("actually 400", Some(&context)).await.unwrap_err();
    assert!(matches!(err, ParleyError::TurnInFlight(ref id) if *id == context.conversation_id));
    assert!(err.is_recoverable());

    let finished = slow.await.unwrap().unwrap();
    assert_eq!(finished.context.turn_number, 2);
    assert!(engine.in_flight().is_empty());
}

#[tokio::test]
async fn test_corrupted_context_rejected_before_extraction() {
    let fake = Arc::new(FakeExtractor::new().reply(understanding(0.6, json!([quantity()]))));
    let engine = engine_with(fake.clone(), fast_config());

    let first = engine.process_turn("bottles", None).await.unwrap();
    let mut tampered = first.context.clone();
    tampered.turn_number = 5;

    let err = engine.process_turn("more", Some(&tampered)).await.unwrap_err();

    assert!(matches!(err, ParleyError::StateInvariant(_)));
    assert_eq!(err.category(), ErrorCategory::Corrupted);
    assert_eq!(fake.extract_calls(), 1);
}
