//! Conversation Engine
//!
//! One turn:
//! 1. Validate the caller's context and claim the conversation id
//! 2. Extraction, context analysis and business insight run concurrently
//! 3. Ambiguity analysis, context merge, state machine walk
//! 4. Question selection, turn record, health assessment
//! 5. Response composition
//!
//! Invariants:
//! - The caller's context is never modified; each turn returns a new value
//! - One turn in flight per conversation id
//! - A timed-out turn changes nothing

use super::extraction::{extract_understanding, fetch_business_insight, fetch_context, RetryPolicy};
use super::extractor::{BusinessInsight, ContextInsight, ExtractionRequest, UnderstandingExtractor};
use crate::config::EngineConfig;
use crate::in_flight::InFlightTurns;
use parley_shared::ambiguity::{analyze, AmbiguityType};
use parley_shared::clarify::{select_direct_question, select_questions, ClarificationQuestion};
use parley_shared::context::{
    merge_context, new_conversation_id, start_context, ClarificationExchange, ConversationContext,
    TurnRecord,
};
use parley_shared::error::{ParleyError, ParleyResult};
use parley_shared::health::{self, Intervention};
use parley_shared::narrator;
use parley_shared::patterns::{EventType, Industry, RecipientType};
use parley_shared::state_machine::{self, ConversationState, TransitionInput};
use parley_shared::turn::{
    fallback_question, ClarificationResponse, ConfidenceSummary, TurnOutcome, TurnResponse,
    FALLBACK_QUESTION,
};
use parley_shared::understanding::{Understanding, FALLBACK_CONFIDENCE};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// External capabilities the engine calls through
#[derive(Clone)]
pub struct AnalysisServices {
    pub extractor: Arc<dyn UnderstandingExtractor>,
}

impl AnalysisServices {
    pub fn new(extractor: Arc<dyn UnderstandingExtractor>) -> Self {
        Self { extractor }
    }
}

type Gathered = (ParleyResult<Understanding>, ContextInsight, Option<BusinessInsight>);

pub struct ConversationEngine {
    services: AnalysisServices,
    config: EngineConfig,
    policy: RetryPolicy,
    in_flight: InFlightTurns,
}

impl ConversationEngine {
    pub fn new(services: AnalysisServices, config: EngineConfig) -> Self {
        let policy = RetryPolicy::from(&config.extraction);
        Self {
            services,
            config,
            policy,
            in_flight: InFlightTurns::new(),
        }
    }

    pub fn with_defaults(services: AnalysisServices) -> Self {
        Self::new(services, EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn in_flight(&self) -> &InFlightTurns {
        &self.in_flight
    }

    /// Process a free-text message, starting a conversation when `context` is `None`
    pub async fn process_turn(
        &self,
        message: &str,
        context: Option<&ConversationContext>,
    ) -> ParleyResult<TurnResponse> {
        self.run_turn(message, context, None).await
    }

    /// Process the user's answer to `question_asked`.
    ///
    /// The answer is recorded in the clarification history together with the
    /// ambiguity the question was about and, when the answer made it go away,
    /// `resolvedAmbiguityType`.
    pub async fn process_clarification_answer(
        &self,
        answer: &str,
        question_asked: &str,
        context: &ConversationContext,
    ) -> ParleyResult<ClarificationResponse> {
        let asked_about = context
            .ambiguity_for_question(question_asked)
            .filter(|kind| *kind != AmbiguityType::None);
        let exchange = ClarificationExchange::new(question_asked, answer).about(asked_about);
        let turn = self.run_turn(answer, Some(context), Some(exchange)).await?;
        Ok(turn.into())
    }

    async fn run_turn(
        &self,
        message: &str,
        previous: Option<&ConversationContext>,
        exchange: Option<ClarificationExchange>,
    ) -> ParleyResult<TurnResponse> {
        if let Some(ctx) = previous {
            ctx.validate()?;
        }
        let conversation_id = previous
            .map(|c| c.conversation_id.clone())
            .unwrap_or_else(new_conversation_id);
        let _guard = self.in_flight.acquire(&conversation_id)?;

        let start_time = Instant::now();
        let turn = previous.map_or(1, |c| c.turn_number.saturating_add(1));
        info!(conversation = %conversation_id, turn, "Turn started");

        let mut history = previous
            .map(|c| c.clarification_history.clone())
            .unwrap_or_default();
        history.extend(exchange.iter().cloned());
        let request = ExtractionRequest {
            query: message.to_string(),
            prior_understanding: previous.map(|c| c.current_understanding.clone()),
            history,
        };

        let (candidate, context_insight, business) = self.gather(&request).await?;

        let mut understanding = match candidate {
            Ok(u) => u,
            Err(ParleyError::Extraction(reason)) => {
                warn!(
                    conversation = %conversation_id,
                    "Extraction exhausted ({}), asking a generic question",
                    reason
                );
                return Ok(self.degraded_turn(conversation_id, message, previous));
            }
            Err(e) => return Err(e),
        };
        enrich(&mut understanding, &context_insight);

        // Did the answer make the asked-about ambiguity go away?
        let mut exchange = exchange;
        let mut resolved = None;
        if let Some(ex) = exchange.as_mut() {
            if let Some(kind) = ex.asked_about.filter(|k| !understanding.has_ambiguity(*k)) {
                ex.resolved_ambiguity_type = Some(kind);
                resolved = Some((kind, ex.answer.clone()));
            }
        }

        let analysis = analyze(&understanding.ambiguities);

        let mut context = match previous {
            Some(prev) => merge_context(Some(prev), understanding, exchange)?,
            None => start_context(Some(conversation_id.clone()), understanding),
        };
        if let Some((kind, answer)) = &resolved {
            info!(conversation = %conversation_id, "Answer resolved {}", kind);
            context.user_preferences.insert(kind.to_string(), answer.clone());
        }

        let current = &context.current_understanding;
        let input = TransitionInput {
            ambiguity_score: analysis.overall_ambiguity_score,
            confidence: current.confidence.overall,
            ambiguity_count: current.ambiguities.len(),
            new_ambiguity: previous.is_some() && !context.new_ambiguity_types().is_empty(),
        };
        let transition = state_machine::evaluate(context.state, &input)?;
        for (from, to) in &transition.path {
            info!(conversation = %conversation_id, "State {} -> {}", from, to);
        }
        context.state = transition.to;

        let mut questions = if context.state == ConversationState::Clarification {
            let selected = select_questions(
                &analysis.clarification_priority,
                self.config.clarification.max_questions,
            );
            if selected.is_empty() {
                vec![fallback_question()]
            } else {
                selected
            }
        } else {
            Vec::new()
        };

        context.turn_log.push(TurnRecord {
            turn_number: context.turn_number,
            state: context.state,
            confidence: context.current_understanding.confidence.overall,
            ambiguity_types: context.current_understanding.ambiguity_types(),
            asked_about: Vec::new(),
            questions: Vec::new(),
        });
        record_questions(&mut context, &questions);

        let health = health::assess(&context, self.config.health.turn_ceiling);
        if health.stuck_indicator {
            warn!(
                conversation = %conversation_id,
                reason = ?health.stuck_reason,
                "Conversation stuck: {}",
                health.recommended_intervention.as_deref().unwrap_or_default()
            );
        }
        if health.intervention == Some(Intervention::DirectMultipleChoice)
            && context.state == ConversationState::Clarification
        {
            if let Some(direct) = select_direct_question(&analysis.clarification_priority) {
                questions = vec![direct];
                record_questions(&mut context, &questions);
            }
        }

        let ready = context.current_understanding.ready_for_recommendations();
        let outcome = if health.needs_handoff() {
            TurnOutcome::Escalate
        } else if ready {
            TurnOutcome::Ready
        } else {
            TurnOutcome::Continue
        };

        let current = &context.current_understanding;
        let response = match outcome {
            TurnOutcome::Escalate => narrator::narrate_handoff(),
            TurnOutcome::Ready => match business.as_ref() {
                Some(b) => {
                    narrator::narrate_ready(current, Some(&b.summary), &b.suggested_products)
                }
                None => narrator::narrate_ready(current, None, &[]),
            },
            _ if context.state == ConversationState::Clarification => {
                narrator::narrate_clarification(current, &questions)
            }
            _ => narrator::narrate_confirmation(current),
        };

        info!(
            conversation = %conversation_id,
            turn = context.turn_number,
            state = %context.state,
            outcome = ?outcome,
            questions = questions.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Turn complete"
        );

        Ok(TurnResponse {
            response,
            understanding: context.current_understanding.clone(),
            needs_clarification: context.state == ConversationState::Clarification,
            clarification_questions: questions,
            confidence: ConfidenceSummary {
                overall: context.current_understanding.confidence.overall,
                ready_to_recommend: ready,
            },
            health,
            outcome,
            transitions: transition.path,
            resolved_ambiguity_type: resolved.map(|(kind, _)| kind),
            context,
        })
    }

    /// Fan out the three reads and join them under the turn deadline
    async fn gather(&self, request: &ExtractionRequest) -> ParleyResult<Gathered> {
        let extractor = self.services.extractor.as_ref();
        let call_timeout = self.policy.call_timeout;
        let fan_out = async {
            tokio::join!(
                extract_understanding(extractor, request, &self.policy),
                fetch_context(extractor, &request.query, call_timeout),
                fetch_business_insight(
                    extractor,
                    &request.query,
                    request.prior_understanding.as_ref(),
                    call_timeout
                ),
            )
        };

        let turn_timeout_ms = self.config.extraction.turn_timeout_ms;
        tokio::time::timeout(self.config.extraction.turn_timeout(), fan_out)
            .await
            .map_err(|_| {
                warn!("Turn exceeded {}ms deadline", turn_timeout_ms);
                ParleyError::TurnTimeout(turn_timeout_ms)
            })
    }

    /// Safe clarification turn after extraction gave up.
    ///
    /// An existing context comes back unchanged; a first turn gets a fresh
    /// context holding a placeholder understanding.
    fn degraded_turn(
        &self,
        conversation_id: String,
        message: &str,
        previous: Option<&ConversationContext>,
    ) -> TurnResponse {
        let context = match previous {
            Some(ctx) => ctx.clone(),
            None => {
                let mut ctx =
                    start_context(Some(conversation_id), Understanding::placeholder(message));
                ctx.turn_log.push(TurnRecord {
                    turn_number: ctx.turn_number,
                    state: ctx.state,
                    confidence: FALLBACK_CONFIDENCE,
                    ambiguity_types: Vec::new(),
                    asked_about: vec![AmbiguityType::None],
                    questions: vec![FALLBACK_QUESTION.to_string()],
                });
                ctx
            }
        };
        let health = health::assess(&context, self.config.health.turn_ceiling);
        let mut response = TurnResponse::fallback(context);
        response.health = health;
        response
    }
}

/// Keep the turn record's question columns aligned with `questions`
fn record_questions(context: &mut ConversationContext, questions: &[ClarificationQuestion]) {
    if let Some(record) = context.turn_log.last_mut() {
        record.asked_about = questions.iter().map(|q| q.ambiguity_type).collect();
        record.questions = questions.iter().map(|q| q.question.clone()).collect();
    }
}

/// Fill classification gaps from the context analysis
fn enrich(understanding: &mut Understanding, insight: &ContextInsight) {
    if understanding.industry_context == Industry::Unknown {
        understanding.industry_context = insight.industry;
    }
    if understanding.event_type == EventType::Unknown {
        understanding.event_type = insight.event_type;
    }
    if understanding.recipient_type == RecipientType::Unknown {
        understanding.recipient_type = insight.recipient_type;
    }
    debug!(
        industry = ?understanding.industry_context,
        event = ?understanding.event_type,
        recipient = ?understanding.recipient_type,
        "classification after enrichment"
    );
}
