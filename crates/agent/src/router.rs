//! Top-level turn routing.
//!
//! States per turn, evaluated strictly in order, first reply wins:
//! 1. An open clarification for a signed-in caller is resolved first.
//! 2. A trusted classified intent with a dedicated handler runs next.
//! 3. Everything else goes to retrieval-augmented or open generation.
//! 4. A provenance record is handed to the persistence sink regardless of
//!    path; sink failures never change the reply already computed.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use helply_core::chrono::{Duration as ChronoDuration, Utc};
use helply_core::config::AppConfig;
use helply_core::matching::{self, ContextChange};
use helply_core::{
    assemble_context, CanonicalIntent, ChunkRef, ContextTag, DialogueStore, HeuristicEstimator,
    OrderStore, Reply, RetrievedChunk, Turn, TurnRecord, TurnSink,
};

use crate::classify::{IntentClassifier, IntentResolver};
use crate::generate::{GenerationOrchestrator, GenerationOutcome, Generator, RATE_LIMIT_APOLOGY};
use crate::prompts;
use crate::retrieve::Retriever;

pub const GREETING_REPLY: &str = "Hello! 👋 How can I help you today?";
pub const GOODBYE_REPLY: &str = "Goodbye! Have a great day.";
pub const COMPLAINT_REPLY: &str =
    "I apologize for the inconvenience. I can escalate this to a human agent if you'd like.";
pub const SIGN_IN_REQUIRED_REPLY: &str =
    "Please sign in so I can look up your order details.";
pub const ORDERS_UNAVAILABLE_REPLY: &str =
    "Sorry, I couldn't fetch your order details right now.";
pub const ITEM_NAME_PROMPT_REPLY: &str = "What item would you like to order?";
pub const RAG_FALLBACK_REPLY: &str =
    "I don't know the answer to that based on the information I have.";
pub const GENERAL_FALLBACK_REPLY: &str =
    "I'm having trouble connecting right now. Please try again shortly.";

const NEW_ORDER_STATUS: &str = "Processing";
const NEW_ORDER_DELIVERY_DAYS: i64 = 5;

/// Engine tunables, all sourced from configuration rather than call sites.
#[derive(Clone, Copy, Debug)]
pub struct EngineSettings {
    pub confidence_threshold: f32,
    pub top_k: u32,
    pub score_threshold: f32,
    pub max_prompt_tokens: usize,
    pub max_retries: u32,
    pub max_response_tokens: u32,
    pub temperature: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.40,
            top_k: 3,
            score_threshold: 0.25,
            max_prompt_tokens: 8000,
            max_retries: 3,
            max_response_tokens: 500,
            temperature: 0.3,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            confidence_threshold: config.nlu.confidence_threshold,
            top_k: config.retrieval.top_k,
            score_threshold: config.retrieval.score_threshold,
            max_prompt_tokens: config.llm.max_prompt_tokens as usize,
            max_retries: config.llm.max_retries,
            max_response_tokens: config.llm.max_response_tokens,
            temperature: config.llm.temperature,
        }
    }
}

/// Injected collaborator capabilities.
pub struct EngineDeps {
    pub classifier: Arc<dyn IntentClassifier>,
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn Generator>,
    pub orders: Arc<dyn OrderStore>,
    pub dialogue: Arc<dyn DialogueStore>,
    pub sink: Arc<dyn TurnSink>,
}

/// One finished turn: the caller-facing reply plus the id the audit trail
/// assigned to it (absent when persistence failed).
#[derive(Clone, Debug, PartialEq)]
pub struct CompletedTurn {
    pub reply: Reply,
    pub query_id: Option<String>,
}

struct HandlerOutput {
    reply: Reply,
    model_text: Option<String>,
}

impl HandlerOutput {
    fn plain(reply: Reply) -> Self {
        Self { reply, model_text: None }
    }
}

pub struct TurnEngine {
    resolver: IntentResolver,
    retriever: Arc<dyn Retriever>,
    orchestrator: GenerationOrchestrator,
    orders: Arc<dyn OrderStore>,
    dialogue: Arc<dyn DialogueStore>,
    sink: Arc<dyn TurnSink>,
    estimator: HeuristicEstimator,
    settings: EngineSettings,
}

impl TurnEngine {
    pub fn new(deps: EngineDeps, settings: EngineSettings) -> Self {
        Self {
            resolver: IntentResolver::new(deps.classifier),
            retriever: deps.retriever,
            orchestrator: GenerationOrchestrator::new(
                deps.generator,
                settings.max_retries,
                settings.max_response_tokens,
                settings.temperature,
            ),
            orders: deps.orders,
            dialogue: deps.dialogue,
            sink: deps.sink,
            estimator: HeuristicEstimator,
            settings,
        }
    }

    /// Run one turn to completion. Always produces a non-empty reply; every
    /// collaborator failure degrades the reply instead of aborting the turn.
    pub async fn handle_turn(&self, turn: &Turn, user_id: Option<&str>) -> CompletedTurn {
        let email = turn.caller.as_ref().and_then(|caller| caller.email());
        let mut confidence = None;

        let context = match self.dialogue.get(&turn.session_id).await {
            Ok(tag) => tag,
            Err(error) => {
                warn!(
                    event_name = "engine.dialogue.read_failed",
                    session_id = %turn.session_id,
                    error = %error,
                    "dialogue context read failed; continuing without context"
                );
                None
            }
        };

        let mut output = None;
        if context == Some(ContextTag::AwaitingClarification) {
            if let Some(email) = email {
                output = Some(self.resolve_clarification(turn, email, &mut confidence).await);
            }
        }

        let output = match output {
            Some(output) => output,
            None => {
                let result = self.resolver.resolve(&turn.text).await;
                confidence = Some(result.confidence);
                if result.is_trusted(self.settings.confidence_threshold)
                    && result.intent.has_structured_handler()
                {
                    self.handle_structured(turn, result.intent, email).await
                } else {
                    self.answer_with_generation(&turn.text).await
                }
            }
        };

        let HandlerOutput { reply, model_text } = output;
        info!(
            event_name = "engine.turn.resolved",
            session_id = %turn.session_id,
            intent = reply.intent.as_str(),
            success = reply.success,
            "turn resolved"
        );

        let record = TurnRecord {
            user_id: user_id.map(str::to_string),
            session_id: turn.session_id.clone(),
            transcript: turn.text.clone(),
            intent: reply.intent,
            reply: reply.text.clone(),
            model_text,
            sources: reply.sources.clone(),
            confidence,
            model_ms: reply.model_ms,
            success: reply.success,
        };
        let query_id = match self.sink.record(&record).await {
            Ok(id) => Some(id),
            Err(error) => {
                warn!(
                    event_name = "engine.persist.failed",
                    session_id = %turn.session_id,
                    error = %error,
                    "failed to persist turn record"
                );
                None
            }
        };

        CompletedTurn { reply, query_id }
    }

    /// Step 1: the turn answers an open clarification.
    ///
    /// On a match the context clears. On no match, a trusted non-tracking,
    /// non-general intent abandons the stale clarification and is handled
    /// normally; anything else re-asks and leaves the context open.
    async fn resolve_clarification(
        &self,
        turn: &Turn,
        email: &str,
        confidence: &mut Option<f32>,
    ) -> HandlerOutput {
        let candidates = match self.orders.recent_for_owner(email).await {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(
                    event_name = "engine.orders.read_failed",
                    error = %error,
                    "order lookup failed during clarification"
                );
                return HandlerOutput::plain(failed_reply(
                    ORDERS_UNAVAILABLE_REPLY,
                    CanonicalIntent::TrackOrder,
                ));
            }
        };

        let outcome = matching::resolve_answer(&turn.text, &candidates);
        if outcome.matched.is_some() {
            self.apply_context_change(&turn.session_id, outcome.context).await;
            return HandlerOutput::plain(Reply::structured(
                outcome.reply,
                CanonicalIntent::TrackOrder,
            ));
        }

        let result = self.resolver.resolve(&turn.text).await;
        *confidence = Some(result.confidence);
        if result.is_trusted(self.settings.confidence_threshold)
            && overrides_open_clarification(result.intent)
        {
            self.apply_context_change(&turn.session_id, ContextChange::Clear).await;
            return self.handle_structured(turn, result.intent, Some(email)).await;
        }

        HandlerOutput::plain(Reply::structured(outcome.reply, CanonicalIntent::TrackOrder))
    }

    /// Step 2: dedicated handlers for trusted intents.
    async fn handle_structured(
        &self,
        turn: &Turn,
        intent: CanonicalIntent,
        email: Option<&str>,
    ) -> HandlerOutput {
        match intent {
            CanonicalIntent::Greeting => {
                HandlerOutput::plain(Reply::structured(GREETING_REPLY, intent))
            }
            CanonicalIntent::Goodbye => {
                HandlerOutput::plain(Reply::structured(GOODBYE_REPLY, intent))
            }
            CanonicalIntent::Complaint => {
                HandlerOutput::plain(Reply::structured(COMPLAINT_REPLY, intent))
            }
            CanonicalIntent::TrackOrder
            | CanonicalIntent::CreateOrder
            | CanonicalIntent::CountOrders => {
                let Some(email) = email else {
                    return HandlerOutput::plain(Reply::structured(SIGN_IN_REQUIRED_REPLY, intent));
                };
                match intent {
                    CanonicalIntent::TrackOrder => self.track_order(turn, email).await,
                    CanonicalIntent::CreateOrder => self.create_order(turn, email).await,
                    _ => self.count_orders(email).await,
                }
            }
            CanonicalIntent::GeneralQuestion => self.answer_with_generation(&turn.text).await,
        }
    }

    async fn track_order(&self, turn: &Turn, email: &str) -> HandlerOutput {
        let candidates = match self.orders.recent_for_owner(email).await {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(
                    event_name = "engine.orders.read_failed",
                    error = %error,
                    "order lookup failed"
                );
                return HandlerOutput::plain(failed_reply(
                    ORDERS_UNAVAILABLE_REPLY,
                    CanonicalIntent::TrackOrder,
                ));
            }
        };

        let outcome = matching::resolve_intent(&turn.text, &candidates);
        self.apply_context_change(&turn.session_id, outcome.context).await;
        HandlerOutput::plain(Reply::structured(outcome.reply, CanonicalIntent::TrackOrder))
    }

    async fn create_order(&self, turn: &Turn, email: &str) -> HandlerOutput {
        let prompt = prompts::extraction_prompt(&turn.text);
        let started = Instant::now();
        let outcome = self.orchestrator.complete(&prompt).await;
        let model_ms = started.elapsed().as_millis() as u64;

        let (item, model_text) = match outcome {
            GenerationOutcome::Text(raw) => {
                (prompts::parse_extracted_item(&raw), Some(raw))
            }
            _ => (None, None),
        };

        let Some(item) = item else {
            // Extraction fails soft: ask for the item instead of erroring.
            let mut reply = Reply::structured(ITEM_NAME_PROMPT_REPLY, CanonicalIntent::CreateOrder);
            reply.model_ms = Some(model_ms);
            return HandlerOutput { reply, model_text };
        };

        let delivery_date =
            (Utc::now() + ChronoDuration::days(NEW_ORDER_DELIVERY_DAYS)).format("%Y-%m-%d");
        let inserted = self
            .orders
            .insert(email, &item, NEW_ORDER_STATUS, &delivery_date.to_string())
            .await;

        let mut reply = match inserted {
            Ok(order) => Reply::structured(
                format!(
                    "I've placed your order for {}. Expected delivery: {}.",
                    order.item_name, order.delivery_date
                ),
                CanonicalIntent::CreateOrder,
            ),
            Err(error) => {
                warn!(
                    event_name = "engine.orders.write_failed",
                    error = %error,
                    "order insert failed"
                );
                failed_reply(ORDERS_UNAVAILABLE_REPLY, CanonicalIntent::CreateOrder)
            }
        };
        reply.model_ms = Some(model_ms);
        HandlerOutput { reply, model_text }
    }

    async fn count_orders(&self, email: &str) -> HandlerOutput {
        let reply = match self.orders.count_for_owner(email).await {
            Ok(0) => Reply::structured(matching::NO_ORDERS_REPLY, CanonicalIntent::CountOrders),
            Ok(1) => {
                Reply::structured("You have 1 active order.", CanonicalIntent::CountOrders)
            }
            Ok(count) => Reply::structured(
                format!("You have {count} active orders."),
                CanonicalIntent::CountOrders,
            ),
            Err(error) => {
                warn!(
                    event_name = "engine.orders.read_failed",
                    error = %error,
                    "order count failed"
                );
                failed_reply(ORDERS_UNAVAILABLE_REPLY, CanonicalIntent::CountOrders)
            }
        };
        HandlerOutput::plain(reply)
    }

    /// Step 3: retrieval-augmented generation when a chunk clears the
    /// relevance threshold, open generation otherwise.
    async fn answer_with_generation(&self, question: &str) -> HandlerOutput {
        let chunks = match self.retriever.search(question, self.settings.top_k).await {
            Ok(chunks) => chunks,
            Err(error) => {
                warn!(
                    event_name = "engine.retrieve.failed",
                    error = %error,
                    "retrieval unavailable; treating as zero chunks"
                );
                Vec::new()
            }
        };

        let relevant: Vec<RetrievedChunk> = chunks
            .into_iter()
            .filter(|chunk| chunk.score >= self.settings.score_threshold)
            .collect();

        if relevant.is_empty() {
            self.generate_general(question).await
        } else {
            self.generate_grounded(question, &relevant).await
        }
    }

    async fn generate_grounded(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> HandlerOutput {
        let assembled = assemble_context(
            chunks,
            question,
            self.settings.max_prompt_tokens,
            &self.estimator,
        );
        let prompt = prompts::rag_prompt(question, &assembled.text);
        let sources: Vec<ChunkRef> = assembled.used.iter().map(ChunkRef::from).collect();

        let started = Instant::now();
        let outcome = self.orchestrator.complete(&prompt).await;
        let model_ms = started.elapsed().as_millis() as u64;

        let (text, model_text, success) = match outcome {
            GenerationOutcome::Text(text) => (text.clone(), Some(text), true),
            GenerationOutcome::RateLimitExhausted => (RATE_LIMIT_APOLOGY.to_string(), None, false),
            GenerationOutcome::Empty | GenerationOutcome::Failed(_) => {
                (RAG_FALLBACK_REPLY.to_string(), None, false)
            }
        };

        HandlerOutput {
            reply: Reply {
                text,
                intent: CanonicalIntent::GeneralQuestion,
                sources,
                model_ms: Some(model_ms),
                success,
            },
            model_text,
        }
    }

    async fn generate_general(&self, question: &str) -> HandlerOutput {
        let prompt = prompts::general_prompt(question);

        let started = Instant::now();
        let outcome = self.orchestrator.complete(&prompt).await;
        let model_ms = started.elapsed().as_millis() as u64;

        let (text, model_text, success) = match outcome {
            GenerationOutcome::Text(text) => (text.clone(), Some(text), true),
            GenerationOutcome::RateLimitExhausted => (RATE_LIMIT_APOLOGY.to_string(), None, false),
            GenerationOutcome::Empty | GenerationOutcome::Failed(_) => {
                (GENERAL_FALLBACK_REPLY.to_string(), None, false)
            }
        };

        HandlerOutput {
            reply: Reply {
                text,
                intent: CanonicalIntent::GeneralQuestion,
                sources: Vec::new(),
                model_ms: Some(model_ms),
                success,
            },
            model_text,
        }
    }

    async fn apply_context_change(&self, session_id: &str, change: ContextChange) {
        let tag = match change {
            ContextChange::Keep => return,
            ContextChange::Set(tag) => Some(tag),
            ContextChange::Clear => None,
        };
        if let Err(error) = self.dialogue.set(session_id, tag).await {
            // Lost disambiguation state is recoverable: the engine re-asks.
            warn!(
                event_name = "engine.dialogue.write_failed",
                session_id = %session_id,
                error = %error,
                "dialogue context write failed"
            );
        }
    }
}

fn overrides_open_clarification(intent: CanonicalIntent) -> bool {
    matches!(
        intent,
        CanonicalIntent::CreateOrder
            | CanonicalIntent::CountOrders
            | CanonicalIntent::Greeting
            | CanonicalIntent::Goodbye
            | CanonicalIntent::Complaint
    )
}

fn failed_reply(text: &str, intent: CanonicalIntent) -> Reply {
    Reply { text: text.to_string(), intent, sources: Vec::new(), model_ms: None, success: false }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use helply_core::{
        CallerIdentity, CanonicalIntent, ClassifyError, ContextTag, DialogueStore, GenerateError,
        OrderStore, RetrieveError, RetrievedChunk, StoreError, Turn, TurnRecord, TurnSink,
    };
    use helply_db::repositories::{InMemoryDialogueStore, InMemoryOrderStore, InMemoryTurnSink};

    use super::{
        CompletedTurn, EngineDeps, EngineSettings, TurnEngine, GENERAL_FALLBACK_REPLY,
        GOODBYE_REPLY, GREETING_REPLY, ITEM_NAME_PROMPT_REPLY, RATE_LIMIT_APOLOGY,
        SIGN_IN_REQUIRED_REPLY,
    };
    use crate::classify::{Classification, IntentClassifier};
    use crate::generate::Generator;
    use crate::retrieve::Retriever;

    struct FixedClassifier {
        label: &'static str,
        score: f32,
    }

    #[async_trait]
    impl IntentClassifier for FixedClassifier {
        async fn classify(
            &self,
            _text: &str,
            _candidate_labels: &[String],
            _hypothesis_template: &str,
        ) -> Result<Classification, ClassifyError> {
            Ok(Classification { labels: vec![self.label.to_string()], scores: vec![self.score] })
        }
    }

    struct StaticRetriever {
        chunks: Vec<RetrievedChunk>,
    }

    #[async_trait]
    impl Retriever for StaticRetriever {
        async fn search(
            &self,
            _query: &str,
            _top_k: u32,
        ) -> Result<Vec<RetrievedChunk>, RetrieveError> {
            Ok(self.chunks.clone())
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn search(
            &self,
            _query: &str,
            _top_k: u32,
        ) -> Result<Vec<RetrievedChunk>, RetrieveError> {
            Err(RetrieveError("index not loaded".to_string()))
        }
    }

    enum Script {
        Text(&'static str),
        Empty,
        Fail(&'static str),
        RateLimit,
    }

    struct ScriptedGenerator {
        script: Script,
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn complete(
            &self,
            _prompt: &str,
            _max_output_tokens: u32,
            _temperature: f32,
        ) -> Result<Option<String>, GenerateError> {
            match &self.script {
                Script::Text(text) => Ok(Some((*text).to_string())),
                Script::Empty => Ok(None),
                Script::Fail(message) => Err(GenerateError::Other((*message).to_string())),
                Script::RateLimit => Err(GenerateError::RateLimited { retry_after_secs: None }),
            }
        }
    }

    struct FailingSink;

    #[async_trait]
    impl TurnSink for FailingSink {
        async fn record(&self, _record: &TurnRecord) -> Result<String, StoreError> {
            Err(StoreError("audit table unavailable".to_string()))
        }
    }

    struct TestBed {
        engine: TurnEngine,
        dialogue: Arc<InMemoryDialogueStore>,
        orders: Arc<InMemoryOrderStore>,
        sink: Arc<InMemoryTurnSink>,
    }

    fn testbed(
        classifier: FixedClassifier,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        orders: Arc<InMemoryOrderStore>,
    ) -> TestBed {
        let dialogue = Arc::new(InMemoryDialogueStore::default());
        let sink = Arc::new(InMemoryTurnSink::default());
        let engine = TurnEngine::new(
            EngineDeps {
                classifier: Arc::new(classifier),
                retriever,
                generator,
                orders: orders.clone(),
                dialogue: dialogue.clone(),
                sink: sink.clone(),
            },
            EngineSettings { max_retries: 1, ..EngineSettings::default() },
        );
        TestBed { engine, dialogue, orders, sink }
    }

    fn caller() -> Option<CallerIdentity> {
        Some(CallerIdentity {
            subject_id: "subject-1".to_string(),
            email: Some("ada@example.com".to_string()),
            display_name: Some("Ada".to_string()),
        })
    }

    fn anonymous_caller() -> Option<CallerIdentity> {
        Some(CallerIdentity { subject_id: "subject-1".to_string(), email: None, display_name: None })
    }

    fn turn(text: &str, caller: Option<CallerIdentity>) -> Turn {
        Turn::new("sess-1", caller, text)
    }

    async fn seeded_orders(items: &[(&str, &str, &str)]) -> Arc<InMemoryOrderStore> {
        let store = Arc::new(InMemoryOrderStore::default());
        for (item, status, delivery) in items {
            store.insert("ada@example.com", item, status, delivery).await.expect("seed order");
        }
        store
    }

    fn chunk(id: &str, score: f32, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            id: id.to_string(),
            score,
            text: text.to_string(),
            source: "faq.md".to_string(),
        }
    }

    async fn handle(bed: &TestBed, turn: &Turn) -> CompletedTurn {
        bed.engine.handle_turn(turn, Some("user-1")).await
    }

    #[tokio::test]
    async fn low_confidence_bypasses_structured_handlers() {
        let orders = seeded_orders(&[("Laptop", "Processing", "May 1")]).await;
        let bed = testbed(
            FixedClassifier { label: "check order status", score: 0.1 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::Text("model answer") }),
            orders,
        );

        let completed = handle(&bed, &turn("where is my order", caller())).await;

        assert_eq!(completed.reply.text, "model answer");
        assert_eq!(completed.reply.intent, CanonicalIntent::GeneralQuestion);
        assert!(completed.reply.success);
    }

    #[tokio::test]
    async fn empty_retrieval_and_failing_generator_yield_the_fixed_fallback() {
        let bed = testbed(
            FixedClassifier { label: "ask a general question", score: 0.9 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::Fail("upstream 500") }),
            Arc::new(InMemoryOrderStore::default()),
        );

        let completed = handle(&bed, &turn("what are your hours?", caller())).await;

        assert_eq!(completed.reply.text, GENERAL_FALLBACK_REPLY);
        assert!(!completed.reply.success);
        assert!(completed.reply.sources.is_empty());
    }

    #[tokio::test]
    async fn retrieval_failure_degrades_to_the_general_path() {
        let bed = testbed(
            FixedClassifier { label: "ask a general question", score: 0.9 },
            Arc::new(FailingRetriever),
            Arc::new(ScriptedGenerator { script: Script::Text("general answer") }),
            Arc::new(InMemoryOrderStore::default()),
        );

        let completed = handle(&bed, &turn("what are your hours?", caller())).await;

        assert_eq!(completed.reply.text, "general answer");
        assert!(completed.reply.sources.is_empty());
    }

    #[tokio::test]
    async fn relevant_chunks_take_the_grounded_path_with_provenance() {
        let bed = testbed(
            FixedClassifier { label: "ask a general question", score: 0.9 },
            Arc::new(StaticRetriever {
                chunks: vec![chunk("12", 0.8, "Refunds take 5-7 business days.")],
            }),
            Arc::new(ScriptedGenerator { script: Script::Text("Per faq.md, 5-7 business days.") }),
            Arc::new(InMemoryOrderStore::default()),
        );

        let completed = handle(&bed, &turn("how long do refunds take?", caller())).await;

        assert!(completed.reply.success);
        assert_eq!(completed.reply.sources.len(), 1);
        assert_eq!(completed.reply.sources[0].source, "faq.md");
        assert!(completed.reply.model_ms.is_some());

        let records = bed.sink.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sources.len(), 1);
        assert_eq!(records[0].model_text.as_deref(), Some("Per faq.md, 5-7 business days."));
    }

    #[tokio::test]
    async fn low_scoring_chunks_do_not_count_as_relevant() {
        let bed = testbed(
            FixedClassifier { label: "ask a general question", score: 0.9 },
            Arc::new(StaticRetriever { chunks: vec![chunk("12", 0.05, "barely related")] }),
            Arc::new(ScriptedGenerator { script: Script::Text("general answer") }),
            Arc::new(InMemoryOrderStore::default()),
        );

        let completed = handle(&bed, &turn("something obscure", caller())).await;

        assert!(completed.reply.sources.is_empty());
        assert_eq!(completed.reply.text, "general answer");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_rate_limits_surface_the_apology() {
        let bed = testbed(
            FixedClassifier { label: "ask a general question", score: 0.9 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::RateLimit }),
            Arc::new(InMemoryOrderStore::default()),
        );

        let completed = handle(&bed, &turn("anything", caller())).await;

        assert_eq!(completed.reply.text, RATE_LIMIT_APOLOGY);
        assert!(!completed.reply.success);
    }

    #[tokio::test]
    async fn greeting_short_circuits_everything_downstream() {
        let bed = testbed(
            FixedClassifier { label: "greet the assistant", score: 0.95 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::Fail("should not be called") }),
            Arc::new(InMemoryOrderStore::default()),
        );

        let completed = handle(&bed, &turn("hi there", caller())).await;

        assert_eq!(completed.reply.text, GREETING_REPLY);
        assert_eq!(completed.reply.intent, CanonicalIntent::Greeting);
    }

    #[tokio::test]
    async fn structured_intents_require_a_signed_in_caller() {
        let bed = testbed(
            FixedClassifier { label: "check order status", score: 0.9 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::Empty }),
            Arc::new(InMemoryOrderStore::default()),
        );

        let completed = handle(&bed, &turn("where is my order", anonymous_caller())).await;

        assert_eq!(completed.reply.text, SIGN_IN_REQUIRED_REPLY);
        assert_eq!(completed.reply.intent, CanonicalIntent::TrackOrder);
    }

    #[tokio::test]
    async fn single_order_is_reported_without_clarification() {
        let orders = seeded_orders(&[("Laptop", "Processing", "May 1")]).await;
        let bed = testbed(
            FixedClassifier { label: "check order status", score: 0.9 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::Empty }),
            orders,
        );

        let completed = handle(&bed, &turn("where is my order", caller())).await;

        assert!(completed.reply.text.contains("Laptop"));
        assert!(completed.reply.text.contains("Processing"));
        assert!(completed.reply.text.contains("May 1"));
        assert_eq!(bed.dialogue.get("sess-1").await.expect("context"), None);
    }

    #[tokio::test]
    async fn ambiguous_orders_open_a_clarification_then_an_answer_resolves_it() {
        let orders = seeded_orders(&[
            ("Monitor", "Delivered", "April 2"),
            ("Mouse", "Shipped", "April 20"),
            ("Laptop", "Processing", "May 1"),
        ])
        .await;
        let bed = testbed(
            FixedClassifier { label: "check order status", score: 0.9 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::Empty }),
            orders,
        );

        let first = handle(&bed, &turn("track my order", caller())).await;
        assert!(first.reply.text.contains("Which order are you talking about?"));
        assert_eq!(
            bed.dialogue.get("sess-1").await.expect("context"),
            Some(ContextTag::AwaitingClarification)
        );

        let second = handle(&bed, &turn("the mouse one", caller())).await;
        assert!(second.reply.text.contains("Mouse"));
        assert!(second.reply.text.contains("Shipped"));
        assert_eq!(bed.dialogue.get("sess-1").await.expect("context"), None);
    }

    #[tokio::test]
    async fn unmatched_clarification_answer_re_asks_and_keeps_context() {
        let orders = seeded_orders(&[
            ("Monitor", "Delivered", "April 2"),
            ("Mouse", "Shipped", "April 20"),
        ])
        .await;
        let bed = testbed(
            FixedClassifier { label: "check order status", score: 0.9 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::Empty }),
            orders,
        );

        handle(&bed, &turn("track my order", caller())).await;
        let completed = handle(&bed, &turn("the keyboard one", caller())).await;

        assert!(completed.reply.text.contains("exact item name"));
        assert_eq!(
            bed.dialogue.get("sess-1").await.expect("context"),
            Some(ContextTag::AwaitingClarification)
        );
    }

    #[tokio::test]
    async fn trusted_unrelated_intent_abandons_a_stale_clarification() {
        let orders = seeded_orders(&[
            ("Monitor", "Delivered", "April 2"),
            ("Mouse", "Shipped", "April 20"),
        ])
        .await;
        let bed = testbed(
            FixedClassifier { label: "say goodbye", score: 0.9 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::Empty }),
            orders,
        );
        bed.dialogue
            .set("sess-1", Some(ContextTag::AwaitingClarification))
            .await
            .expect("seed context");

        let completed = handle(&bed, &turn("actually never mind, bye", caller())).await;

        assert_eq!(completed.reply.text, GOODBYE_REPLY);
        assert_eq!(bed.dialogue.get("sess-1").await.expect("context"), None);
    }

    #[tokio::test]
    async fn create_order_extracts_the_item_and_inserts_it() {
        let orders = Arc::new(InMemoryOrderStore::default());
        let bed = testbed(
            FixedClassifier { label: "place a new order", score: 0.9 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::Text("Laptop") }),
            orders,
        );

        let completed = handle(&bed, &turn("I'd like to buy a laptop", caller())).await;

        assert!(completed.reply.text.contains("Laptop"));
        assert!(completed.reply.success);
        let owned = bed.orders.recent_for_owner("ada@example.com").await.expect("orders");
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].item_name, "Laptop");
        assert_eq!(owned[0].status, "Processing");
    }

    #[tokio::test]
    async fn create_order_fails_soft_when_extraction_yields_nothing() {
        let orders = Arc::new(InMemoryOrderStore::default());
        let bed = testbed(
            FixedClassifier { label: "place a new order", score: 0.9 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::Text("None") }),
            orders,
        );

        let completed = handle(&bed, &turn("I want to order something", caller())).await;

        assert_eq!(completed.reply.text, ITEM_NAME_PROMPT_REPLY);
        assert!(bed.orders.recent_for_owner("ada@example.com").await.expect("orders").is_empty());
    }

    #[tokio::test]
    async fn count_orders_reports_the_owner_scoped_total() {
        let orders = seeded_orders(&[
            ("Monitor", "Delivered", "April 2"),
            ("Mouse", "Shipped", "April 20"),
        ])
        .await;
        let bed = testbed(
            FixedClassifier { label: "count their orders", score: 0.9 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::Empty }),
            orders,
        );

        let completed = handle(&bed, &turn("how many orders do I have?", caller())).await;

        assert_eq!(completed.reply.text, "You have 2 active orders.");
    }

    #[tokio::test]
    async fn persistence_failure_never_changes_the_reply() {
        let dialogue = Arc::new(InMemoryDialogueStore::default());
        let engine = TurnEngine::new(
            EngineDeps {
                classifier: Arc::new(FixedClassifier { label: "greet the assistant", score: 0.9 }),
                retriever: Arc::new(StaticRetriever { chunks: Vec::new() }),
                generator: Arc::new(ScriptedGenerator { script: Script::Empty }),
                orders: Arc::new(InMemoryOrderStore::default()),
                dialogue,
                sink: Arc::new(FailingSink),
            },
            EngineSettings::default(),
        );

        let completed = engine.handle_turn(&turn("hello", caller()), Some("user-1")).await;

        assert_eq!(completed.reply.text, GREETING_REPLY);
        assert_eq!(completed.query_id, None);
    }

    #[tokio::test]
    async fn every_turn_is_recorded_with_its_intent_and_transcript() {
        let bed = testbed(
            FixedClassifier { label: "greet the assistant", score: 0.9 },
            Arc::new(StaticRetriever { chunks: Vec::new() }),
            Arc::new(ScriptedGenerator { script: Script::Empty }),
            Arc::new(InMemoryOrderStore::default()),
        );

        let completed = handle(&bed, &turn("hello", caller())).await;
        assert!(completed.query_id.is_some());

        let records = bed.sink.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transcript, "hello");
        assert_eq!(records[0].intent, CanonicalIntent::Greeting);
        assert_eq!(records[0].user_id.as_deref(), Some("user-1"));
        assert!(!records[0].reply.is_empty());
    }

    #[tokio::test]
    async fn the_reply_is_never_empty_across_degraded_paths() {
        let scripts = [Script::Text("ok"), Script::Empty, Script::Fail("boom")];
        for script in scripts {
            let bed = testbed(
                FixedClassifier { label: "ask a general question", score: 0.9 },
                Arc::new(FailingRetriever),
                Arc::new(ScriptedGenerator { script }),
                Arc::new(InMemoryOrderStore::default()),
            );
            let completed = handle(&bed, &turn("anything at all", caller())).await;
            assert!(!completed.reply.text.is_empty());
        }
    }
}
