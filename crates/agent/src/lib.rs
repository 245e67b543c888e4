//! Conversational decision engine.
//!
//! This crate decides, turn by turn, whether a user utterance is answered
//! from structured order records (with multi-turn disambiguation when the
//! record set is ambiguous), from retrieved reference text, or from open
//! generation.
//!
//! # Architecture
//!
//! The engine is a composition of small pieces, evaluated strictly in order
//! per turn (see `router`):
//! 1. **Clarification**: an open disambiguation question is answered first.
//! 2. **Intent** (`classify`): zero-shot classification behind a confidence
//!    gate; failures degrade to a low-confidence general question.
//! 3. **Structured handlers**: order tracking, creation, counting, and the
//!    fixed social intents.
//! 4. **Generation** (`generate`, `prompts`): retrieval-augmented when a
//!    chunk clears the relevance threshold, open generation otherwise, with
//!    bounded rate-limit retries.
//!
//! Every external collaborator (classifier, retriever, generator, stores)
//! is an injected capability. A collaborator failure degrades the reply, it
//! never aborts the turn: the router always returns a non-empty reply.

pub mod classify;
pub mod generate;
pub mod prompts;
pub mod retrieve;
pub mod router;

pub use classify::{Classification, IntentClassifier, IntentResolver, NoopClassifier};
pub use generate::{
    GenerationOrchestrator, GenerationOutcome, Generator, NoopGenerator, RATE_LIMIT_APOLOGY,
};
pub use retrieve::{NoopRetriever, Retriever};
pub use router::{CompletedTurn, EngineDeps, EngineSettings, TurnEngine};
