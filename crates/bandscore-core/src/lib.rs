//! bandscore-core: IELTS Speaking evaluation engine.
//!
//! This crate defines the data model, the four per-criterion scorers
//! (fluency, grammar, lexical resource, pronunciation), the session
//! aggregator, and the collaborator traits the evaluator calls to gather
//! linguistic signals.

pub mod aggregate;
pub mod alignment;
pub mod band;
pub mod diff;
pub mod engine;
pub mod error;
pub mod fluency;
pub mod grammar;
pub mod lexical;
pub mod lexicon;
pub mod model;
pub mod parser;
pub mod phonemes;
pub mod pronunciation;
pub mod report;
pub mod results;
pub mod templates;
pub mod traits;

/// Feedback returned by every scorer when the transcript is empty.
pub const EMPTY_TRANSCRIPTION_MESSAGE: &str =
    "Your transcription is empty. Please provide a valid transcription.";
