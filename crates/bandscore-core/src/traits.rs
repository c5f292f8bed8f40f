//! Collaborator trait definitions.
//!
//! The engine consumes the outputs of external NLP and speech components
//! as data. These async traits are the seams: `bandscore-providers`
//! implements them against an inference server, an OpenAI-compatible API,
//! or recorded fixtures.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{AnnotatedSentence, CefrLevel, DisfluencyCategory, TaggedToken, WordAlignment};

// ---------------------------------------------------------------------------
// Sentence segmentation
// ---------------------------------------------------------------------------

/// Splits a transcript into sentences with POS and dependency annotations.
#[async_trait]
pub trait SentenceSegmenter: Send + Sync {
    async fn segment(&self, text: &str) -> anyhow::Result<Vec<AnnotatedSentence>>;
}

// ---------------------------------------------------------------------------
// Disfluency tagging
// ---------------------------------------------------------------------------

/// Binary token classifiers, one per disfluency category.
#[async_trait]
pub trait DisfluencyTagger: Send + Sync {
    /// Tag `text` with the classifier for `category`. The returned tokens
    /// cover the same text in the tagger's own tokenization.
    async fn tag(&self, text: &str, category: DisfluencyCategory)
        -> anyhow::Result<Vec<TaggedToken>>;
}

// ---------------------------------------------------------------------------
// Grammar correction
// ---------------------------------------------------------------------------

/// Request to correct one sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRequest {
    /// The sentence as spoken.
    pub sentence: String,
    /// Model identifier, when the backend serves more than one.
    #[serde(default)]
    pub model: Option<String>,
}

/// A grammar-error-correction backend.
#[async_trait]
pub trait GrammarCorrector: Send + Sync {
    /// Backend name (e.g. "coedit").
    fn name(&self) -> &str;

    /// Return the corrected sentence. An unchanged sentence means no errors.
    async fn correct(&self, request: &CorrectionRequest) -> anyhow::Result<String>;
}

// ---------------------------------------------------------------------------
// CEFR classification
// ---------------------------------------------------------------------------

/// Classifies the CEFR level of a sentence.
#[async_trait]
pub trait CefrClassifier: Send + Sync {
    async fn classify(&self, sentence: &str) -> anyhow::Result<CefrLevel>;
}

// ---------------------------------------------------------------------------
// Fill-mask prediction
// ---------------------------------------------------------------------------

/// Masked-language-model predictions used for the collocation check.
#[async_trait]
pub trait FillMaskPredictor: Send + Sync {
    /// The mask placeholder this model expects (e.g. `[MASK]`).
    fn mask_token(&self) -> &str {
        "[MASK]"
    }

    /// Return up to `top_k` predicted tokens for the masked position.
    async fn predict(&self, masked_sentence: &str, top_k: usize) -> anyhow::Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Forced alignment
// ---------------------------------------------------------------------------

/// Request to force-align a transcript against its audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentRequest {
    pub audio: PathBuf,
    pub transcript: String,
}

/// Produces word and phoneme intervals for a recording.
#[async_trait]
pub trait ForcedAligner: Send + Sync {
    async fn align(&self, request: &AlignmentRequest) -> anyhow::Result<Vec<WordAlignment>>;
}
