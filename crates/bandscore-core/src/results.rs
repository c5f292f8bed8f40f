//! Scorer outputs.

use serde::{Deserialize, Serialize};

use crate::band::Band;
use crate::fluency::FluencyDiagnostics;
use crate::grammar::GrammarDiagnostics;
use crate::lexical::LexicalDiagnostics;
use crate::model::Criterion;
use crate::pronunciation::PronunciationDiagnostics;
use crate::EMPTY_TRANSCRIPTION_MESSAGE;

/// Structured detail behind a criterion band. Renderers turn these into
/// highlighted transcripts and correction lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostics {
    /// Nothing was scored (empty transcript or missing input).
    Empty,
    Fluency(FluencyDiagnostics),
    Grammar(GrammarDiagnostics),
    Lexical(LexicalDiagnostics),
    Pronunciation(PronunciationDiagnostics),
}

/// The result of scoring one answer against one criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub criterion: Criterion,
    pub ielts_band: Band,
    pub readable_feedback: String,
    pub diagnostics: Diagnostics,
}

impl EvaluationResult {
    /// The canonical zero-band result for an empty transcript.
    pub fn empty(criterion: Criterion) -> Self {
        Self::zero(criterion, EMPTY_TRANSCRIPTION_MESSAGE)
    }

    /// A zero-band result carrying `message` as feedback.
    pub fn zero(criterion: Criterion, message: impl Into<String>) -> Self {
        Self {
            criterion,
            ielts_band: Band::ZERO,
            readable_feedback: message.into(),
            diagnostics: Diagnostics::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.diagnostics, Diagnostics::Empty)
    }
}

/// Band and feedback for one criterion across a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionSummary {
    pub criterion: Criterion,
    pub band: Band,
    pub feedback: String,
    /// Number of per-answer results averaged into `band`.
    pub answers: usize,
}

/// Session-level result: the overall band plus one summary per criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallEvaluationResult {
    pub overall_band: Band,
    pub overall_feedback: String,
    pub criteria: Vec<CriterionSummary>,
}

impl OverallEvaluationResult {
    pub fn summary(&self, criterion: Criterion) -> Option<&CriterionSummary> {
        self.criteria.iter().find(|c| c.criterion == criterion)
    }

    /// True when every criterion was assessed.
    pub fn is_complete(&self) -> bool {
        Criterion::ALL.iter().all(|&c| self.summary(c).is_some())
    }

    /// Band for `criterion`, zero when it was not assessed.
    pub fn band(&self, criterion: Criterion) -> Band {
        self.summary(criterion).map(|c| c.band).unwrap_or(Band::ZERO)
    }
}
