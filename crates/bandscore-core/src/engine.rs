//! Evaluator: gathers collaborator outputs for an answer and runs the
//! scorers over them.
//!
//! Scoring itself is synchronous and pure. The evaluator awaits collaborator
//! calls one after another inside a single evaluation, with no timeout or
//! retry, and fans whole answers out in parallel for a session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::aggregate::{aggregate, SessionHistory};
use crate::error::EvalError;
use crate::fluency::{self, FluencyInput, FluencyParams};
use crate::grammar::{self, CorrectedSentence};
use crate::lexical::{self, collocation_probes, LexicalInput, ProbeOutcome};
use crate::lexicon::FrequencyLexicon;
use crate::model::{AnnotatedSentence, Answer, Criterion, DisfluencyCategory, DisfluencyTags, Session};
use crate::pronunciation::{self, PronunciationParams};
use crate::report::{AnswerReport, FailedAnswer, SessionReport, SessionSummary};
use crate::results::EvaluationResult;
use crate::templates::TemplateCatalog;
use crate::traits::{
    AlignmentRequest, CefrClassifier, CorrectionRequest, DisfluencyTagger, FillMaskPredictor,
    ForcedAligner, GrammarCorrector, SentenceSegmenter,
};

/// Feedback for a pronunciation request with nothing to align against.
pub const NO_AUDIO_MESSAGE: &str = "No audio or forced alignment was provided for this answer.";

/// Per-call scoring configuration. Built once per run and passed by
/// reference to every evaluation; never mutated while scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Name of the grammar corrector to use.
    pub grammar_backend: String,
    /// Model passed to the corrector, when it serves several.
    #[serde(default)]
    pub grammar_model: Option<String>,
    #[serde(default)]
    pub fluency: FluencyParams,
    #[serde(default)]
    pub pronunciation: PronunciationParams,
    /// Predictions requested per collocation probe.
    pub fill_mask_top_k: usize,
    /// Criteria to score, in report order.
    pub criteria: Vec<Criterion>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            grammar_backend: String::new(),
            grammar_model: None,
            fluency: FluencyParams::default(),
            pronunciation: PronunciationParams::default(),
            fill_mask_top_k: 5,
            criteria: Criterion::ALL.to_vec(),
        }
    }
}

impl ScoringConfig {
    pub fn with_backend(backend: impl Into<String>) -> Self {
        Self {
            grammar_backend: backend.into(),
            ..Self::default()
        }
    }

    /// Check the values that do not depend on which backends exist.
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.criteria.is_empty() {
            return Err(EvalError::Configuration("no criteria selected".into()));
        }
        if self.fill_mask_top_k == 0 {
            return Err(EvalError::Configuration(
                "fill_mask_top_k must be at least 1".into(),
            ));
        }
        if self.fluency.long_pause_threshold <= 0.0 {
            return Err(EvalError::Configuration(
                "long_pause_threshold must be positive".into(),
            ));
        }
        if self.pronunciation.under_duration_threshold <= 0.0 {
            return Err(EvalError::Configuration(
                "under_duration_threshold must be positive".into(),
            ));
        }
        if matches!(&self.grammar_model, Some(m) if m.trim().is_empty()) {
            return Err(EvalError::Configuration("grammar model name is empty".into()));
        }
        Ok(())
    }

    /// Requested criteria in canonical order, without duplicates.
    pub fn selected(&self) -> Vec<Criterion> {
        Criterion::ALL
            .into_iter()
            .filter(|c| self.criteria.contains(c))
            .collect()
    }
}

/// The non-grammar collaborators an evaluator calls.
#[derive(Clone)]
pub struct Collaborators {
    pub segmenter: Arc<dyn SentenceSegmenter>,
    pub tagger: Arc<dyn DisfluencyTagger>,
    pub cefr: Arc<dyn CefrClassifier>,
    pub fill_mask: Arc<dyn FillMaskPredictor>,
    pub aligner: Arc<dyn ForcedAligner>,
    pub lexicon: Arc<dyn FrequencyLexicon>,
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_answer_start(&self, answer_id: &str);
    fn on_answer_complete(&self, report: &AnswerReport);
    fn on_answer_error(&self, answer_id: &str, error: &str);
    fn on_session_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_answer_start(&self, _: &str) {}
    fn on_answer_complete(&self, _: &AnswerReport) {}
    fn on_answer_error(&self, _: &str, _: &str) {}
    fn on_session_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Options for a session run.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Maximum answers evaluated at once.
    pub parallelism: usize,
    pub catalog: TemplateCatalog,
    /// Seed for feedback template selection. `None` picks at random.
    pub seed: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            parallelism: 4,
            catalog: TemplateCatalog::builtin(),
            seed: None,
        }
    }
}

/// Scores answers against the four criteria.
pub struct Evaluator {
    collaborators: Collaborators,
    correctors: HashMap<String, Arc<dyn GrammarCorrector>>,
}

impl Evaluator {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            correctors: HashMap::new(),
        }
    }

    /// Register a grammar corrector under its own name.
    pub fn with_corrector(mut self, corrector: Arc<dyn GrammarCorrector>) -> Self {
        self.correctors
            .insert(corrector.name().to_string(), corrector);
        self
    }

    /// Names of the registered grammar correctors, sorted.
    pub fn backends(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.correctors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn corrector(&self, config: &ScoringConfig) -> Result<&Arc<dyn GrammarCorrector>, EvalError> {
        let name = config.grammar_backend.trim();
        if name.is_empty() {
            return Err(EvalError::Configuration("grammar backend is not set".into()));
        }
        self.correctors.get(name).ok_or_else(|| {
            EvalError::Configuration(format!(
                "unknown grammar backend '{name}' (available: {})",
                self.backends().join(", ")
            ))
        })
    }

    pub async fn evaluate_fluency(
        &self,
        answer: &Answer,
        config: &ScoringConfig,
    ) -> Result<EvaluationResult, EvalError> {
        config.validate()?;
        if answer.is_blank() {
            return Ok(EvaluationResult::empty(Criterion::Fluency));
        }
        let sentences = self.segment(answer, Criterion::Fluency).await?;
        self.score_fluency(answer, &sentences, config).await
    }

    pub async fn evaluate_grammar(
        &self,
        answer: &Answer,
        config: &ScoringConfig,
    ) -> Result<EvaluationResult, EvalError> {
        config.validate()?;
        let corrector = self.corrector(config)?;
        if answer.is_blank() {
            return Ok(EvaluationResult::empty(Criterion::Grammar));
        }
        let sentences = self.segment(answer, Criterion::Grammar).await?;
        self.score_grammar(answer, sentences, corrector.as_ref(), config)
            .await
    }

    pub async fn evaluate_lexical(
        &self,
        answer: &Answer,
        config: &ScoringConfig,
    ) -> Result<EvaluationResult, EvalError> {
        config.validate()?;
        if answer.is_blank() {
            return Ok(EvaluationResult::empty(Criterion::Lexical));
        }
        let sentences = self.segment(answer, Criterion::Lexical).await?;
        self.score_lexical(answer, &sentences, config).await
    }

    pub async fn evaluate_pronunciation(
        &self,
        answer: &Answer,
        config: &ScoringConfig,
    ) -> Result<EvaluationResult, EvalError> {
        config.validate()?;
        if answer.is_blank() {
            return Ok(EvaluationResult::empty(Criterion::Pronunciation));
        }
        self.score_pronunciation(answer, config).await
    }

    /// Score every configured criterion for one answer. Sentences are
    /// segmented once and shared between the criteria that need them.
    #[tracing::instrument(skip_all, fields(answer = %answer.id))]
    pub async fn evaluate_answer(
        &self,
        answer: &Answer,
        config: &ScoringConfig,
    ) -> Result<AnswerReport, EvalError> {
        config.validate()?;
        let criteria = config.selected();
        let corrector = if criteria.contains(&Criterion::Grammar) {
            Some(self.corrector(config)?)
        } else {
            None
        };

        let start = Instant::now();
        let mut results = Vec::with_capacity(criteria.len());

        if answer.is_blank() {
            results.extend(criteria.iter().map(|&c| EvaluationResult::empty(c)));
        } else {
            let sentences = match criteria.iter().find(|&&c| c != Criterion::Pronunciation) {
                Some(&first) => self.segment(answer, first).await?,
                None => Vec::new(),
            };

            for criterion in &criteria {
                let result = match criterion {
                    Criterion::Fluency => self.score_fluency(answer, &sentences, config).await?,
                    Criterion::Grammar => match corrector {
                        Some(corrector) => {
                            self.score_grammar(answer, sentences.clone(), corrector.as_ref(), config)
                                .await?
                        }
                        None => continue,
                    },
                    Criterion::Lexical => self.score_lexical(answer, &sentences, config).await?,
                    Criterion::Pronunciation => self.score_pronunciation(answer, config).await?,
                };
                results.push(result);
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            bands = %results
                .iter()
                .map(|r| format!("{}={}", r.criterion, r.ielts_band))
                .collect::<Vec<_>>()
                .join(" "),
            duration_ms,
            "answer evaluated"
        );

        Ok(AnswerReport {
            answer_id: answer.id.clone(),
            question: answer.question.clone(),
            transcript: answer.transcript.clone(),
            created_at: Utc::now(),
            results,
            duration_ms,
        })
    }

    /// Evaluate every answer of a session and aggregate the results.
    ///
    /// Answers run concurrently up to `options.parallelism`. An answer that
    /// fails is logged, reported to `progress` and listed in
    /// [`SessionReport::failed`]; the others still count.
    pub async fn evaluate_session(
        &self,
        session: &Session,
        config: &ScoringConfig,
        options: &SessionOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<SessionReport> {
        config.validate()?;
        if config.criteria.contains(&Criterion::Grammar) {
            self.corrector(config)?;
        }

        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(options.parallelism.max(1)));
        let mut futures = FuturesUnordered::new();

        for (index, answer) in session.answers.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        progress.on_answer_start(&answer.id);
                        self.evaluate_answer(answer, config)
                            .await
                            .map_err(anyhow::Error::from)
                    }
                    Err(_) => Err(anyhow::anyhow!("semaphore closed")),
                };
                (index, answer.id.clone(), result)
            });
        }

        let total = futures.len();
        let mut slots: Vec<Option<AnswerReport>> = vec![None; total];
        let mut failed = Vec::new();

        while let Some((index, answer_id, result)) = futures.next().await {
            match result {
                Ok(report) => {
                    progress.on_answer_complete(&report);
                    slots[index] = Some(report);
                }
                Err(e) => {
                    tracing::error!("evaluation failed for answer {answer_id}: {e:#}");
                    progress.on_answer_error(&answer_id, &e.to_string());
                    failed.push(FailedAnswer {
                        answer_id,
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        let answers: Vec<AnswerReport> = slots.into_iter().flatten().collect();
        let elapsed = start.elapsed();
        progress.on_session_complete(total, answers.len(), failed.len(), elapsed);

        let mut history = SessionHistory::new();
        for report in &answers {
            history.extend(report.results.iter().cloned());
        }
        let mut rng = match options.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let overall = aggregate(&history, &options.catalog, &mut rng);

        Ok(SessionReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            session: SessionSummary {
                id: session.id.clone(),
                name: session.name.clone(),
                candidate: session.candidate.clone(),
                answer_count: session.answers.len(),
            },
            answers,
            failed,
            overall,
            duration_ms: elapsed.as_millis() as u64,
        })
    }

    // -----------------------------------------------------------------------
    // Collaborator plumbing
    // -----------------------------------------------------------------------

    async fn segment(
        &self,
        answer: &Answer,
        criterion: Criterion,
    ) -> Result<Vec<AnnotatedSentence>, EvalError> {
        let sentences = self
            .collaborators
            .segmenter
            .segment(&answer.transcript)
            .await
            .map_err(|e| EvalError::collaborator(criterion, "sentence segmenter", e))?;
        if sentences.is_empty() {
            tracing::warn!(answer = %answer.id, "segmenter returned no sentences, using the whole transcript");
            return Ok(vec![AnnotatedSentence::plain(answer.transcript.trim())]);
        }
        Ok(sentences)
    }

    async fn score_fluency(
        &self,
        answer: &Answer,
        sentences: &[AnnotatedSentence],
        config: &ScoringConfig,
    ) -> Result<EvaluationResult, EvalError> {
        let mut tags = DisfluencyTags::new();
        for category in DisfluencyCategory::ALL {
            let tokens = self
                .collaborators
                .tagger
                .tag(&answer.transcript, category)
                .await
                .map_err(|e| EvalError::collaborator(Criterion::Fluency, "disfluency tagger", e))?;
            tags.insert(category, tokens);
        }

        let input = FluencyInput {
            transcript: &answer.transcript,
            words: &answer.words,
            tags: &tags,
            sentences,
        };
        Ok(fluency::score(&input, &config.fluency))
    }

    async fn score_grammar(
        &self,
        answer: &Answer,
        sentences: Vec<AnnotatedSentence>,
        corrector: &dyn GrammarCorrector,
        config: &ScoringConfig,
    ) -> Result<EvaluationResult, EvalError> {
        let mut corrected = Vec::with_capacity(sentences.len());
        for sentence in sentences {
            let request = CorrectionRequest {
                sentence: sentence.text.clone(),
                model: config.grammar_model.clone(),
            };
            let output = corrector
                .correct(&request)
                .await
                .map_err(|e| EvalError::collaborator(Criterion::Grammar, "grammar corrector", e))?;
            tracing::debug!(backend = corrector.name(), original = %sentence.text, corrected = %output, "sentence corrected");
            corrected.push(CorrectedSentence {
                sentence,
                corrected: output,
            });
        }
        Ok(grammar::score(&answer.transcript, &corrected))
    }

    async fn score_lexical(
        &self,
        answer: &Answer,
        sentences: &[AnnotatedSentence],
        config: &ScoringConfig,
    ) -> Result<EvaluationResult, EvalError> {
        let mut levels = Vec::with_capacity(sentences.len());
        for sentence in sentences {
            let level = self
                .collaborators
                .cefr
                .classify(&sentence.text)
                .await
                .map_err(|e| EvalError::collaborator(Criterion::Lexical, "CEFR classifier", e))?;
            levels.push(level);
        }

        let fill_mask = &self.collaborators.fill_mask;
        let probes = collocation_probes(sentences, fill_mask.mask_token());
        let mut outcomes = Vec::with_capacity(probes.len());
        for probe in probes {
            let predictions = fill_mask
                .predict(&probe.masked_sentence, config.fill_mask_top_k)
                .await
                .map_err(|e| EvalError::collaborator(Criterion::Lexical, "fill-mask predictor", e))?;
            tracing::debug!(word = %probe.word, ?predictions, "collocation probe");
            outcomes.push(ProbeOutcome::new(probe, predictions));
        }

        let input = LexicalInput {
            transcript: &answer.transcript,
            sentences,
            cefr_levels: &levels,
            probes: &outcomes,
        };
        Ok(lexical::score(&input, self.collaborators.lexicon.as_ref()))
    }

    async fn score_pronunciation(
        &self,
        answer: &Answer,
        config: &ScoringConfig,
    ) -> Result<EvaluationResult, EvalError> {
        let alignment = match (&answer.alignment, &answer.audio) {
            (Some(alignment), _) => alignment.clone(),
            (None, Some(audio)) => {
                let request = AlignmentRequest {
                    audio: audio.clone(),
                    transcript: answer.transcript.clone(),
                };
                self.collaborators
                    .aligner
                    .align(&request)
                    .await
                    .map_err(|e| {
                        EvalError::collaborator(Criterion::Pronunciation, "forced aligner", e)
                    })?
            }
            (None, None) => {
                return Ok(EvaluationResult::zero(
                    Criterion::Pronunciation,
                    NO_AUDIO_MESSAGE,
                ))
            }
        };

        Ok(pronunciation::score(
            &answer.transcript,
            &alignment,
            &answer.words,
            &config.pronunciation,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_but_has_no_backend() {
        let config = ScoringConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.grammar_backend.is_empty());
        assert_eq!(config.selected(), Criterion::ALL.to_vec());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = ScoringConfig::with_backend("coedit");
        config.fill_mask_top_k = 0;
        assert!(matches!(config.validate(), Err(EvalError::Configuration(_))));

        let mut config = ScoringConfig::with_backend("coedit");
        config.grammar_model = Some("  ".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("model name is empty"));

        let mut config = ScoringConfig::with_backend("coedit");
        config.fluency.long_pause_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = ScoringConfig::with_backend("coedit");
        config.criteria.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn selected_dedups_and_orders() {
        let mut config = ScoringConfig::with_backend("coedit");
        config.criteria = vec![
            Criterion::Pronunciation,
            Criterion::Fluency,
            Criterion::Pronunciation,
        ];
        assert_eq!(
            config.selected(),
            vec![Criterion::Fluency, Criterion::Pronunciation]
        );
    }
}
