//! Offline collaborators that replay outputs recorded in answer files.
//!
//! Lookups are keyed by text: the transcript for segmentation and tagging,
//! the sentence for correction and CEFR level, the masked sentence for
//! fill-mask predictions. Taggers and the fill-mask predictor treat a
//! missing recording as "nothing found"; the corrector and CEFR classifier
//! fail, since guessing would fabricate a score.

use std::collections::HashMap;

use async_trait::async_trait;

use bandscore_core::model::{
    AnnotatedSentence, Answer, CefrLevel, DisfluencyCategory, DisfluencyTags, TaggedToken,
    WordAlignment,
};
use bandscore_core::traits::{
    AlignmentRequest, CefrClassifier, CorrectionRequest, DisfluencyTagger, FillMaskPredictor,
    ForcedAligner, GrammarCorrector, SentenceSegmenter,
};

/// Backend name under which recorded corrections are registered.
pub const RECORDED_BACKEND: &str = "recorded";

fn key(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replays [`RecordedAnalysis`](bandscore_core::model::RecordedAnalysis)
/// sections from a set of answers.
#[derive(Debug, Default)]
pub struct RecordedCollaborators {
    sentences: HashMap<String, Vec<AnnotatedSentence>>,
    tags: HashMap<String, DisfluencyTags>,
    corrections: HashMap<String, String>,
    cefr: HashMap<String, CefrLevel>,
    fill_mask: HashMap<String, Vec<String>>,
    alignments: HashMap<String, Vec<WordAlignment>>,
}

impl RecordedCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the recordings of every answer that has them.
    pub fn from_answers(answers: &[Answer]) -> Self {
        let mut recorded = Self::new();
        for answer in answers {
            recorded.add(answer);
        }
        recorded
    }

    pub fn add(&mut self, answer: &Answer) {
        let transcript = key(&answer.transcript);
        if let Some(alignment) = &answer.alignment {
            self.alignments
                .insert(transcript.clone(), alignment.clone());
        }
        let Some(analysis) = &answer.recorded else {
            return;
        };
        if !analysis.sentences.is_empty() {
            self.sentences
                .insert(transcript.clone(), analysis.sentences.clone());
        }
        if !analysis.disfluency.is_empty() {
            self.tags.insert(transcript, analysis.disfluency.clone());
        }
        self.corrections.extend(
            analysis
                .corrections
                .iter()
                .map(|(k, v)| (key(k), v.clone())),
        );
        self.cefr
            .extend(analysis.cefr.iter().map(|(k, v)| (key(k), *v)));
        self.fill_mask.extend(
            analysis
                .fill_mask
                .iter()
                .map(|(k, v)| (key(k), v.clone())),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
            && self.tags.is_empty()
            && self.corrections.is_empty()
            && self.cefr.is_empty()
            && self.fill_mask.is_empty()
    }
}

#[async_trait]
impl SentenceSegmenter for RecordedCollaborators {
    async fn segment(&self, text: &str) -> anyhow::Result<Vec<AnnotatedSentence>> {
        // An empty list makes the evaluator score the whole transcript as
        // one unannotated sentence.
        Ok(self.sentences.get(&key(text)).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl DisfluencyTagger for RecordedCollaborators {
    async fn tag(
        &self,
        text: &str,
        category: DisfluencyCategory,
    ) -> anyhow::Result<Vec<TaggedToken>> {
        Ok(self
            .tags
            .get(&key(text))
            .and_then(|tags| tags.get(&category))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl CefrClassifier for RecordedCollaborators {
    async fn classify(&self, sentence: &str) -> anyhow::Result<CefrLevel> {
        self.cefr
            .get(&key(sentence))
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no recorded CEFR level for sentence: {sentence}"))
    }
}

#[async_trait]
impl FillMaskPredictor for RecordedCollaborators {
    async fn predict(&self, masked_sentence: &str, top_k: usize) -> anyhow::Result<Vec<String>> {
        let predictions = self.fill_mask.get(&key(masked_sentence));
        if predictions.is_none() {
            tracing::debug!(masked_sentence, "no recorded fill-mask predictions");
        }
        Ok(predictions
            .map(|p| p.iter().take(top_k).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ForcedAligner for RecordedCollaborators {
    async fn align(&self, request: &AlignmentRequest) -> anyhow::Result<Vec<WordAlignment>> {
        self.alignments
            .get(&key(&request.transcript))
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no recorded alignment for {} (offline mode cannot align audio)",
                    request.audio.display()
                )
            })
    }
}

#[async_trait]
impl GrammarCorrector for RecordedCollaborators {
    fn name(&self) -> &str {
        RECORDED_BACKEND
    }

    async fn correct(&self, request: &CorrectionRequest) -> anyhow::Result<String> {
        self.corrections
            .get(&key(&request.sentence))
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!("no recorded correction for sentence: {}", request.sentence)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandscore_core::model::RecordedAnalysis;

    fn recorded_answer() -> Answer {
        let mut analysis = RecordedAnalysis::default();
        analysis
            .sentences
            .push(AnnotatedSentence::plain("He go to school."));
        analysis.disfluency.insert(
            DisfluencyCategory::FilledPause,
            vec![TaggedToken::new("he", 0), TaggedToken::new("go", 0)],
        );
        analysis
            .corrections
            .insert("He go to school.".into(), "He goes to school.".into());
        analysis.cefr.insert("He go to school.".into(), CefrLevel::A2);
        analysis
            .fill_mask
            .insert("He [MASK] to school.".into(), vec!["goes".into(), "went".into()]);

        let mut answer = Answer::new("q1", "He go  to school.", vec![]);
        answer.recorded = Some(analysis);
        answer
    }

    #[tokio::test]
    async fn replays_by_normalized_text() {
        let recorded = RecordedCollaborators::from_answers(&[recorded_answer()]);
        assert!(!recorded.is_empty());

        let sentences = recorded.segment("He go to  school.").await.unwrap();
        assert_eq!(sentences.len(), 1);

        let tokens = recorded
            .tag("He go to school.", DisfluencyCategory::FilledPause)
            .await
            .unwrap();
        assert_eq!(tokens.len(), 2);
        let none = recorded
            .tag("He go to school.", DisfluencyCategory::Restart)
            .await
            .unwrap();
        assert!(none.is_empty());

        assert_eq!(recorded.classify("He go to school.").await.unwrap(), CefrLevel::A2);
        assert_eq!(
            recorded.predict("He [MASK] to school.", 1).await.unwrap(),
            vec!["goes"]
        );
        assert!(recorded.predict("unknown [MASK]", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_correction_is_an_error() {
        let recorded = RecordedCollaborators::from_answers(&[recorded_answer()]);
        let corrected = recorded
            .correct(&CorrectionRequest {
                sentence: "He go to school.".into(),
                model: None,
            })
            .await
            .unwrap();
        assert_eq!(corrected, "He goes to school.");

        let err = recorded
            .correct(&CorrectionRequest {
                sentence: "Something else.".into(),
                model: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no recorded correction"));
        assert_eq!(recorded.name(), "recorded");
    }

    #[tokio::test]
    async fn aligner_refuses_audio_without_recording() {
        let recorded = RecordedCollaborators::new();
        let err = recorded
            .align(&AlignmentRequest {
                audio: "q1.wav".into(),
                transcript: "hello".into(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("offline mode"));
    }
}
