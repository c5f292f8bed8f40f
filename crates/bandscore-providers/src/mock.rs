//! Mock collaborators for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use bandscore_core::model::{
    AnnotatedSentence, CefrLevel, DisfluencyCategory, TaggedToken, WordAlignment,
};
use bandscore_core::traits::{
    AlignmentRequest, CefrClassifier, CorrectionRequest, DisfluencyTagger, FillMaskPredictor,
    ForcedAligner, GrammarCorrector, SentenceSegmenter,
};

/// A mock grammar corrector.
///
/// Returns the sentence unchanged unless a scripted substring matches, in
/// which case the first matching replacement is applied.
pub struct MockCorrector {
    name: String,
    /// Substring → replacement.
    fixes: HashMap<String, String>,
    /// Fail every call with this message.
    failure: Option<String>,
    call_count: AtomicU32,
    last_request: Mutex<Option<CorrectionRequest>>,
}

impl MockCorrector {
    /// A corrector that changes nothing.
    pub fn identity(name: &str) -> Self {
        Self::with_fixes(name, HashMap::new())
    }

    pub fn with_fixes(name: &str, fixes: HashMap<String, String>) -> Self {
        Self {
            name: name.to_string(),
            fixes,
            failure: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A corrector whose every call fails with `message`.
    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::identity(name)
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<CorrectionRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl GrammarCorrector for MockCorrector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn correct(&self, request: &CorrectionRequest) -> anyhow::Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        if let Some(message) = &self.failure {
            anyhow::bail!("{message}");
        }

        let corrected = self
            .fixes
            .iter()
            .find(|(from, _)| request.sentence.contains(from.as_str()))
            .map(|(from, to)| request.sentence.replacen(from.as_str(), to, 1))
            .unwrap_or_else(|| request.sentence.clone());
        Ok(corrected)
    }
}

/// Deterministic stand-ins for the non-grammar collaborators.
///
/// Sentences split on `.`, `?` and `!` with no annotations. Tokens whose
/// text appears in `markers` for a category are tagged 1. Every sentence
/// gets `level`. Fill-mask predictions echo nothing; the aligner returns
/// `alignment` or fails when it is unset.
pub struct MockCollaborators {
    pub markers: HashMap<DisfluencyCategory, Vec<String>>,
    pub level: CefrLevel,
    pub alignment: Option<Vec<WordAlignment>>,
    calls: AtomicU32,
}

impl Default for MockCollaborators {
    fn default() -> Self {
        Self {
            markers: HashMap::new(),
            level: CefrLevel::B2,
            alignment: None,
            calls: AtomicU32::new(0),
        }
    }
}

impl MockCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total collaborator calls made.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl SentenceSegmenter for MockCollaborators {
    async fn segment(&self, text: &str) -> anyhow::Result<Vec<AnnotatedSentence>> {
        self.hit();
        Ok(text
            .split_inclusive(['.', '?', '!'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(AnnotatedSentence::plain)
            .collect())
    }
}

#[async_trait]
impl DisfluencyTagger for MockCollaborators {
    async fn tag(
        &self,
        text: &str,
        category: DisfluencyCategory,
    ) -> anyhow::Result<Vec<TaggedToken>> {
        self.hit();
        let markers = self.markers.get(&category);
        Ok(text
            .split_whitespace()
            .map(|t| {
                let lower = t.to_lowercase();
                let marked = markers.is_some_and(|m| m.iter().any(|w| *w == lower));
                TaggedToken::new(lower, u8::from(marked))
            })
            .collect())
    }
}

#[async_trait]
impl CefrClassifier for MockCollaborators {
    async fn classify(&self, _: &str) -> anyhow::Result<CefrLevel> {
        self.hit();
        Ok(self.level)
    }
}

#[async_trait]
impl FillMaskPredictor for MockCollaborators {
    async fn predict(&self, _: &str, _: usize) -> anyhow::Result<Vec<String>> {
        self.hit();
        Ok(Vec::new())
    }
}

#[async_trait]
impl ForcedAligner for MockCollaborators {
    async fn align(&self, request: &AlignmentRequest) -> anyhow::Result<Vec<WordAlignment>> {
        self.hit();
        self.alignment
            .clone()
            .ok_or_else(|| anyhow::anyhow!("mock aligner has no alignment for {}", request.audio.display()))
    }
}
