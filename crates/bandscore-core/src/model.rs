//! Core data model types for bandscore.
//!
//! These are the values that flow between collaborators, scorers, and
//! renderers: timestamped words, tagger outputs, annotated sentences,
//! forced-alignment intervals, and the derived spans and edits.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single recognized word with timing and ASR confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// ASR confidence in `[0, 1]`.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64, confidence: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            confidence,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// The IELTS Speaking criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Fluency,
    Grammar,
    Lexical,
    Pronunciation,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::Fluency,
        Criterion::Grammar,
        Criterion::Lexical,
        Criterion::Pronunciation,
    ];

    /// The rubric's display name.
    pub fn title(self) -> &'static str {
        match self {
            Criterion::Fluency => "Fluency & Coherence",
            Criterion::Grammar => "Grammatical Range & Accuracy",
            Criterion::Lexical => "Lexical Resource",
            Criterion::Pronunciation => "Pronunciation",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Fluency => write!(f, "fluency"),
            Criterion::Grammar => write!(f, "grammar"),
            Criterion::Lexical => write!(f, "lexical"),
            Criterion::Pronunciation => write!(f, "pronunciation"),
        }
    }
}

impl FromStr for Criterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fluency" | "fc" => Ok(Criterion::Fluency),
            "grammar" | "gra" => Ok(Criterion::Grammar),
            "lexical" | "lexis" | "lr" => Ok(Criterion::Lexical),
            "pronunciation" | "pron" | "p" => Ok(Criterion::Pronunciation),
            other => Err(format!("unknown criterion: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Disfluency tagging
// ---------------------------------------------------------------------------

/// The five disfluency marker categories, each produced by its own tagger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisfluencyCategory {
    FilledPause,
    EditingTerm,
    DiscourseMarker,
    Conjunction,
    Restart,
}

impl DisfluencyCategory {
    pub const ALL: [DisfluencyCategory; 5] = [
        DisfluencyCategory::FilledPause,
        DisfluencyCategory::EditingTerm,
        DisfluencyCategory::DiscourseMarker,
        DisfluencyCategory::Conjunction,
        DisfluencyCategory::Restart,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DisfluencyCategory::FilledPause => "filled pause",
            DisfluencyCategory::EditingTerm => "editing term",
            DisfluencyCategory::DiscourseMarker => "discourse marker",
            DisfluencyCategory::Conjunction => "conjunction",
            DisfluencyCategory::Restart => "restart",
        }
    }
}

impl fmt::Display for DisfluencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisfluencyCategory::FilledPause => "filled_pause",
            DisfluencyCategory::EditingTerm => "editing_term",
            DisfluencyCategory::DiscourseMarker => "discourse_marker",
            DisfluencyCategory::Conjunction => "conjunction",
            DisfluencyCategory::Restart => "restart",
        };
        f.write_str(s)
    }
}

impl FromStr for DisfluencyCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "filled_pause" | "filled_pauses" => Ok(DisfluencyCategory::FilledPause),
            "editing_term" | "editing_terms" => Ok(DisfluencyCategory::EditingTerm),
            "discourse_marker" | "discourse_markers" => Ok(DisfluencyCategory::DiscourseMarker),
            "conjunction" | "conjunctions" => Ok(DisfluencyCategory::Conjunction),
            "restart" | "restarts" => Ok(DisfluencyCategory::Restart),
            other => Err(format!("unknown disfluency category: {other}")),
        }
    }
}

/// One sub-token of a binary tagger's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedToken {
    pub text: String,
    /// 1 when the token belongs to a marker of the tagger's category.
    pub label: u8,
}

impl TaggedToken {
    pub fn new(text: impl Into<String>, label: u8) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }

    pub fn is_marked(&self) -> bool {
        self.label == 1
    }
}

/// A contiguous run of words flagged by a disfluency tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpan {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub category: DisfluencyCategory,
    /// Index of the first overlapped word.
    pub first_word: usize,
    /// Index of the last overlapped word (inclusive).
    pub last_word: usize,
}

/// A silence between consecutive words longer than the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongPause {
    pub start: f64,
    pub end: f64,
}

impl LongPause {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

/// Kind of a non-equal edit between an original and corrected sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    Insert,
    Delete,
    Replace,
}

/// One correction suggested by the grammar-correction collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEdit {
    pub kind: EditKind,
    pub original_phrase: String,
    pub corrected_phrase: String,
    pub message: String,
}

/// A token produced by the sentence segmenter, with part-of-speech and
/// dependency annotations (Universal POS in `pos`, Penn Treebank in `tag`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    #[serde(default)]
    pub lemma: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub dep: String,
    /// Index of the syntactic head within the sentence (self for the root).
    #[serde(default)]
    pub head: usize,
}

impl Token {
    pub fn lower(&self) -> String {
        self.text.to_lowercase()
    }

    pub fn lemma_or_lower(&self) -> String {
        if self.lemma.is_empty() {
            self.lower()
        } else {
            self.lemma.to_lowercase()
        }
    }
}

/// A sentence as returned by the segmenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedSentence {
    pub text: String,
    #[serde(default)]
    pub tokens: Vec<Token>,
}

impl AnnotatedSentence {
    /// A sentence with no annotations. Classification rules that need tags
    /// degrade to their defaults on such sentences.
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        let tokens = text
            .split_whitespace()
            .enumerate()
            .map(|(i, t)| Token {
                text: t.to_string(),
                lemma: String::new(),
                pos: String::new(),
                tag: String::new(),
                dep: String::new(),
                head: i,
            })
            .collect();
        Self { text, tokens }
    }
}

/// Clause structure of a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SentenceStructure {
    Simple,
    Compound,
    Complex,
    #[serde(rename = "Compound-Complex")]
    CompoundComplex,
}

impl fmt::Display for SentenceStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SentenceStructure::Simple => "Simple",
            SentenceStructure::Compound => "Compound",
            SentenceStructure::Complex => "Complex",
            SentenceStructure::CompoundComplex => "Compound-Complex",
        };
        f.write_str(s)
    }
}

/// Grammatical features that widen a speaker's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrammarFeature {
    Modal,
    Passive,
    Conditional,
    Relative,
}

impl GrammarFeature {
    pub const ALL: [GrammarFeature; 4] = [
        GrammarFeature::Modal,
        GrammarFeature::Passive,
        GrammarFeature::Conditional,
        GrammarFeature::Relative,
    ];

    /// Weight of the feature in the range coverage score.
    pub fn weight(self) -> f64 {
        match self {
            GrammarFeature::Modal => 1.0,
            GrammarFeature::Passive => 1.5,
            GrammarFeature::Conditional => 2.0,
            GrammarFeature::Relative => 2.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GrammarFeature::Modal => "modal verbs",
            GrammarFeature::Passive => "passive voice",
            GrammarFeature::Conditional => "conditional clauses",
            GrammarFeature::Relative => "relative clauses",
        }
    }
}

/// Time frame of a verb group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeFrame {
    Present,
    Past,
    Future,
}

/// Aspect of a verb group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Aspect {
    Simple,
    Continuous,
    Perfect,
    PerfectContinuous,
}

/// One of the twelve English tense categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tense {
    pub time: TimeFrame,
    pub aspect: Aspect,
}

impl Tense {
    pub fn new(time: TimeFrame, aspect: Aspect) -> Self {
        Self { time, aspect }
    }
}

impl fmt::Display for Tense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = match self.time {
            TimeFrame::Present => "present",
            TimeFrame::Past => "past",
            TimeFrame::Future => "future",
        };
        let aspect = match self.aspect {
            Aspect::Simple => "simple",
            Aspect::Continuous => "continuous",
            Aspect::Perfect => "perfect",
            Aspect::PerfectContinuous => "perfect continuous",
        };
        write!(f, "{time} {aspect}")
    }
}

/// Communicative function of a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SentenceFunction {
    Declarative,
    Interrogative,
    Imperative,
    Exclamatory,
}

impl fmt::Display for SentenceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SentenceFunction::Declarative => "Declarative",
            SentenceFunction::Interrogative => "Interrogative",
            SentenceFunction::Imperative => "Imperative",
            SentenceFunction::Exclamatory => "Exclamatory",
        };
        f.write_str(s)
    }
}

/// Everything the grammar scorer learned about one sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceAnnotation {
    pub text: String,
    pub structure: SentenceStructure,
    pub features: Vec<GrammarFeature>,
    pub tenses: Vec<Tense>,
    pub function: SentenceFunction,
    /// CEFR-derived band, when the lexical scorer has classified the sentence.
    #[serde(default)]
    pub cefr_band: Option<f64>,
}

// ---------------------------------------------------------------------------
// Lexical
// ---------------------------------------------------------------------------

/// CEFR proficiency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    /// Fixed CEFR → IELTS mapping.
    pub fn ielts_band(self) -> f64 {
        match self {
            CefrLevel::A1 => 2.0,
            CefrLevel::A2 => 3.0,
            CefrLevel::B1 => 4.0,
            CefrLevel::B2 => 6.0,
            CefrLevel::C1 => 7.5,
            CefrLevel::C2 => 9.0,
        }
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        };
        f.write_str(s)
    }
}

impl FromStr for CefrLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            other => Err(format!("unknown CEFR level: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Pronunciation
// ---------------------------------------------------------------------------

/// Whether a phoneme was held long enough to count as pronounced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhonemeStatus {
    Pronounced,
    UnderDuration,
}

/// A phoneme interval from the forced aligner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeInterval {
    pub arpabet: String,
    #[serde(default)]
    pub ipa: String,
    pub start: f64,
    pub end: f64,
    #[serde(default = "default_status")]
    pub status: PhonemeStatus,
}

fn default_status() -> PhonemeStatus {
    PhonemeStatus::Pronounced
}

impl PhonemeInterval {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A word interval from the forced aligner with its phonemes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordAlignment {
    pub word: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub phonemes: Vec<PhonemeInterval>,
}

/// Tagger output keyed by category.
pub type DisfluencyTags = BTreeMap<DisfluencyCategory, Vec<TaggedToken>>;

// ---------------------------------------------------------------------------
// Answers and sessions
// ---------------------------------------------------------------------------

/// Collaborator outputs captured ahead of time, so an answer can be scored
/// without reaching any model server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedAnalysis {
    #[serde(default)]
    pub sentences: Vec<AnnotatedSentence>,
    #[serde(default)]
    pub disfluency: DisfluencyTags,
    /// Original sentence → corrected sentence.
    #[serde(default)]
    pub corrections: BTreeMap<String, String>,
    /// Sentence → CEFR level.
    #[serde(default)]
    pub cefr: BTreeMap<String, CefrLevel>,
    /// Masked sentence → predicted tokens, best first.
    #[serde(default)]
    pub fill_mask: BTreeMap<String, Vec<String>>,
}

/// One spoken answer: the ASR transcript, its word timings, and whatever
/// audio or alignment the pronunciation scorer can use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub words: Vec<Word>,
    #[serde(default)]
    pub audio: Option<PathBuf>,
    /// Pre-computed forced alignment. Takes precedence over `audio`.
    #[serde(default)]
    pub alignment: Option<Vec<WordAlignment>>,
    #[serde(default)]
    pub recorded: Option<RecordedAnalysis>,
}

impl Answer {
    pub fn new(id: impl Into<String>, transcript: impl Into<String>, words: Vec<Word>) -> Self {
        Self {
            id: id.into(),
            question: None,
            transcript: transcript.into(),
            words,
            audio: None,
            alignment: None,
            recorded: None,
        }
    }

    /// True when there is nothing to score.
    pub fn is_blank(&self) -> bool {
        self.transcript.trim().is_empty()
    }
}

/// A speaking test: a named set of answers scored together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub candidate: Option<String>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}
