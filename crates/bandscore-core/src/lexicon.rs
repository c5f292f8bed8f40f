//! Word lists and word-frequency lookup.
//!
//! Zipf frequency is log10 of occurrences per billion words: "the" sits
//! near 7.7, everyday content words between 4.5 and 6, rare words below 4.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;

/// Looks up word frequencies on the Zipf scale.
pub trait FrequencyLexicon: Send + Sync {
    /// Zipf frequency of `word`. Unknown words return 0.0.
    fn zipf(&self, word: &str) -> f64;
}

/// An in-memory word → Zipf table.
#[derive(Debug, Clone, Default)]
pub struct ZipfLexicon {
    entries: HashMap<String, f64>,
}

impl ZipfLexicon {
    pub fn new(entries: HashMap<String, f64>) -> Self {
        Self { entries }
    }

    /// The bundled list of common spoken English, about 900 words. Words
    /// missing from it read as rare, so deployments scoring open-ended
    /// answers should load a full frequency list.
    pub fn builtin() -> Self {
        let entries = BUILTIN_TSV
            .lines()
            .filter(|line| !line.starts_with('#'))
            .filter_map(|line| {
                let (word, zipf) = line.split_once('\t')?;
                Some((word.to_string(), zipf.trim().parse().ok()?))
            })
            .collect();
        Self { entries }
    }

    /// Parse `word<TAB>zipf` lines. Blank lines and `#` comments are skipped.
    pub fn from_tsv(content: &str) -> anyhow::Result<Self> {
        let mut entries = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split('\t');
            let word = parts.next().unwrap_or_default().trim();
            let value = parts
                .next()
                .with_context(|| format!("line {}: missing zipf column", idx + 1))?;
            let zipf: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("line {}: invalid zipf value '{}'", idx + 1, value.trim()))?;
            entries.insert(word.to_lowercase(), zipf);
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read lexicon {}", path.display()))?;
        Self::from_tsv(&content).with_context(|| format!("in {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FrequencyLexicon for ZipfLexicon {
    fn zipf(&self, word: &str) -> f64 {
        self.entries
            .get(&word.to_lowercase())
            .copied()
            .unwrap_or(0.0)
    }
}

/// English stopwords.
pub const STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't", "i'm", "i've", "i'll", "i'd", "um", "uh", "er", "erm", "hmm",
];

pub fn is_stopword(word: &str) -> bool {
    let lower = word.to_lowercase();
    STOPWORDS.contains(&lower.as_str())
}

/// Adverbs that work as discourse connectives.
pub const DISCOURSE_ADVERBIALS: &[&str] = &[
    "however", "therefore", "moreover", "furthermore", "also", "besides", "consequently",
    "meanwhile", "nevertheless", "nonetheless", "otherwise", "then", "thus", "hence",
    "instead", "likewise", "similarly", "additionally", "finally", "firstly", "secondly",
    "thirdly", "lastly", "actually", "basically", "anyway", "still", "overall", "afterwards",
    "eventually", "accordingly", "conversely", "alternatively", "namely", "indeed",
];

/// Conjunctions used to spot linking words when the segmenter gives no
/// part-of-speech tags.
pub const LINKING_WORDS: &[&str] = &[
    "and", "but", "or", "so", "yet", "nor", "because", "although", "though", "while",
    "whereas", "since", "unless", "if", "when", "whenever", "before", "after", "until",
    "once", "as", "whether",
];

const BUILTIN_TSV: &str = include_str!("../assets/zipf_en.tsv");
