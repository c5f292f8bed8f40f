//! Per-token highlighting of a transcript.
//!
//! Marker spans index the answer's word timings, which line up with the
//! whitespace tokens of the transcript. Renderers walk the tokens and ask
//! these helpers how each one should be styled.

use std::collections::HashSet;

use bandscore_core::fluency::FluencyDiagnostics;
use bandscore_core::lexical::{word_tokens, LexicalDiagnostics};
use bandscore_core::model::DisfluencyCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LexicalMark {
    Advanced,
    Repeated,
}

pub(crate) fn tokens(transcript: &str) -> Vec<&str> {
    transcript.split_whitespace().collect()
}

/// The disfluency category covering each token, first span wins.
pub(crate) fn disfluency_marks(
    token_count: usize,
    diagnostics: &FluencyDiagnostics,
) -> Vec<Option<DisfluencyCategory>> {
    let mut marks = vec![None; token_count];
    for span in diagnostics.all_spans() {
        if span.first_word >= token_count || span.first_word > span.last_word {
            continue;
        }
        let last = span.last_word.min(token_count - 1);
        for mark in &mut marks[span.first_word..=last] {
            mark.get_or_insert(span.category);
        }
    }
    marks
}

/// Advanced and repeated words per token. Advanced wins over repeated.
pub(crate) fn lexical_marks(tokens: &[&str], diagnostics: &LexicalDiagnostics) -> Vec<Option<LexicalMark>> {
    let advanced: HashSet<&str> = diagnostics.advanced_words.iter().map(String::as_str).collect();
    let repeated: HashSet<&str> = diagnostics
        .repeated_words
        .iter()
        .map(|r| r.word.as_str())
        .collect();

    tokens
        .iter()
        .map(|token| {
            let word = word_tokens(token).pop()?;
            if advanced.contains(word.as_str()) {
                Some(LexicalMark::Advanced)
            } else if repeated.contains(word.as_str()) {
                Some(LexicalMark::Repeated)
            } else {
                None
            }
        })
        .collect()
}

pub(crate) fn seconds(t: f64) -> String {
    format!("{t:.2}s")
}
