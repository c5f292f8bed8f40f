//! Mapping tagger predictions back onto timestamped words.
//!
//! Taggers work on their own sub-word tokenization while the ASR words
//! carry the timestamps. Both sides are flattened to a normalized character
//! stream and walked in lock-step; labelled characters are attributed to
//! the word that owns them.

use crate::model::{DisfluencyCategory, MarkerSpan, TaggedToken, Word};

/// One character of a normalized stream and the item it came from.
#[derive(Debug, Clone, Copy)]
struct StreamChar<T> {
    ch: char,
    owner: T,
}

/// Fold a string into the comparable alphabet: lowercase alphanumerics and
/// apostrophes.
fn normalized_chars(s: &str) -> impl Iterator<Item = char> + '_ {
    s.chars()
        .map(|c| if c == '\u{2019}' { '\'' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '\'')
        .flat_map(char::to_lowercase)
}

/// Remove sub-word continuation markers used by common tokenizers.
fn strip_subword_marker(token: &str) -> &str {
    token
        .strip_prefix("##")
        .or_else(|| token.strip_prefix('\u{2581}'))
        .or_else(|| token.strip_prefix('\u{0120}'))
        .unwrap_or(token)
}

/// `[CLS]`, `</s>`, `<pad>` and friends carry no transcript text.
fn is_special_token(token: &str) -> bool {
    (token.starts_with('[') && token.ends_with(']') && token.len() > 2)
        || (token.starts_with('<') && token.ends_with('>') && token.len() > 2)
}

fn word_stream(words: &[Word]) -> Vec<StreamChar<usize>> {
    words
        .iter()
        .enumerate()
        .flat_map(|(idx, w)| normalized_chars(&w.text).map(move |ch| StreamChar { ch, owner: idx }))
        .collect()
}

fn token_stream(tokens: &[TaggedToken]) -> Vec<StreamChar<bool>> {
    tokens
        .iter()
        .filter(|t| !is_special_token(&t.text))
        .flat_map(|t| {
            let marked = t.is_marked();
            normalized_chars(strip_subword_marker(&t.text))
                .map(move |ch| StreamChar { ch, owner: marked })
        })
        .collect()
}

fn make_span(words: &[Word], first: usize, last: usize, category: DisfluencyCategory) -> MarkerSpan {
    let covered = &words[first..=last];
    let start = covered.iter().map(|w| w.start).fold(f64::INFINITY, f64::min);
    let end = covered.iter().map(|w| w.end).fold(f64::NEG_INFINITY, f64::max);
    let text = covered
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    MarkerSpan {
        text,
        start,
        end,
        category,
        first_word: first,
        last_word: last,
    }
}

/// Align one tagger's binary predictions onto the ASR words.
///
/// Contiguous runs of labelled characters become one [`MarkerSpan`]
/// covering every word they touch. On a character mismatch the pointer
/// whose relative progress through its stream is behind advances; on an
/// exact tie both advance. A mismatch never closes an open span, and a span
/// still open when either stream runs out is flushed.
pub fn align_predictions(
    words: &[Word],
    tokens: &[TaggedToken],
    category: DisfluencyCategory,
) -> Vec<MarkerSpan> {
    let wc = word_stream(words);
    let tc = token_stream(tokens);
    if wc.is_empty() || tc.is_empty() {
        return Vec::new();
    }

    let mut spans = Vec::new();
    let mut open: Option<(usize, usize)> = None;
    let mut repairs = 0usize;
    let (mut i, mut j) = (0usize, 0usize);

    while i < wc.len() && j < tc.len() {
        let w = wc[i];
        let t = tc[j];
        if w.ch == t.ch {
            if t.owner {
                open = Some(match open {
                    Some((first, _)) => (first, w.owner),
                    None => (w.owner, w.owner),
                });
            } else if let Some((first, last)) = open.take() {
                spans.push(make_span(words, first, last, category));
            }
            i += 1;
            j += 1;
            continue;
        }

        repairs += 1;
        // Compare i/|wc| with j/|tc| without floating point.
        let word_progress = i * tc.len();
        let token_progress = j * wc.len();
        match word_progress.cmp(&token_progress) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }

    if let Some((first, last)) = open {
        spans.push(make_span(words, first, last, category));
    }

    if repairs > 0 {
        tracing::debug!(
            category = %category,
            repairs,
            "alignment: repaired character mismatches"
        );
    }

    spans
}
