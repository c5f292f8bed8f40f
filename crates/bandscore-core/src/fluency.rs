//! Fluency & Coherence scorer.
//!
//! Combines speech rate, long pauses, and the five disfluency marker
//! categories into a weighted score, then revises it for answer length and
//! the number of linking words.

use serde::{Deserialize, Serialize};

use crate::alignment::align_predictions;
use crate::band::{clamp_score, occurrence_band, Band};
use crate::lexicon::{DISCOURSE_ADVERBIALS, LINKING_WORDS};
use crate::model::{
    AnnotatedSentence, Criterion, DisfluencyCategory, DisfluencyTags, LongPause, MarkerSpan, Word,
};
use crate::results::{Diagnostics, EvaluationResult};

/// Tunable fluency parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluencyParams {
    /// Gap between consecutive words, in seconds, that counts as a long pause.
    pub long_pause_threshold: f64,
}

impl Default for FluencyParams {
    fn default() -> Self {
        Self {
            long_pause_threshold: 3.0,
        }
    }
}

/// Everything the fluency scorer reads.
#[derive(Debug, Clone, Copy)]
pub struct FluencyInput<'a> {
    pub transcript: &'a str,
    pub words: &'a [Word],
    /// Tagger output per category. A missing category has no markers.
    pub tags: &'a DisfluencyTags,
    pub sentences: &'a [AnnotatedSentence],
}

/// Markers found for one disfluency category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMarkers {
    pub category: DisfluencyCategory,
    pub band: f64,
    pub spans: Vec<MarkerSpan>,
}

/// The length and linking-word adjustment applied after weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LengthRevision {
    /// Short answer: the score was capped.
    Capped { cap: f64 },
    /// Long answer: the score was shifted by `delta`.
    Adjusted { delta: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluencyDiagnostics {
    pub word_count: usize,
    pub duration_seconds: f64,
    pub speech_rate_wpm: f64,
    pub speech_rate_band: f64,
    pub long_pause_threshold: f64,
    pub long_pauses: Vec<LongPause>,
    pub long_pause_band: f64,
    pub late_start_penalty: f64,
    pub markers: Vec<CategoryMarkers>,
    pub linking_words: Vec<String>,
    pub weighted_score: f64,
    pub revision: LengthRevision,
}

impl FluencyDiagnostics {
    /// All marker spans across categories, ordered by start time.
    pub fn all_spans(&self) -> Vec<&MarkerSpan> {
        let mut spans: Vec<&MarkerSpan> = self.markers.iter().flat_map(|m| &m.spans).collect();
        spans.sort_by(|a, b| a.start.total_cmp(&b.start));
        spans
    }

    pub fn marker_count(&self) -> usize {
        self.markers.iter().map(|m| m.spans.len()).sum()
    }
}

fn category_weight(category: DisfluencyCategory) -> f64 {
    match category {
        DisfluencyCategory::FilledPause => 0.25,
        DisfluencyCategory::EditingTerm => 0.15,
        DisfluencyCategory::DiscourseMarker => 0.15,
        DisfluencyCategory::Conjunction => 0.05,
        DisfluencyCategory::Restart => 0.10,
    }
}

const SPEECH_RATE_WEIGHT: f64 = 0.10;
const LONG_PAUSE_WEIGHT: f64 = 0.20;

/// Words per minute over the span from the first word's start to the last
/// word's end, with the duration in seconds.
pub fn speech_rate(words: &[Word]) -> (f64, f64) {
    let (Some(first), Some(last)) = (words.first(), words.last()) else {
        return (0.0, 0.0);
    };
    let duration = last.end - first.start;
    if duration <= 0.0 {
        return (0.0, duration.max(0.0));
    }
    (words.len() as f64 / (duration / 60.0), duration)
}

pub fn speech_rate_band(wpm: f64) -> f64 {
    match wpm {
        r if r >= 160.0 => 9.0,
        r if r >= 140.0 => 8.0,
        r if r >= 120.0 => 7.0,
        r if r >= 100.0 => 6.0,
        r if r >= 90.0 => 5.0,
        r if r >= 70.0 => 4.0,
        r if r >= 50.0 => 3.0,
        r if r >= 30.0 => 2.0,
        r if r > 0.0 => 1.0,
        _ => 0.0,
    }
}

/// Gaps between consecutive words longer than `threshold` seconds.
pub fn long_pauses(words: &[Word], threshold: f64) -> Vec<LongPause> {
    words
        .windows(2)
        .filter(|pair| pair[1].start - pair[0].end > threshold)
        .map(|pair| LongPause {
            start: pair[0].end,
            end: pair[1].start,
        })
        .collect()
}

/// Penalty for a slow start, based on when the first word begins.
pub fn late_start_penalty(first_word_start: f64) -> f64 {
    match first_word_start {
        s if s > 2.0 => -2.0,
        s if s > 1.5 => -1.5,
        s if s > 1.0 => -1.0,
        s if s > 0.5 => -0.5,
        _ => 0.0,
    }
}

/// Conjunctions and discourse adverbials in the annotated sentences.
///
/// Sentences without part-of-speech tags fall back to a fixed list of
/// conjunctions.
pub fn linking_words(sentences: &[AnnotatedSentence]) -> Vec<String> {
    let tagged = sentences
        .iter()
        .flat_map(|s| &s.tokens)
        .any(|t| !t.pos.is_empty());

    sentences
        .iter()
        .flat_map(|s| &s.tokens)
        .filter(|t| {
            let lower = t.lower();
            if tagged {
                matches!(t.pos.as_str(), "CCONJ" | "SCONJ")
                    || (t.pos == "ADV" && DISCOURSE_ADVERBIALS.contains(&lower.as_str()))
            } else {
                let bare = lower.trim_matches(|c: char| !c.is_alphanumeric());
                LINKING_WORDS.contains(&bare) || DISCOURSE_ADVERBIALS.contains(&bare)
            }
        })
        .map(|t| t.lower())
        .collect()
}

/// Cap short answers and reward or penalize long ones by linking-word use.
pub fn revise_for_length(score: f64, word_count: usize, linking_count: usize) -> (f64, LengthRevision) {
    let linked = linking_count > 0;
    let cap = match word_count {
        n if n < 8 => Some(5.0),
        n if n < 12 => Some(if linked { 6.0 } else { 5.5 }),
        n if n < 18 => Some(if linked { 6.5 } else { 6.0 }),
        _ => None,
    };
    match cap {
        Some(cap) => (score.min(cap), LengthRevision::Capped { cap }),
        None => {
            let delta = match linking_count {
                0 => -0.5,
                1..=9 => 0.5,
                _ => 1.0,
            };
            (score + delta, LengthRevision::Adjusted { delta })
        }
    }
}

/// Score fluency and coherence for one answer.
pub fn score(input: &FluencyInput<'_>, params: &FluencyParams) -> EvaluationResult {
    if input.transcript.trim().is_empty() || input.words.is_empty() {
        return EvaluationResult::empty(Criterion::Fluency);
    }

    let word_count = input.transcript.split_whitespace().count();
    let (wpm, duration) = speech_rate(input.words);
    let rate_band = speech_rate_band(wpm);

    let pauses = long_pauses(input.words, params.long_pause_threshold);
    let penalty = input
        .words
        .first()
        .map(|w| late_start_penalty(w.start))
        .unwrap_or(0.0);
    // The late-start penalty lowers the long-pause sub-band only.
    let pause_band = clamp_score(occurrence_band(pauses.len()) + penalty);

    let markers: Vec<CategoryMarkers> = DisfluencyCategory::ALL
        .iter()
        .map(|&category| {
            let spans = input
                .tags
                .get(&category)
                .map(|tokens| align_predictions(input.words, tokens, category))
                .unwrap_or_default();
            CategoryMarkers {
                category,
                band: occurrence_band(spans.len()),
                spans,
            }
        })
        .collect();

    let weighted = SPEECH_RATE_WEIGHT * rate_band
        + markers
            .iter()
            .map(|m| category_weight(m.category) * m.band)
            .sum::<f64>()
        + LONG_PAUSE_WEIGHT * pause_band;
    let weighted = clamp_score(weighted);

    let linking = linking_words(input.sentences);
    let (revised, revision) = revise_for_length(weighted, word_count, linking.len());
    let band = Band::from_score(revised);

    tracing::debug!(
        word_count,
        wpm,
        pauses = pauses.len(),
        linking = linking.len(),
        weighted,
        band = band.value(),
        "fluency scored"
    );

    let diagnostics = FluencyDiagnostics {
        word_count,
        duration_seconds: duration,
        speech_rate_wpm: wpm,
        speech_rate_band: rate_band,
        long_pause_threshold: params.long_pause_threshold,
        long_pauses: pauses,
        long_pause_band: pause_band,
        late_start_penalty: penalty,
        markers,
        linking_words: linking,
        weighted_score: weighted,
        revision,
    };

    EvaluationResult {
        criterion: Criterion::Fluency,
        ielts_band: band,
        readable_feedback: feedback(&diagnostics),
        diagnostics: Diagnostics::Fluency(diagnostics),
    }
}

fn feedback(d: &FluencyDiagnostics) -> String {
    let mut lines = Vec::new();

    lines.push(match d.revision {
        LengthRevision::Capped { cap } if d.word_count < 8 => format!(
            "Your answer is very short ({} words), which limits your fluency band to {cap:.1}. \
             Develop your answer with reasons and examples.",
            d.word_count
        ),
        LengthRevision::Capped { cap } => format!(
            "Your answer has {} words, which limits your fluency band to {cap:.1}. \
             Longer answers give you room to show fluency.",
            d.word_count
        ),
        LengthRevision::Adjusted { .. } => format!(
            "Your answer has {} words, long enough to assess fluency fully.",
            d.word_count
        ),
    });

    lines.push(match d.linking_words.len() {
        0 => "You did not use any linking words. Connect your ideas with words like \
              \"because\", \"however\" or \"so\"."
            .to_string(),
        n if n < 10 => format!(
            "You used {n} linking word{}. Using more of them would make your answer more coherent.",
            if n == 1 { "" } else { "s" }
        ),
        n => format!("You used {n} linking words, which helps your answer flow."),
    });

    lines.push(format!(
        "Your speech rate was {:.0} words per minute.",
        d.speech_rate_wpm
    ));

    lines.push(match d.long_pauses.len() {
        0 => format!(
            "You did not pause for longer than {:.1} seconds.",
            d.long_pause_threshold
        ),
        n => format!(
            "You paused for longer than {:.1} seconds {n} time{}.",
            d.long_pause_threshold,
            if n == 1 { "" } else { "s" }
        ),
    });

    if d.late_start_penalty < 0.0 {
        lines.push("You took a while to start speaking. Try to begin your answer promptly.".to_string());
    }

    let total = d.marker_count();
    if total == 0 {
        lines.push("No disfluency markers were detected.".to_string());
    } else {
        let parts: Vec<String> = d
            .markers
            .iter()
            .filter(|m| !m.spans.is_empty())
            .map(|m| format!("{} {}", m.spans.len(), m.category.label()))
            .collect();
        lines.push(format!(
            "We detected {total} disfluency marker{}: {}.",
            if total == 1 { "" } else { "s" },
            parts.join(", ")
        ));
        for span in d.all_spans() {
            lines.push(format!(
                "- {} \"{}\" at {:.2}s-{:.2}s",
                span.category.label(),
                span.text,
                span.start,
                span.end
            ));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaggedToken, Token};
    use crate::EMPTY_TRANSCRIPTION_MESSAGE;

    fn timed_words(text: &str, seconds_per_word: f64) -> Vec<Word> {
        text.split_whitespace()
            .enumerate()
            .map(|(i, t)| {
                let start = i as f64 * seconds_per_word;
                Word::new(t, start, start + seconds_per_word, 0.95)
            })
            .collect()
    }

    fn tagged_sentence(text: &str, conj: &[&str]) -> AnnotatedSentence {
        let tokens = text
            .split_whitespace()
            .enumerate()
            .map(|(i, t)| Token {
                text: t.to_string(),
                lemma: t.to_lowercase(),
                pos: if conj.contains(&t) { "CCONJ".into() } else { "NOUN".into() },
                tag: String::new(),
                dep: String::new(),
                head: i,
            })
            .collect();
        AnnotatedSentence {
            text: text.to_string(),
            tokens,
        }
    }

    #[test]
    fn empty_transcript_scores_zero() {
        let tags = DisfluencyTags::new();
        let input = FluencyInput {
            transcript: "   ",
            words: &[],
            tags: &tags,
            sentences: &[],
        };
        let r = score(&input, &FluencyParams::default());
        assert_eq!(r.ielts_band, Band::ZERO);
        assert_eq!(r.readable_feedback, EMPTY_TRANSCRIPTION_MESSAGE);
        assert!(r.is_empty());
    }

    #[test]
    fn speech_rate_bands() {
        assert_eq!(speech_rate_band(165.0), 9.0);
        assert_eq!(speech_rate_band(150.0), 8.0);
        assert_eq!(speech_rate_band(95.0), 5.0);
        assert_eq!(speech_rate_band(10.0), 1.0);
        assert_eq!(speech_rate_band(0.0), 0.0);
    }

    #[test]
    fn speech_rate_single_word_uses_own_duration() {
        let words = vec![Word::new("hello", 1.0, 1.5, 1.0)];
        let (wpm, duration) = speech_rate(&words);
        assert_eq!(duration, 0.5);
        assert_eq!(wpm, 120.0);
        let zero = vec![Word::new("hi", 1.0, 1.0, 1.0)];
        assert_eq!(speech_rate(&zero).0, 0.0);
    }

    #[test]
    fn long_pause_band_is_non_increasing() {
        let mut previous = f64::INFINITY;
        for n in 0..20 {
            let words: Vec<Word> = (0..=n)
                .map(|i| Word::new("w", i as f64 * 4.0, i as f64 * 4.0 + 0.5, 1.0))
                .collect();
            let pauses = long_pauses(&words, 3.0);
            assert_eq!(pauses.len(), n);
            let band = occurrence_band(pauses.len());
            assert!(band <= previous);
            previous = band;
        }
    }

    #[test]
    fn pause_exactly_at_threshold_is_not_long() {
        let words = vec![Word::new("a", 0.0, 1.0, 1.0), Word::new("b", 4.0, 4.5, 1.0)];
        assert!(long_pauses(&words, 3.0).is_empty());
    }

    #[test]
    fn late_start_penalties() {
        assert_eq!(late_start_penalty(0.2), 0.0);
        assert_eq!(late_start_penalty(0.6), -0.5);
        assert_eq!(late_start_penalty(1.2), -1.0);
        assert_eq!(late_start_penalty(1.8), -1.5);
        assert_eq!(late_start_penalty(3.0), -2.0);
    }

    #[test]
    fn length_revision_caps_and_adjusts() {
        assert_eq!(revise_for_length(8.0, 5, 3).0, 5.0);
        assert_eq!(revise_for_length(8.0, 10, 0).0, 5.5);
        assert_eq!(revise_for_length(8.0, 10, 1).0, 6.0);
        assert_eq!(revise_for_length(8.0, 15, 0).0, 6.0);
        assert_eq!(revise_for_length(8.0, 15, 2).0, 6.5);
        assert_eq!(revise_for_length(4.0, 15, 2).0, 4.0);
        assert_eq!(revise_for_length(7.0, 30, 0).0, 6.5);
        assert_eq!(revise_for_length(7.0, 30, 4).0, 7.5);
        assert_eq!(revise_for_length(7.0, 30, 12).0, 8.0);
    }

    #[test]
    fn linking_words_from_tags_and_fallback() {
        let tagged = tagged_sentence("tea and coffee or juice", &["and", "or"]);
        assert_eq!(linking_words(&[tagged]), vec!["and", "or"]);

        let plain = AnnotatedSentence::plain("I stayed home because it rained, however I was fine");
        let found = linking_words(&[plain]);
        assert_eq!(found, vec!["because", "however"]);
    }

    #[test]
    fn fluent_twenty_word_answer_reaches_nine() {
        // 20 words over 8 seconds is 150 wpm.
        let transcript = "and I and we and they and you and it and he and she and one and two and three and four";
        let words = timed_words(transcript, 0.4);
        assert_eq!(words.len(), 20);
        let sentence = tagged_sentence(transcript, &["and"]);
        let tags = DisfluencyTags::new();
        let input = FluencyInput {
            transcript,
            words: &words,
            tags: &tags,
            sentences: std::slice::from_ref(&sentence),
        };
        let r = score(&input, &FluencyParams::default());
        let Diagnostics::Fluency(d) = &r.diagnostics else {
            panic!("expected fluency diagnostics");
        };
        assert_eq!(d.speech_rate_band, 8.0);
        assert_eq!(d.linking_words.len(), 10);
        assert!((d.weighted_score - 8.9).abs() < 1e-9);
        assert_eq!(d.revision, LengthRevision::Adjusted { delta: 1.0 });
        assert_eq!(r.ielts_band.value(), 9.0);
    }

    #[test]
    fn late_start_lowers_only_the_pause_sub_band() {
        // 20 words over 6 seconds (200 wpm), starting 2.5 seconds in.
        let transcript = "my favourite place is the city park near my home with green trees \
                          quiet paths little ponds old benches everywhere";
        let words: Vec<Word> = timed_words(transcript, 0.3)
            .into_iter()
            .map(|w| Word::new(w.text, w.start + 2.5, w.end + 2.5, w.confidence))
            .collect();
        assert_eq!(words.len(), 20);
        let tags = DisfluencyTags::new();
        let sentences = vec![AnnotatedSentence::plain(transcript)];
        let input = FluencyInput {
            transcript,
            words: &words,
            tags: &tags,
            sentences: &sentences,
        };
        let r = score(&input, &FluencyParams::default());
        let Diagnostics::Fluency(d) = &r.diagnostics else {
            panic!("expected fluency diagnostics");
        };
        assert_eq!(d.speech_rate_band, 9.0);
        assert_eq!(d.late_start_penalty, -2.0);
        assert_eq!(d.long_pause_band, 7.0);
        assert!(d.linking_words.is_empty());
        // 0.1 * 9 + 0.7 * 9 + 0.2 * 7
        assert!((d.weighted_score - 8.6).abs() < 1e-9);
        assert_eq!(d.revision, LengthRevision::Adjusted { delta: -0.5 });
        assert_eq!(r.ielts_band.value(), 8.0);
        assert!(r.readable_feedback.contains("took a while to start"));
    }

    #[test]
    fn markers_lower_the_band_and_appear_in_feedback() {
        let transcript = "um I think uh it is a good idea um because we can all go";
        let words = timed_words(transcript, 0.4);
        let mut tags = DisfluencyTags::new();
        tags.insert(
            DisfluencyCategory::FilledPause,
            transcript
                .split_whitespace()
                .map(|t| TaggedToken::new(t.to_lowercase(), u8::from(t == "um" || t == "uh")))
                .collect(),
        );
        let sentences = vec![AnnotatedSentence::plain(transcript)];
        let input = FluencyInput {
            transcript,
            words: &words,
            tags: &tags,
            sentences: &sentences,
        };
        let r = score(&input, &FluencyParams::default());
        let Diagnostics::Fluency(d) = &r.diagnostics else {
            panic!("expected fluency diagnostics");
        };
        let filled = &d.markers[0];
        assert_eq!(filled.category, DisfluencyCategory::FilledPause);
        assert_eq!(filled.spans.len(), 3);
        assert_eq!(filled.band, 6.0);
        assert!(r.readable_feedback.contains("3 filled pause"));
        assert!(r.readable_feedback.contains("\"uh\" at 1.20s-1.60s"));
        assert!((0.0..=9.0).contains(&r.ielts_band.value()));
    }
}
