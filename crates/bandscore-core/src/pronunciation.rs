//! Pronunciation scorer.
//!
//! Phonemes held for less than a minimum duration are treated as not fully
//! pronounced, and aligned words with no phones at all as missing. The
//! resulting phoneme error rate is blended with the mean ASR confidence.

use serde::{Deserialize, Serialize};

use crate::band::Band;
use crate::model::{Criterion, PhonemeInterval, PhonemeStatus, Word, WordAlignment};
use crate::phonemes::{is_silence, is_spoken_noise, to_ipa_or_raw};
use crate::results::{Diagnostics, EvaluationResult};
use crate::templates::prose_tier;

const PHONEME_WEIGHT: f64 = 0.8;
const CONFIDENCE_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PronunciationParams {
    /// Phonemes shorter than this many seconds are under-duration.
    pub under_duration_threshold: f64,
}

impl Default for PronunciationParams {
    fn default() -> Self {
        Self {
            under_duration_threshold: 0.06,
        }
    }
}

/// A word with at least one under-duration phoneme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
    /// The whole word in IPA.
    pub ipa: String,
    pub phonemes: Vec<PhonemeInterval>,
}

impl FlaggedWord {
    pub fn under_duration(&self) -> impl Iterator<Item = &PhonemeInterval> {
        self.phonemes
            .iter()
            .filter(|p| p.status == PhonemeStatus::UnderDuration)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PronunciationDiagnostics {
    pub total_phonemes: usize,
    pub under_duration: usize,
    pub missing_words: Vec<String>,
    pub phoneme_error_rate: f64,
    pub phoneme_band: f64,
    pub mean_confidence: Option<f64>,
    pub confidence_band: f64,
    /// Speech words with IPA and phoneme status filled in.
    pub words: Vec<WordAlignment>,
    pub flagged_words: Vec<FlaggedWord>,
}

/// Drop silence, convert phones to IPA, and mark under-duration phonemes.
pub fn mark_phonemes(alignment: &[WordAlignment], params: &PronunciationParams) -> Vec<WordAlignment> {
    alignment
        .iter()
        .filter(|w| !is_silence(&w.word))
        .map(|w| WordAlignment {
            word: w.word.clone(),
            start: w.start,
            end: w.end,
            phonemes: w
                .phonemes
                .iter()
                .filter(|p| !is_silence(&p.arpabet))
                .map(|p| PhonemeInterval {
                    arpabet: p.arpabet.clone(),
                    ipa: if p.ipa.is_empty() {
                        to_ipa_or_raw(&p.arpabet)
                    } else {
                        p.ipa.clone()
                    },
                    start: p.start,
                    end: p.end,
                    status: if p.duration() < params.under_duration_threshold {
                        PhonemeStatus::UnderDuration
                    } else {
                        PhonemeStatus::Pronounced
                    },
                })
                .collect(),
        })
        .collect()
}

fn is_missing(word: &WordAlignment) -> bool {
    word.phonemes.iter().all(|p| is_spoken_noise(&p.arpabet))
}

pub fn phoneme_band(per: f64) -> f64 {
    match per {
        r if r < 0.05 => 9.0,
        r if r < 0.10 => 8.0,
        r if r < 0.20 => 7.0,
        r if r < 0.30 => 6.0,
        r if r < 0.40 => 5.0,
        r if r < 0.50 => 4.0,
        r if r < 0.70 => 3.0,
        _ => 1.0,
    }
}

/// Band for the mean ASR confidence; 1 when there are no words.
pub fn confidence_band(mean: Option<f64>) -> f64 {
    match mean {
        Some(c) if c > 0.9 => 9.0,
        Some(c) if c > 0.8 => 8.0,
        Some(c) if c > 0.7 => 7.0,
        Some(c) if c > 0.6 => 6.0,
        Some(c) if c > 0.5 => 5.0,
        Some(c) if c > 0.4 => 4.0,
        Some(c) if c > 0.3 => 3.0,
        Some(c) if c > 0.2 => 2.0,
        _ => 1.0,
    }
}

/// Score pronunciation for one answer.
pub fn score(
    transcript: &str,
    alignment: &[WordAlignment],
    words: &[Word],
    params: &PronunciationParams,
) -> EvaluationResult {
    if transcript.trim().is_empty() {
        return EvaluationResult::empty(Criterion::Pronunciation);
    }

    let marked = mark_phonemes(alignment, params);

    let mut missing_words: Vec<String> = Vec::new();
    let mut total = 0usize;
    let mut under = 0usize;
    for word in &marked {
        if is_missing(word) {
            missing_words.push(word.word.clone());
            continue;
        }
        for p in word.phonemes.iter().filter(|p| !is_spoken_noise(&p.arpabet)) {
            total += 1;
            if p.status == PhonemeStatus::UnderDuration {
                under += 1;
            }
        }
    }
    if marked.is_empty() {
        // Nothing was aligned: every spoken word is missing.
        missing_words = transcript.split_whitespace().map(str::to_string).collect();
        tracing::warn!(
            words = missing_words.len(),
            "no aligned speech; treating every word as missing"
        );
    }

    let missing = missing_words.len();
    let denominator = total + missing;
    let per = if denominator == 0 {
        0.0
    } else {
        (under + missing) as f64 / denominator as f64
    };
    let phoneme = phoneme_band(per);

    let mean_confidence = if words.is_empty() {
        None
    } else {
        Some(words.iter().map(|w| w.confidence).sum::<f64>() / words.len() as f64)
    };
    let confidence = confidence_band(mean_confidence);
    let band = Band::from_score(PHONEME_WEIGHT * phoneme + CONFIDENCE_WEIGHT * confidence);

    let flagged_words: Vec<FlaggedWord> = marked
        .iter()
        .filter(|w| {
            w.phonemes
                .iter()
                .any(|p| p.status == PhonemeStatus::UnderDuration)
        })
        .map(|w| FlaggedWord {
            word: w.word.clone(),
            start: w.start,
            end: w.end,
            ipa: w.phonemes.iter().map(|p| p.ipa.as_str()).collect(),
            phonemes: w.phonemes.clone(),
        })
        .collect();

    tracing::debug!(
        total,
        under,
        missing,
        per,
        confidence = ?mean_confidence,
        band = band.value(),
        "pronunciation scored"
    );

    let diagnostics = PronunciationDiagnostics {
        total_phonemes: total,
        under_duration: under,
        missing_words,
        phoneme_error_rate: per,
        phoneme_band: phoneme,
        mean_confidence,
        confidence_band: confidence,
        words: marked,
        flagged_words,
    };

    EvaluationResult {
        criterion: Criterion::Pronunciation,
        ielts_band: band,
        readable_feedback: feedback(&diagnostics, band),
        diagnostics: Diagnostics::Pronunciation(diagnostics),
    }
}

const BAND_PROSE: [&str; 16] = [
    "Your speech could not be understood. Practise individual English sounds slowly.",
    "Very few sounds were pronounced clearly. Focus on producing each sound fully.",
    "Many sounds were cut short or missing, which makes you hard to understand.",
    "Frequent mispronunciations put strain on the listener.",
    "Several sounds are not fully pronounced. Slow down and articulate each syllable.",
    "Some sounds are cut short, and listeners may need effort to follow you.",
    "Your pronunciation is understandable with some effort.",
    "You are mostly understandable, but a number of sounds are rushed.",
    "You are generally understood, though some sounds are unclear.",
    "Your pronunciation is generally clear, with a few rushed sounds.",
    "You are easy to understand, with occasional lapses.",
    "Your pronunciation is clear, and only a few sounds were rushed.",
    "You are easy to understand throughout.",
    "Your pronunciation is clear and precise, with rare lapses.",
    "Your pronunciation is very clear and natural.",
    "Your pronunciation is effortless to understand.",
];

fn feedback(d: &PronunciationDiagnostics, band: Band) -> String {
    let mut lines = vec![BAND_PROSE[prose_tier(band.value())].to_string()];

    if d.total_phonemes > 0 {
        lines.push(format!(
            "{} of {} phonemes were too short to count as fully pronounced.",
            d.under_duration, d.total_phonemes
        ));
    }
    if !d.missing_words.is_empty() {
        lines.push(format!(
            "{} word{} could not be matched to clear speech: {}.",
            d.missing_words.len(),
            if d.missing_words.len() == 1 { "" } else { "s" },
            d.missing_words.join(", ")
        ));
    }
    if !d.flagged_words.is_empty() {
        lines.push("Words to practise:".to_string());
        for w in &d.flagged_words {
            let short: Vec<&str> = w.under_duration().map(|p| p.ipa.as_str()).collect();
            lines.push(format!(
                "- \"{}\" /{}/ (short: {})",
                w.word,
                w.ipa,
                short.join(" ")
            ));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EMPTY_TRANSCRIPTION_MESSAGE;

    fn phone(arpabet: &str, start: f64, end: f64) -> PhonemeInterval {
        PhonemeInterval {
            arpabet: arpabet.into(),
            ipa: String::new(),
            start,
            end,
            status: PhonemeStatus::Pronounced,
        }
    }

    fn word(text: &str, phones: Vec<PhonemeInterval>) -> WordAlignment {
        let start = phones.first().map(|p| p.start).unwrap_or(0.0);
        let end = phones.last().map(|p| p.end).unwrap_or(0.0);
        WordAlignment {
            word: text.into(),
            start,
            end,
            phonemes: phones,
        }
    }

    fn think(short_th: bool) -> WordAlignment {
        let th_end = if short_th { 0.03 } else { 0.1 };
        word(
            "think",
            vec![
                phone("TH", 0.0, th_end),
                phone("IH1", th_end, th_end + 0.1),
                phone("NG", th_end + 0.1, th_end + 0.2),
                phone("K", th_end + 0.2, th_end + 0.3),
            ],
        )
    }

    #[test]
    fn empty_transcript_scores_zero() {
        let r = score(" ", &[], &[], &PronunciationParams::default());
        assert_eq!(r.ielts_band, Band::ZERO);
        assert_eq!(r.readable_feedback, EMPTY_TRANSCRIPTION_MESSAGE);
    }

    #[test]
    fn perfect_alignment_and_confidence_is_nine() {
        let words = vec![Word::new("think", 0.0, 0.4, 1.0)];
        let r = score("think", &[think(false)], &words, &PronunciationParams::default());
        assert_eq!(r.ielts_band.value(), 9.0);
    }

    #[test]
    fn short_phonemes_are_flagged_with_ipa() {
        let words = vec![Word::new("think", 0.0, 0.33, 0.95)];
        let r = score("think", &[think(true)], &words, &PronunciationParams::default());
        let Diagnostics::Pronunciation(d) = &r.diagnostics else {
            panic!("expected pronunciation diagnostics");
        };
        assert_eq!(d.total_phonemes, 4);
        assert_eq!(d.under_duration, 1);
        assert_eq!(d.phoneme_error_rate, 0.25);
        assert_eq!(d.phoneme_band, 6.0);
        assert_eq!(d.flagged_words.len(), 1);
        assert_eq!(d.flagged_words[0].ipa, "θɪŋk");
        // 0.8 * 6 + 0.2 * 9 = 6.6 → 6.5
        assert_eq!(r.ielts_band.value(), 6.5);
        assert!(r.readable_feedback.contains("\"think\" /θɪŋk/ (short: θ)"));
    }

    #[test]
    fn silence_is_ignored_and_spoken_noise_is_missing() {
        let alignment = vec![
            word("", vec![phone("sil", 0.0, 0.5)]),
            think(false),
            word("um", vec![phone("spn", 0.9, 1.2)]),
            word("okay", vec![]),
        ];
        let r = score("think um okay", &alignment, &[], &PronunciationParams::default());
        let Diagnostics::Pronunciation(d) = &r.diagnostics else {
            panic!("expected pronunciation diagnostics");
        };
        assert_eq!(d.words.len(), 3);
        assert_eq!(d.missing_words, vec!["um", "okay"]);
        assert_eq!(d.total_phonemes, 4);
        // (0 + 2) / (4 + 2)
        assert!((d.phoneme_error_rate - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(d.confidence_band, 1.0);
    }

    #[test]
    fn missing_alignment_counts_every_word() {
        let r = score("hello there", &[], &[], &PronunciationParams::default());
        let Diagnostics::Pronunciation(d) = &r.diagnostics else {
            panic!("expected pronunciation diagnostics");
        };
        assert_eq!(d.missing_words.len(), 2);
        assert_eq!(d.phoneme_error_rate, 1.0);
        assert_eq!(r.ielts_band.value(), 1.0);
    }

    #[test]
    fn band_tables() {
        assert_eq!(phoneme_band(0.0), 9.0);
        assert_eq!(phoneme_band(0.15), 7.0);
        assert_eq!(phoneme_band(0.8), 1.0);
        assert_eq!(confidence_band(Some(0.95)), 9.0);
        assert_eq!(confidence_band(Some(0.55)), 5.0);
        assert_eq!(confidence_band(None), 1.0);
    }
}
