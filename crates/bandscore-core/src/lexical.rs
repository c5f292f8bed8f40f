//! Lexical Resource scorer.
//!
//! Five signals: sentence-level CEFR level, word-frequency sophistication,
//! MTLD lexical diversity, content-word repetition, and a collocation check
//! that asks a masked language model whether it would have chosen the same
//! word.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::band::{clamp_score, Band};
use crate::lexicon::{is_stopword, FrequencyLexicon};
use crate::model::{AnnotatedSentence, CefrLevel, Criterion};
use crate::results::{Diagnostics, EvaluationResult};

/// Type-token ratio at which an MTLD factor is complete.
pub const MTLD_THRESHOLD: f64 = 0.72;

const CEFR_WEIGHT: f64 = 0.25;
const SOPHISTICATION_WEIGHT: f64 = 0.25;
const DIVERSITY_WEIGHT: f64 = 0.2;
const REPETITION_WEIGHT: f64 = 0.2;
const COLLOCATION_WEIGHT: f64 = 0.1;

const PROBE_POS: &[&str] = &["NOUN", "VERB", "ADJ", "ADV"];

/// One content word masked in its sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollocationProbe {
    pub sentence_index: usize,
    pub token_index: usize,
    pub word: String,
    pub masked_sentence: String,
}

/// A probe with the predictor's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub probe: CollocationProbe,
    pub predictions: Vec<String>,
    pub hit: bool,
}

impl ProbeOutcome {
    pub fn new(probe: CollocationProbe, predictions: Vec<String>) -> Self {
        let word = probe.word.to_lowercase();
        let hit = predictions
            .iter()
            .any(|p| normalize_prediction(p) == word);
        Self {
            probe,
            predictions,
            hit,
        }
    }
}

fn normalize_prediction(p: &str) -> String {
    p.trim()
        .trim_start_matches("##")
        .trim_start_matches('\u{2581}')
        .trim_start_matches('\u{0120}')
        .to_lowercase()
}

/// CEFR level assigned to one sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceLevel {
    pub text: String,
    pub level: CefrLevel,
    pub band: f64,
}

/// Share of tokens in each Zipf frequency bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyProfile {
    pub advanced: f64,
    pub less_common: f64,
    pub common: f64,
    pub very_common: f64,
}

/// A content word used more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatedWord {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalDiagnostics {
    pub word_count: usize,
    pub sentence_levels: Vec<SentenceLevel>,
    pub cefr_band: f64,
    pub profile: FrequencyProfile,
    pub repetition_ratio: f64,
    pub advanced_words: Vec<String>,
    pub sophistication_band: f64,
    pub mtld: f64,
    pub diversity_band: f64,
    pub content_repetition_ratio: f64,
    pub repeated_words: Vec<RepeatedWord>,
    pub repetition_band: f64,
    pub probes: Vec<ProbeOutcome>,
    pub collocation_score: f64,
    pub collocation_band: f64,
    pub weighted_score: f64,
}

/// Everything the lexical scorer reads.
#[derive(Debug, Clone, Copy)]
pub struct LexicalInput<'a> {
    pub transcript: &'a str,
    pub sentences: &'a [AnnotatedSentence],
    /// One level per sentence, in order.
    pub cefr_levels: &'a [CefrLevel],
    pub probes: &'a [ProbeOutcome],
}

/// Lowercase word tokens of a transcript. Punctuation is stripped and
/// apostrophes inside words are kept.
pub fn word_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| {
            t.replace('\u{2019}', "'")
                .trim_matches(|c: char| !c.is_alphabetic())
                .to_lowercase()
        })
        .filter(|t| t.chars().any(char::is_alphabetic))
        .collect()
}

/// Mean IELTS band of the sentence CEFR levels, rounded. Zero without levels.
pub fn cefr_band(levels: &[CefrLevel]) -> f64 {
    Band::mean(levels.iter().map(|l| Band::from_score(l.ielts_band()))).value()
}

pub fn frequency_profile(tokens: &[String], lexicon: &dyn FrequencyLexicon) -> FrequencyProfile {
    if tokens.is_empty() {
        return FrequencyProfile::default();
    }
    let mut profile = FrequencyProfile::default();
    for token in tokens {
        let zipf = lexicon.zipf(token);
        let slot = if zipf < 4.0 {
            &mut profile.advanced
        } else if zipf < 4.5 {
            &mut profile.less_common
        } else if zipf < 5.0 {
            &mut profile.common
        } else {
            &mut profile.very_common
        };
        *slot += 1.0;
    }
    let n = tokens.len() as f64;
    profile.advanced /= n;
    profile.less_common /= n;
    profile.common /= n;
    profile.very_common /= n;
    profile
}

fn counts(tokens: &[String]) -> HashMap<&str, usize> {
    let mut map = HashMap::new();
    for t in tokens {
        *map.entry(t.as_str()).or_insert(0) += 1;
    }
    map
}

/// Distinct words occurring more than once, over all tokens.
pub fn repetition_ratio(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let repeated = counts(tokens).values().filter(|&&n| n > 1).count();
    repeated as f64 / tokens.len() as f64
}

pub fn sophistication_band(profile: &FrequencyProfile, repetition: f64) -> f64 {
    let p = profile;
    if p.advanced > 0.3 && p.less_common > 0.2 && repetition < 0.15 && p.very_common < 0.4 {
        9.0
    } else if p.advanced > 0.2 && p.less_common > 0.15 && repetition < 0.2 && p.very_common < 0.5 {
        8.0
    } else if p.advanced > 0.1 && p.less_common > 0.1 && repetition < 0.25 && p.very_common < 0.6 {
        7.0
    } else if p.advanced > 0.05 && repetition < 0.3 {
        6.0
    } else {
        5.0
    }
}

fn mtld_pass<'a>(tokens: impl Iterator<Item = &'a String>, total: usize) -> f64 {
    let mut factors = 0.0;
    let mut types: HashSet<&str> = HashSet::new();
    let mut count = 0usize;

    for token in tokens {
        count += 1;
        types.insert(token.as_str());
        let ttr = types.len() as f64 / count as f64;
        if ttr <= MTLD_THRESHOLD {
            factors += 1.0;
            types.clear();
            count = 0;
        }
    }
    if count > 0 {
        let ttr = types.len() as f64 / count as f64;
        factors += (1.0 - ttr) / (1.0 - MTLD_THRESHOLD);
    }

    if factors == 0.0 {
        total as f64
    } else {
        total as f64 / factors
    }
}

/// Measure of textual lexical diversity: mean of a forward and a backward
/// pass, with partial credit for the trailing incomplete factor.
pub fn mtld(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let forward = mtld_pass(tokens.iter(), tokens.len());
    let backward = mtld_pass(tokens.iter().rev(), tokens.len());
    (forward + backward) / 2.0
}

pub fn diversity_band(mtld: f64) -> f64 {
    match mtld {
        m if m > 100.0 => 9.0,
        m if m > 80.0 => 8.0,
        m if m > 60.0 => 7.0,
        m if m > 40.0 => 6.0,
        _ => 5.0,
    }
}

/// Extra occurrences of repeated content words over all content words,
/// with the repeated words themselves sorted by count.
pub fn content_repetition(tokens: &[String]) -> (f64, Vec<RepeatedWord>) {
    let content: Vec<String> = tokens.iter().filter(|t| !is_stopword(t)).cloned().collect();
    if content.is_empty() {
        return (0.0, Vec::new());
    }
    let mut repeated: Vec<RepeatedWord> = counts(&content)
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(w, n)| RepeatedWord {
            word: w.to_string(),
            count: n,
        })
        .collect();
    repeated.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    let extra: usize = repeated.iter().map(|r| r.count - 1).sum();
    (extra as f64 / content.len() as f64, repeated)
}

pub fn repetition_band(ratio: f64, has_content: bool) -> f64 {
    if !has_content {
        return 9.0;
    }
    match ratio {
        r if r < 0.1 => 9.0,
        r if r < 0.2 => 8.0,
        r if r < 0.3 => 7.0,
        r if r < 0.4 => 6.0,
        r if r < 0.5 => 5.0,
        _ => 4.0,
    }
}

/// Mask each probe-worthy content word of each sentence in turn.
pub fn collocation_probes(sentences: &[AnnotatedSentence], mask_token: &str) -> Vec<CollocationProbe> {
    let mut probes = Vec::new();
    for (sentence_index, sentence) in sentences.iter().enumerate() {
        // Byte offset of each token in the sentence text, found left to right.
        let mut cursor = 0usize;
        let offsets: Vec<Option<usize>> = sentence
            .tokens
            .iter()
            .map(|t| {
                let found = sentence.text[cursor..].find(&t.text).map(|off| cursor + off);
                if let Some(start) = found {
                    cursor = start + t.text.len();
                }
                found
            })
            .collect();

        for (token_index, token) in sentence.tokens.iter().enumerate() {
            if !PROBE_POS.contains(&token.pos.as_str())
                || is_stopword(&token.text)
                || !token.text.chars().any(char::is_alphabetic)
            {
                continue;
            }
            let masked_sentence = match offsets[token_index] {
                Some(start) => format!(
                    "{}{}{}",
                    &sentence.text[..start],
                    mask_token,
                    &sentence.text[start + token.text.len()..]
                ),
                None => sentence
                    .tokens
                    .iter()
                    .enumerate()
                    .map(|(i, t)| if i == token_index { mask_token } else { t.text.as_str() })
                    .collect::<Vec<_>>()
                    .join(" "),
            };
            probes.push(CollocationProbe {
                sentence_index,
                token_index,
                word: token.text.to_lowercase(),
                masked_sentence,
            });
        }
    }
    probes
}

/// Percentage of probes whose word was among the predictions. Zero without probes.
pub fn collocation_score(outcomes: &[ProbeOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let hits = outcomes.iter().filter(|o| o.hit).count();
    hits as f64 / outcomes.len() as f64 * 100.0
}

pub fn collocation_band(score: f64) -> f64 {
    match score {
        s if s >= 100.0 => 9.0,
        s if s >= 90.0 => 8.0,
        s if s >= 75.0 => 7.0,
        s if s >= 60.0 => 6.0,
        s if s >= 45.0 => 5.0,
        s if s >= 30.0 => 4.0,
        s if s >= 15.0 => 3.0,
        _ => 1.0,
    }
}

/// Score lexical resource for one answer.
pub fn score(input: &LexicalInput<'_>, lexicon: &dyn FrequencyLexicon) -> EvaluationResult {
    let tokens = word_tokens(input.transcript);
    if input.transcript.trim().is_empty() || tokens.is_empty() {
        return EvaluationResult::empty(Criterion::Lexical);
    }

    let sentence_levels: Vec<SentenceLevel> = input
        .sentences
        .iter()
        .zip(input.cefr_levels)
        .map(|(s, level)| SentenceLevel {
            text: s.text.clone(),
            level: *level,
            band: level.ielts_band(),
        })
        .collect();
    let cefr = cefr_band(input.cefr_levels);

    let profile = frequency_profile(&tokens, lexicon);
    let repetition = repetition_ratio(&tokens);
    let sophistication = sophistication_band(&profile, repetition);
    let mut advanced_words: Vec<String> = tokens
        .iter()
        .filter(|t| lexicon.zipf(t) < 4.0 && !is_stopword(t))
        .cloned()
        .collect();
    advanced_words.sort();
    advanced_words.dedup();

    let diversity = mtld(&tokens);
    let diversity_b = diversity_band(diversity);

    let has_content = tokens.iter().any(|t| !is_stopword(t));
    let (content_ratio, repeated_words) = content_repetition(&tokens);
    let repetition_b = repetition_band(content_ratio, has_content);

    let colloc = collocation_score(input.probes);
    let colloc_b = collocation_band(colloc);

    let weighted = clamp_score(
        CEFR_WEIGHT * cefr
            + SOPHISTICATION_WEIGHT * sophistication
            + DIVERSITY_WEIGHT * diversity_b
            + REPETITION_WEIGHT * repetition_b
            + COLLOCATION_WEIGHT * colloc_b,
    );
    let band = Band::from_score(weighted);

    tracing::debug!(
        cefr,
        sophistication,
        mtld = diversity,
        repetition = content_ratio,
        collocation = colloc,
        band = band.value(),
        "lexical scored"
    );

    let diagnostics = LexicalDiagnostics {
        word_count: tokens.len(),
        sentence_levels,
        cefr_band: cefr,
        profile,
        repetition_ratio: repetition,
        advanced_words,
        sophistication_band: sophistication,
        mtld: diversity,
        diversity_band: diversity_b,
        content_repetition_ratio: content_ratio,
        repeated_words,
        repetition_band: repetition_b,
        probes: input.probes.to_vec(),
        collocation_score: colloc,
        collocation_band: colloc_b,
        weighted_score: weighted,
    };

    EvaluationResult {
        criterion: Criterion::Lexical,
        ielts_band: band,
        readable_feedback: feedback(&diagnostics),
        diagnostics: Diagnostics::Lexical(diagnostics),
    }
}

fn feedback(d: &LexicalDiagnostics) -> String {
    let mut lines = Vec::new();

    if !d.sentence_levels.is_empty() {
        let mut levels: Vec<CefrLevel> = d.sentence_levels.iter().map(|s| s.level).collect();
        levels.sort();
        let highest = levels[levels.len() - 1];
        lines.push(format!(
            "Your sentences were rated between CEFR {} and {}, an IELTS equivalent of {:.1}.",
            levels[0], highest, d.cefr_band
        ));
    }

    lines.push(match d.sophistication_band {
        b if b >= 8.0 => "You use a good proportion of less common words.".to_string(),
        b if b >= 6.0 => {
            "You use some less common words. Adding more precise vocabulary would raise your score."
                .to_string()
        }
        _ => "Most of your words are very common. Try using more precise, less common vocabulary."
            .to_string(),
    });
    if !d.advanced_words.is_empty() {
        lines.push(format!(
            "Less common words you used: {}.",
            d.advanced_words.join(", ")
        ));
    }

    lines.push(format!(
        "Your lexical diversity (MTLD) is {:.1}. {}",
        d.mtld,
        if d.diversity_band >= 7.0 {
            "You vary your vocabulary well."
        } else {
            "Try to vary your vocabulary more."
        }
    ));

    if d.repeated_words.is_empty() {
        lines.push("You did not repeat any content words.".to_string());
    } else {
        let top: Vec<String> = d
            .repeated_words
            .iter()
            .take(5)
            .map(|r| format!("\"{}\" ({}x)", r.word, r.count))
            .collect();
        lines.push(format!(
            "You repeated some words: {}. Use synonyms or paraphrase to avoid repetition.",
            top.join(", ")
        ));
    }

    if d.probes.is_empty() {
        lines.push("No content words could be checked for natural collocation.".to_string());
    } else {
        lines.push(format!(
            "{:.0}% of your content words matched the choices of a language model in context.",
            d.collocation_score
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::ZipfLexicon;
    use crate::model::Token;
    use crate::EMPTY_TRANSCRIPTION_MESSAGE;

    fn toks(text: &str) -> Vec<String> {
        word_tokens(text)
    }

    fn lexicon(pairs: &[(&str, f64)]) -> ZipfLexicon {
        ZipfLexicon::new(pairs.iter().map(|(w, z)| (w.to_string(), *z)).collect())
    }

    #[test]
    fn empty_transcript_scores_zero() {
        let input = LexicalInput {
            transcript: "",
            sentences: &[],
            cefr_levels: &[],
            probes: &[],
        };
        let r = score(&input, &ZipfLexicon::builtin());
        assert_eq!(r.ielts_band, Band::ZERO);
        assert_eq!(r.readable_feedback, EMPTY_TRANSCRIPTION_MESSAGE);
    }

    #[test]
    fn word_tokens_strip_punctuation() {
        assert_eq!(
            toks("Well, I don’t know... 42 ways!"),
            vec!["well", "i", "don't", "know", "ways"]
        );
    }

    #[test]
    fn cefr_mean_is_rounded() {
        assert_eq!(cefr_band(&[CefrLevel::B2, CefrLevel::C1]), 7.0);
        assert_eq!(cefr_band(&[CefrLevel::A2, CefrLevel::B1]), 3.5);
        assert_eq!(cefr_band(&[]), 0.0);
    }

    #[test]
    fn frequency_buckets() {
        let lex = lexicon(&[("the", 7.7), ("city", 5.3), ("commute", 4.2), ("vibrant", 3.7)]);
        let profile = frequency_profile(&toks("the city commute vibrant unknownword"), &lex);
        assert_eq!(profile.very_common, 0.4);
        assert_eq!(profile.less_common, 0.2);
        assert_eq!(profile.advanced, 0.4);
        assert_eq!(profile.common, 0.0);
    }

    #[test]
    fn very_common_unrepeated_words_cap_sophistication() {
        let lex = ZipfLexicon::builtin();
        let tokens = toks("I think people like good music and friends");
        let profile = frequency_profile(&tokens, &lex);
        assert!(profile.advanced == 0.0);
        assert!(sophistication_band(&profile, repetition_ratio(&tokens)) <= 5.0);
    }

    #[test]
    fn everyday_topic_words_are_not_advanced() {
        let tokens = toks("I enjoy cooking and football at the weekend with coffee in my garden");
        let profile = frequency_profile(&tokens, &ZipfLexicon::builtin());
        assert_eq!(profile.advanced, 0.0);
    }

    #[test]
    fn sophistication_top_tier() {
        let profile = FrequencyProfile {
            advanced: 0.35,
            less_common: 0.25,
            common: 0.1,
            very_common: 0.3,
        };
        assert_eq!(sophistication_band(&profile, 0.1), 9.0);
        assert_eq!(sophistication_band(&profile, 0.17), 8.0);
    }

    #[test]
    fn mtld_of_repetitive_text_is_low() {
        let repetitive = toks(&"the cat the cat the cat the cat the cat".repeat(3));
        let varied = toks(
            "my hometown is a bustling coastal city famous for seafood markets \
             narrow cobbled streets lively festivals and friendly residents who welcome visitors",
        );
        assert!(mtld(&repetitive) < mtld(&varied));
        assert_eq!(mtld(&[]), 0.0);
    }

    #[test]
    fn mtld_counts_full_factors() {
        // "a b a b": TTR falls to 0.67 at the third token, completing one
        // factor; the trailing "b" has TTR 1.0 and adds no partial credit.
        let tokens = toks("a b a b");
        assert!((mtld(&tokens) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn content_repetition_ignores_stopwords() {
        let (ratio, repeated) = content_repetition(&toks("the park is nice and the park is big"));
        // content: park nice park big → one extra "park" over 4
        assert_eq!(ratio, 0.25);
        assert_eq!(repeated, vec![RepeatedWord { word: "park".into(), count: 2 }]);
        assert_eq!(repetition_band(ratio, true), 7.0);
        assert_eq!(repetition_band(0.0, false), 9.0);
    }

    #[test]
    fn collocation_bands_and_score() {
        assert_eq!(collocation_band(100.0), 9.0);
        assert_eq!(collocation_band(80.0), 7.0);
        assert_eq!(collocation_band(10.0), 1.0);
        assert_eq!(collocation_score(&[]), 0.0);
    }

    #[test]
    fn probes_mask_content_words_in_place() {
        let sentence = AnnotatedSentence {
            text: "I really enjoy fresh bread.".into(),
            tokens: vec![
                tok("I", "PRON"),
                tok("really", "ADV"),
                tok("enjoy", "VERB"),
                tok("fresh", "ADJ"),
                tok("bread", "NOUN"),
                tok(".", "PUNCT"),
            ],
        };
        let probes = collocation_probes(&[sentence], "[MASK]");
        let words: Vec<&str> = probes.iter().map(|p| p.word.as_str()).collect();
        assert_eq!(words, vec!["really", "enjoy", "fresh", "bread"]);
        assert_eq!(probes[3].masked_sentence, "I really enjoy fresh [MASK].");
        assert_eq!(probes[0].masked_sentence, "I [MASK] enjoy fresh bread.");
    }

    #[test]
    fn probe_outcome_matches_case_insensitively() {
        let probe = CollocationProbe {
            sentence_index: 0,
            token_index: 4,
            word: "bread".into(),
            masked_sentence: "I really enjoy fresh [MASK].".into(),
        };
        let outcome = ProbeOutcome::new(probe.clone(), vec!["fish".into(), "Bread".into()]);
        assert!(outcome.hit);
        let outcome = ProbeOutcome::new(probe, vec!["fruit".into()]);
        assert!(!outcome.hit);
    }

    fn tok(text: &str, pos: &str) -> Token {
        Token {
            text: text.into(),
            lemma: text.to_lowercase(),
            pos: pos.into(),
            tag: String::new(),
            dep: String::new(),
            head: 0,
        }
    }

    #[test]
    fn full_score_combines_signals() {
        let transcript = "My hometown is a picturesque village with tranquil rivers and vibrant markets.";
        let sentences = vec![AnnotatedSentence::plain(transcript)];
        let levels = [CefrLevel::C1];
        let probe = CollocationProbe {
            sentence_index: 0,
            token_index: 4,
            word: "picturesque".into(),
            masked_sentence: "My hometown is a [MASK] village with tranquil rivers and vibrant markets.".into(),
        };
        let probes = vec![ProbeOutcome::new(probe, vec!["picturesque".into(), "small".into()])];
        let input = LexicalInput {
            transcript,
            sentences: &sentences,
            cefr_levels: &levels,
            probes: &probes,
        };
        let r = score(&input, &ZipfLexicon::builtin());
        let Diagnostics::Lexical(d) = &r.diagnostics else {
            panic!("expected lexical diagnostics");
        };
        assert_eq!(d.cefr_band, 7.5);
        assert_eq!(d.collocation_score, 100.0);
        assert_eq!(d.collocation_band, 9.0);
        assert_eq!(d.repetition_band, 9.0);
        assert!(d.advanced_words.contains(&"picturesque".to_string()));
        assert!((0.0..=9.0).contains(&r.ielts_band.value()));
        assert_eq!(r.ielts_band, Band::from_score(d.weighted_score));
    }
}
