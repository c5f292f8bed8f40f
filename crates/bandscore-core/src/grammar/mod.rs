//! Grammatical Range & Accuracy scorer.
//!
//! Accuracy comes from diffing each sentence against its correction; range
//! comes from the mix of sentence structures, grammatical features, tenses
//! and sentence functions across the answer.

pub mod classify;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::band::{clamp_score, round_to_band, Band};
use crate::diff::diff_sentences;
use crate::model::{
    AnnotatedSentence, Criterion, ErrorEdit, GrammarFeature, SentenceAnnotation, SentenceFunction,
    SentenceStructure, Tense,
};
use crate::results::{Diagnostics, EvaluationResult};
use crate::templates::prose_tier;

/// A segmented sentence paired with the corrector's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedSentence {
    pub sentence: AnnotatedSentence,
    pub corrected: String,
}

/// Per-sentence grammar findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceAssessment {
    pub annotation: SentenceAnnotation,
    pub corrected: String,
    pub edits: Vec<ErrorEdit>,
    pub error_rate: f64,
    pub accuracy_band: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarDiagnostics {
    pub sentences: Vec<SentenceAssessment>,
    pub accuracy_band: f64,
    pub structure_band: f64,
    pub feature_band: f64,
    pub tense_band: f64,
    pub function_band: f64,
    pub range_band: f64,
    pub structure_counts: BTreeMap<SentenceStructure, usize>,
    pub function_counts: BTreeMap<SentenceFunction, usize>,
    pub features_used: Vec<GrammarFeature>,
    pub tenses_used: Vec<Tense>,
}

impl GrammarDiagnostics {
    pub fn edit_count(&self) -> usize {
        self.sentences.iter().map(|s| s.edits.len()).sum()
    }
}

pub fn accuracy_band(error_rate: f64) -> f64 {
    match error_rate {
        r if r < 0.02 => 9.0,
        r if r < 0.05 => 8.0,
        r if r < 0.10 => 7.0,
        r if r < 0.15 => 6.0,
        r if r < 0.25 => 5.0,
        r if r < 0.35 => 4.0,
        r if r < 0.60 => 3.0,
        _ => 1.0,
    }
}

/// Band for the share of complex and compound-complex sentences.
pub fn structure_band(counts: &BTreeMap<SentenceStructure, usize>) -> f64 {
    let total: usize = counts.values().sum();
    if total == 0 {
        return 5.0;
    }
    let count = |s: SentenceStructure| counts.get(&s).copied().unwrap_or(0);
    let compound_complex = count(SentenceStructure::CompoundComplex);
    let complex_ratio = (count(SentenceStructure::Complex) + compound_complex) as f64 / total as f64;

    match complex_ratio {
        r if r > 0.75 => {
            if compound_complex >= 3 {
                9.0
            } else if compound_complex >= 1 {
                8.0
            } else {
                7.0
            }
        }
        r if r > 0.5 => 7.0,
        r if r > 0.25 => 6.0,
        r if r > 0.0 => 5.0,
        _ => {
            let simple_ratio = count(SentenceStructure::Simple) as f64 / total as f64;
            if simple_ratio >= 0.75 {
                3.0
            } else if simple_ratio >= 0.5 {
                4.0
            } else {
                5.0
            }
        }
    }
}

/// Band for weighted coverage of the grammatical features.
pub fn feature_band(features: &[GrammarFeature]) -> f64 {
    let max: f64 = GrammarFeature::ALL.iter().map(|f| f.weight()).sum();
    let mut distinct = features.to_vec();
    distinct.sort();
    distinct.dedup();
    let coverage = distinct.iter().map(|f| f.weight()).sum::<f64>() / max;

    match coverage {
        c if c >= 1.0 => 9.0,
        c if c >= 0.75 => 8.0,
        c if c >= 0.6 => 7.0,
        c if c >= 0.45 => 6.0,
        c if c >= 0.3 => 5.0,
        c if c >= 0.15 => 4.0,
        c if c > 0.0 => 3.0,
        _ => 2.0,
    }
}

/// Band for the number of distinct tenses.
pub fn tense_band(distinct: usize) -> f64 {
    (distinct.min(7) + 2) as f64
}

/// Band for the number of distinct sentence functions.
pub fn function_band(distinct: usize) -> f64 {
    (distinct.min(4) + 5) as f64
}

/// Score grammatical range and accuracy for one answer.
pub fn score(transcript: &str, sentences: &[CorrectedSentence]) -> EvaluationResult {
    if transcript.trim().is_empty() || sentences.is_empty() {
        return EvaluationResult::empty(Criterion::Grammar);
    }

    let assessments: Vec<SentenceAssessment> = sentences
        .iter()
        .map(|cs| {
            let diff = diff_sentences(&cs.sentence.text, &cs.corrected);
            let band = accuracy_band(diff.error_rate);
            tracing::debug!(
                sentence = %cs.sentence.text,
                edits = diff.edits.len(),
                error_rate = diff.error_rate,
                "grammar sentence assessed"
            );
            SentenceAssessment {
                annotation: classify::annotate(&cs.sentence),
                corrected: cs.corrected.clone(),
                edits: diff.edits,
                error_rate: diff.error_rate,
                accuracy_band: band,
            }
        })
        .collect();

    let accuracy = Band::mean(assessments.iter().map(|a| Band::from_score(a.accuracy_band))).value();

    let mut structure_counts = BTreeMap::new();
    let mut function_counts = BTreeMap::new();
    let mut features_used: Vec<GrammarFeature> = Vec::new();
    let mut tenses_used: Vec<Tense> = Vec::new();
    for a in &assessments {
        *structure_counts.entry(a.annotation.structure).or_insert(0) += 1;
        *function_counts.entry(a.annotation.function).or_insert(0) += 1;
        for f in &a.annotation.features {
            if !features_used.contains(f) {
                features_used.push(*f);
            }
        }
        for t in &a.annotation.tenses {
            if !tenses_used.contains(t) {
                tenses_used.push(*t);
            }
        }
    }
    features_used.sort();

    let structure = structure_band(&structure_counts);
    let feature = feature_band(&features_used);
    let tense = tense_band(tenses_used.len());
    let function = function_band(function_counts.len());
    let range = round_to_band(clamp_score(
        0.5 * structure + 0.3 * feature + 0.1 * tense + 0.1 * function,
    ));
    let band = Band::from_score(0.5 * accuracy + 0.5 * range);

    tracing::debug!(
        accuracy,
        structure,
        feature,
        tense,
        function,
        range,
        band = band.value(),
        "grammar scored"
    );

    let diagnostics = GrammarDiagnostics {
        sentences: assessments,
        accuracy_band: accuracy,
        structure_band: structure,
        feature_band: feature,
        tense_band: tense,
        function_band: function,
        range_band: range,
        structure_counts,
        function_counts,
        features_used,
        tenses_used,
    };

    EvaluationResult {
        criterion: Criterion::Grammar,
        ielts_band: band,
        readable_feedback: feedback(&diagnostics),
        diagnostics: Diagnostics::Grammar(diagnostics),
    }
}

const ACCURACY_PROSE: [&str; 16] = [
    "Almost every sentence contains errors, and meaning is often lost.",
    "Errors appear in nearly all of your sentences and make you hard to follow.",
    "Most sentences contain several errors, even in simple forms.",
    "Frequent errors in basic forms make some of your answer difficult to follow.",
    "Errors are frequent. Focus on basic verb forms and word order.",
    "Many sentences contain errors, although simple ideas still come across.",
    "Errors are common, particularly with verb forms and articles.",
    "Basic sentences are often accurate, but longer sentences contain errors.",
    "Your grammar is reasonably accurate in simple sentences, with errors in complex ones.",
    "Errors are noticeable but rarely stop the listener from understanding you.",
    "Your grammar is generally accurate. Some errors remain in complex structures.",
    "Most of your sentences are free of errors.",
    "You frequently produce error-free sentences, with only a few slips.",
    "Your sentences are largely accurate, with only occasional minor errors.",
    "Errors are rare and do not affect communication.",
    "Your grammar is consistently accurate.",
];

fn structure_prose(structure: SentenceStructure) -> &'static str {
    match structure {
        SentenceStructure::Simple => {
            "Most of your sentences are simple. Combine ideas with clauses introduced by \
             \"because\", \"which\" or \"although\"."
        }
        SentenceStructure::Compound => {
            "Most of your sentences join clauses with \"and\" or \"but\". Adding subordinate \
             clauses would widen your range."
        }
        SentenceStructure::Complex => {
            "Most of your sentences are complex, which shows good control of subordination."
        }
        SentenceStructure::CompoundComplex => {
            "Most of your sentences combine coordination and subordination, which shows a wide range."
        }
    }
}

fn function_prose(function: SentenceFunction) -> &'static str {
    match function {
        SentenceFunction::Declarative => "Most of your sentences are statements.",
        SentenceFunction::Interrogative => "Most of your sentences are questions.",
        SentenceFunction::Imperative => "Most of your sentences are instructions.",
        SentenceFunction::Exclamatory => "Most of your sentences are exclamations.",
    }
}

fn dominant<K: Copy>(counts: &BTreeMap<K, usize>) -> Option<K> {
    let total: usize = counts.values().sum();
    counts
        .iter()
        .find(|(_, n)| total > 0 && **n as f64 / total as f64 > 0.5)
        .map(|(k, _)| *k)
}

fn join_labels(labels: &[String]) -> String {
    match labels {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

fn feedback(d: &GrammarDiagnostics) -> String {
    let mut lines = vec![ACCURACY_PROSE[prose_tier(d.accuracy_band)].to_string()];

    let edits = d.edit_count();
    if edits > 0 {
        let flagged = d.sentences.iter().filter(|s| !s.edits.is_empty()).count();
        lines.push(format!(
            "We suggested {edits} correction{} in {flagged} of your {} sentences.",
            if edits == 1 { "" } else { "s" },
            d.sentences.len()
        ));
    }

    if let Some(structure) = dominant(&d.structure_counts) {
        lines.push(structure_prose(structure).to_string());
    }

    let used: Vec<String> = d.features_used.iter().map(|f| f.label().to_string()).collect();
    let missing: Vec<String> = GrammarFeature::ALL
        .iter()
        .filter(|f| !d.features_used.contains(f))
        .map(|f| f.label().to_string())
        .collect();
    if used.is_empty() {
        lines.push(format!(
            "Try using {} to show a wider grammatical range.",
            join_labels(&missing)
        ));
    } else if missing.is_empty() {
        lines.push(format!("You used {}.", join_labels(&used)));
    } else {
        lines.push(format!(
            "You used {}. Try adding {} as well.",
            join_labels(&used),
            join_labels(&missing)
        ));
    }

    let tenses: Vec<String> = d.tenses_used.iter().map(ToString::to_string).collect();
    lines.push(match tenses.len() {
        0 => "We could not identify any finite verb tenses.".to_string(),
        1 => format!("You used only the {} tense.", tenses[0]),
        n => format!("You used {n} different tenses: {}.", join_labels(&tenses)),
    });

    if let Some(function) = dominant(&d.function_counts) {
        lines.push(function_prose(function).to_string());
    }

    lines.join("\n")
}
