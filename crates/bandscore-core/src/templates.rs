//! Feedback templates keyed by half-point band.
//!
//! Every target (overall and the four criteria) has one template set per
//! half-point bucket from 0.0 to 9.0. Rendering picks one template at
//! random and substitutes `{band}`. The random source is passed in, so a
//! seeded [`fastrand::Rng`] gives repeatable output.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::band::Band;
use crate::model::Criterion;

/// Half-point buckets 0.0, 0.5, ..., 9.0.
pub const BUCKETS: usize = 19;

/// What a template describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeedbackTarget {
    Overall,
    Criterion(Criterion),
}

impl FeedbackTarget {
    pub const ALL: [FeedbackTarget; 5] = [
        FeedbackTarget::Overall,
        FeedbackTarget::Criterion(Criterion::Fluency),
        FeedbackTarget::Criterion(Criterion::Grammar),
        FeedbackTarget::Criterion(Criterion::Lexical),
        FeedbackTarget::Criterion(Criterion::Pronunciation),
    ];
}

impl fmt::Display for FeedbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackTarget::Overall => f.write_str("overall"),
            FeedbackTarget::Criterion(c) => write!(f, "{c}"),
        }
    }
}

/// Index into a 16-entry prose table covering bands 1.5 through 9.0.
/// Anything at or below 1.5 maps to the first entry.
pub fn prose_tier(band: f64) -> usize {
    let idx = ((band - 1.5) * 2.0).round();
    if idx.is_nan() || idx < 0.0 {
        0
    } else {
        (idx as usize).min(15)
    }
}

/// Template sets for every target and bucket.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    sets: BTreeMap<FeedbackTarget, Vec<Vec<String>>>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateCatalog {
    /// The built-in English catalog.
    pub fn builtin() -> Self {
        let mut sets = BTreeMap::new();
        for target in FeedbackTarget::ALL {
            let levels = level_table(target);
            let buckets = (0..BUCKETS)
                .map(|bucket| {
                    let level = bucket / 2;
                    levels[level]
                        .iter()
                        .map(|t| {
                            if bucket % 2 == 1 {
                                format!("{t} You are close to band {}.", level + 1)
                            } else {
                                (*t).to_string()
                            }
                        })
                        .collect()
                })
                .collect();
            sets.insert(target, buckets);
        }
        Self { sets }
    }

    /// Parse a TOML catalog. Entries override the matching built-in bucket;
    /// anything not listed keeps the built-in templates.
    ///
    /// ```toml
    /// [[fluency]]
    /// band = 6.5
    /// templates = ["Band {band}: you speak at length with some hesitation."]
    /// ```
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let file: CatalogFile = toml::from_str(content).context("failed to parse template catalog")?;
        let mut catalog = Self::builtin();

        let targets = [
            (FeedbackTarget::Overall, file.overall),
            (FeedbackTarget::Criterion(Criterion::Fluency), file.fluency),
            (FeedbackTarget::Criterion(Criterion::Grammar), file.grammar),
            (FeedbackTarget::Criterion(Criterion::Lexical), file.lexical),
            (
                FeedbackTarget::Criterion(Criterion::Pronunciation),
                file.pronunciation,
            ),
        ];

        for (target, entries) in targets {
            for entry in entries {
                if !(0.0..=9.0).contains(&entry.band) || (entry.band * 2.0).fract() != 0.0 {
                    bail!(
                        "{target} template band {} is not a half-point band between 0 and 9",
                        entry.band
                    );
                }
                if entry.templates.iter().all(|t| t.trim().is_empty()) {
                    bail!("{target} templates for band {} are empty", entry.band);
                }
                let bucket = (entry.band * 2.0) as usize;
                if let Some(buckets) = catalog.sets.get_mut(&target) {
                    buckets[bucket] = entry
                        .templates
                        .into_iter()
                        .filter(|t| !t.trim().is_empty())
                        .collect();
                }
            }
        }

        Ok(catalog)
    }

    /// Load a catalog from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// The template set for `target` at `band`.
    pub fn templates_for(&self, target: FeedbackTarget, band: Band) -> &[String] {
        self.sets
            .get(&target)
            .and_then(|buckets| buckets.get(band.bucket().min(BUCKETS - 1)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Pick one template for `band` and substitute `{band}`.
    pub fn render(&self, target: FeedbackTarget, band: Band, rng: &mut fastrand::Rng) -> String {
        let templates = self.templates_for(target, band);
        if templates.is_empty() {
            return format!("Band {band}.");
        }
        let template = &templates[rng.usize(..templates.len())];
        template.replace("{band}", &band.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    overall: Vec<BucketEntry>,
    #[serde(default)]
    fluency: Vec<BucketEntry>,
    #[serde(default)]
    grammar: Vec<BucketEntry>,
    #[serde(default)]
    lexical: Vec<BucketEntry>,
    #[serde(default)]
    pronunciation: Vec<BucketEntry>,
}

#[derive(Debug, Deserialize)]
struct BucketEntry {
    band: f64,
    templates: Vec<String>,
}

type LevelTable = [[&'static str; 2]; 10];

fn level_table(target: FeedbackTarget) -> &'static LevelTable {
    match target {
        FeedbackTarget::Overall => &OVERALL,
        FeedbackTarget::Criterion(Criterion::Fluency) => &FLUENCY,
        FeedbackTarget::Criterion(Criterion::Grammar) => &GRAMMAR,
        FeedbackTarget::Criterion(Criterion::Lexical) => &LEXICAL,
        FeedbackTarget::Criterion(Criterion::Pronunciation) => &PRONUNCIATION,
    }
}

const OVERALL: LevelTable = [
    [
        "Overall band {band}. There was no assessable speech in this session.",
        "Band {band}: there was not enough spoken English to assess.",
    ],
    [
        "Band {band}: communication is limited to isolated words.",
        "Overall band {band}. Beyond a few words, no rateable language was produced.",
    ],
    [
        "Band {band}: speech is mostly isolated words and memorised phrases.",
        "Overall band {band}. Very little communication was possible.",
    ],
    [
        "Band {band}: you convey basic information, but long pauses often break communication.",
        "Overall band {band}. Simple messages come through with limited control of the language.",
    ],
    [
        "Band {band}: you can talk about familiar topics, although hesitation and errors get in the way.",
        "Overall band {band}. Basic meaning is conveyed on familiar topics.",
    ],
    [
        "Band {band}: you usually keep going, though hesitation and a narrow range hold you back.",
        "Overall band {band}. You communicate on most topics, with noticeable limitations.",
    ],
    [
        "Band {band}: you speak at length and are generally understood, with some lapses in accuracy.",
        "Overall band {band}. You are willing to speak at length, with occasional loss of coherence.",
    ],
    [
        "Band {band}: you speak at length without noticeable effort and use a good range of language.",
        "Overall band {band}. Errors occur but rarely get in the way of communication.",
    ],
    [
        "Band {band}: you speak fluently with only occasional repetition or self-correction.",
        "Overall band {band}. Your language is precise and flexible, with rare errors.",
    ],
    [
        "Band {band}: you speak fluently and accurately with a full range of language.",
        "Overall band {band}. This is an expert-level performance.",
    ],
];

const FLUENCY: LevelTable = [
    [
        "Fluency band {band}. No rateable speech was detected.",
        "Band {band} for fluency: there was nothing to assess.",
    ],
    [
        "Fluency band {band}. Speech consists of isolated words.",
        "Band {band} for fluency: communication did not get started.",
    ],
    [
        "Fluency band {band}. Long pauses come before most words.",
        "Band {band} for fluency: speech is very slow and fragmented.",
    ],
    [
        "Fluency band {band}. You speak with long pauses and link only simple sentences.",
        "Band {band} for fluency: frequent hesitation limits what you can say.",
    ],
    [
        "Fluency band {band}. You cannot keep going without noticeable pauses.",
        "Band {band} for fluency: you repeat and self-correct often, and rarely link ideas.",
    ],
    [
        "Fluency band {band}. You usually keep going but rely on repetition and slow speech.",
        "Band {band} for fluency: simple speech is fluent, complex ideas cause hesitation.",
    ],
    [
        "Fluency band {band}. You are willing to speak at length, with some hesitation.",
        "Band {band} for fluency: you use connectives, though not always appropriately.",
    ],
    [
        "Fluency band {band}. You speak at length without noticeable effort.",
        "Band {band} for fluency: you use a range of connectives and discourse markers with some flexibility.",
    ],
    [
        "Fluency band {band}. You speak fluently with only occasional repetition.",
        "Band {band} for fluency: hesitation is usually content-related and topics are developed coherently.",
    ],
    [
        "Fluency band {band}. You speak fluently with rare repetition or self-correction.",
        "Band {band} for fluency: your speech is fully coherent and well developed.",
    ],
];

const GRAMMAR: LevelTable = [
    [
        "Grammar band {band}. No rateable language was produced.",
        "Band {band} for grammar: there was nothing to assess.",
    ],
    [
        "Grammar band {band}. Only isolated words were produced.",
        "Band {band} for grammar: no sentence forms could be assessed.",
    ],
    [
        "Grammar band {band}. You cannot yet produce basic sentence forms.",
        "Band {band} for grammar: most utterances are fragments.",
    ],
    [
        "Grammar band {band}. You attempt basic sentence forms with limited success.",
        "Band {band} for grammar: errors are numerous except in memorised phrases.",
    ],
    [
        "Grammar band {band}. You produce basic sentences, but subordinate structures are rare.",
        "Band {band} for grammar: errors are frequent and may lead to misunderstanding.",
    ],
    [
        "Grammar band {band}. Basic forms are reasonably accurate, complex structures contain errors.",
        "Band {band} for grammar: your range of structures is limited.",
    ],
    [
        "Grammar band {band}. You mix simple and complex structures with limited flexibility.",
        "Band {band} for grammar: errors are frequent in complex structures but rarely cause comprehension problems.",
    ],
    [
        "Grammar band {band}. You use a range of complex structures with some flexibility.",
        "Band {band} for grammar: you frequently produce error-free sentences.",
    ],
    [
        "Grammar band {band}. You use a wide range of structures flexibly.",
        "Band {band} for grammar: most sentences are error-free, with only occasional slips.",
    ],
    [
        "Grammar band {band}. You use a full range of structures naturally and appropriately.",
        "Band {band} for grammar: your sentences are consistently accurate.",
    ],
];

const LEXICAL: LevelTable = [
    [
        "Vocabulary band {band}. No rateable language was produced.",
        "Band {band} for lexical resource: there was nothing to assess.",
    ],
    [
        "Vocabulary band {band}. Only a few isolated words were used.",
        "Band {band} for lexical resource: no usable vocabulary range was shown.",
    ],
    [
        "Vocabulary band {band}. Only isolated words or memorised utterances were used.",
        "Band {band} for lexical resource: vocabulary is extremely limited.",
    ],
    [
        "Vocabulary band {band}. You use simple vocabulary to convey personal information.",
        "Band {band} for lexical resource: vocabulary is not sufficient for less familiar topics.",
    ],
    [
        "Vocabulary band {band}. You talk about familiar topics but convey only basic meaning on unfamiliar ones.",
        "Band {band} for lexical resource: you rarely attempt paraphrase.",
    ],
    [
        "Vocabulary band {band}. You talk about familiar and unfamiliar topics with limited flexibility.",
        "Band {band} for lexical resource: you attempt paraphrase with mixed success.",
    ],
    [
        "Vocabulary band {band}. Your vocabulary is wide enough to discuss topics at length.",
        "Band {band} for lexical resource: you generally paraphrase successfully.",
    ],
    [
        "Vocabulary band {band}. You use vocabulary flexibly across a variety of topics.",
        "Band {band} for lexical resource: you use some less common and idiomatic vocabulary.",
    ],
    [
        "Vocabulary band {band}. You use a wide resource readily and flexibly to convey precise meaning.",
        "Band {band} for lexical resource: less common and idiomatic items are used skilfully.",
    ],
    [
        "Vocabulary band {band}. You use vocabulary with full flexibility and precision on all topics.",
        "Band {band} for lexical resource: idiomatic language is used naturally and accurately.",
    ],
];

const PRONUNCIATION: LevelTable = [
    [
        "Pronunciation band {band}. No rateable speech was produced.",
        "Band {band} for pronunciation: there was nothing to assess.",
    ],
    [
        "Pronunciation band {band}. Speech is mostly unintelligible.",
        "Band {band} for pronunciation: very few sounds could be recognised.",
    ],
    [
        "Pronunciation band {band}. Speech is often unintelligible.",
        "Band {band} for pronunciation: many sounds are mispronounced or missing.",
    ],
    [
        "Pronunciation band {band}. Frequent mispronunciations cause strain for the listener.",
        "Band {band} for pronunciation: only some features of English pronunciation are controlled.",
    ],
    [
        "Pronunciation band {band}. You use a limited range of pronunciation features.",
        "Band {band} for pronunciation: mispronunciations are frequent and cause some difficulty.",
    ],
    [
        "Pronunciation band {band}. Your pronunciation is understandable with some effort.",
        "Band {band} for pronunciation: control of features is mixed.",
    ],
    [
        "Pronunciation band {band}. You are generally understood, though some sounds are unclear.",
        "Band {band} for pronunciation: you use a range of features with mixed control.",
    ],
    [
        "Pronunciation band {band}. You are easy to understand with occasional lapses.",
        "Band {band} for pronunciation: you show all the positive features of band 6 and some of band 8.",
    ],
    [
        "Pronunciation band {band}. You are easy to understand throughout.",
        "Band {band} for pronunciation: your accent has minimal effect on intelligibility.",
    ],
    [
        "Pronunciation band {band}. You use a full range of pronunciation features with precision.",
        "Band {band} for pronunciation: you are effortless to understand.",
    ],
];
