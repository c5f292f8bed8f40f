//! Input loading: answer files, session manifests and Praat TextGrids.
//!
//! Answers are JSON, sessions are TOML manifests that list answer files,
//! and forced-aligner output can be read from long-format TextGrids.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{
    Answer, PhonemeInterval, PhonemeStatus, RecordedAnalysis, Session, Word, WordAlignment,
};
use crate::phonemes::{is_silence, to_ipa_or_raw};

/// On-disk answer layout. Paths are relative to the answer file.
#[derive(Debug, Deserialize)]
struct AnswerFile {
    id: String,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    words: Vec<Word>,
    #[serde(default)]
    audio: Option<PathBuf>,
    #[serde(default)]
    alignment: Option<Vec<WordAlignment>>,
    /// Forced-aligner TextGrid, used when `alignment` is absent.
    #[serde(default)]
    textgrid: Option<PathBuf>,
    #[serde(default)]
    recorded: Option<RecordedAnalysis>,
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Parse a single JSON answer file.
pub fn parse_answer(path: &Path) -> Result<Answer> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answer file: {}", path.display()))?;

    parse_answer_str(&content, path)
}

/// Parse an answer from a JSON string. Relative `audio` and `textgrid`
/// paths resolve against the directory of `source_path`.
pub fn parse_answer_str(content: &str, source_path: &Path) -> Result<Answer> {
    let parsed: AnswerFile = serde_json::from_str(content)
        .with_context(|| format!("failed to parse answer JSON: {}", source_path.display()))?;

    let base = source_path.parent().unwrap_or_else(|| Path::new(""));

    let alignment = match (parsed.alignment, parsed.textgrid) {
        (Some(alignment), _) => Some(alignment),
        (None, Some(textgrid)) => {
            let path = resolve(base, textgrid);
            Some(load_textgrid(&path).with_context(|| {
                format!("failed to load TextGrid for answer '{}'", parsed.id)
            })?)
        }
        (None, None) => None,
    };

    Ok(Answer {
        id: parsed.id,
        question: parsed.question,
        transcript: parsed.transcript,
        words: parsed.words,
        audio: parsed.audio.map(|p| resolve(base, p)),
        alignment,
        recorded: parsed.recorded,
    })
}

/// Recursively load all `.json` answer files from a directory. Files that
/// fail to parse are skipped with a warning.
pub fn load_answer_directory(dir: &Path) -> Result<Vec<Answer>> {
    let mut answers = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            answers.extend(load_answer_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            match parse_answer(&path) {
                Ok(answer) => answers.push(answer),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(answers)
}

// ---------------------------------------------------------------------------
// Session manifests
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ManifestFile {
    session: ManifestHeader,
    #[serde(default)]
    answers: Vec<ManifestAnswer>,
}

#[derive(Debug, Deserialize)]
struct ManifestHeader {
    id: String,
    name: String,
    #[serde(default)]
    candidate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestAnswer {
    file: PathBuf,
}

/// Load a session manifest and every answer file it lists.
pub fn parse_session(path: &Path) -> Result<Session> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read session manifest: {}", path.display()))?;

    parse_session_str(&content, path)
}

/// Parse a manifest from a TOML string. Answer files resolve against the
/// directory of `source_path` and must all load.
pub fn parse_session_str(content: &str, source_path: &Path) -> Result<Session> {
    let parsed: ManifestFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let base = source_path.parent().unwrap_or_else(|| Path::new(""));

    let answers = parsed
        .answers
        .into_iter()
        .map(|a| parse_answer(&resolve(base, a.file)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Session {
        id: parsed.session.id,
        name: parsed.session.name,
        candidate: parsed.session.candidate,
        answers,
    })
}

// ---------------------------------------------------------------------------
// TextGrid
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tier {
    name: String,
    interval_tier: bool,
    intervals: Vec<(f64, f64, String)>,
}

#[derive(Debug, Default)]
struct PendingInterval {
    xmin: Option<f64>,
    xmax: Option<f64>,
}

fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?.trim_start();
    Some(rest.strip_prefix('=')?.trim())
}

fn unquote(value: &str) -> String {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    inner.replace("\"\"", "\"")
}

fn number(value: &str, line_no: usize) -> Result<f64> {
    value
        .parse()
        .with_context(|| format!("line {line_no}: invalid time value '{value}'"))
}

/// Parse a long-format Praat TextGrid with `words` and `phones` interval
/// tiers into word alignments.
///
/// Silent words and phones are dropped. Each phone goes to the word whose
/// interval contains its midpoint.
pub fn parse_textgrid(content: &str) -> Result<Vec<WordAlignment>> {
    let mut tiers: Vec<Tier> = Vec::new();
    let mut pending: Option<PendingInterval> = None;

    for (i, raw) in content.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();

        if line.starts_with("item [") && line.ends_with(':') && !line.starts_with("item []") {
            tiers.push(Tier::default());
            pending = None;
            continue;
        }
        let Some(tier) = tiers.last_mut() else {
            continue;
        };

        if let Some(v) = field(line, "class") {
            tier.interval_tier = unquote(v) == "IntervalTier";
        } else if let Some(v) = field(line, "name") {
            tier.name = unquote(v);
        } else if line.starts_with("intervals [") {
            pending = Some(PendingInterval::default());
        } else if let Some(interval) = pending.as_mut() {
            if let Some(v) = field(line, "xmin") {
                interval.xmin = Some(number(v, line_no)?);
            } else if let Some(v) = field(line, "xmax") {
                interval.xmax = Some(number(v, line_no)?);
            } else if let Some(v) = field(line, "text") {
                let (Some(xmin), Some(xmax)) = (interval.xmin, interval.xmax) else {
                    anyhow::bail!("line {line_no}: interval text before its bounds");
                };
                tier.intervals.push((xmin, xmax, unquote(v)));
                pending = None;
            }
        }
    }

    let find = |suffix: &str| {
        tiers
            .iter()
            .find(|t| t.interval_tier && t.name.to_lowercase().ends_with(suffix))
    };
    let words = find("words").context("TextGrid has no words tier")?;
    let phones = find("phones");

    let mut alignment: Vec<WordAlignment> = words
        .intervals
        .iter()
        .filter(|(_, _, text)| !is_silence(text))
        .map(|(start, end, text)| WordAlignment {
            word: text.clone(),
            start: *start,
            end: *end,
            phonemes: Vec::new(),
        })
        .collect();

    if let Some(phones) = phones {
        for (start, end, label) in &phones.intervals {
            if is_silence(label) {
                continue;
            }
            let mid = (start + end) / 2.0;
            match alignment.iter_mut().find(|w| w.start <= mid && mid < w.end) {
                Some(word) => word.phonemes.push(PhonemeInterval {
                    arpabet: label.clone(),
                    ipa: to_ipa_or_raw(label),
                    start: *start,
                    end: *end,
                    status: PhonemeStatus::Pronounced,
                }),
                None => tracing::debug!(phone = %label, start, "phone outside any word interval"),
            }
        }
    }

    Ok(alignment)
}

/// Load a TextGrid file.
pub fn load_textgrid(path: &Path) -> Result<Vec<WordAlignment>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read TextGrid: {}", path.display()))?;
    parse_textgrid(&content).with_context(|| format!("failed to parse TextGrid: {}", path.display()))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A warning from answer or session validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The answer ID (if applicable).
    pub answer_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Check an answer for inputs that will score poorly or misleadingly.
pub fn validate_answer(answer: &Answer) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut warn = |message: String| {
        warnings.push(ValidationWarning {
            answer_id: Some(answer.id.clone()),
            message,
        })
    };

    if answer.is_blank() {
        warn("transcript is empty; every criterion will score 0".into());
        return warnings;
    }

    if answer.words.is_empty() {
        warn("no word timestamps; fluency will score 0".into());
    } else {
        let spoken = answer.transcript.split_whitespace().count();
        if spoken != answer.words.len() {
            warn(format!(
                "transcript has {spoken} words but {} timestamps were given",
                answer.words.len()
            ));
        }
    }

    for (i, word) in answer.words.iter().enumerate() {
        if word.end < word.start {
            warn(format!(
                "word {i} \"{}\" ends before it starts ({:.2}s < {:.2}s)",
                word.text, word.end, word.start
            ));
        }
        if !(0.0..=1.0).contains(&word.confidence) {
            warn(format!(
                "word {i} \"{}\" has confidence {} outside [0, 1]",
                word.text, word.confidence
            ));
        }
    }

    for (i, pair) in answer.words.windows(2).enumerate() {
        if pair[1].start < pair[0].start {
            warn(format!(
                "timestamps are not monotonic at word {} \"{}\"",
                i + 1,
                pair[1].text
            ));
        }
    }

    match (&answer.alignment, &answer.audio) {
        (Some(alignment), _) if alignment.is_empty() => {
            warn("alignment is empty; every word will count as missing".into());
        }
        (None, None) => {
            warn("no audio or alignment; pronunciation will score 0".into());
        }
        (None, Some(audio)) if !audio.exists() => {
            warn(format!("audio file not found: {}", audio.display()));
        }
        _ => {}
    }

    warnings
}

/// Validate every answer of a session and check for duplicate IDs.
pub fn validate_session(session: &Session) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if session.answers.is_empty() {
        warnings.push(ValidationWarning {
            answer_id: None,
            message: format!("session '{}' has no answers", session.id),
        });
    }

    let mut seen_ids = HashSet::new();
    for answer in &session.answers {
        if !seen_ids.insert(&answer.id) {
            warnings.push(ValidationWarning {
                answer_id: Some(answer.id.clone()),
                message: format!("duplicate answer ID: {}", answer.id),
            });
        }
    }

    for answer in &session.answers {
        warnings.extend(validate_answer(answer));
    }

    warnings
}
