//! Markdown report generator.
//!
//! Disfluency markers render as `**[token]**`, less common words as
//! `_token_` and repeated words as `~token~`.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;

use bandscore_core::fluency::FluencyDiagnostics;
use bandscore_core::grammar::GrammarDiagnostics;
use bandscore_core::lexical::LexicalDiagnostics;
use bandscore_core::model::PhonemeStatus;
use bandscore_core::pronunciation::PronunciationDiagnostics;
use bandscore_core::report::{AnswerReport, SessionReport};
use bandscore_core::results::Diagnostics;

use crate::transcript::{disfluency_marks, lexical_marks, seconds, tokens, LexicalMark};

/// Pipes would break table cells.
fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

/// Render one answer report.
pub fn answer_markdown(report: &AnswerReport) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Answer {}\n", report.answer_id);
    answer_body(&mut md, report);
    md
}

/// Render a session report: summary first, then every answer.
pub fn session_markdown(report: &SessionReport) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# {}\n", report.session.name);
    if let Some(candidate) = &report.session.candidate {
        let _ = writeln!(md, "Candidate: {candidate}  ");
    }
    let _ = writeln!(
        md,
        "{} answers, scored {}\n",
        report.session.answer_count,
        report.created_at.format("%Y-%m-%d %H:%M UTC")
    );

    let _ = writeln!(md, "## Overall band: {}\n", report.overall.overall_band);
    if !report.overall.is_complete() {
        let _ = writeln!(
            md,
            "_Averaged over {} of 4 criteria._\n",
            report.overall.criteria.len()
        );
    }
    if !report.overall.overall_feedback.is_empty() {
        let _ = writeln!(md, "{}\n", report.overall.overall_feedback);
    }

    md.push_str("| Criterion | Band | Answers |\n|---|---|---|\n");
    for summary in &report.overall.criteria {
        let _ = writeln!(
            md,
            "| {} | {} | {} |",
            summary.criterion.title(),
            summary.band,
            summary.answers
        );
    }
    md.push('\n');

    for summary in &report.overall.criteria {
        if !summary.feedback.is_empty() {
            let _ = writeln!(md, "**{}**: {}\n", summary.criterion.title(), summary.feedback);
        }
    }

    if !report.failed.is_empty() {
        md.push_str("### Failed answers\n\n");
        for failed in &report.failed {
            let _ = writeln!(md, "- `{}`: {}", failed.answer_id, failed.error);
        }
        md.push('\n');
    }

    for answer in &report.answers {
        let _ = writeln!(md, "## Answer {}\n", answer.answer_id);
        answer_body(&mut md, answer);
    }
    md
}

/// Write rendered Markdown to a file.
pub fn write_markdown(markdown: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, markdown)?;
    Ok(())
}

fn answer_body(md: &mut String, report: &AnswerReport) {
    if let Some(question) = &report.question {
        let _ = writeln!(md, "> {question}\n");
    }

    md.push_str("| Criterion | Band |\n|---|---|\n");
    for result in &report.results {
        let _ = writeln!(md, "| {} | {} |", result.criterion.title(), result.ielts_band);
    }
    md.push('\n');

    for result in &report.results {
        let _ = writeln!(md, "### {} ({})\n", result.criterion.title(), result.ielts_band);
        let _ = writeln!(md, "{}\n", result.readable_feedback);
        match &result.diagnostics {
            Diagnostics::Empty => {}
            Diagnostics::Fluency(d) => fluency(md, &report.transcript, d),
            Diagnostics::Grammar(d) => grammar(md, d),
            Diagnostics::Lexical(d) => lexical(md, &report.transcript, d),
            Diagnostics::Pronunciation(d) => pronunciation(md, d),
        }
    }
}

fn fluency(md: &mut String, transcript: &str, d: &FluencyDiagnostics) {
    let words = tokens(transcript);
    let marks = disfluency_marks(words.len(), d);
    let highlighted: Vec<String> = words
        .iter()
        .zip(&marks)
        .map(|(w, m)| match m {
            Some(_) => format!("**[{w}]**"),
            None => (*w).to_string(),
        })
        .collect();
    let _ = writeln!(md, "{}\n", highlighted.join(" "));

    for markers in d.markers.iter().filter(|m| !m.spans.is_empty()) {
        let _ = writeln!(md, "- {} ({}):", markers.category.label(), markers.spans.len());
        for span in &markers.spans {
            let _ = writeln!(
                md,
                "  - \"{}\" at {} to {}",
                span.text,
                seconds(span.start),
                seconds(span.end)
            );
        }
    }
    for pause in &d.long_pauses {
        let _ = writeln!(
            md,
            "- long pause: {} to {} ({})",
            seconds(pause.start),
            seconds(pause.end),
            seconds(pause.duration())
        );
    }
    md.push('\n');
}

fn grammar(md: &mut String, d: &GrammarDiagnostics) {
    md.push_str("| Original | Correction | Structure | Errors |\n|---|---|---|---|\n");
    for s in &d.sentences {
        let errors = s
            .edits
            .iter()
            .map(|e| cell(&e.message))
            .collect::<Vec<_>>()
            .join("<br>");
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} |",
            cell(&s.annotation.text),
            cell(&s.corrected),
            s.annotation.structure,
            errors
        );
    }
    let _ = writeln!(
        md,
        "\nAccuracy {:.1}, range {:.1}\n",
        d.accuracy_band, d.range_band
    );
}

fn lexical(md: &mut String, transcript: &str, d: &LexicalDiagnostics) {
    let words = tokens(transcript);
    let marks = lexical_marks(&words, d);
    let highlighted: Vec<String> = words
        .iter()
        .zip(&marks)
        .map(|(w, m)| match m {
            Some(LexicalMark::Advanced) => format!("_{w}_"),
            Some(LexicalMark::Repeated) => format!("~{w}~"),
            None => (*w).to_string(),
        })
        .collect();
    let _ = writeln!(md, "{}\n", highlighted.join(" "));

    for level in &d.sentence_levels {
        let _ = writeln!(md, "- {} ({})", level.text, level.level);
    }
    let _ = writeln!(
        md,
        "\nMTLD {:.1}, advanced {:.0}%, collocations {:.0}%\n",
        d.mtld,
        d.profile.advanced * 100.0,
        d.collocation_score * 100.0
    );
}

fn pronunciation(md: &mut String, d: &PronunciationDiagnostics) {
    md.push_str("| Word | IPA | Short phonemes |\n|---|---|---|\n");
    for word in &d.words {
        let ipa: String = word.phonemes.iter().map(|p| p.ipa.as_str()).collect();
        let short = word
            .phonemes
            .iter()
            .filter(|p| p.status == PhonemeStatus::UnderDuration)
            .map(|p| p.ipa.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(md, "| {} | /{}/ | {} |", cell(&word.word), ipa, short);
    }
    if !d.missing_words.is_empty() {
        let _ = writeln!(md, "\nNot found in the audio: {}", d.missing_words.join(", "));
    }
    md.push('\n');
}
