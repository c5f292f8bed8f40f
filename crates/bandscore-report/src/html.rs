//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS inlined.

use anyhow::Result;
use std::path::Path;

use bandscore_core::fluency::FluencyDiagnostics;
use bandscore_core::grammar::GrammarDiagnostics;
use bandscore_core::lexical::LexicalDiagnostics;
use bandscore_core::model::{DisfluencyCategory, PhonemeStatus};
use bandscore_core::pronunciation::PronunciationDiagnostics;
use bandscore_core::report::{AnswerReport, SessionReport};
use bandscore_core::results::{Diagnostics, EvaluationResult};

use crate::transcript::{disfluency_marks, lexical_marks, seconds, tokens, LexicalMark};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Newlines in feedback become line breaks.
fn feedback_html(s: &str) -> String {
    html_escape(s).replace('\n', "<br>\n")
}

fn category_class(category: DisfluencyCategory) -> &'static str {
    match category {
        DisfluencyCategory::FilledPause => "filled-pause",
        DisfluencyCategory::EditingTerm => "editing-term",
        DisfluencyCategory::DiscourseMarker => "discourse-marker",
        DisfluencyCategory::Conjunction => "conjunction",
        DisfluencyCategory::Restart => "restart",
    }
}

fn page_start(title: &str) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>bandscore report: {}</title>\n", html_escape(title)));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");
    html
}

fn raw_json<T: serde::Serialize>(value: &T) -> String {
    let mut html = String::new();
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(value).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");
    html
}

/// Generate an HTML page for one scored answer.
pub fn generate_answer_html(report: &AnswerReport) -> String {
    let mut html = page_start(&report.answer_id);

    html.push_str("<header>\n");
    html.push_str("<h1>bandscore report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Answer: <strong>{}</strong> | {}</p>\n",
        html_escape(&report.answer_id),
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    html.push_str(&answer_section(report));
    html.push_str(&raw_json(report));
    html.push_str("</body>\n</html>");
    html
}

/// Generate an HTML page for a session: the summary table, then every answer.
pub fn generate_session_html(report: &SessionReport) -> String {
    let mut html = page_start(&report.session.name);

    html.push_str("<header>\n");
    html.push_str("<h1>bandscore report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Session: <strong>{}</strong> | {} answers",
        html_escape(&report.session.name),
        report.session.answer_count
    ));
    if let Some(candidate) = &report.session.candidate {
        html.push_str(&format!(" | Candidate: {}", html_escape(candidate)));
    }
    html.push_str(&format!(
        " | {}</p>\n",
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str(&format!(
        "<p class=\"overall\">Overall band <span class=\"band\">{}</span></p>\n",
        report.overall.overall_band
    ));
    if !report.overall.is_complete() {
        html.push_str(&format!(
            "<p class=\"note\">Averaged over {} of 4 criteria.</p>\n",
            report.overall.criteria.len()
        ));
    }
    html.push_str(&format!(
        "<p>{}</p>\n",
        feedback_html(&report.overall.overall_feedback)
    ));

    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Criterion</th><th>Band</th><th>Answers</th><th>Feedback</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for summary in &report.overall.criteria {
        html.push_str(&format!(
            "<tr><td>{}</td><td class=\"band\">{}</td><td>{}</td><td>{}</td></tr>\n",
            html_escape(summary.criterion.title()),
            summary.band,
            summary.answers,
            feedback_html(&summary.feedback)
        ));
    }
    html.push_str("</tbody></table>\n");

    if !report.failed.is_empty() {
        html.push_str("<h3>Failed answers</h3>\n<ul class=\"failed\">\n");
        for failed in &report.failed {
            html.push_str(&format!(
                "<li><strong>{}</strong>: {}</li>\n",
                html_escape(&failed.answer_id),
                html_escape(&failed.error)
            ));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</section>\n");

    for answer in &report.answers {
        html.push_str(&answer_section(answer));
    }

    html.push_str(&raw_json(report));
    html.push_str("</body>\n</html>");
    html
}

/// Write an answer report to an HTML file.
pub fn write_answer_html(report: &AnswerReport, path: &Path) -> Result<()> {
    write(&generate_answer_html(report), path)
}

/// Write a session report to an HTML file.
pub fn write_session_html(report: &SessionReport, path: &Path) -> Result<()> {
    write(&generate_session_html(report), path)
}

fn write(html: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

fn answer_section(report: &AnswerReport) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        "<section class=\"answer\" id=\"answer-{}\">\n",
        html_escape(&report.answer_id)
    ));
    html.push_str(&format!("<h2>Answer {}</h2>\n", html_escape(&report.answer_id)));
    if let Some(question) = &report.question {
        html.push_str(&format!("<p class=\"question\">{}</p>\n", html_escape(question)));
    }

    html.push_str("<table class=\"bands\">\n<thead><tr>");
    for result in &report.results {
        html.push_str(&format!("<th>{}</th>", html_escape(result.criterion.title())));
    }
    html.push_str("</tr></thead>\n<tbody><tr>");
    for result in &report.results {
        html.push_str(&format!("<td class=\"band\">{}</td>", result.ielts_band));
    }
    html.push_str("</tr></tbody></table>\n");

    for result in &report.results {
        html.push_str(&criterion_section(report, result));
    }
    html.push_str("</section>\n");
    html
}

fn criterion_section(report: &AnswerReport, result: &EvaluationResult) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        "<div class=\"criterion\">\n<h3>{} <span class=\"band\">{}</span></h3>\n",
        html_escape(result.criterion.title()),
        result.ielts_band
    ));
    html.push_str(&format!(
        "<p class=\"feedback\">{}</p>\n",
        feedback_html(&result.readable_feedback)
    ));

    match &result.diagnostics {
        Diagnostics::Empty => {}
        Diagnostics::Fluency(d) => html.push_str(&fluency_html(&report.transcript, d)),
        Diagnostics::Grammar(d) => html.push_str(&grammar_html(d)),
        Diagnostics::Lexical(d) => html.push_str(&lexical_html(&report.transcript, d)),
        Diagnostics::Pronunciation(d) => html.push_str(&pronunciation_html(d)),
    }
    html.push_str("</div>\n");
    html
}

fn fluency_html(transcript: &str, d: &FluencyDiagnostics) -> String {
    let mut html = String::new();
    let words = tokens(transcript);
    let marks = disfluency_marks(words.len(), d);

    html.push_str("<p class=\"transcript\">");
    for (i, (word, mark)) in words.iter().zip(&marks).enumerate() {
        if i > 0 {
            html.push(' ');
        }
        match mark {
            Some(category) => html.push_str(&format!(
                "<span class=\"marker {}\" title=\"{}\">{}</span>",
                category_class(*category),
                category.label(),
                html_escape(word)
            )),
            None => html.push_str(&html_escape(word)),
        }
    }
    html.push_str("</p>\n");

    html.push_str(&format!(
        "<p class=\"meta\">{} words in {} ({:.0} wpm) | {} long pauses over {}</p>\n",
        d.word_count,
        seconds(d.duration_seconds),
        d.speech_rate_wpm,
        d.long_pauses.len(),
        seconds(d.long_pause_threshold)
    ));

    for markers in d.markers.iter().filter(|m| !m.spans.is_empty()) {
        html.push_str(&format!(
            "<h4><span class=\"marker {}\">{}</span> ({})</h4>\n<ul>\n",
            category_class(markers.category),
            markers.category.label(),
            markers.spans.len()
        ));
        for span in &markers.spans {
            html.push_str(&format!(
                "<li>\"{}\" at {} to {}</li>\n",
                html_escape(&span.text),
                seconds(span.start),
                seconds(span.end)
            ));
        }
        html.push_str("</ul>\n");
    }

    if !d.long_pauses.is_empty() {
        html.push_str("<h4>Long pauses</h4>\n<ul>\n");
        for pause in &d.long_pauses {
            html.push_str(&format!(
                "<li>{} to {} ({})</li>\n",
                seconds(pause.start),
                seconds(pause.end),
                seconds(pause.duration())
            ));
        }
        html.push_str("</ul>\n");
    }
    html
}

fn grammar_html(d: &GrammarDiagnostics) -> String {
    let mut html = String::new();
    html.push_str("<table class=\"grammar\">\n");
    html.push_str("<thead><tr><th>Original</th><th>Correction</th><th>Structure</th><th>Tenses</th><th>Errors</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for s in &d.sentences {
        let class = if s.edits.is_empty() { "pass" } else { "fail" };
        let tenses = s
            .annotation
            .tenses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>",
            class,
            html_escape(&s.annotation.text),
            html_escape(&s.corrected),
            s.annotation.structure,
            html_escape(&tenses),
        ));
        if !s.edits.is_empty() {
            html.push_str("<ul>");
            for edit in &s.edits {
                html.push_str(&format!("<li>{}</li>", html_escape(&edit.message)));
            }
            html.push_str("</ul>");
        }
        html.push_str("</td></tr>\n");
    }
    html.push_str("</tbody></table>\n");

    html.push_str(&format!(
        "<p class=\"meta\">Accuracy {:.1} | Range {:.1} (structures {:.1}, features {:.1}, tenses {:.1}, functions {:.1})</p>\n",
        d.accuracy_band, d.range_band, d.structure_band, d.feature_band, d.tense_band, d.function_band
    ));
    html
}

fn lexical_html(transcript: &str, d: &LexicalDiagnostics) -> String {
    let mut html = String::new();
    let words = tokens(transcript);
    let marks = lexical_marks(&words, d);

    html.push_str("<p class=\"transcript\">");
    for (i, (word, mark)) in words.iter().zip(&marks).enumerate() {
        if i > 0 {
            html.push(' ');
        }
        match mark {
            Some(LexicalMark::Advanced) => html.push_str(&format!(
                "<span class=\"advanced\" title=\"less common word\">{}</span>",
                html_escape(word)
            )),
            Some(LexicalMark::Repeated) => html.push_str(&format!(
                "<span class=\"repeated\" title=\"repeated word\">{}</span>",
                html_escape(word)
            )),
            None => html.push_str(&html_escape(word)),
        }
    }
    html.push_str("</p>\n");

    html.push_str("<table class=\"lexical\">\n<thead><tr><th>Sentence</th><th>CEFR</th></tr></thead>\n<tbody>\n");
    for level in &d.sentence_levels {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            html_escape(&level.text),
            level.level
        ));
    }
    html.push_str("</tbody></table>\n");

    html.push_str(&format!(
        "<p class=\"meta\">MTLD {:.1} | advanced {:.0}% | collocations {:.0}%</p>\n",
        d.mtld,
        d.profile.advanced * 100.0,
        d.collocation_score * 100.0
    ));
    html
}

fn pronunciation_html(d: &PronunciationDiagnostics) -> String {
    let mut html = String::new();
    html.push_str("<table class=\"pronunciation\">\n");
    html.push_str("<thead><tr><th>Word</th><th>IPA</th><th>Time</th></tr></thead>\n<tbody>\n");
    for word in &d.words {
        let flagged = word
            .phonemes
            .iter()
            .any(|p| p.status == PhonemeStatus::UnderDuration);
        let class = if flagged { "fail" } else { "pass" };
        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td class=\"ipa\">",
            class,
            html_escape(&word.word)
        ));
        for phoneme in &word.phonemes {
            match phoneme.status {
                PhonemeStatus::UnderDuration => html.push_str(&format!(
                    "<span class=\"short\" title=\"{}ms\">{}</span>",
                    (phoneme.duration() * 1000.0).round(),
                    html_escape(&phoneme.ipa)
                )),
                PhonemeStatus::Pronounced => html.push_str(&html_escape(&phoneme.ipa)),
            }
        }
        html.push_str(&format!(
            "</td><td>{} to {}</td></tr>\n",
            seconds(word.start),
            seconds(word.end)
        ));
    }
    html.push_str("</tbody></table>\n");

    if !d.missing_words.is_empty() {
        html.push_str(&format!(
            "<p class=\"meta\">Not found in the audio: {}</p>\n",
            html_escape(&d.missing_words.join(", "))
        ));
    }
    html.push_str(&format!(
        "<p class=\"meta\">{} of {} phonemes under duration</p>\n",
        d.under_duration, d.total_phonemes
    ));
    html
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
.band { font-weight: bold; font-variant-numeric: tabular-nums; }
.overall .band { font-size: 1.5rem; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; vertical-align: top; }
th { background: var(--border); }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
.transcript { line-height: 2; }
.marker { border-radius: 4px; padding: 0 2px; }
.filled-pause { background: #fde68a; color: #1a1a1a; }
.editing-term { background: #fbcfe8; color: #1a1a1a; }
.discourse-marker { background: #bfdbfe; color: #1a1a1a; }
.conjunction { background: #ddd6fe; color: #1a1a1a; }
.restart { background: #fecaca; color: #1a1a1a; }
.advanced { background: #bbf7d0; color: #1a1a1a; border-radius: 4px; }
.repeated { text-decoration: underline wavy #f97316; }
.ipa { font-family: 'Doulos SIL', 'Charis SIL', serif; }
.short { color: #dc2626; font-weight: bold; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use bandscore_core::band::Band;
    use bandscore_core::fluency::{CategoryMarkers, LengthRevision};
    use bandscore_core::model::{Criterion, MarkerSpan};
    use bandscore_core::report::{FailedAnswer, SessionSummary};
    use bandscore_core::results::{CriterionSummary, OverallEvaluationResult};

    fn fluency_result() -> EvaluationResult {
        EvaluationResult {
            criterion: Criterion::Fluency,
            ielts_band: Band::from_score(6.5),
            readable_feedback: "Good pace.\nA few fillers.".into(),
            diagnostics: Diagnostics::Fluency(FluencyDiagnostics {
                word_count: 4,
                duration_seconds: 2.0,
                speech_rate_wpm: 120.0,
                speech_rate_band: 7.0,
                long_pause_threshold: 3.0,
                long_pauses: vec![],
                long_pause_band: 9.0,
                late_start_penalty: 0.0,
                markers: vec![CategoryMarkers {
                    category: DisfluencyCategory::FilledPause,
                    band: 8.0,
                    spans: vec![MarkerSpan {
                        text: "um".into(),
                        start: 0.0,
                        end: 0.3,
                        category: DisfluencyCategory::FilledPause,
                        first_word: 0,
                        last_word: 0,
                    }],
                }],
                linking_words: vec![],
                weighted_score: 6.4,
                revision: LengthRevision::Capped { cap: 6.5 },
            }),
        }
    }

    fn answer_report() -> AnswerReport {
        AnswerReport {
            answer_id: "q1".into(),
            question: Some("Do you like <reading>?".into()),
            transcript: "Um I like books".into(),
            created_at: chrono::Utc::now(),
            results: vec![
                fluency_result(),
                EvaluationResult::empty(Criterion::Grammar),
            ],
            duration_ms: 12,
        }
    }

    #[test]
    fn answer_html_highlights_markers() {
        let html = generate_answer_html(&answer_report());

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("<span class=\"marker filled-pause\" title=\"filled pause\">Um</span>"));
        assert!(html.contains("Do you like &lt;reading&gt;?"));
        assert!(html.contains("Good pace.<br>"));
        assert!(html.contains("<td class=\"band\">6.5</td>"));
    }

    #[test]
    fn session_html_has_summary_and_failures() {
        let report = SessionReport {
            id: uuid::Uuid::nil(),
            created_at: chrono::Utc::now(),
            session: SessionSummary {
                id: "s1".into(),
                name: "Mock Test".into(),
                candidate: Some("cand-1".into()),
                answer_count: 2,
            },
            answers: vec![answer_report()],
            failed: vec![FailedAnswer {
                answer_id: "q2".into(),
                error: "grammar corrector failed".into(),
            }],
            overall: OverallEvaluationResult {
                overall_band: Band::from_score(6.5),
                overall_feedback: "Solid.".into(),
                criteria: vec![CriterionSummary {
                    criterion: Criterion::Fluency,
                    band: Band::from_score(6.5),
                    feedback: "Keep going.".into(),
                    answers: 1,
                }],
            },
            duration_ms: 20,
        };

        let html = generate_session_html(&report);
        assert!(html.contains("Mock Test"));
        assert!(html.contains("cand-1"));
        assert!(html.contains("Fluency &amp; Coherence"));
        assert!(html.contains("grammar corrector failed"));
        assert!(html.contains("id=\"answer-q1\""));
        assert!(html.contains("Averaged over 1 of 4 criteria."));
    }

    #[test]
    fn html_report_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("q1.html");

        write_answer_html(&answer_report(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }

    #[test]
    fn escape_covers_markup() {
        assert_eq!(html_escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;");
    }
}
