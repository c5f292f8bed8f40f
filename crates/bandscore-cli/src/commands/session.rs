//! The `bandscore session` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Table};

use bandscore_core::engine::{ProgressReporter, SessionOptions};
use bandscore_core::model::Criterion;
use bandscore_core::parser;
use bandscore_core::report::{AnswerReport, SessionReport};
use bandscore_providers::build_evaluator;
use bandscore_report::{session_markdown, write_markdown, write_session_html};

use super::{file_stem, parse_criteria, parse_formats, print_warnings, OutputFormat, RunOptions};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_answer_start(&self, answer_id: &str) {
        eprintln!("  Starting: {answer_id}");
    }

    fn on_answer_complete(&self, report: &AnswerReport) {
        let bands = report
            .results
            .iter()
            .map(|r| format!("{} {}", r.criterion, r.ielts_band))
            .collect::<Vec<_>>()
            .join(", ");
        eprintln!(
            "  Done: {} [{}] ({}ms)",
            report.answer_id, bands, report.duration_ms
        );
    }

    fn on_answer_error(&self, answer_id: &str, error: &str) {
        eprintln!("  ERROR: {answer_id}: {error}");
    }

    fn on_session_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} scored, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    manifest: PathBuf,
    parallelism: Option<usize>,
    options: RunOptions,
) -> Result<()> {
    let config = options.load_config()?;
    let parallelism = parallelism.unwrap_or(config.parallelism);
    anyhow::ensure!(parallelism >= 1, "parallelism must be at least 1");
    let criteria = parse_criteria(options.criteria.as_deref())?;
    let formats = parse_formats(&options.format)?;

    let session = parser::parse_session(&manifest)?;
    print_warnings(&parser::validate_session(&session));

    let evaluator = build_evaluator(&config, &session.answers)?;
    let scoring = config.scoring_config(&criteria);
    let session_options = SessionOptions {
        parallelism,
        catalog: config.template_catalog()?,
        seed: config.scoring.template_seed,
    };

    eprintln!(
        "bandscore v{} - Scoring {} answers of '{}'",
        env!("CARGO_PKG_VERSION"),
        session.answers.len(),
        session.name
    );
    eprintln!();

    let report = evaluator
        .evaluate_session(&session, &scoring, &session_options, &ConsoleReporter)
        .await?;

    print_summary(&report);

    let output = options.output_dir(&config);
    std::fs::create_dir_all(&output)?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
    let stem = format!("session-{}-{timestamp}", file_stem(&report.session.id));

    for format in formats {
        let path = output.join(format!("{stem}.{}", format.extension()));
        match format {
            OutputFormat::Json => report.save_json(&path)?,
            OutputFormat::Html => write_session_html(&report, &path)?,
            OutputFormat::Markdown => write_markdown(&session_markdown(&report), &path)?,
        }
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn print_summary(report: &SessionReport) {
    let mut table = Table::new();
    let mut header = vec!["Answer".to_string()];
    header.extend(
        report
            .overall
            .criteria
            .iter()
            .map(|c| c.criterion.to_string()),
    );
    table.set_header(header);

    for answer in &report.answers {
        let mut row = vec![Cell::new(&answer.answer_id)];
        for summary in &report.overall.criteria {
            let band = answer
                .result(summary.criterion)
                .map(|r| r.ielts_band.to_string())
                .unwrap_or_else(|| "-".to_string());
            row.push(Cell::new(band));
        }
        table.add_row(row);
    }

    let mut totals = vec![Cell::new("session")];
    totals.extend(
        report
            .overall
            .criteria
            .iter()
            .map(|c| Cell::new(c.band.to_string())),
    );
    table.add_row(totals);

    eprintln!("\n{table}");
    let overall = &report.overall;
    if overall.is_complete() {
        eprintln!(
            "\nOverall band: {}\n{}",
            overall.overall_band, overall.overall_feedback
        );
    } else {
        eprintln!(
            "\nOverall band ({} of {} criteria assessed): {}\n{}",
            overall.criteria.len(),
            Criterion::ALL.len(),
            overall.overall_band,
            overall.overall_feedback
        );
    }
}
