//! The `bandscore score` command.

use std::path::PathBuf;

use anyhow::Result;

use bandscore_core::aggregate::{aggregate, SessionHistory};
use bandscore_core::model::Criterion;
use bandscore_core::parser;
use bandscore_providers::build_evaluator;
use bandscore_report::{answer_markdown, write_answer_html, write_markdown};

use super::{bands_table, file_stem, parse_criteria, parse_formats, print_warnings, OutputFormat, RunOptions};

pub async fn execute(answer_path: PathBuf, options: RunOptions) -> Result<()> {
    let config = options.load_config()?;
    let criteria = parse_criteria(options.criteria.as_deref())?;
    let formats = parse_formats(&options.format)?;

    let answer = parser::parse_answer(&answer_path)?;
    print_warnings(&parser::validate_answer(&answer));

    let evaluator = build_evaluator(&config, std::slice::from_ref(&answer))?;
    let scoring = config.scoring_config(&criteria);
    let selected = scoring.selected();

    eprintln!(
        "bandscore v{} - Scoring answer '{}' ({})",
        env!("CARGO_PKG_VERSION"),
        answer.id,
        selected
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let report = evaluator.evaluate_answer(&answer, &scoring).await?;

    eprintln!("\n{}", bands_table(&report.results));
    for result in &report.results {
        eprintln!("\n{}:\n{}", result.criterion.title(), result.readable_feedback);
    }

    // An overall band only means something when all four criteria were scored.
    if selected.len() == Criterion::ALL.len() {
        let mut history = SessionHistory::new();
        history.extend(report.results.iter().cloned());
        let mut rng = match config.scoring.template_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let overall = aggregate(&history, &config.template_catalog()?, &mut rng);
        eprintln!(
            "\nOverall band: {}\n{}",
            overall.overall_band, overall.overall_feedback
        );
    }

    let output = options.output_dir(&config);
    std::fs::create_dir_all(&output)?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
    let stem = format!("{}-{timestamp}", file_stem(&report.answer_id));

    for format in formats {
        let path = output.join(format!("{stem}.{}", format.extension()));
        match format {
            OutputFormat::Json => report.save_json(&path)?,
            OutputFormat::Html => write_answer_html(&report, &path)?,
            OutputFormat::Markdown => write_markdown(&answer_markdown(&report), &path)?,
        }
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}
