//! The `bandscore compare` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use bandscore_core::band::Band;
use bandscore_core::model::Criterion;
use bandscore_core::report::{BandComparison, SessionReport};

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");
    let baseline = SessionReport::load_json(&baseline_path)?;
    let current = SessionReport::load_json(&current_path)?;

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => print_text(&baseline, &current, &report, threshold),
    }

    if fail_on_regression && report.has_regressions() {
        std::process::exit(1);
    }

    Ok(())
}

fn session_label(report: &SessionReport) -> String {
    match &report.session.candidate {
        Some(candidate) => format!("{} (candidate {candidate})", report.session.name),
        None => report.session.name.clone(),
    }
}

fn print_text(
    baseline: &SessionReport,
    current: &SessionReport,
    report: &BandComparison,
    threshold: f64,
) {
    if baseline.session.id == current.session.id {
        println!("Band comparison for {}", session_label(current));
    } else {
        println!(
            "Band comparison: {} against {}",
            session_label(current),
            session_label(baseline)
        );
    }
    println!(
        "  baseline scored {}, current scored {}",
        baseline.created_at.format("%Y-%m-%d %H:%M UTC"),
        current.created_at.format("%Y-%m-%d %H:%M UTC")
    );

    let mut table = Table::new();
    table.set_header(vec!["Criterion", "Baseline", "Current", "Change", ""]);
    table.add_row(band_row(
        "Overall band",
        Some(baseline.overall.overall_band),
        Some(current.overall.overall_band),
        report,
        "overall",
    ));
    for criterion in Criterion::ALL {
        table.add_row(band_row(
            criterion.title(),
            baseline.overall.summary(criterion).map(|s| s.band),
            current.overall.summary(criterion).map(|s| s.band),
            report,
            &criterion.to_string(),
        ));
    }
    println!("{table}");

    for r in &report.regressions {
        println!(
            "{} dropped {:.1} bands ({:.1} -> {:.1})",
            target_title(&r.target),
            -r.delta,
            r.baseline,
            r.current
        );
    }
    for i in &report.improvements {
        println!(
            "{} rose {:.1} bands ({:.1} -> {:.1})",
            target_title(&i.target),
            i.delta,
            i.baseline,
            i.current
        );
    }
    println!(
        "\n{} regressions, {} improvements at a {:.1}-band threshold",
        report.regressions.len(),
        report.improvements.len(),
        threshold
    );
}

fn band_row(
    title: &str,
    baseline: Option<Band>,
    current: Option<Band>,
    report: &BandComparison,
    target: &str,
) -> Vec<Cell> {
    let (Some(before), Some(after)) = (baseline, current) else {
        let show = |band: Option<Band>| band.map_or("-".to_string(), |b| b.to_string());
        return vec![
            Cell::new(title),
            Cell::new(show(baseline)),
            Cell::new(show(current)),
            Cell::new(""),
            Cell::new("not assessed in both"),
        ];
    };
    let status = if report.regressions.iter().any(|r| r.target == target) {
        "regressed"
    } else if report.improvements.iter().any(|i| i.target == target) {
        "improved"
    } else {
        ""
    };
    vec![
        Cell::new(title),
        Cell::new(before.to_string()),
        Cell::new(after.to_string()),
        Cell::new(format!("{:+.1}", after.value() - before.value())),
        Cell::new(status),
    ]
}

/// Readable name for a comparison target.
fn target_title(target: &str) -> &'static str {
    match target.parse::<Criterion>() {
        Ok(criterion) => criterion.title(),
        Err(_) => "Overall band",
    }
}
