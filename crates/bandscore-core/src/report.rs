//! Answer and session reports with JSON persistence and progress comparison.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::band::Band;
use crate::model::Criterion;
use crate::results::{EvaluationResult, OverallEvaluationResult};

fn save_pretty<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

fn load<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read report from {}", path.display()))?;
    serde_json::from_str(&content).context("failed to parse report JSON")
}

/// All criterion results for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerReport {
    pub answer_id: String,
    #[serde(default)]
    pub question: Option<String>,
    /// The scored transcript, kept so renderers can highlight it.
    #[serde(default)]
    pub transcript: String,
    pub created_at: DateTime<Utc>,
    pub results: Vec<EvaluationResult>,
    /// Wall-clock time spent evaluating, in milliseconds.
    pub duration_ms: u64,
}

impl AnswerReport {
    pub fn result(&self, criterion: Criterion) -> Option<&EvaluationResult> {
        self.results.iter().find(|r| r.criterion == criterion)
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_pretty(self, path)
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        load(path)
    }
}

/// Summary of a session (without the answers themselves).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub candidate: Option<String>,
    pub answer_count: usize,
}

/// An answer whose evaluation failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAnswer {
    pub answer_id: String,
    pub error: String,
}

/// A complete session report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Unique report identifier.
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub session: SessionSummary,
    /// Per-answer reports, in session order.
    pub answers: Vec<AnswerReport>,
    /// Answers that could not be scored. They do not count toward `overall`.
    #[serde(default)]
    pub failed: Vec<FailedAnswer>,
    pub overall: OverallEvaluationResult,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl SessionReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_pretty(self, path)
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        load(path)
    }

    /// Compare this session against an earlier one.
    ///
    /// The overall band and each criterion band count as changed when they
    /// moved by at least `threshold`. Criteria missing from either session
    /// are left out.
    pub fn compare(&self, baseline: &SessionReport, threshold: f64) -> BandComparison {
        let mut targets: Vec<(String, Band, Band)> = vec![(
            "overall".to_string(),
            baseline.overall.overall_band,
            self.overall.overall_band,
        )];
        for criterion in Criterion::ALL {
            // Only criteria both sessions assessed are comparable.
            if let (Some(before), Some(after)) = (
                baseline.overall.summary(criterion),
                self.overall.summary(criterion),
            ) {
                targets.push((criterion.to_string(), before.band, after.band));
            }
        }

        let mut comparison = BandComparison {
            baseline_id: baseline.id,
            current_id: self.id,
            regressions: Vec::new(),
            improvements: Vec::new(),
            unchanged: Vec::new(),
        };

        for (target, before, after) in targets {
            let delta = after.value() - before.value();
            let change = BandDelta {
                target,
                baseline: before.value(),
                current: after.value(),
                delta,
            };
            if delta != 0.0 && delta.abs() >= threshold {
                if delta < 0.0 {
                    comparison.regressions.push(change);
                } else {
                    comparison.improvements.push(change);
                }
            } else {
                comparison.unchanged.push(change.target);
            }
        }

        comparison
    }
}

/// Band movement of one target between two sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandDelta {
    /// "overall" or a criterion name.
    pub target: String,
    pub baseline: f64,
    pub current: f64,
    pub delta: f64,
}

/// Result of comparing two session reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandComparison {
    pub baseline_id: Uuid,
    pub current_id: Uuid,
    pub regressions: Vec<BandDelta>,
    pub improvements: Vec<BandDelta>,
    pub unchanged: Vec<String>,
}

impl BandComparison {
    /// Format the comparison as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged.len()
        ));

        for (title, rows, sign) in [
            ("Regressions", &self.regressions, ""),
            ("Improvements", &self.improvements, "+"),
        ] {
            if rows.is_empty() {
                continue;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| Target | Baseline | Current | Delta |\n");
            md.push_str("|--------|----------|---------|-------|\n");
            for r in rows {
                md.push_str(&format!(
                    "| {} | {:.1} | {:.1} | {sign}{:.1} |\n",
                    r.target, r.baseline, r.current, r.delta
                ));
            }
            md.push('\n');
        }

        md
    }

    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}
