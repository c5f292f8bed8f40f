//! Session aggregation: per-criterion means and the overall band.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::band::Band;
use crate::model::Criterion;
use crate::results::{CriterionSummary, EvaluationResult, OverallEvaluationResult};
use crate::templates::{FeedbackTarget, TemplateCatalog};

/// Per-criterion results collected over a session, in answer order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionHistory {
    results: BTreeMap<Criterion, Vec<EvaluationResult>>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result under its own criterion.
    pub fn push(&mut self, result: EvaluationResult) {
        self.results.entry(result.criterion).or_default().push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = EvaluationResult>) {
        for r in results {
            self.push(r);
        }
    }

    pub fn results(&self, criterion: Criterion) -> &[EvaluationResult] {
        self.results
            .get(&criterion)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.results.values().all(Vec::is_empty)
    }

    /// Rounded mean band of `criterion`; zero when it has no results.
    pub fn criterion_band(&self, criterion: Criterion) -> Band {
        Band::mean(self.results(criterion).iter().map(|r| r.ielts_band))
    }
}

/// Combine a session's results into per-criterion and overall bands.
///
/// Only criteria with at least one result get a summary, and the overall
/// band is the rounded mean of those summaries. A session scored on every
/// criterion therefore averages all four; a partial selection never counts
/// the missing criteria as zero.
pub fn aggregate(
    history: &SessionHistory,
    catalog: &TemplateCatalog,
    rng: &mut fastrand::Rng,
) -> OverallEvaluationResult {
    let criteria: Vec<CriterionSummary> = Criterion::ALL
        .into_iter()
        .filter(|&criterion| !history.results(criterion).is_empty())
        .map(|criterion| {
            let band = history.criterion_band(criterion);
            CriterionSummary {
                criterion,
                band,
                feedback: catalog.render(FeedbackTarget::Criterion(criterion), band, rng),
                answers: history.results(criterion).len(),
            }
        })
        .collect();

    let overall_band = Band::mean(criteria.iter().map(|c| c.band));
    let overall_feedback = catalog.render(FeedbackTarget::Overall, overall_band, rng);

    tracing::info!(
        overall = overall_band.value(),
        bands = %criteria
            .iter()
            .map(|c| format!("{}={}", c.criterion, c.band))
            .collect::<Vec<_>>()
            .join(" "),
        "session aggregated"
    );
    if !criteria.is_empty() && criteria.len() < Criterion::ALL.len() {
        tracing::warn!(
            assessed = criteria.len(),
            "overall band covers only the assessed criteria"
        );
    }

    OverallEvaluationResult {
        overall_band,
        overall_feedback,
        criteria,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(criterion: Criterion, band: f64) -> EvaluationResult {
        let mut r = EvaluationResult::zero(criterion, "");
        r.ielts_band = Band::from_score(band);
        r
    }

    #[test]
    fn fluency_mean_rounds_to_half_band() {
        let mut history = SessionHistory::new();
        for b in [6.0, 6.5, 7.0, 7.5] {
            history.push(result(Criterion::Fluency, b));
        }
        assert_eq!(history.criterion_band(Criterion::Fluency).value(), 7.0);
        assert_eq!(history.criterion_band(Criterion::Grammar), Band::ZERO);
    }

    #[test]
    fn overall_is_mean_of_criteria() {
        let mut history = SessionHistory::new();
        history.extend([
            result(Criterion::Fluency, 7.0),
            result(Criterion::Grammar, 6.5),
            result(Criterion::Lexical, 6.0),
            result(Criterion::Pronunciation, 7.0),
        ]);
        let mut rng = fastrand::Rng::with_seed(3);
        let overall = aggregate(&history, &TemplateCatalog::builtin(), &mut rng);
        // mean 6.625 → 6.5
        assert_eq!(overall.overall_band.value(), 6.5);
        assert_eq!(overall.band(Criterion::Grammar).value(), 6.5);
        assert!(overall.overall_feedback.contains("6.5"));
        assert_eq!(overall.criteria.len(), 4);
        assert!(overall.is_complete());
        assert!(overall.criteria.iter().all(|c| c.answers == 1));
    }

    #[test]
    fn empty_history_is_zero() {
        let mut rng = fastrand::Rng::with_seed(3);
        let overall = aggregate(&SessionHistory::new(), &TemplateCatalog::builtin(), &mut rng);
        assert_eq!(overall.overall_band, Band::ZERO);
        assert!(overall.criteria.is_empty());
        assert!(!overall.is_complete());
    }

    #[test]
    fn unassessed_criteria_do_not_count_as_zero() {
        let mut history = SessionHistory::new();
        history.extend([result(Criterion::Fluency, 6.0), result(Criterion::Fluency, 7.0)]);
        let mut rng = fastrand::Rng::with_seed(3);
        let overall = aggregate(&history, &TemplateCatalog::builtin(), &mut rng);
        assert_eq!(overall.criteria.len(), 1);
        assert!(overall.summary(Criterion::Grammar).is_none());
        // mean 6.5
        assert_eq!(overall.overall_band.value(), 6.5);
        assert!(!overall.is_complete());
    }
}
