//! Evaluation error types.
//!
//! Empty or missing transcripts are not errors: each scorer answers them
//! with a canonical zero-band result. What remains is a collaborator that
//! failed mid-evaluation and a configuration that cannot be used at all.
//! The evaluator never returns partial results, so a criterion either gets
//! a full [`EvaluationResult`](crate::results::EvaluationResult) or one of
//! these.

use thiserror::Error;

use crate::model::Criterion;

/// Errors that can occur while evaluating an answer.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A collaborator call (segmenter, tagger, corrector, classifier,
    /// fill-mask predictor, aligner) failed. Not retried.
    #[error("{criterion} evaluation failed: {collaborator} error: {message}")]
    Collaborator {
        criterion: Criterion,
        collaborator: &'static str,
        message: String,
    },

    /// The scoring configuration is unusable (unset or unknown backend,
    /// empty model name). Raised before any collaborator is called.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl EvalError {
    pub(crate) fn collaborator(
        criterion: Criterion,
        collaborator: &'static str,
        err: anyhow::Error,
    ) -> Self {
        Self::Collaborator {
            criterion,
            collaborator,
            message: format!("{err:#}"),
        }
    }

    /// Configuration errors are the caller's to fix; collaborator errors
    /// are server-side.
    pub fn is_client_error(&self) -> bool {
        matches!(self, EvalError::Configuration(_))
    }

    /// The criterion whose evaluation failed, if the error is tied to one.
    pub fn criterion(&self) -> Option<Criterion> {
        match self {
            EvalError::Collaborator { criterion, .. } => Some(*criterion),
            EvalError::Configuration(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_error_keeps_original_message() {
        let err = EvalError::collaborator(
            Criterion::Grammar,
            "grammar corrector",
            anyhow::anyhow!("model not found: coedit").context("correct sentence"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("grammar evaluation failed"));
        assert!(msg.contains("model not found: coedit"));
        assert!(!err.is_client_error());
        assert_eq!(err.criterion(), Some(Criterion::Grammar));
    }

    #[test]
    fn configuration_error_is_client_side() {
        let err = EvalError::Configuration("grammar backend is not set".into());
        assert!(err.is_client_error());
        assert_eq!(err.criterion(), None);
        assert_eq!(
            err.to_string(),
            "configuration error: grammar backend is not set"
        );
    }
}
