//! Smart query evaluation seam.

use thiserror::Error;
use vitrine_core::CancellationToken;

use crate::store::{ExhibitId, SmartQuery};

/// Failure reported by a [`SmartQueryEvaluator`].
#[derive(Debug, Error)]
pub enum EvaluatorError {
    /// The evaluator observed the token and stopped early.
    #[error("evaluation cancelled")]
    Cancelled,

    /// The filter text could not be understood.
    #[error("invalid filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// Anything else the evaluator wants to report.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Computes the exhibits matching a smart query.
///
/// Called on worker threads. Long evaluations should poll `cancel` and return
/// [`EvaluatorError::Cancelled`] once it is set.
pub trait SmartQueryEvaluator: Send + Sync {
    fn evaluate(&self, query: &SmartQuery, cancel: &CancellationToken) -> Result<Vec<ExhibitId>, EvaluatorError>;
}

/// An evaluator that matches nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEvaluator;

impl SmartQueryEvaluator for EmptyEvaluator {
    fn evaluate(&self, _query: &SmartQuery, _cancel: &CancellationToken) -> Result<Vec<ExhibitId>, EvaluatorError> {
        Ok(Vec::new())
    }
}
