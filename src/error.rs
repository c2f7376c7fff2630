use thiserror::Error;

/// Failures reported by the model, the solver and the interactive session.
///
/// A failed `simulate` call never carries a partial trajectory.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid time grid: {0}")]
    InvalidTimeGrid(String),

    #[error("numeric instability at t={time}: {reason}")]
    NumericInstability { time: f64, reason: String },
}

pub type SimResult<T> = Result<T, SimError>;
