//! The error taxonomy shared across every component boundary.
//!
//! Each variant corresponds to one of the failure kinds a job outcome can record.
//! Lower-level errors (I/O, HTTP status, solver internals) are wrapped into the
//! matching variant at the point they are first observed so that callers further up
//! the stack can match on `kind()` rather than inspecting an opaque error chain.
use thiserror::Error;

/// A failure occurring anywhere in the input-bundle → MILP → schedule → sink pipeline.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// A structural precondition on the input bundle failed (missing mapping,
    /// negative value, unknown identifier).
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// The live tabular data source could not be read.
    #[error("data source unavailable: {0}")]
    SourceUnavailable(#[source] anyhow::Error),

    /// The solver reports no feasible point exists.
    #[error("no feasible solution exists for this input")]
    Infeasible,

    /// The solver crashed, was interrupted, or returned an unrecognized status.
    #[error("solver error: {0}")]
    SolverError(String),

    /// The wall-clock budget for the job was exceeded.
    #[error("job exceeded time limit of {0}s")]
    Timeout(u64),

    /// The schedule was computed but could not be persisted to the results sink.
    #[error("failed to write results: {0}")]
    SinkFailure(#[source] anyhow::Error),
}

impl PlannerError {
    /// A short, stable name for the error kind, suitable for a job status payload.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputInvalid(_) => "InputInvalid",
            Self::SourceUnavailable(_) => "SourceUnavailable",
            Self::Infeasible => "Infeasible",
            Self::SolverError(_) => "SolverError",
            Self::Timeout(_) => "Timeout",
            Self::SinkFailure(_) => "SinkFailure",
        }
    }

    /// The process exit code to use for this error kind when run from the CLI.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InputInvalid(_) => 2,
            Self::SourceUnavailable(_) => 3,
            Self::Infeasible => 4,
            Self::SolverError(_) => 5,
            Self::Timeout(_) => 6,
            Self::SinkFailure(_) => 7,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_exit_code_are_distinct_per_variant() {
        let errs: Vec<PlannerError> = vec![
            PlannerError::InputInvalid("x".into()),
            PlannerError::SourceUnavailable(anyhow::anyhow!("x")),
            PlannerError::Infeasible,
            PlannerError::SolverError("x".into()),
            PlannerError::Timeout(600),
            PlannerError::SinkFailure(anyhow::anyhow!("x")),
        ];
        let kinds: Vec<&str> = errs.iter().map(PlannerError::kind).collect();
        let mut sorted = kinds.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(kinds.len(), sorted.len());
    }
}
