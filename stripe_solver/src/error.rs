use thiserror::Error;

/// Errors surfaced by problem construction and by the solver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    /// Malformed input detected while building a [`crate::Problem`].
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// The search space was exhausted without a feasible assignment.
    #[error("no feasible layout with those bounds and shard counts")]
    Infeasible,
    /// The time budget elapsed before any feasible assignment was found.
    #[error("time budget exceeded before a feasible layout was found")]
    TimeBudgetExceeded,
    /// The caller cancelled the search before any feasible assignment was found.
    #[error("search cancelled before a feasible layout was found")]
    SearchCancelled,
}

impl SolveError {
    /// Whether the caller should treat this as "no layout available".
    ///
    /// A cut-off search without a solution is indistinguishable from a proven
    /// infeasible one for the consumer of a report.
    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            SolveError::Infeasible | SolveError::TimeBudgetExceeded | SolveError::SearchCancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_errors_read_as_infeasible() {
        assert!(SolveError::Infeasible.is_infeasible());
        assert!(SolveError::TimeBudgetExceeded.is_infeasible());
        assert!(SolveError::SearchCancelled.is_infeasible());
        assert!(!SolveError::InvalidConfiguration("x".into()).is_infeasible());
        assert_ne!(SolveError::Infeasible, SolveError::TimeBudgetExceeded);
    }
}
