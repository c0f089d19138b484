//! Placement of sharded clusters onto capacity-bounded stripes.
//!
//! Each cluster is split into `k` equal shards (`1 <= k <= K_max`, shard
//! weight `floor(weight / k)`) placed on `k` distinct stripes, and every
//! stripe load must land in `[L, H]`. [`solve`] runs a branch-and-bound
//! search for the layout with the lowest `10 * placements + shard_count`.
//!
//! ```
//! use stripe_solver::{plan, ClusterId, Problem, ProblemConfig, SearchOptions};
//!
//! let problem = Problem::new(
//!     vec![(ClusterId(1), 900_000)],
//!     ProblemConfig { stripes: 2, max_shards: 2, min_load: 400_000, max_load: 550_000 },
//! )
//! .unwrap();
//! let report = plan(&problem, &SearchOptions::default()).unwrap();
//! assert_eq!(report.cost, 22);
//! assert_eq!(report.stripes[0].load, 450_000);
//! ```
#![deny(missing_docs)]

pub mod assignment;
pub mod config;
pub mod constraint;
mod error;
pub mod model;
pub mod objective;
pub mod report;
pub mod search;

pub use assignment::{Assignment, Placement};
pub use config::PlanFile;
pub use error::SolveError;
pub use model::{shard_weight, Cluster, ClusterId, Problem, ProblemConfig, StripeId};
pub use report::{Report, ShardEntry, StripeReport};
pub use search::{
    solve, CancelToken, Outcome, Search, SearchOptions, SearchPhase, SearchResult, SearchStats,
    Solution, SolveStatus, StopCause,
};

/// Search `problem` and lay the result out per stripe.
pub fn plan(problem: &Problem, options: &SearchOptions) -> Result<Report, SolveError> {
    let result = solve(problem, options);
    Report::from_result(problem, &result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_reports_infeasibility() {
        let problem = Problem::new(
            vec![(ClusterId(1), 1000)],
            ProblemConfig { stripes: 3, max_shards: 4, min_load: 400, max_load: 600 },
        )
        .unwrap();
        assert_eq!(
            plan(&problem, &SearchOptions::default()),
            Err(SolveError::Infeasible)
        );
    }

    #[test]
    fn plan_lists_pairs_per_stripe() {
        let problem = Problem::new(
            vec![(ClusterId(7), 10), (ClusterId(3), 10)],
            ProblemConfig { stripes: 2, max_shards: 1, min_load: 0, max_load: 100 },
        )
        .unwrap();
        let report = plan(&problem, &SearchOptions::default()).unwrap();
        assert_eq!(report.cost, 22);
        assert!(report.is_optimal());
        let mut seen: Vec<ClusterId> = report
            .stripes
            .iter()
            .flat_map(|s| s.pairs())
            .map(|(c, k)| {
                assert_eq!(k, 1);
                c
            })
            .collect();
        seen.sort();
        assert_eq!(seen, vec![ClusterId(3), ClusterId(7)]);
        assert!(report.stripes.iter().all(|s| s.shards.len() == 1));
    }
}
