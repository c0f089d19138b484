//! Per-stripe report built from a terminal search outcome.
use serde::{Deserialize, Serialize};

use crate::error::SolveError;
use crate::model::{ClusterId, Problem, StripeId};
use crate::search::{Outcome, SearchResult, Solution, SolveStatus, StopCause};

/// One shard sitting on a stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEntry {
    /// Owning cluster.
    pub cluster: ClusterId,
    /// Shard count chosen for that cluster.
    pub k: usize,
    /// Users carried by this shard.
    pub shard_weight: u64,
}

/// Contents and load of a single stripe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripeReport {
    /// Stripe identifier.
    pub stripe: StripeId,
    /// Sum of shard weights on this stripe.
    pub load: u64,
    /// Shards ordered by cluster identifier.
    pub shards: Vec<ShardEntry>,
}

impl StripeReport {
    /// `(cluster, k)` pairs placed on this stripe.
    pub fn pairs(&self) -> Vec<(ClusterId, usize)> {
        self.shards.iter().map(|e| (e.cluster, e.k)).collect()
    }
}

/// Layout handed to the caller for a solved search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// One entry per stripe, by identifier.
    pub stripes: Vec<StripeReport>,
    /// Objective value of the layout.
    pub cost: u64,
    /// Proven optimal or cut off by time or cancellation.
    pub status: SolveStatus,
    /// Sum of all stripe loads.
    pub total_load: u64,
    /// Users lost to floor division when splitting clusters.
    pub truncated: u64,
}

impl Report {
    /// Build a report from a search result; infeasibility becomes an error.
    pub fn from_result(problem: &Problem, result: &SearchResult) -> Result<Self, SolveError> {
        Self::from_outcome(problem, &result.outcome)
    }

    /// Build a report from a terminal outcome; infeasibility becomes an error.
    pub fn from_outcome(problem: &Problem, outcome: &Outcome) -> Result<Self, SolveError> {
        match outcome {
            Outcome::Solved { solution, status } => {
                Ok(Self::from_solution(problem, solution, *status))
            }
            Outcome::Infeasible => Err(SolveError::Infeasible),
            Outcome::Interrupted(StopCause::TimeLimit) => Err(SolveError::TimeBudgetExceeded),
            Outcome::Interrupted(StopCause::Cancelled) => Err(SolveError::SearchCancelled),
        }
    }

    /// Lay out a solution stripe by stripe.
    pub fn from_solution(problem: &Problem, solution: &Solution, status: SolveStatus) -> Self {
        let mut stripes: Vec<StripeReport> = problem
            .stripes()
            .map(|stripe| StripeReport {
                stripe,
                load: solution.assignment.load(stripe),
                shards: Vec::new(),
            })
            .collect();

        let mut truncated = 0;
        for (idx, placement) in solution.assignment.placements() {
            let cluster = problem.cluster(idx);
            truncated += cluster.weight - placement.shard_weight * placement.k as u64;
            for s in &placement.stripes {
                stripes[s.0].shards.push(ShardEntry {
                    cluster: cluster.id,
                    k: placement.k,
                    shard_weight: placement.shard_weight,
                });
            }
        }

        let total_load = stripes.iter().map(|s| s.load).sum();
        Self {
            stripes,
            cost: solution.cost,
            status,
            total_load,
            truncated,
        }
    }

    /// Report for `stripe`, if it exists.
    pub fn stripe(&self, stripe: StripeId) -> Option<&StripeReport> {
        self.stripes.get(stripe.0)
    }

    /// Whether the layout is proven optimal.
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}
