//! Two-term placement cost and incumbent ordering.
//!
//! `cost = 10 * placements + shard_count`. While every cluster's `k` shards sit
//! on `k` distinct stripes the two terms are equal; they are still counted
//! separately so a model that relaxes that rule keeps its meaning.
use crate::assignment::Assignment;

/// Weight of one shard-to-stripe edge.
pub const PLACEMENT_WEIGHT: u64 = 10;
/// Weight of one unit of chosen shard count.
pub const SHARD_COUNT_WEIGHT: u64 = 1;

/// Total number of (cluster, stripe) edges.
pub fn total_placements(assignment: &Assignment) -> u64 {
    assignment
        .placements()
        .map(|(_, p)| p.stripes.len() as u64)
        .sum()
}

/// Sum of chosen shard counts.
pub fn total_shard_count(assignment: &Assignment) -> u64 {
    assignment.placements().map(|(_, p)| p.k as u64).sum()
}

/// Cost of the clusters placed so far.
pub fn cost(assignment: &Assignment) -> u64 {
    weighted(total_placements(assignment), total_shard_count(assignment))
}

/// Lowest cost any completion of `assignment` can reach when at least
/// `extra_shards` more shards must still be placed.
pub fn lower_bound(assignment: &Assignment, extra_shards: u64) -> u64 {
    weighted(
        total_placements(assignment) + extra_shards,
        total_shard_count(assignment) + extra_shards,
    )
}

/// Strictly better than the incumbent; ties keep the incumbent.
pub fn improves(candidate: u64, incumbent: Option<u64>) -> bool {
    incumbent.map_or(true, |best| candidate < best)
}

fn weighted(placements: u64, shard_count: u64) -> u64 {
    PLACEMENT_WEIGHT * placements + SHARD_COUNT_WEIGHT * shard_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClusterId, Problem, ProblemConfig, StripeId};

    #[test]
    fn cost_is_eleven_per_shard() {
        let p = Problem::new(
            vec![(ClusterId(1), 10), (ClusterId(2), 10)],
            ProblemConfig { stripes: 3, max_shards: 3, min_load: 0, max_load: 100 },
        )
        .unwrap();
        let mut a = Assignment::empty(&p);
        assert_eq!(cost(&a), 0);
        a.place(&p, 0, 1, &[StripeId(0)]);
        a.place(&p, 1, 3, &[StripeId(0), StripeId(1), StripeId(2)]);
        assert_eq!(total_placements(&a), 4);
        assert_eq!(total_shard_count(&a), 4);
        assert_eq!(cost(&a), 44);
        assert_eq!(lower_bound(&a, 2), 66);
    }

    #[test]
    fn ties_keep_incumbent() {
        assert!(improves(22, None));
        assert!(improves(21, Some(22)));
        assert!(!improves(22, Some(22)));
        assert!(!improves(33, Some(22)));
    }
}
