//! Feasibility predicates over partial and complete assignments.
//!
//! All functions here are pure. The search engine calls
//! [`shard_placement_valid`] before extending an assignment and
//! [`capacity_feasible`] after, abandoning the branch on the first `false`.
use crate::assignment::Assignment;
use crate::model::{Cluster, Problem, StripeId};

/// `stripes` holds exactly `k` distinct in-range stripes, `k` is in the shard
/// domain, and none of the stripes already hosts a shard of `cluster`.
pub fn shard_placement_valid(
    problem: &Problem,
    assignment: &Assignment,
    cluster: usize,
    k: usize,
    stripes: &[StripeId],
) -> bool {
    if !problem.shard_domain().contains(&k) || stripes.len() != k {
        return false;
    }
    stripes.iter().enumerate().all(|(i, s)| {
        s.0 < problem.stripe_count()
            && !stripes[..i].contains(s)
            && !assignment.hosts(cluster, *s)
    })
}

/// Can every stripe still end inside `[L, H]` once `remaining` is placed?
///
/// A necessary condition only: `true` does not promise a completion exists,
/// `false` proves none does.
pub fn capacity_feasible(problem: &Problem, loads: &[u64], remaining: &[Cluster]) -> bool {
    let (min_load, max_load) = problem.bounds();
    if loads.iter().any(|&l| l > max_load) {
        return false;
    }

    // Each remaining cluster adds at most its full weight (k = 1) in total.
    // Bound-sized sums saturate: S * H may exceed u64 even though loads cannot.
    let max_mass = saturating_sum(remaining.iter().map(|c| c.weight));
    let deficit = saturating_sum(loads.iter().map(|&l| min_load.saturating_sub(l)));
    if deficit > max_mass {
        return false;
    }

    // ...and at least its smallest truncated total, which must fit under H.
    let min_mass = saturating_sum(remaining.iter().map(|c| min_spread_mass(problem, c)));
    let slack = saturating_sum(loads.iter().map(|&l| max_load - l));
    if min_mass > slack {
        return false;
    }

    // A stripe below L needs at least one non-empty shard.
    let hungry = deficient_stripes(problem, loads);
    let max_nonempty: usize = remaining.iter().map(|c| max_nonempty_shards(problem, c)).sum();
    if hungry > max_nonempty {
        return false;
    }

    remaining
        .iter()
        .all(|c| min_shard_count(problem, loads, c).is_some())
}

/// Smallest `k` for which `cluster` has `k` stripes with room for one shard.
///
/// Expects every load to be at most `H`.
pub fn min_shard_count(problem: &Problem, loads: &[u64], cluster: &Cluster) -> Option<usize> {
    let (_, max_load) = problem.bounds();
    problem.usable_shard_counts().find(|&k| {
        let w = cluster.shard_weight(k);
        loads.iter().filter(|&&l| max_load - l >= w).count() >= k
    })
}

/// Fewest shards still to be placed by any completion of the current state.
///
/// Every remaining cluster needs its [`min_shard_count`], and every stripe
/// below `L` needs at least one more shard.
pub fn min_remaining_shards(problem: &Problem, loads: &[u64], remaining: &[Cluster]) -> u64 {
    let per_cluster: usize = remaining
        .iter()
        .map(|c| min_shard_count(problem, loads, c).unwrap_or(1))
        .sum();
    per_cluster.max(deficient_stripes(problem, loads)) as u64
}

/// Number of stripes whose load is still below `L`.
pub fn deficient_stripes(problem: &Problem, loads: &[u64]) -> usize {
    let (min_load, _) = problem.bounds();
    loads.iter().filter(|&&l| l < min_load).count()
}

/// All clusters placed, every placement structurally sound, every load in `[L, H]`.
pub fn is_complete(problem: &Problem, assignment: &Assignment) -> bool {
    if !assignment.is_fully_placed() {
        return false;
    }
    let mut loads = vec![0u64; problem.stripe_count()];
    for (idx, placement) in assignment.placements() {
        let cluster = problem.cluster(idx);
        if !problem.shard_domain().contains(&placement.k)
            || placement.stripes.len() != placement.k
            || placement.shard_weight != cluster.shard_weight(placement.k)
        {
            return false;
        }
        for (i, s) in placement.stripes.iter().enumerate() {
            if s.0 >= loads.len() || placement.stripes[..i].contains(s) {
                return false;
            }
            loads[s.0] += placement.shard_weight;
        }
    }
    let (min_load, max_load) = problem.bounds();
    loads == assignment.loads() && loads.iter().all(|&l| l >= min_load && l <= max_load)
}

fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

fn min_spread_mass(problem: &Problem, cluster: &Cluster) -> u64 {
    problem
        .usable_shard_counts()
        .map(|k| k as u64 * cluster.shard_weight(k))
        .min()
        .unwrap_or(cluster.weight)
}

fn max_nonempty_shards(problem: &Problem, cluster: &Cluster) -> usize {
    problem
        .usable_shard_counts()
        .filter(|&k| cluster.shard_weight(k) > 0)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClusterId, ProblemConfig};

    fn problem(
        weights: &[u64],
        stripes: usize,
        max_shards: usize,
        min_load: u64,
        max_load: u64,
    ) -> Problem {
        Problem::new(
            weights.iter().enumerate().map(|(i, &w)| (ClusterId(i as u64), w)),
            ProblemConfig { stripes, max_shards, min_load, max_load },
        )
        .unwrap()
    }

    #[test]
    fn placement_validity() {
        let p = problem(&[10, 20], 3, 2, 0, 100);
        let mut a = Assignment::empty(&p);
        assert!(shard_placement_valid(&p, &a, 0, 2, &[StripeId(0), StripeId(2)]));
        assert!(!shard_placement_valid(&p, &a, 0, 2, &[StripeId(0), StripeId(0)]));
        assert!(!shard_placement_valid(&p, &a, 0, 2, &[StripeId(0)]));
        assert!(!shard_placement_valid(&p, &a, 0, 1, &[StripeId(3)]));
        assert!(!shard_placement_valid(&p, &a, 0, 3, &[StripeId(0), StripeId(1), StripeId(2)]));

        a.place(&p, 0, 1, &[StripeId(1)]);
        assert!(!shard_placement_valid(&p, &a, 0, 1, &[StripeId(1)]));
        assert!(shard_placement_valid(&p, &a, 1, 1, &[StripeId(1)]));
    }

    #[test]
    fn capacity_rejects_overfull_stripe() {
        let p = problem(&[10], 2, 1, 0, 5);
        assert!(!capacity_feasible(&p, &[6, 0], &[]));
        assert!(capacity_feasible(&p, &[5, 0], &[]));
    }

    #[test]
    fn capacity_rejects_unreachable_lower_bound() {
        // 1000 users cannot lift three stripes to 400 each.
        let p = problem(&[1000], 3, 4, 400, 600);
        assert!(!capacity_feasible(&p, &[0, 0, 0], p.clusters()));

        let p = problem(&[900], 2, 2, 400, 600);
        assert!(capacity_feasible(&p, &[0, 0], p.clusters()));
        assert!(!capacity_feasible(&p, &[450, 0], &[]));
    }

    #[test]
    fn capacity_rejects_unplaceable_cluster() {
        // Smallest shard of 50 (k = 2 on two stripes) is 25; only one stripe has room.
        let p = problem(&[50], 2, 2, 0, 30);
        assert!(!capacity_feasible(&p, &[20, 0], p.clusters()));
        assert!(capacity_feasible(&p, &[5, 0], p.clusters()));
    }

    #[test]
    fn capacity_counts_nonempty_shards() {
        // Enough mass for all three stripes, but at most two shards.
        let p = problem(&[5], 3, 2, 1, 10);
        assert!(!capacity_feasible(&p, &[0, 0, 0], p.clusters()));
        assert!(capacity_feasible(&p, &[1, 0, 0], p.clusters()));
    }

    #[test]
    fn minimum_shards_from_room() {
        let p = problem(&[900, 100, 1], 3, 3, 0, 500);
        let loads = [0, 0, 450];
        assert_eq!(min_shard_count(&p, &loads, p.cluster(0)), Some(2));
        assert_eq!(min_shard_count(&p, &loads, p.cluster(1)), Some(1));
        // 900 and 100 need 2 + 1, the weight-1 cluster one more.
        assert_eq!(min_remaining_shards(&p, &loads, p.clusters()), 4);

        let tight = problem(&[900], 2, 2, 0, 400);
        assert_eq!(min_shard_count(&tight, &[0, 0], tight.cluster(0)), None);

        // Three hungry stripes outweigh a single remaining cluster.
        let hungry = problem(&[90], 3, 3, 10, 100);
        assert_eq!(min_remaining_shards(&hungry, &[0, 0, 0], hungry.clusters()), 3);
    }

    #[test]
    fn huge_upper_bound_does_not_overflow() {
        let max_load = i64::MAX as u64;
        let p = problem(&[10], 3, 1, 0, max_load);
        assert!(capacity_feasible(&p, &[0, 0, 0], p.clusters()));
        assert!(capacity_feasible(&p, &[10, 0, 0], &[]));

        let p = problem(&[10], 3, 1, u64::MAX, u64::MAX);
        assert!(!capacity_feasible(&p, &[0, 0, 0], p.clusters()));
    }

    #[test]
    fn zero_weight_shards_still_occupy_stripes() {
        let p = problem(&[3], 4, 4, 0, 10);
        let mut a = Assignment::empty(&p);
        let all = [StripeId(0), StripeId(1), StripeId(2), StripeId(3)];
        assert!(shard_placement_valid(&p, &a, 0, 4, &all));
        a.place(&p, 0, 4, &all);
        assert_eq!(a.loads(), &[0, 0, 0, 0]);
        assert!(is_complete(&p, &a));
    }

    #[test]
    fn completeness() {
        let p = problem(&[10, 10], 2, 1, 5, 15);
        let mut a = Assignment::empty(&p);
        a.place(&p, 0, 1, &[StripeId(0)]);
        assert!(!is_complete(&p, &a));
        a.place(&p, 1, 1, &[StripeId(0)]);
        assert!(!is_complete(&p, &a));
        a.place(&p, 1, 1, &[StripeId(1)]);
        assert!(is_complete(&p, &a));
        assert_eq!(deficient_stripes(&p, a.loads()), 0);
    }
}
