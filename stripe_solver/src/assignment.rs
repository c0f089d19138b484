//! Partial or complete assignment of clusters to stripes.
use serde::{Deserialize, Serialize};

use crate::model::{Problem, StripeId};

/// Chosen shard count and host stripes for one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Shard count `k`.
    pub k: usize,
    /// `floor(weight / k)`, shared by all `k` shards.
    pub shard_weight: u64,
    /// Stripes hosting one shard each.
    pub stripes: Vec<StripeId>,
}

/// Mutable search state: per-cluster placements plus derived stripe loads.
///
/// Cluster indices follow [`Problem::clusters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    placements: Vec<Option<Placement>>,
    loads: Vec<u64>,
}

impl Assignment {
    /// Assignment with nothing placed.
    pub fn empty(problem: &Problem) -> Self {
        Self {
            placements: vec![None; problem.clusters().len()],
            loads: vec![0; problem.stripe_count()],
        }
    }

    /// Placement chosen for `cluster`, if any.
    pub fn placement(&self, cluster: usize) -> Option<&Placement> {
        self.placements.get(cluster).and_then(Option::as_ref)
    }

    /// Placed clusters with their placements, by cluster index.
    pub fn placements(&self) -> impl Iterator<Item = (usize, &Placement)> {
        self.placements
            .iter()
            .enumerate()
            .filter_map(|(idx, p)| p.as_ref().map(|p| (idx, p)))
    }

    /// Current load of every stripe.
    pub fn loads(&self) -> &[u64] {
        &self.loads
    }

    /// Current load of `stripe`.
    pub fn load(&self, stripe: StripeId) -> u64 {
        self.loads[stripe.0]
    }

    /// Number of clusters with a placement.
    pub fn assigned_count(&self) -> usize {
        self.placements.iter().filter(|p| p.is_some()).count()
    }

    /// Whether every cluster has a placement.
    pub fn is_fully_placed(&self) -> bool {
        self.placements.iter().all(Option::is_some)
    }

    /// Whether `stripe` already hosts a shard of `cluster`.
    pub fn hosts(&self, cluster: usize, stripe: StripeId) -> bool {
        self.placement(cluster)
            .map_or(false, |p| p.stripes.contains(&stripe))
    }

    /// Put `k` shards of `cluster` on `stripes`, replacing any previous placement.
    ///
    /// Does not validate; see [`crate::constraint::shard_placement_valid`].
    pub fn place(&mut self, problem: &Problem, cluster: usize, k: usize, stripes: &[StripeId]) {
        self.unplace(cluster);
        let shard_weight = problem.cluster(cluster).shard_weight(k);
        for s in stripes {
            self.loads[s.0] += shard_weight;
        }
        self.placements[cluster] = Some(Placement {
            k,
            shard_weight,
            stripes: stripes.to_vec(),
        });
    }

    /// Remove the placement of `cluster` and roll back its load.
    pub fn unplace(&mut self, cluster: usize) -> Option<Placement> {
        let placement = self.placements[cluster].take()?;
        for s in &placement.stripes {
            self.loads[s.0] -= placement.shard_weight;
        }
        Some(placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClusterId, ProblemConfig};

    fn problem() -> Problem {
        Problem::new(
            vec![(ClusterId(1), 10), (ClusterId(2), 7)],
            ProblemConfig { stripes: 3, max_shards: 3, min_load: 0, max_load: 100 },
        )
        .unwrap()
    }

    #[test]
    fn place_and_rollback() {
        let p = problem();
        let mut a = Assignment::empty(&p);
        a.place(&p, 0, 3, &[StripeId(0), StripeId(1), StripeId(2)]);
        a.place(&p, 1, 1, &[StripeId(1)]);
        assert_eq!(a.loads(), &[3, 10, 3]);
        assert!(a.is_fully_placed());
        assert!(a.hosts(0, StripeId(2)));
        assert!(!a.hosts(1, StripeId(0)));

        let removed = a.unplace(0).unwrap();
        assert_eq!(removed.shard_weight, 3);
        assert_eq!(a.loads(), &[0, 7, 0]);
        assert_eq!(a.assigned_count(), 1);
        assert!(a.unplace(0).is_none());
    }

    #[test]
    fn replacing_a_placement_keeps_loads_consistent() {
        let p = problem();
        let mut a = Assignment::empty(&p);
        a.place(&p, 0, 1, &[StripeId(0)]);
        a.place(&p, 0, 2, &[StripeId(1), StripeId(2)]);
        assert_eq!(a.loads(), &[0, 5, 5]);
        assert_eq!(a.placements().count(), 1);
    }
}
