//! Immutable problem instance: clusters, stripes, shard-count domain and load bounds.
use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::SolveError;

/// Cluster identifier as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u64);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stripe identifier in `0..S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StripeId(pub usize);

impl fmt::Display for StripeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A weighted item to be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Unique identifier.
    pub id: ClusterId,
    /// Total user count.
    pub weight: u64,
}

impl Cluster {
    /// Weight carried by each of `k` shards of this cluster.
    pub fn shard_weight(&self, k: usize) -> u64 {
        shard_weight(self.weight, k)
    }
}

/// Weight of one shard when `weight` is split into `k` shards.
///
/// Truncating: the `weight % k` remainder belongs to no shard and never
/// reaches any stripe load.
pub fn shard_weight(weight: u64, k: usize) -> u64 {
    debug_assert!(k > 0);
    weight / k as u64
}

/// Scalar parameters of a placement problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemConfig {
    /// Number of stripes `S`.
    pub stripes: usize,
    /// Largest shard count `K_max` a cluster may be split into.
    pub max_shards: usize,
    /// Lower load bound `L` (inclusive).
    pub min_load: u64,
    /// Upper load bound `H` (inclusive).
    pub max_load: u64,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            stripes: 5,
            max_shards: 4,
            min_load: 400_000,
            max_load: 550_000,
        }
    }
}

/// Immutable placement problem.
///
/// Clusters are kept sorted by identifier; every index-based accessor in the
/// crate refers to that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    clusters: Vec<Cluster>,
    config: ProblemConfig,
}

impl Problem {
    /// Validate input and build a problem instance.
    pub fn new<I>(clusters: I, config: ProblemConfig) -> Result<Self, SolveError>
    where
        I: IntoIterator<Item = (ClusterId, u64)>,
    {
        if config.stripes == 0 {
            return Err(SolveError::InvalidConfiguration(
                "stripe count must be positive".into(),
            ));
        }
        if config.max_shards == 0 {
            return Err(SolveError::InvalidConfiguration(
                "maximum shard count must be positive".into(),
            ));
        }
        if config.min_load > config.max_load {
            return Err(SolveError::InvalidConfiguration(format!(
                "lower load bound {} exceeds upper bound {}",
                config.min_load, config.max_load
            )));
        }

        let mut seen = BTreeSet::new();
        let mut list = Vec::new();
        let mut total = 0u64;
        for (id, weight) in clusters {
            if weight == 0 {
                return Err(SolveError::InvalidConfiguration(format!(
                    "cluster {id} has non-positive weight"
                )));
            }
            if !seen.insert(id) {
                return Err(SolveError::InvalidConfiguration(format!(
                    "cluster {id} listed more than once"
                )));
            }
            // Stripe loads never exceed the total, so it must fit in a u64.
            total = total.checked_add(weight).ok_or_else(|| {
                SolveError::InvalidConfiguration("total cluster weight overflows u64".into())
            })?;
            list.push(Cluster { id, weight });
        }
        list.sort_by_key(|c| c.id);

        Ok(Self { clusters: list, config })
    }

    /// All clusters, ordered by identifier.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Cluster at position `idx` of [`Problem::clusters`].
    pub fn cluster(&self, idx: usize) -> &Cluster {
        &self.clusters[idx]
    }

    /// Scalar parameters this instance was built with.
    pub fn config(&self) -> &ProblemConfig {
        &self.config
    }

    /// Number of stripes `S`.
    pub fn stripe_count(&self) -> usize {
        self.config.stripes
    }

    /// Stripe identifiers `0..S`.
    pub fn stripes(&self) -> impl Iterator<Item = StripeId> {
        (0..self.config.stripes).map(StripeId)
    }

    /// The shard-count domain `{1, ..., K_max}`.
    pub fn shard_domain(&self) -> RangeInclusive<usize> {
        1..=self.config.max_shards
    }

    /// Shard counts that can satisfy the distinct-stripe rule: `{1, ..., min(K_max, S)}`.
    pub fn usable_shard_counts(&self) -> RangeInclusive<usize> {
        1..=self.config.max_shards.min(self.config.stripes)
    }

    /// Inclusive load bounds `(L, H)`.
    pub fn bounds(&self) -> (u64, u64) {
        (self.config.min_load, self.config.max_load)
    }

    /// Sum of the raw cluster weights; fits in a `u64` by construction.
    pub fn total_weight(&self) -> u64 {
        self.clusters.iter().map(|c| c.weight).sum()
    }
}
