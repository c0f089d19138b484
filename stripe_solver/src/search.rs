//! Branch-and-bound search for a minimum-cost feasible assignment.
//!
//! Clusters are placed one at a time, heaviest first. For each cluster every
//! usable shard count is tried in ascending order, and for each count every
//! subset of stripes with room, least loaded first. Stripes with equal load
//! are interchangeable for the rest of the search, so subsets differing only
//! by such a swap are generated once.
//!
//! A branch is abandoned when the placement is structurally invalid, when the
//! capacity check proves the bounds unreachable, or when its cost lower bound
//! cannot beat the incumbent.
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assignment::Assignment;
use crate::constraint::{
    capacity_feasible, is_complete, min_remaining_shards, shard_placement_valid,
};
use crate::error::SolveError;
use crate::model::{Cluster, Problem, StripeId};
use crate::objective;

/// Cooperative cancellation flag, cloneable across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every search holding this token to unwind.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`CancelToken::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Knobs for a single search run.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Wall-clock budget; `None` searches to exhaustion.
    pub time_limit: Option<Duration>,
    /// Worker threads; `0` and `1` both mean single-threaded.
    pub workers: usize,
    /// Caller-side cancellation.
    pub cancel: CancelToken,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            time_limit: Some(Duration::from_secs(60)),
            workers: 1,
            cancel: CancelToken::new(),
        }
    }
}

/// Why a search stopped before exhausting the space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCause {
    /// The time budget elapsed.
    TimeLimit,
    /// The caller cancelled.
    Cancelled,
}

impl StopCause {
    fn code(self) -> u8 {
        match self {
            StopCause::TimeLimit => 1,
            StopCause::Cancelled => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(StopCause::TimeLimit),
            2 => Some(StopCause::Cancelled),
            _ => None,
        }
    }
}

/// Quality guarantee attached to a found solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// The whole space was explored; no cheaper assignment exists.
    Optimal,
    /// Best found before the search was cut off; possibly suboptimal.
    Bounded(StopCause),
}

/// A feasible complete assignment and its cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// The assignment itself.
    pub assignment: Assignment,
    /// Objective value, see [`crate::objective`].
    pub cost: u64,
}

/// Terminal state of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A feasible assignment was found.
    Solved {
        /// Best assignment found.
        solution: Solution,
        /// Whether it is proven optimal.
        status: SolveStatus,
    },
    /// The space was exhausted without a feasible assignment.
    Infeasible,
    /// The search was cut off before any feasible assignment was found.
    Interrupted(StopCause),
}

/// Counters collected while searching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Search tree nodes entered.
    pub nodes: u64,
    /// Candidate placements rejected as structurally invalid.
    pub structural_prunes: u64,
    /// Candidate placements rejected by the capacity check.
    pub capacity_prunes: u64,
    /// Nodes abandoned because they could not beat the incumbent.
    pub bound_prunes: u64,
    /// Times a worker's incumbent improved.
    pub incumbent_updates: u64,
    /// Wall-clock time spent.
    pub elapsed: Duration,
}

impl SearchStats {
    fn merge(&mut self, other: &SearchStats) {
        self.nodes += other.nodes;
        self.structural_prunes += other.structural_prunes;
        self.capacity_prunes += other.capacity_prunes;
        self.bound_prunes += other.bound_prunes;
        self.incumbent_updates += other.incumbent_updates;
    }
}

/// Outcome plus statistics of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Terminal state.
    pub outcome: Outcome,
    /// Counters.
    pub stats: SearchStats,
}

impl SearchResult {
    /// The solution, or the error the caller should see when there is none.
    pub fn into_solution(self) -> Result<(Solution, SolveStatus), SolveError> {
        match self.outcome {
            Outcome::Solved { solution, status } => Ok((solution, status)),
            Outcome::Infeasible => Err(SolveError::Infeasible),
            Outcome::Interrupted(StopCause::TimeLimit) => Err(SolveError::TimeBudgetExceeded),
            Outcome::Interrupted(StopCause::Cancelled) => Err(SolveError::SearchCancelled),
        }
    }
}

/// Lifecycle of a [`Search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// Created, not yet run.
    Unstarted,
    /// Terminal; the result never changes.
    Finished,
}

/// One search over one problem.
///
/// Runs at most once: later calls to [`Search::run`] return the stored result.
#[derive(Debug)]
pub struct Search<'p> {
    problem: &'p Problem,
    options: SearchOptions,
    result: Option<SearchResult>,
}

impl<'p> Search<'p> {
    /// Prepare a search; nothing is explored until [`Search::run`].
    pub fn new(problem: &'p Problem, options: SearchOptions) -> Self {
        Self {
            problem,
            options,
            result: None,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SearchPhase {
        match self.result {
            Some(_) => SearchPhase::Finished,
            None => SearchPhase::Unstarted,
        }
    }

    /// Terminal result, once [`Search::run`] has returned.
    pub fn result(&self) -> Option<&SearchResult> {
        self.result.as_ref()
    }

    /// Explore the space and return the terminal result.
    pub fn run(&mut self) -> &SearchResult {
        let (problem, options) = (self.problem, &self.options);
        self.result.get_or_insert_with(|| execute(problem, options))
    }
}

/// Run a fresh search and return its result.
pub fn solve(problem: &Problem, options: &SearchOptions) -> SearchResult {
    execute(problem, options)
}

/// State shared by every worker of a run.
struct Context<'a> {
    problem: &'a Problem,
    /// Cluster indices in search order.
    order: Vec<usize>,
    /// Clusters in search order, so remaining clusters form a suffix.
    ordered: Vec<Cluster>,
    deadline: Option<Instant>,
    cancel: CancelToken,
    best_cost: AtomicU64,
    stop: AtomicU8,
}

impl<'a> Context<'a> {
    fn new(problem: &'a Problem, options: &SearchOptions, started: Instant) -> Self {
        let mut order: Vec<usize> = (0..problem.clusters().len()).collect();
        order.sort_by(|&a, &b| {
            let (ca, cb) = (problem.cluster(a), problem.cluster(b));
            cb.weight.cmp(&ca.weight).then(ca.id.cmp(&cb.id))
        });
        let ordered = order.iter().map(|&i| *problem.cluster(i)).collect();
        Self {
            problem,
            order,
            ordered,
            deadline: options.time_limit.and_then(|d| started.checked_add(d)),
            cancel: options.cancel.clone(),
            best_cost: AtomicU64::new(u64::MAX),
            stop: AtomicU8::new(0),
        }
    }

    fn stop_cause(&self) -> Option<StopCause> {
        StopCause::from_code(self.stop.load(Ordering::Acquire))
    }

    fn halt(&self, cause: StopCause) {
        let _ = self
            .stop
            .compare_exchange(0, cause.code(), Ordering::AcqRel, Ordering::Acquire);
    }

    /// Polls cancellation and the deadline; sticky once tripped.
    fn should_stop(&self) -> bool {
        if self.stop_cause().is_some() {
            return true;
        }
        if self.cancel.is_cancelled() {
            self.halt(StopCause::Cancelled);
            return true;
        }
        if self.deadline.map_or(false, |d| Instant::now() >= d) {
            self.halt(StopCause::TimeLimit);
            return true;
        }
        false
    }

    /// Every `(k, stripes)` worth trying for `cluster` from the given loads.
    fn candidates(&self, cluster: usize, loads: &[u64]) -> Vec<(usize, Vec<StripeId>)> {
        let (_, max_load) = self.problem.bounds();
        let mut by_load: Vec<usize> = (0..loads.len()).collect();
        by_load.sort_by_key(|&s| (loads[s], s));

        let mut out = Vec::new();
        for k in self.problem.usable_shard_counts() {
            let w = self.problem.cluster(cluster).shard_weight(k);
            let pool: Vec<usize> = by_load
                .iter()
                .copied()
                .filter(|&s| loads[s].checked_add(w).map_or(false, |l| l <= max_load))
                .collect();
            let mut picked = Vec::with_capacity(k);
            let mut subsets = Vec::new();
            distinct_subsets(&pool, loads, k, 0, &mut picked, &mut subsets);
            out.extend(subsets.into_iter().map(|s| (k, s)));
        }
        out
    }
}

/// Subsets of size `k` from `pool` (sorted by load), one per load multiset.
fn distinct_subsets(
    pool: &[usize],
    loads: &[u64],
    k: usize,
    start: usize,
    picked: &mut Vec<StripeId>,
    out: &mut Vec<Vec<StripeId>>,
) {
    if picked.len() == k {
        out.push(picked.clone());
        return;
    }
    for i in start..pool.len() {
        if pool.len() - i < k - picked.len() {
            break;
        }
        if i > start && loads[pool[i]] == loads[pool[i - 1]] {
            continue;
        }
        picked.push(StripeId(pool[i]));
        distinct_subsets(pool, loads, k, i + 1, picked, out);
        picked.pop();
    }
}

/// A placement decision fixed before handing a subtree to a worker.
#[derive(Debug, Clone)]
struct Step {
    cluster: usize,
    k: usize,
    stripes: Vec<StripeId>,
}

fn apply(problem: &Problem, prefix: &[Step]) -> Assignment {
    let mut assignment = Assignment::empty(problem);
    for step in prefix {
        assignment.place(problem, step.cluster, step.k, &step.stripes);
    }
    assignment
}

struct Worker<'c, 'a> {
    ctx: &'c Context<'a>,
    assignment: Assignment,
    best: Option<Solution>,
    stats: SearchStats,
}

impl<'c, 'a> Worker<'c, 'a> {
    fn new(ctx: &'c Context<'a>, prefix: &[Step]) -> Self {
        Self {
            ctx,
            assignment: apply(ctx.problem, prefix),
            best: None,
            stats: SearchStats::default(),
        }
    }

    fn descend(&mut self, depth: usize) {
        self.stats.nodes += 1;
        if self.ctx.should_stop() {
            return;
        }
        if depth == self.ctx.order.len() {
            self.record();
            return;
        }

        let ctx = self.ctx;
        let problem = ctx.problem;
        let remaining = &ctx.ordered[depth..];
        let extra = min_remaining_shards(problem, self.assignment.loads(), remaining);
        let bound = objective::lower_bound(&self.assignment, extra);
        if bound >= ctx.best_cost.load(Ordering::Acquire) {
            self.stats.bound_prunes += 1;
            return;
        }

        let cluster = ctx.order[depth];
        for (k, stripes) in ctx.candidates(cluster, self.assignment.loads()) {
            if !shard_placement_valid(problem, &self.assignment, cluster, k, &stripes) {
                self.stats.structural_prunes += 1;
                continue;
            }
            self.assignment.place(problem, cluster, k, &stripes);
            if capacity_feasible(problem, self.assignment.loads(), &remaining[1..]) {
                self.descend(depth + 1);
            } else {
                self.stats.capacity_prunes += 1;
            }
            self.assignment.unplace(cluster);
            if ctx.stop_cause().is_some() {
                return;
            }
        }
    }

    fn record(&mut self) {
        if !is_complete(self.ctx.problem, &self.assignment) {
            return;
        }
        let cost = objective::cost(&self.assignment);
        if !objective::improves(cost, self.best.as_ref().map(|s| s.cost)) {
            return;
        }
        let previous = self.ctx.best_cost.fetch_min(cost, Ordering::AcqRel);
        if cost >= previous {
            return;
        }
        debug!(cost, "incumbent improved");
        self.stats.incumbent_updates += 1;
        self.best = Some(Solution {
            assignment: self.assignment.clone(),
            cost,
        });
    }
}

/// Expand the tree breadth-first from the root until there are enough
/// independent subtrees to keep `workers` threads busy.
///
/// Stops early, keeping the last complete level, once the run is cut off.
fn frontier(
    ctx: &Context<'_>,
    workers: usize,
    stats: &mut SearchStats,
) -> (Vec<Vec<Step>>, usize) {
    let target = workers * 4;
    let mut level = 0;
    let mut prefixes: Vec<Vec<Step>> = vec![Vec::new()];
    while workers > 1 && prefixes.len() < target && level < ctx.order.len() {
        if ctx.should_stop() {
            break;
        }
        let cluster = ctx.order[level];
        let remaining = &ctx.ordered[level + 1..];
        let mut next = Vec::new();
        for prefix in &prefixes {
            let mut scratch = apply(ctx.problem, prefix);
            for (k, stripes) in ctx.candidates(cluster, scratch.loads()) {
                stats.nodes += 1;
                if !shard_placement_valid(ctx.problem, &scratch, cluster, k, &stripes) {
                    stats.structural_prunes += 1;
                    continue;
                }
                scratch.place(ctx.problem, cluster, k, &stripes);
                if capacity_feasible(ctx.problem, scratch.loads(), remaining) {
                    let mut extended = prefix.clone();
                    extended.push(Step { cluster, k, stripes });
                    next.push(extended);
                } else {
                    stats.capacity_prunes += 1;
                }
                scratch.unplace(cluster);
            }
        }
        prefixes = next;
        level += 1;
    }
    (prefixes, level)
}

fn explore(ctx: &Context<'_>, prefix: &[Step], depth: usize) -> (Option<Solution>, SearchStats) {
    let mut worker = Worker::new(ctx, prefix);
    worker.descend(depth);
    (worker.best, worker.stats)
}

fn execute(problem: &Problem, options: &SearchOptions) -> SearchResult {
    let started = Instant::now();
    let ctx = Context::new(problem, options, started);
    let workers = options.workers.max(1);
    info!(
        clusters = problem.clusters().len(),
        stripes = problem.stripe_count(),
        max_shards = problem.config().max_shards,
        workers,
        "starting stripe search"
    );

    let mut stats = SearchStats::default();
    let empty = Assignment::empty(problem);
    let root_ok = capacity_feasible(problem, empty.loads(), &ctx.ordered);
    let results: Vec<(Option<Solution>, SearchStats)> = if !root_ok {
        stats.capacity_prunes += 1;
        Vec::new()
    } else {
        let (prefixes, depth) = frontier(&ctx, workers, &mut stats);
        if workers == 1 || prefixes.len() <= 1 {
            prefixes.iter().map(|p| explore(&ctx, p, depth)).collect()
        } else {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("stripe-search-{i}"))
                .build()
            {
                Ok(pool) => pool.install(|| {
                    prefixes
                        .par_iter()
                        .map(|p| explore(&ctx, p, depth))
                        .collect::<Vec<_>>()
                }),
                Err(e) => {
                    warn!(error = %e, "worker pool unavailable, searching on the calling thread");
                    prefixes.iter().map(|p| explore(&ctx, p, depth)).collect()
                }
            }
        }
    };
    conclude(&ctx, results, stats, started)
}

/// Merge per-subtree results into the terminal outcome of the run.
fn conclude(
    ctx: &Context<'_>,
    results: Vec<(Option<Solution>, SearchStats)>,
    mut stats: SearchStats,
    started: Instant,
) -> SearchResult {
    // Cheapest wins; among equals the earliest subtree.
    let mut best: Option<Solution> = None;
    for (found, worker_stats) in results {
        stats.merge(&worker_stats);
        if let Some(found) = found {
            if objective::improves(found.cost, best.as_ref().map(|s| s.cost)) {
                best = Some(found);
            }
        }
    }
    stats.elapsed = started.elapsed();

    let outcome = match (best, ctx.stop_cause()) {
        (Some(solution), None) => Outcome::Solved {
            solution,
            status: SolveStatus::Optimal,
        },
        (Some(solution), Some(cause)) => Outcome::Solved {
            solution,
            status: SolveStatus::Bounded(cause),
        },
        (None, None) => Outcome::Infeasible,
        (None, Some(cause)) => Outcome::Interrupted(cause),
    };
    match &outcome {
        Outcome::Solved { solution, status } => info!(
            cost = solution.cost,
            status = ?status,
            nodes = stats.nodes,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "stripe search finished"
        ),
        Outcome::Infeasible => info!(nodes = stats.nodes, "stripe search exhausted: infeasible"),
        Outcome::Interrupted(cause) => warn!(
            cause = ?cause,
            nodes = stats.nodes,
            "stripe search stopped before finding a layout"
        ),
    }
    SearchResult { outcome, stats }
}
