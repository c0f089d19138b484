//! Plan files: the cluster table plus optional solver parameters.
//!
//! ```yaml
//! stripes: 5
//! max_shards: 4
//! min_load: 400000
//! max_load: 550000
//! time_limit_secs: 60
//! clusters:
//!   25: 68639
//!   40: 885865
//! ```
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::SolveError;
use crate::model::{ClusterId, Problem, ProblemConfig};
use crate::search::SearchOptions;

/// Parsed plan file. Missing parameters fall back to the defaults.
///
/// Numbers are read signed so that non-positive values surface as
/// [`SolveError::InvalidConfiguration`] instead of parse errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFile {
    /// Cluster identifier to user count.
    pub clusters: BTreeMap<u64, i64>,
    /// Stripe count `S`.
    #[serde(default)]
    pub stripes: Option<i64>,
    /// Largest shard count `K_max`.
    #[serde(default)]
    pub max_shards: Option<i64>,
    /// Lower load bound `L`.
    #[serde(default)]
    pub min_load: Option<i64>,
    /// Upper load bound `H`.
    #[serde(default)]
    pub max_load: Option<i64>,
    /// Search budget in seconds; `0` means unlimited.
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
    /// Search threads.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl PlanFile {
    /// Read a plan from disk; `.json` files are parsed as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading plan file {}", path.display()))?;
        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        let plan = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("parsing JSON plan {}", path.display()))?
        } else {
            Self::from_yaml_str(&content)
                .with_context(|| format!("parsing YAML plan {}", path.display()))?
        };
        Ok(plan)
    }

    /// Parse a YAML plan.
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Scalar parameters with defaults applied.
    pub fn problem_config(&self) -> Result<ProblemConfig, SolveError> {
        let defaults = ProblemConfig::default();
        Ok(ProblemConfig {
            stripes: positive("stripe count", self.stripes, defaults.stripes as i64)? as usize,
            max_shards: positive(
                "maximum shard count",
                self.max_shards,
                defaults.max_shards as i64,
            )? as usize,
            min_load: non_negative("lower load bound", self.min_load, defaults.min_load as i64)?,
            max_load: non_negative("upper load bound", self.max_load, defaults.max_load as i64)?,
        })
    }

    /// Validated problem instance.
    pub fn problem(&self) -> Result<Problem, SolveError> {
        let config = self.problem_config()?;
        let mut clusters = Vec::with_capacity(self.clusters.len());
        for (&id, &weight) in &self.clusters {
            if weight <= 0 {
                return Err(SolveError::InvalidConfiguration(format!(
                    "cluster {id} has non-positive weight {weight}"
                )));
            }
            clusters.push((ClusterId(id), weight as u64));
        }
        Problem::new(clusters, config)
    }

    /// Search options with defaults applied.
    pub fn search_options(&self) -> SearchOptions {
        let defaults = SearchOptions::default();
        SearchOptions {
            time_limit: match self.time_limit_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.time_limit,
            },
            workers: self.workers.unwrap_or(defaults.workers),
            cancel: defaults.cancel,
        }
    }
}

fn positive(what: &str, value: Option<i64>, default: i64) -> Result<i64, SolveError> {
    match value.unwrap_or(default) {
        v if v > 0 => Ok(v),
        v => Err(SolveError::InvalidConfiguration(format!("{what} must be positive, got {v}"))),
    }
}

fn non_negative(what: &str, value: Option<i64>, default: i64) -> Result<u64, SolveError> {
    match value.unwrap_or(default) {
        v if v >= 0 => Ok(v as u64),
        v => Err(SolveError::InvalidConfiguration(format!("{what} must not be negative, got {v}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const WEB: &str = "
stripes: 5
time_limit_secs: 0
clusters:
  25: 68639
  40: 885865
";

    #[test]
    fn yaml_plan_with_defaults() {
        let plan = PlanFile::from_yaml_str(WEB).unwrap();
        let problem = plan.problem().unwrap();
        assert_eq!(problem.clusters().len(), 2);
        assert_eq!(problem.cluster(1).weight, 885_865);
        assert_eq!(*problem.config(), ProblemConfig::default());
        let options = plan.search_options();
        assert_eq!(options.time_limit, None);
        assert_eq!(options.workers, 1);
    }

    #[test]
    fn non_positive_values_rejected() {
        let mut plan = PlanFile::from_yaml_str(WEB).unwrap();
        plan.stripes = Some(0);
        assert!(matches!(plan.problem(), Err(SolveError::InvalidConfiguration(_))));

        let mut plan = PlanFile::from_yaml_str(WEB).unwrap();
        plan.max_shards = Some(-1);
        assert!(matches!(plan.problem(), Err(SolveError::InvalidConfiguration(_))));

        let mut plan = PlanFile::from_yaml_str(WEB).unwrap();
        plan.clusters.insert(7, -5);
        assert!(matches!(plan.problem(), Err(SolveError::InvalidConfiguration(_))));

        let mut plan = PlanFile::from_yaml_str(WEB).unwrap();
        plan.min_load = Some(10);
        plan.max_load = Some(5);
        assert!(matches!(plan.problem(), Err(SolveError::InvalidConfiguration(_))));
    }

    #[test]
    fn loads_json_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            concat!(
                r#"{{"clusters": {{"1": 10, "2": 10}}, "stripes": 2, "max_shards": 1, "#,
                r#""min_load": 0, "max_load": 100, "time_limit_secs": 5}}"#,
            )
        )
        .unwrap();
        let plan = PlanFile::load(file.path()).unwrap();
        assert_eq!(plan.clusters.len(), 2);
        assert_eq!(plan.search_options().time_limit, Some(Duration::from_secs(5)));
        assert_eq!(plan.problem().unwrap().stripe_count(), 2);
    }

    #[test]
    fn bundled_web_sample_solves() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../samples/web.yaml");
        let plan = PlanFile::load(path).unwrap();
        let problem = plan.problem().unwrap();
        assert_eq!(problem.clusters().len(), 9);
        let report = crate::plan(&problem, &plan.search_options()).unwrap();
        assert!(report.is_optimal());
        assert_eq!(report.cost, 121);
        assert_eq!(report.stripes.len(), 5);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = PlanFile::load("/nonexistent/plan.yaml").unwrap_err();
        assert!(err.to_string().contains("reading plan file"));
    }
}
