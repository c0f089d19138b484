use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use directories::BaseDirs;
use stripe_solver::{solve, PlanFile, Report, SearchOptions};
use tracing::{info, Level};

mod render;

/// Stripe planner command-line tool.
#[derive(Parser)]
#[command(
    name = "stripectl",
    author,
    version,
    about = "Place sharded clusters onto stripes",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    opts: Options,
}

#[derive(Args, Clone)]
struct Options {
    /// Plan file with the cluster table (default: $HOME/.stripeplan.yaml).
    #[arg(short = 'p', long = "plan", global = true)]
    plan: Option<PathBuf>,

    /// Number of stripes.
    #[arg(long, global = true)]
    stripes: Option<i64>,

    /// Largest shard count per cluster.
    #[arg(long = "max-shards", global = true)]
    max_shards: Option<i64>,

    /// Lower bound on every stripe's load.
    #[arg(long = "min-load", global = true)]
    min_load: Option<i64>,

    /// Upper bound on every stripe's load.
    #[arg(long = "max-load", global = true)]
    max_load: Option<i64>,

    /// Search budget in seconds, 0 for unlimited.
    #[arg(long = "time-limit", global = true)]
    time_limit: Option<u64>,

    /// Search threads.
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Write JSON logs to rolling files in this directory instead of stderr.
    #[arg(long = "log-dir", global = true)]
    log_dir: Option<PathBuf>,

    /// Log level when RUST_LOG is unset.
    #[arg(long = "log-level", default_value = "warn", global = true)]
    log_level: Level,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for the cheapest layout and print it (default).
    Solve {
        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Validate the plan and print its parameters without searching.
    Check,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    stripe_log::init(cli.opts.log_dir.as_deref(), cli.opts.log_level)?;

    let plan = load_plan(&cli.opts)?;
    match cli.command.unwrap_or(Commands::Solve { format: Format::Text }) {
        Commands::Solve { format } => run_solve(&plan, format),
        Commands::Check => run_check(&plan),
    }
}

/// Read the plan file and apply command-line overrides.
fn load_plan(opts: &Options) -> anyhow::Result<PlanFile> {
    let path = opts
        .plan
        .clone()
        .or_else(|| BaseDirs::new().map(|b| b.home_dir().join(".stripeplan.yaml")));
    let Some(path) = path else {
        bail!("no plan file given and no home directory to look in");
    };
    let mut plan = PlanFile::load(&path)?;
    info!(path = %path.display(), clusters = plan.clusters.len(), "loaded plan");

    plan.stripes = opts.stripes.or(plan.stripes);
    plan.max_shards = opts.max_shards.or(plan.max_shards);
    plan.min_load = opts.min_load.or(plan.min_load);
    plan.max_load = opts.max_load.or(plan.max_load);
    plan.time_limit_secs = opts.time_limit.or(plan.time_limit_secs);
    plan.workers = opts.workers.or(plan.workers);
    Ok(plan)
}

fn run_solve(plan: &PlanFile, format: Format) -> anyhow::Result<()> {
    let problem = plan.problem().context("invalid plan")?;
    let options: SearchOptions = plan.search_options();
    let result = solve(&problem, &options);
    info!(
        nodes = result.stats.nodes,
        capacity_prunes = result.stats.capacity_prunes,
        bound_prunes = result.stats.bound_prunes,
        "search statistics"
    );

    match Report::from_result(&problem, &result) {
        Ok(report) => match format {
            Format::Text => print!("{}", render::render_text(&report)),
            Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        },
        Err(err) if err.is_infeasible() => match format {
            Format::Text => println!("{}", render::render_failure(&err)),
            Format::Json => println!(
                "{}",
                serde_json::json!({ "error": render::render_failure(&err) })
            ),
        },
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

fn run_check(plan: &PlanFile) -> anyhow::Result<()> {
    let problem = plan.problem().context("invalid plan")?;
    let options = plan.search_options();
    let (min_load, max_load) = problem.bounds();
    println!(
        "{} clusters, {} users",
        problem.clusters().len(),
        render::thousands(problem.total_weight())
    );
    println!(
        "{} stripes, k in 1..={}, load in [{}, {}]",
        problem.stripe_count(),
        problem.config().max_shards,
        render::thousands(min_load),
        render::thousands(max_load)
    );
    let budget = options
        .time_limit
        .map_or_else(|| "unlimited".to_string(), |d: Duration| format!("{}s", d.as_secs()));
    println!("time limit {}, {} worker(s)", budget, options.workers.max(1));
    Ok(())
}
