//! Human-readable rendering of solver reports.
use stripe_solver::{Report, SolveError, SolveStatus, StopCause};

/// `1234567` -> `1,234,567`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// One `FS<n>: <load> users <- cluster<id>/k=<k>, ...` line per stripe, then a summary.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    for stripe in &report.stripes {
        let shards: Vec<String> = stripe
            .shards
            .iter()
            .map(|e| format!("cluster{}/k={}", e.cluster, e.k))
            .collect();
        out.push_str(&format!(
            "FS{}: {} users <- {}\n",
            stripe.stripe.0 + 1,
            thousands(stripe.load),
            shards.join(", ")
        ));
    }
    let status = match report.status {
        SolveStatus::Optimal => "optimal",
        SolveStatus::Bounded(StopCause::TimeLimit) => "best found before time limit",
        SolveStatus::Bounded(StopCause::Cancelled) => "best found before cancellation",
    };
    out.push_str(&format!(
        "cost={} ({}), placed {} users, {} lost to rounding\n",
        report.cost,
        status,
        thousands(report.total_load),
        thousands(report.truncated)
    ));
    out
}

/// Message for a search that produced no layout.
pub fn render_failure(err: &SolveError) -> String {
    match err {
        SolveError::Infeasible => "No feasible layout with those bounds and K values".to_string(),
        SolveError::TimeBudgetExceeded => {
            "No feasible layout found within the time limit".to_string()
        }
        SolveError::SearchCancelled => "Search cancelled before a layout was found".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stripe_solver::{plan, ClusterId, Problem, ProblemConfig, SearchOptions};

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1_000), "1,000");
        assert_eq!(thousands(450_000), "450,000");
        assert_eq!(thousands(1_229_618), "1,229,618");
    }

    #[test]
    fn renders_one_line_per_stripe() {
        let problem = Problem::new(
            vec![(ClusterId(40), 900_001)],
            ProblemConfig { stripes: 2, max_shards: 2, min_load: 400_000, max_load: 550_000 },
        )
        .unwrap();
        let report = plan(&problem, &SearchOptions::default()).unwrap();
        let text = render_text(&report);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "FS1: 450,000 users <- cluster40/k=2");
        assert_eq!(lines[1], "FS2: 450,000 users <- cluster40/k=2");
        assert_eq!(lines[2], "cost=22 (optimal), placed 900,000 users, 1 lost to rounding");
    }

    #[test]
    fn failure_messages() {
        assert_eq!(
            render_failure(&SolveError::Infeasible),
            "No feasible layout with those bounds and K values"
        );
        assert!(render_failure(&SolveError::InvalidConfiguration("bad".into())).contains("bad"));
    }
}
