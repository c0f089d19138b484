//! Logging setup shared by the stripe planner binaries.
use std::path::Path;

use anyhow::Result;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file name prefix inside the log directory.
pub const LOG_FILE: &str = "stripeplan.log";

/// Build the filter: `RUST_LOG` when set, otherwise `level`.
pub fn filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()))
}

/// Initialize logging.
/// With `dir`, structured JSON goes to hourly rolling files there;
/// otherwise human-readable lines go to stderr.
pub fn init(dir: Option<&Path>, level: Level) -> Result<()> {
    let registry = tracing_subscriber::registry().with(filter(level));
    match dir {
        Some(dir) => {
            let file_appender = RollingFileAppender::new(Rotation::HOURLY, dir, LOG_FILE);
            let fmt_layer = fmt::layer()
                .with_writer(file_appender)
                .json()
                .with_current_span(false)
                .with_span_list(false);
            registry.with(fmt_layer).try_init()?;
        }
        None => {
            let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
            registry.with(fmt_layer).try_init()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        init(Some(dir.path()), Level::DEBUG).unwrap();
        tracing::info!(nodes = 3, "written to file");
        assert!(init(None, Level::INFO).is_err());

        let logs: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(LOG_FILE))
            .collect();
        assert_eq!(logs.len(), 1);
    }
}
