//! Tracing setup: a daily log file next to the settings, plus stderr.
//!
//! `RUST_LOG` always wins over the built-in filter. Setting
//! `RELAYBOT_LOG_JSON=1` writes the file as JSON lines with the current
//! span attached, for shipping to a log collector.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "relaybot.log";

/// Where and how to log.
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub dir: PathBuf,
    pub verbose: bool,
    pub json: bool,
}

impl LogOptions {
    /// Log under `~/.relaybot/logs`, reading the JSON switch from the environment.
    pub fn from_env(verbose: bool) -> Result<Self> {
        Ok(Self {
            dir: log_dir()?,
            verbose,
            json: parse_flag(std::env::var("RELAYBOT_LOG_JSON").ok().as_deref()),
        })
    }
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug,relaybot=trace"
    } else {
        "info,relaybot=debug"
    }
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes")
    )
}

/// Install the global subscriber. Keep the guard alive until exit so the file writer flushes.
pub fn init(options: &LogOptions) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&options.dir)?;

    let appender = tracing_appender::rolling::daily(&options.dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(options.verbose)));

    let json_file = options.json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(writer.clone())
    });
    let text_file = (!options.json).then(|| {
        fmt::layer()
            .with_writer(writer.clone())
            .with_ansi(false)
            .with_thread_ids(true)
            .with_line_number(true)
    });
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(options.verbose)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(json_file)
        .with(text_file)
        .with(console)
        .try_init()?;

    tracing::info!(dir = %options.dir.display(), json = options.json, "logging initialized");
    Ok(guard)
}

/// `~/.relaybot/logs`.
pub fn log_dir() -> Result<PathBuf> {
    Ok(crate::config::get_home_dir()?.join("logs"))
}

/// Console-only logging for tests. Safe to call repeatedly.
#[cfg(test)]
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for verbose in [false, true] {
            assert!(EnvFilter::try_new(default_directive(verbose)).is_ok());
        }
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some(" TRUE ")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(Some("")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_log_dir_sits_under_home() {
        let dir = log_dir().unwrap();
        assert!(dir.ends_with(".relaybot/logs"));
    }
}
