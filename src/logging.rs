//! Logging setup for the binary.
//!
//! The TUI owns the terminal, so it logs to a file in the platform data
//! directory. Subcommands log to stderr. `MONGOMATE_LOG` takes an `EnvFilter`
//! directive and wins over `-v`.

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Mutex,
};

use color_eyre::eyre::{Result, WrapErr, eyre};
use directories::ProjectDirs;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "MONGOMATE_LOG";
const LOG_FILE: &str = "mongomate.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Default directive for a `-v` count: warnings only, then info, debug, trace.
pub fn verbosity_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "mongomate=info,warn",
        2 => "mongomate=debug,info",
        _ => "mongomate=trace,debug",
    }
}

fn build_env_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(verbosity_directive(verbose)))
}

/// `<data dir>/mongomate.log`, creating the directory if needed.
pub fn default_log_file() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "mongomate")
        .ok_or_else(|| eyre!("could not determine a data directory for logs"))?;
    let dir = dirs.data_dir();
    fs::create_dir_all(dir)
        .wrap_err_with(|| format!("creating log directory {}", dir.display()))?;
    Ok(dir.join(LOG_FILE))
}

pub fn init(verbose: u8, target: &LogTarget) -> Result<()> {
    let filter = build_env_filter(verbose);
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());
    match target {
        LogTarget::Stderr => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time();
            registry.with(layer).try_init()?;
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("opening log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false);
            registry.with(layer).try_init()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_crate_level() {
        assert_eq!(verbosity_directive(0), "warn");
        assert_eq!(verbosity_directive(1), "mongomate=info,warn");
        assert_eq!(verbosity_directive(9), "mongomate=trace,debug");
    }

    #[test]
    fn directives_parse() {
        for verbose in 0..4 {
            assert!(EnvFilter::try_new(verbosity_directive(verbose)).is_ok());
        }
    }
}
