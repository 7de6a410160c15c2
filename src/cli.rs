// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::default_manifest_path;
use crate::source::Selector;
use crate::types::parse_duration;

/// Command-line arguments for `kubedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubedag",
    version,
    about = "Create interdependent resources in dependency order, in parallel.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the manifest file (TOML).
    ///
    /// Default: `Kubedag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value_os_t = default_manifest_path())]
    pub manifest: PathBuf,

    /// Only schedule resources whose labels match this selector,
    /// e.g. `app=web,tier!=cache`.
    #[arg(long, value_name = "SELECTOR", value_parser = parse_selector)]
    pub selector: Option<Selector>,

    /// Build the graph, print it and its creation waves (or cycles), but
    /// don't create anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Cancel the run after this long (e.g. `30s`, `5m`). Overrides the
    /// manifest.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Maximum number of creations in flight at once. Overrides the manifest.
    #[arg(long, value_name = "N", value_parser = parse_max_in_flight)]
    pub max_in_flight: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `KUBEDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_selector(s: &str) -> Result<Selector, String> {
    s.parse()
}

fn parse_max_in_flight(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["kubedag"]).unwrap();
        assert_eq!(args.manifest, default_manifest_path());
        assert_eq!(args.manifest, PathBuf::from("Kubedag.toml"));
        assert!(args.selector.is_none());
        assert!(!args.dry_run);
        assert!(args.timeout.is_none());
        assert!(args.max_in_flight.is_none());
    }

    #[test]
    fn parses_all_flags() {
        let args = CliArgs::try_parse_from([
            "kubedag",
            "--manifest",
            "deploy/Kubedag.toml",
            "--selector",
            "app=web",
            "--dry-run",
            "--timeout",
            "90s",
            "--max-in-flight",
            "2",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.manifest, PathBuf::from("deploy/Kubedag.toml"));
        assert!(args.selector.is_some());
        assert!(args.dry_run);
        assert_eq!(args.timeout, Some(Duration::from_secs(90)));
        assert_eq!(args.max_in_flight, Some(2));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }

    #[test]
    fn rejects_zero_max_in_flight() {
        assert!(CliArgs::try_parse_from(["kubedag", "--max-in-flight", "0"]).is_err());
    }

    #[test]
    fn rejects_bad_timeout() {
        assert!(CliArgs::try_parse_from(["kubedag", "--timeout", "soon"]).is_err());
    }
}
