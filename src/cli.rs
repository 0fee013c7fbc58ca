// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `jobkit`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobkit",
    version,
    about = "Discover and inspect job modules.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the host config file (TOML).
    ///
    /// Defaults to `Jobkit.toml` in the current working directory; a missing
    /// file means default settings.
    #[arg(long, value_name = "PATH", default_value = "Jobkit.toml", global = true)]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBKIT_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Discover modules in the configured directory and list their jobs.
    List {
        /// Print descriptors as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the manifest embedded in a single module binary.
    Inspect {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
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

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands_with_global_flags() {
        let args = CliArgs::try_parse_from(["jobkit", "list", "--json", "--log-level", "debug"]).unwrap();
        assert!(matches!(args.command, Command::List { json: true }));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert_eq!(args.config, PathBuf::from("Jobkit.toml"));

        let args = CliArgs::try_parse_from(["jobkit", "--config", "/etc/jobkit.toml", "inspect", "libx.so"]).unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/jobkit.toml"));
        assert!(matches!(args.command, Command::Inspect { path } if path == PathBuf::from("libx.so")));
    }
}
