//! CLI command definitions for the `buildrelay` binary.
//!
//! Uses clap derive macros for argument parsing. Command handlers live in
//! the sibling modules.

pub mod check;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Relay app build requests to CI and report their status.
#[derive(Parser)]
#[command(name = "buildrelay", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to $BUILDRELAY_CONFIG or ./buildrelay.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log directives for the chosen verbosity; `RUST_LOG` overrides.
    pub fn log_directives(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn,buildrelay=info",
            1 => "info,buildrelay=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (overrides config and $PORT).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config).
        #[arg(long)]
        host: Option<String>,
    },

    /// Derive a build's status straight from CI, bypassing the registry.
    Status {
        /// Correlation token returned by `POST /api/build`.
        token: String,
    },

    /// Validate configuration and print the effective settings.
    Check,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_maps_to_directives() {
        let quiet = Cli::parse_from(["buildrelay", "-q", "check"]);
        assert_eq!(quiet.log_directives(), "error");

        let verbose = Cli::parse_from(["buildrelay", "-v", "check"]);
        assert_eq!(verbose.log_directives(), "info,buildrelay=debug");

        let trace = Cli::parse_from(["buildrelay", "-vv", "check"]);
        assert_eq!(trace.log_directives(), "trace");
    }

    #[test]
    fn test_serve_flags_are_optional() {
        let cli = Cli::parse_from(["buildrelay", "serve", "--port", "8080"]);
        match cli.command {
            Commands::Serve { port, host } => {
                assert_eq!(port, Some(8080));
                assert!(host.is_none());
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["buildrelay", "status", "abc", "--json", "--config", "relay.toml"]);
        assert!(cli.json);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("relay.toml")));
        assert!(matches!(cli.command, Commands::Status { ref token } if token == "abc"));
    }
}
