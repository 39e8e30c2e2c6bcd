//! CLI command definitions for the `zeno` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod policy;
pub mod stats;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use zeno_infra::config::DEFAULT_CONFIG_FILE;

/// Fallback-routing LLM relay server.
#[derive(Parser)]
#[command(name = "zeno", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, env = "ZENO_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Filter applied when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "info,zeno=debug,zeno_core=debug,zeno_infra=debug,zeno_api=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Port to listen on (overrides config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config).
        #[arg(long)]
        host: Option<String>,
    },

    /// Inspect or replace the routing policy.
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Show request statistics for the last hour.
    Stats,
}

#[derive(Subcommand)]
pub enum PolicyAction {
    /// Print the stored routing policy as JSON.
    Show,

    /// Validate and store a routing policy from a JSON file.
    Apply {
        /// Path to the policy JSON document.
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from(["zeno", "serve", "--port", "9000", "--host", "127.0.0.1"])
            .unwrap();
        match cli.command {
            Commands::Serve { port, host } => {
                assert_eq!(port, Some(9000));
                assert_eq!(host.as_deref(), Some("127.0.0.1"));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn parses_policy_apply_with_global_flags() {
        let cli = Cli::try_parse_from(["zeno", "policy", "apply", "p.json", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.log_level(), "trace");
        assert!(matches!(
            cli.command,
            Commands::Policy { action: PolicyAction::Apply { ref file } } if file == &PathBuf::from("p.json")
        ));
    }
}
