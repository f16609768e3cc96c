//! CLI command definitions for the `regorch` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod config;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use regorch_types::workflow::WorkflowKind;

/// Orchestrate multi-step model registry workflows.
#[derive(Parser)]
#[command(name = "regorch", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to `<data dir>/config.toml`).
    #[arg(long, global = true, env = "REGORCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "8090")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Run one workflow from a JSON request file.
    Run {
        workflow: WorkflowArg,

        /// Request body (JSON).
        #[arg(short, long)]
        file: PathBuf,

        /// Skip the execution store (only honoured without an explicit key).
        #[arg(long)]
        no_idempotency: bool,
    },

    /// Print the idempotency key a request resolves to.
    Key {
        workflow: WorkflowArg,

        /// Request body (JSON).
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the effective configuration.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WorkflowArg {
    ModelWithVersion,
    DeployModelVersion,
}

impl From<WorkflowArg> for WorkflowKind {
    fn from(arg: WorkflowArg) -> Self {
        match arg {
            WorkflowArg::ModelWithVersion => WorkflowKind::CreateModelWithVersion,
            WorkflowArg::DeployModelVersion => WorkflowKind::DeployModelVersion,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_global_flags() {
        let cli = Cli::try_parse_from([
            "regorch",
            "run",
            "deploy-model-version",
            "--file",
            "req.json",
            "--no-idempotency",
            "--json",
            "-vv",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                workflow,
                file,
                no_idempotency,
            } => {
                assert_eq!(WorkflowKind::from(workflow), WorkflowKind::DeployModelVersion);
                assert_eq!(file, PathBuf::from("req.json"));
                assert!(no_idempotency);
            }
            _ => panic!("expected run"),
        }
    }
}
