//! Registry orchestrator CLI and REST API entry point.
//!
//! Binary name: `regorch`
//!
//! Parses CLI arguments, initializes tracing and the orchestrator, then
//! dispatches to the command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use regorch_infra::config::{load_effective_config, resolve_data_dir};
use regorch_observe::tracing_setup::{
    TracingOptions, filter_for_verbosity, init_tracing, shutdown_tracing,
};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        default_filter: filter_for_verbosity(cli.verbose, cli.quiet).to_string(),
        json: cli.log_json,
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = dispatch(cli).await;
    shutdown_tracing();
    result
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(shell, &mut cmd, "regorch", &mut std::io::stdout());
        }

        Commands::Config => {
            let data_dir = resolve_data_dir();
            let config = load_effective_config(cli.config.as_deref(), &data_dir).await?;
            cli::config::show_config(&config, &data_dir, cli.json)?;
        }

        Commands::Key { workflow, file } => {
            cli::run::print_key(workflow.into(), &file, cli.json).await?;
        }

        Commands::Run {
            workflow,
            file,
            no_idempotency,
        } => {
            let state = AppState::init(cli.config.as_deref()).await?;
            cli::run::run_workflow(&state, workflow.into(), &file, no_idempotency, cli.json).await?;
        }

        Commands::Serve { port, host } => {
            let state = AppState::init(cli.config.as_deref()).await?;
            let sweeper = state
                .config
                .idempotency
                .enabled
                .then(|| state.start_sweeper());

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!(
                    "  {} Registry orchestrator listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let shutdown = state.shutdown.clone();
            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            shutdown.cancel();
            if let Some(sweeper) = sweeper {
                let _ = sweeper.await;
            }

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
