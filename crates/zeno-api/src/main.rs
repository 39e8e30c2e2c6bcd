//! Zeno CLI and REST API entry point.
//!
//! Binary name: `zeno`
//!
//! Parses CLI arguments, loads configuration, initializes tracing, database
//! and services, then dispatches to the command handler or starts the
//! streaming relay server.

mod cli;
mod http;
mod state;

use clap::Parser;

use cli::{Cli, Commands, PolicyAction};
use state::AppState;
use zeno_infra::config::{apply_env_overrides, read_server_config};
use zeno_infra::policy_watch::{apply_policy_file, watch_policy_file};
use zeno_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use zeno_types::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = read_server_config(&cli.config).await;
    let log_json = loaded.as_ref().map(|c| c.log_json).unwrap_or(false);

    if let Err(e) = init_tracing(TracingOptions {
        json: log_json,
        otel: cli.otel,
        default_level: Some(cli.log_level().to_string()),
    }) {
        eprintln!("failed to initialize tracing: {e}");
    }

    let mut config = loaded.unwrap_or_else(|err| {
        tracing::warn!("{err}; using default configuration");
        ServerConfig::default()
    });
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    let result = run(cli, config).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli, mut config: ServerConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await?;
        }

        Commands::Policy { action } => {
            let state = AppState::init(config).await?;
            match action {
                PolicyAction::Show => cli::policy::show_policy(&state, cli.json).await?,
                PolicyAction::Apply { file } => {
                    cli::policy::apply_policy(&state, &file, cli.json).await?;
                }
            }
        }

        Commands::Stats => {
            let state = AppState::init(config).await?;
            cli::stats::show_stats(&state, cli.json).await?;
        }
    }

    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let policy_file = config.policy_file.clone();

    let state = AppState::init(config).await?;
    let _pruning = state.spawn_limiter_pruning();

    let _watcher = match policy_file {
        Some(path) => {
            if let Err(err) = apply_policy_file(&path, &state.policy_service).await {
                tracing::warn!(path = %path.display(), "policy file not applied: {err}");
            }
            match watch_policy_file(&path, std::sync::Arc::clone(&state.policy_service)) {
                Ok(watcher) => {
                    tracing::info!(path = %watcher.path().display(), "watching routing policy file");
                    Some(watcher)
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), "policy hot reload disabled: {err}");
                    None
                }
            }
        }
        None => None,
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} ZenoAi relay listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());
    tracing::info!(%addr, "server started");

    let router = http::router::build_router(state);
    http::router::serve(listener, router, shutdown_signal()).await?;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
///
/// A signal handler that cannot be installed never fires; the other one
/// still can.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
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
    tracing::info!("shutdown signal received");
}
