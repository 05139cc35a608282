use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use assessment_engine::{
    ability::AbilityAggregator,
    config::{Config, LogFormat},
    problems::standard_catalog,
    relay,
    server::{AppState, RpcServer},
    session::SessionRuntime,
    storage::SqliteAnswerStore,
    submission::{RecordStoreClient, ResultSubmitter, RetryPolicy},
    time::Clock,
};

/// Timed cognitive assessment engine.
#[derive(Parser, Debug)]
#[command(name = "assessment-engine", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Drive assessment sessions over JSON-RPC on stdin/stdout (default).
    Serve,
    /// Run the HTTP save-data relay.
    Relay,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Assessment engine starting..."
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Relay => {
            if let Err(e) = relay::serve(&config).await {
                error!(error = %e, "Relay error");
                return Err(e.into());
            }
            info!("Relay shutdown complete");
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let store = match SqliteAnswerStore::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Answer store initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize answer store");
            return Err(e.into());
        }
    };

    let client = match RecordStoreClient::new(&config.record_store, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.record_store.base_url, "Record store client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize record store client");
            return Err(e.into());
        }
    };

    let submitter = ResultSubmitter::new(Arc::new(client), RetryPolicy::from_config(&config.request))
        .with_aggregator(AbilityAggregator::new().with_jitter_seed(config.ability.jitter_seed));

    let (runtime, handle, notifications) =
        SessionRuntime::new(standard_catalog(), Arc::new(store), submitter, Clock::System);
    let runtime_task = runtime.spawn();

    let server = RpcServer::new(Arc::new(AppState::new(handle)));
    info!("Host ready, waiting for requests on stdin...");

    if let Err(e) = server.run_stdio(notifications).await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    // the runtime exits once the last handle (held by the server) is gone
    drop(server);
    if let Err(e) = runtime_task.await {
        error!(error = %e, "Session runtime panicked");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
