mod cli;

use axum::Router;
use backend::AppState;
use backend::config::BackendConfig;
use backend::providers::ProviderManager;
use clap::Parser;
use cli::{Cli, Command};
use std::net::SocketAddr;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = BackendConfig::from_env(cli.local_db_path)?;

    match cli.command.unwrap_or(Command::Serve { port: 8080 }) {
        Command::Serve { port } => {
            let state = AppState::from_config(&config).await?;
            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            tracing::info!("Listening on {}", addr);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            let router = backend::init(Router::new(), state);
            axum::serve(listener, router).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckProviders => Ok(check_providers(&config).await),
    }
}

async fn check_providers(config: &BackendConfig) -> ExitCode {
    let statuses = ProviderManager::from_config(config).status_all().await;
    let mut available = Vec::new();
    for (kind, status) in &statuses {
        if status.available {
            let latency = status
                .response_time_ms
                .map(|ms| format!(" ({}ms)", ms))
                .unwrap_or_default();
            println!("{:<12} available{}", kind, latency);
            available.push(kind.as_str());
        } else {
            println!(
                "{:<12} unavailable: {}",
                kind,
                status.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if available.is_empty() {
        eprintln!("No providers available. Set at least one API key.");
        return ExitCode::FAILURE;
    }
    println!("{} of {} providers available: {}", available.len(), statuses.len(), available.join(", "));
    ExitCode::SUCCESS
}
