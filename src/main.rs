// src/main.rs
use polls_backend::{config::Config, start_server, state::AppState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok(); // Load environment variables from .env file

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("polls_backend=info,tower_http=info")),
        )
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    info!("Initializing state...");
    let state = match AppState::from_config(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize storage: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = start_server(state).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
