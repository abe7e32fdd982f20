// src/lib.rs
use std::{net::SocketAddr, time::Duration};

use axum::{http::Method, Router};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

pub mod auth;
pub mod chart;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod forms;
pub mod handlers;
pub mod models;
pub mod poll;
pub mod query;
pub mod routes;
pub mod state;
pub mod stats;
pub mod store;

use state::AppState;

/// The full application with its middleware.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(60 * 60));

    routes::create_routes(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn start_server(state: AppState) -> std::io::Result<()> {
    let address = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let app = app(state);

    let handle = axum_server::Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    info!("Server running on {address}");
    axum_server::bind(address)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal(handle: axum_server::Handle) {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
