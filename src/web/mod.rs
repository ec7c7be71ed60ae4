//! The single page and its form endpoints.

use std::num::NonZeroU16;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::studio::Studio;

mod images;
mod prelude;
mod views;

use images::download_handler;
use views::{generate_handler, reset_handler, root_handler, state_handler};

#[derive(Clone)]
pub(crate) struct AppState {
    studio: Studio,
}

impl AppState {
    fn new(studio: Studio) -> Self {
        Self { studio }
    }
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::get(root_handler))
        .route("/generate", axum::routing::post(generate_handler))
        .route("/reset", axum::routing::post(reset_handler))
        .route("/state", axum::routing::get(state_handler))
        .route("/images/{number}", axum::routing::get(download_handler))
        .route("/static/styles.css", axum::routing::get(styles_handler))
}

async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
    }
    info!("Shutting down");
}

/// Serves the studio until ctrl-c.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    studio: Studio,
) -> Result<(), anyhow::Error> {
    let app = create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(studio));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
    }
    Ok(())
}
