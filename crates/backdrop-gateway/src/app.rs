use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::{routing::get, Router};
use backdrop_core::{ArtifactSlot, BackdropConfig};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{info, warn};

/// URL prefix under which the images directory is served.
pub const IMAGES_ROUTE: &str = "/static/images";

/// Shared state for the polling front end. Read-only.
pub struct AppState {
    pub slot: ArtifactSlot,
    /// Public URL of the artifact, e.g. `/static/images/background.jpg`.
    pub public_path: String,
}

impl AppState {
    pub fn new(config: &BackdropConfig) -> Self {
        Self {
            slot: ArtifactSlot::from_config(&config.paths),
            public_path: format!("{}/{}", IMAGES_ROUTE, config.paths.artifact_name),
        }
    }
}

pub fn build_router(state: Arc<AppState>, config: &BackdropConfig) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/check-image", get(crate::http::image::check_image))
        .route("/reset-sessions", get(crate::http::image::reset_sessions))
        .nest_service(IMAGES_ROUTE, ServeDir::new(&config.paths.images_dir))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Bind the first configured port that is free.
pub async fn bind_first_free(bind: &str, ports: &[u16]) -> Result<TcpListener> {
    for &port in ports {
        match TcpListener::bind((bind, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                warn!(port, "port in use, trying next");
            }
            Err(e) => return Err(e).with_context(|| format!("failed to bind {bind}:{port}")),
        }
    }
    bail!("all configured ports are in use: {ports:?}")
}

pub async fn serve(config: &BackdropConfig) -> Result<ExitCode> {
    std::fs::create_dir_all(&config.paths.images_dir).with_context(|| {
        format!(
            "failed to create images dir {}",
            config.paths.images_dir.display()
        )
    })?;

    let state = Arc::new(AppState::new(config));
    let router = build_router(state, config);

    let listener = bind_first_free(&config.server.bind, &config.server.ports).await?;
    info!(addr = %listener.local_addr()?, "polling front end listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("front end shutting down");
        })
        .await?;
    Ok(ExitCode::SUCCESS)
}
