//! HTTP surface of the catalog server.
//!
//! Three small endpoints: upload confirmation (the only write, funneled
//! through the catalog writer lock), stats, and a plain-text export of
//! every known path string. Reads go straight to storage and never
//! contend with the writer.

pub mod response;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db;
use crate::error::{AppError, ServerResult};
use crate::ingest::CatalogService;

use response::ApiResponse;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub service: Arc<CatalogService>,
    pub upload_batch_limit: usize,
}

pub async fn serve(
    config: Config,
    db: PgPool,
    service: Arc<CatalogService>,
) -> anyhow::Result<()> {
    let state = AppState {
        db,
        service,
        upload_batch_limit: config.catalog.upload_batch_limit,
    };
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/stats", get(stats))
        .route("/api/export/paths", get(export_paths))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give ongoing requests time to complete
    tracing::info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(std::time::Duration::from_secs(timeout_secs.min(5))).await;
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Pathdex Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health(State(state): State<AppState>) -> ServerResult<impl IntoResponse> {
    db::health_check(&state.db).await?;
    Ok((StatusCode::OK, "OK"))
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    paths: Vec<String>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    received: usize,
    named: usize,
    promoted: usize,
    already_known: usize,
    unknown: usize,
    invalid: usize,
}

async fn upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> ServerResult<impl IntoResponse> {
    if request.paths.is_empty() {
        return Err(AppError::Validation("upload contains no paths".to_string()));
    }
    if request.paths.len() > state.upload_batch_limit {
        return Err(AppError::Validation(format!(
            "upload exceeds batch limit of {} paths",
            state.upload_batch_limit
        )));
    }

    let summary = state.service.process_upload(&request.paths).await?;
    Ok(ApiResponse::success(UploadResponse {
        received: summary.received,
        named: summary.named,
        promoted: summary.promoted,
        already_known: summary.already_known,
        unknown: summary.unknown,
        invalid: summary.invalid,
    }))
}

async fn stats(State(state): State<AppState>) -> ServerResult<impl IntoResponse> {
    let stats = db::query_stats(&state.db).await?;
    Ok(ApiResponse::success(stats))
}

async fn export_paths(State(state): State<AppState>) -> ServerResult<impl IntoResponse> {
    let paths = db::export_paths(&state.db).await?;
    let mut body = paths.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    ))
}
