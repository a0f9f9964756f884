// Main entry point for the spot-the-difference service

use spotdiff::{
    core::{
        errors::{ArchiveError, ImageRole, PipelineError},
        types::{AppState, ProcessResponse, ZipRequest},
        Config, Settings,
    },
    orchestration::DiffOrchestrator,
    utils::{upload_bytes, zip_from_request, Metrics, ARCHIVE_NAME},
};

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

fn pipeline_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::InvalidImage { .. }
        | PipelineError::EmptyImage { .. }
        | PipelineError::InvalidSettings(_)
        | PipelineError::InvalidDataUrl { .. } => StatusCode::BAD_REQUEST,
        PipelineError::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        PipelineError::EncodingFailed(_) | PipelineError::TaskJoinFailed(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "spotdiff={},tower_http=warn",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== SPOT THE DIFFERENCE GENERATOR ===");
    info!(
        "Config: upload limit={} MiB, jobs={}",
        config.max_upload_bytes() / (1024 * 1024),
        config.max_concurrent_jobs()
    );

    // Initialize metrics
    let metrics = Metrics::new();

    let orchestrator = Arc::new(DiffOrchestrator::new(config.clone(), metrics.clone()));
    let state = AppState {
        config: config.clone(),
        orchestrator,
        metrics,
    };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/process", post(process_images))
        .route("/download-zip", post(download_zip))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()))
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /              - Root endpoint");
    info!("  GET  /health        - Health check");
    info!("  GET  /metrics       - Prometheus metrics");
    info!("  GET  /stats         - Detailed statistics");
    info!("  POST /process       - Compare two images (multipart/form-data)");
    info!("  POST /download-zip  - Bundle results into {}", ARCHIVE_NAME);
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Spot the Difference Generator"
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.metrics.record_endpoint_request("/health");
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "max_upload_bytes": state.config.max_upload_bytes(),
        "max_concurrent_jobs": state.orchestrator.max_concurrent_jobs(),
        "available_slots": state.orchestrator.available_slots(),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = state.metrics.snapshot();
    serde_json::to_value(snapshot).map(Json).map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize metrics: {}", e),
        )
    })
}

/// Compare two images
///
/// # Request Format:
/// - multipart/form-data
/// - Fields "original" and "modified": image files, or `data:` URL text
/// - Field "settings" (optional): JSON with camelCase keys
///
/// # Response:
/// - `ProcessResponse` JSON with both images as JPEG data URLs
async fn process_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    state.metrics.record_endpoint_request("/process");
    info!("Received process request");

    let mut original = None;
    let mut modified = None;
    let mut settings = Settings::default();

    // Parse multipart form
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(e.status(), format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "original" | "modified" => {
                let role = if name == "original" {
                    ImageRole::Original
                } else {
                    ImageRole::Modified
                };
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| api_error(e.status(), format!("Read error: {}", e)))?;
                let bytes = upload_bytes(data.to_vec(), role)
                    .map_err(|e| api_error(pipeline_status(&e), e.to_string()))?;

                match role {
                    ImageRole::Original => original = Some(bytes),
                    ImageRole::Modified => modified = Some(bytes),
                }
            }
            "settings" => {
                let json = field
                    .text()
                    .await
                    .map_err(|e| api_error(e.status(), format!("Settings read error: {}", e)))?;
                settings = Settings::from_json(&json).map_err(|e| {
                    let e = PipelineError::from(e);
                    api_error(pipeline_status(&e), e.to_string())
                })?;
            }
            other => warn!("Ignoring unknown form field '{}'", other),
        }
    }

    let (Some(original), Some(modified)) = (original, modified) else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Both 'original' and 'modified' images are required",
        ));
    };

    let response = state
        .orchestrator
        .process(original, modified, settings)
        .await
        .map_err(|e| api_error(pipeline_status(&e), e.to_string()))?;

    Ok(Json(response))
}

/// Bundle the images returned by `/process` into `results.zip`
async fn download_zip(
    State(state): State<AppState>,
    Json(request): Json<ZipRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.metrics.record_endpoint_request("/download-zip");

    let archive = tokio::task::spawn_blocking(move || zip_from_request(&request))
        .await
        .map_err(|e| {
            error!("Archive task failed: {:?}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Archive task failed")
        })?
        .map_err(|e| match e {
            ArchiveError::InvalidDataUrl { .. } => api_error(StatusCode::BAD_REQUEST, e.to_string()),
            other => {
                error!("Archive creation failed: {:?}", other);
                api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        })?;

    state.metrics.record_archive_built();
    info!("Built {} ({} bytes)", ARCHIVE_NAME, archive.len());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", ARCHIVE_NAME),
            ),
        ],
        archive,
    ))
}
