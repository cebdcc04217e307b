use std::path::PathBuf;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use color_probe_common::color::Color;
use color_probe_common::config::{Config, SourceConfig};
use color_probe_sampler::source::{ImageSequenceSource, PatternSource};
use color_probe_sampler::{
    spawn_controller, CaptureController, CaptureError, CaptureHandle, CaptureSettings,
    FrameSource,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TargetBody {
    hex: String,
}

// ---------------------------------------------------------------------------
// Source selection
// ---------------------------------------------------------------------------

fn build_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>, String> {
    match config.mode.as_str() {
        "pattern" => {
            let colors = config
                .pattern_colors
                .iter()
                .map(|hex| hex.parse::<Color>().map_err(|e| e.to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Box::new(
                PatternSource::new(colors).with_size(config.width, config.height),
            ))
        }
        "images" => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| "source.path is required in 'images' mode".to_string())?;
            Ok(Box::new(ImageSequenceSource::new(path)))
        }
        other => Err(format!(
            "unknown source mode {other:?}, expected 'pattern' or 'images'"
        )),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn status_for(err: &CaptureError) -> StatusCode {
    match err {
        CaptureError::SourceUnavailable(_) | CaptureError::FrameUnavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CaptureError::InvalidTransition { .. } => StatusCode::CONFLICT,
        CaptureError::ControllerClosed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Current state on success, otherwise the error next to the (unchanged) state.
fn command_response(result: Result<(), CaptureError>, capture: &CaptureHandle) -> Response {
    match result {
        Ok(()) => Json(capture.snapshot()).into_response(),
        Err(e) => {
            let status = status_for(&e);
            warn!(error = %e, status = status.as_u16(), "capture command rejected");
            let body = json!({ "error": e.to_string(), "state": capture.snapshot() });
            (status, Json(body)).into_response()
        }
    }
}

/// GET /state
async fn get_state(State(capture): State<CaptureHandle>) -> impl IntoResponse {
    Json(capture.snapshot())
}

/// POST /start
async fn start(State(capture): State<CaptureHandle>) -> Response {
    let result = capture.start().await;
    command_response(result, &capture)
}

/// POST /pause
async fn pause(State(capture): State<CaptureHandle>) -> Response {
    let result = capture.pause().await;
    command_response(result, &capture)
}

/// POST /resume
async fn resume(State(capture): State<CaptureHandle>) -> Response {
    let result = capture.resume().await;
    command_response(result, &capture)
}

/// POST /stop
async fn stop(State(capture): State<CaptureHandle>) -> Response {
    let result = capture.stop().await;
    command_response(result, &capture)
}

/// PUT /target — body: { "hex": "#rrggbb" }
async fn put_target(
    State(capture): State<CaptureHandle>,
    Json(body): Json<TargetBody>,
) -> Response {
    let target = match body.hex.parse::<Color>() {
        Ok(c) => c,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
                .into_response();
        }
    };
    let result = capture.set_target(target).await;
    command_response(result, &capture)
}

async fn health() -> &'static str {
    "ok"
}

fn router(capture: CaptureHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(get_state))
        .route("/start", post(start))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/stop", post(stop))
        .route("/target", put(put_target))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(capture)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let settings = match CaptureSettings::from_config(&config.capture) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "invalid capture.target");
            std::process::exit(1);
        }
    };
    let source = match build_source(&config.source) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "invalid source config");
            std::process::exit(1);
        }
    };

    info!(
        source = config.source.mode,
        tick_interval_ms = config.capture.tick_interval_ms,
        target = config.capture.target,
        "starting color-probe"
    );

    let (controller, ticks) = CaptureController::new(source, settings);
    let (capture, controller_task) = spawn_controller(controller, ticks);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Failed to bind to {}: {e}", config.server.bind);
            std::process::exit(1);
        });
    info!(addr = config.server.bind, "color-probe API server starting");

    if let Err(e) = axum::serve(listener, router(capture.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
    }

    // Release the camera before exiting, whatever state it was left in.
    if let Err(e) = capture.stop().await {
        info!(reason = %e, "nothing to stop on shutdown");
    }
    drop(capture);
    if let Err(e) = controller_task.await {
        error!(error = %e, "controller task panicked");
    }
}
