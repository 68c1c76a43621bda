//! HTTP API for the visual layer and user triggers
//!
//! The front-end reads the face projection from here and delivers the two
//! user-facing triggers: the start-listening control and the cheek-touch
//! reaction targets.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::face::FaceHandle;
use crate::interaction::{Event, FaceView, Side};
use crate::{Error, Result};

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Current face projection for the visual layer
async fn get_face(State(face): State<FaceHandle>) -> Json<FaceView> {
    Json(face.view())
}

/// Start-listening trigger (the mic button)
async fn start_listening(State(face): State<FaceHandle>) -> StatusCode {
    face.send(Event::StartRequested);
    StatusCode::ACCEPTED
}

/// Cheek-touch reaction trigger
async fn react(State(face): State<FaceHandle>, Path(side): Path<String>) -> StatusCode {
    let side = match side.as_str() {
        "left" => Side::Left,
        "right" => Side::Right,
        _ => return StatusCode::NOT_FOUND,
    };

    face.send(Event::CheekTouched(side));
    StatusCode::ACCEPTED
}

/// Build the API router
#[must_use]
pub fn router(face: FaceHandle) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/face", get(get_face))
        .route("/api/listen", post(start_listening))
        .route("/api/react/{side}", post(react))
        .with_state(face)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve the API on the given port until the process exits
///
/// # Errors
///
/// Returns error if the listener cannot bind
pub async fn serve(face: FaceHandle, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| Error::Api(format!("could not bind port {port}: {e}")))?;

    tracing::info!(port, "api server listening");

    axum::serve(listener, router(face))
        .await
        .map_err(|e| Error::Api(e.to_string()))
}
