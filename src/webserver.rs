use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};

async fn liveness_probe() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

async fn readiness_probe() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

async fn version() -> impl IntoResponse {
    env!("CARGO_PKG_VERSION")
}

pub fn create_app() -> Router {
    Router::new()
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/version", get(version))
}
