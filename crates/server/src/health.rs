use axum::{Json, response::IntoResponse};

/// Reported on the health path. The proxy keeps no upstream state, so serving means healthy.
#[derive(Debug, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum HealthState {
    Healthy,
}

pub(crate) async fn health() -> impl IntoResponse {
    Json(HealthState::Healthy)
}
