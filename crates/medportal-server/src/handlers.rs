use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    let time = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    (StatusCode::OK, Json(json!({ "ok": true, "time": time })))
}
