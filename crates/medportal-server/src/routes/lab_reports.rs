use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use medportal_api::ApiError;
use medportal_auth::{Action, BearerAuth, ResourceKind};
use serde_json::json;

use super::gated_form;
use crate::form::RequestForm;
use crate::server::AppState;

/// Lab report routes under `/api/reports`.
///
/// Static segments (`upload`, `all-reports`, `user`) take precedence over
/// the `{id}` capture.
pub fn lab_report_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_report))
        .route("/all-reports", get(all_reports))
        .route("/user", get(user_reports))
        .route(
            "/{id}",
            get(get_report).put(update_report).delete(delete_report),
        )
        .route("/{id}/comment", post(comment_report))
}

/// Multipart upload with the file in the `report` field.
async fn upload_report(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    form: Result<RequestForm, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let form = gated_form(ResourceKind::LabReport, Action::Create, &caller, form)?;
    let report = state.lab_reports.upload(&caller, &form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Lab report uploaded successfully",
            "labReport": report,
        })),
    ))
}

async fn all_reports(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lab_reports.list_all(&caller).await?))
}

async fn user_reports(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lab_reports.list_own(&caller).await?))
}

async fn get_report(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lab_reports.get(&caller, &id).await?))
}

async fn comment_report(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    Path(id): Path<String>,
    form: Result<RequestForm, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let form = gated_form(ResourceKind::LabReport, Action::Comment, &caller, form)?;
    Ok(Json(state.lab_reports.comment(&caller, &id, &form).await?))
}

/// Accepts JSON or multipart. A successful update fires the notification hook.
async fn update_report(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    Path(id): Path<String>,
    form: Result<RequestForm, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let form = gated_form(ResourceKind::LabReport, Action::Update, &caller, form)?;
    let report = state.lab_reports.update(&caller, &id, &form).await?;
    Ok(Json(json!({
        "message": "Lab report updated successfully",
        "updatedReport": report,
    })))
}

async fn delete_report(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.lab_reports.delete(&caller, &id).await?;
    Ok(Json(json!({ "message": "Lab report deleted successfully" })))
}
