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

/// Medical record routes under `/record`.
pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/add-record", post(add_record))
        .route("/getAllRecords", get(all_records))
        .route("/get-records/{user_id}", get(patient_records))
        .route("/user-records", get(own_records))
}

async fn add_record(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    form: Result<RequestForm, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let form = gated_form(ResourceKind::Record, Action::Create, &caller, form)?;
    let record = state.records.create(&caller, &form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Record created successfully", "record": record })),
    ))
}

async fn all_records(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
) -> Result<impl IntoResponse, ApiError> {
    let records = state.records.list_all(&caller).await?;
    Ok(Json(json!({ "reports": records })))
}

async fn patient_records(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let records = state.records.list_for_patient(&caller, &user_id).await?;
    Ok(Json(json!({ "records": records })))
}

async fn own_records(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
) -> Result<impl IntoResponse, ApiError> {
    let records = state.records.list_own(&caller).await?;
    Ok(Json(json!({
        "message": "Records retrieved successfully",
        "records": records,
    })))
}
