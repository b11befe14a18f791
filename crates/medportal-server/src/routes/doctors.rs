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

/// Doctor routes under `/doctor`. Listing and lookup are public.
pub fn doctor_routes() -> Router<AppState> {
    Router::new()
        .route("/create-doctor", post(create_doctor))
        .route("/all-doctors", get(all_doctors))
        .route("/doctor-details/{name}", get(doctor_details))
}

async fn create_doctor(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    form: Result<RequestForm, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let form = gated_form(ResourceKind::Doctor, Action::Create, &caller, form)?;
    let doctor = state.doctors.create(&caller, &form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Doctor created successfully", "doctor": doctor })),
    ))
}

async fn all_doctors(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.doctors.list_all().await?))
}

/// Case-insensitive substring match on the doctor's name.
async fn doctor_details(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.doctors.find_by_name(&name).await?))
}
