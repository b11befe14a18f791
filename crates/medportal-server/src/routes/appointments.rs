use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use medportal_api::ApiError;
use medportal_auth::{Action, BearerAuth, ResourceKind};
use serde_json::json;

use super::gated_form;
use crate::form::RequestForm;
use crate::server::AppState;

/// Appointment routes under `/appointment`.
pub fn appointment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-appointment", post(create_appointment))
        .route("/get-doctor-appointments", get(doctor_appointments))
        .route("/get-patient-appointments", get(patient_appointments))
        .route("/get-all-appointments", get(all_appointments))
        .route("/appointment-update/{id}", put(complete_appointment))
        .route("/delete-appointment/{id}", delete(delete_appointment))
}

async fn create_appointment(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    form: Result<RequestForm, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let form = gated_form(ResourceKind::Appointment, Action::Create, &caller, form)?;
    let appointment = state.appointments.create(&caller, &form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Appointment created successfully",
            "appointment": appointment,
        })),
    ))
}

/// Today's pending appointments assigned to the calling doctor.
async fn doctor_appointments(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
) -> Result<impl IntoResponse, ApiError> {
    let appointments = state.appointments.list_for_doctor(&caller).await?;
    Ok(Json(json!({
        "message": "Today's pending appointments retrieved successfully.",
        "appointments": appointments,
    })))
}

async fn patient_appointments(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
) -> Result<impl IntoResponse, ApiError> {
    let appointments = state.appointments.list_own(&caller).await?;
    Ok(Json(json!({
        "message": "Appointments retrieved successfully",
        "appointments": appointments,
    })))
}

async fn all_appointments(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
) -> Result<impl IntoResponse, ApiError> {
    let appointments = state.appointments.list_all(&caller).await?;
    Ok(Json(json!({
        "message": "All appointments retrieved successfully",
        "appointments": appointments,
    })))
}

/// Marks the appointment completed. There is no way back to pending.
async fn complete_appointment(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let appointment = state.appointments.complete(&caller, &id).await?;
    Ok(Json(json!({
        "status": "Appointment status updated to completed",
        "appointment": appointment,
    })))
}

async fn delete_appointment(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.appointments.delete(&caller, &id).await?;
    Ok(Json(json!({ "message": "Appointment deleted successfully" })))
}
