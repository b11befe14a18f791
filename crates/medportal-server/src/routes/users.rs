use axum::{
    Json, Router,
    extract::State,
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

/// User routes, mounted under both `/user` and `/api/users`.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/save-user", post(save_user))
        .route("/get-user-data", get(get_user_data))
        .route("/all-users", get(all_users))
}

/// Creates or updates the caller's User document.
async fn save_user(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    form: Result<RequestForm, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let form = gated_form(ResourceKind::User, Action::Update, &caller, form)?;
    let user = state.users.save(&caller, &form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User saved successfully", "user": user })),
    ))
}

async fn get_user_data(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.users.profile(&caller).await?;
    Ok(Json(profile))
}

async fn all_users(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.users.list_all(&caller).await?;
    Ok(Json(json!({ "users": users })))
}
