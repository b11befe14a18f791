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

/// Blog routes under `/blog`. Reading is public, writing is owner-only.
pub fn blog_routes() -> Router<AppState> {
    Router::new()
        .route("/create-blog", post(create_blog))
        .route("/get-blogs", get(list_blogs))
        .route("/get-blog/{id}", get(get_blog))
        .route("/update-blog/{id}", put(update_blog))
        .route("/get-doctor-blogs", get(own_blogs))
        .route("/delete-blog/{id}", delete(delete_blog))
        .route("/blog-count", get(blog_count))
}

async fn create_blog(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    form: Result<RequestForm, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let form = gated_form(ResourceKind::Blog, Action::Create, &caller, form)?;
    let blog = state.blogs.create(&caller, &form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Blog created successfully", "blog": blog })),
    ))
}

async fn list_blogs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.blogs.list_all().await?))
}

async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.blogs.get(&id).await?))
}

async fn update_blog(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    Path(id): Path<String>,
    form: Result<RequestForm, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let form = gated_form(ResourceKind::Blog, Action::Update, &caller, form)?;
    let blog = state.blogs.update(&caller, &id, &form).await?;
    Ok(Json(json!({ "message": "Blog updated successfully", "blog": blog })))
}

async fn own_blogs(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.blogs.list_own(&caller).await?))
}

async fn delete_blog(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.blogs.delete(&caller, &id).await?;
    Ok(Json(json!({ "message": "Blog deleted successfully" })))
}

async fn blog_count(
    State(state): State<AppState>,
    BearerAuth(caller): BearerAuth,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.blogs.count_own(&caller).await?;
    Ok(Json(json!({ "count": count })))
}
