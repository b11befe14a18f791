use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use medportal_auth::{AuthError, DenyReason};
use medportal_storage::StorageError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

// -------------------------
// Validation issues
// -------------------------

/// One violated input constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Where the value came from: `body`, `params`, `query` or `file`.
    pub location: String,
    /// Field name.
    pub path: String,
    pub msg: String,
}

impl ValidationIssue {
    pub fn new(
        location: impl Into<String>,
        path: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            path: path.into(),
            msg: msg.into(),
        }
    }

    pub fn body(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new("body", path, msg)
    }
}

// -------------------------
// API error
// -------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed: {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Too many requests: {message}")]
    TooManyRequests { message: String, retry_after: u64 },
    #[error("Partial failure: {0}")]
    PartialFailure(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        Self::Validation(issues)
    }
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::PayloadTooLarge(msg.into())
    }
    pub fn too_many_requests(msg: impl Into<String>, retry_after: u64) -> Self {
        Self::TooManyRequests {
            message: msg.into(),
            retry_after,
        }
    }
    pub fn partial_failure(msg: impl Into<String>) -> Self {
        Self::PartialFailure(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns `Ok(())` for an empty issue list, `Validation` otherwise.
    pub fn check(issues: Vec<ValidationIssue>) -> Result<(), Self> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Self::Validation(issues))
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PartialFailure(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The JSON body sent to the client. Server-side details stay in the log.
    pub fn to_body(&self) -> serde_json::Value {
        match self {
            ApiError::Validation(issues) => json!({
                "message": "Validation failed",
                "errors": issues,
            }),
            ApiError::TooManyRequests { message, .. } => json!({ "error": message }),
            ApiError::PartialFailure(_) => json!({
                "message": "Operation partially completed",
                "code": "partial_failure",
            }),
            ApiError::Internal(_) => json!({ "message": "Internal server error" }),
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg) => json!({ "message": msg }),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::NotFound { .. } => ApiError::not_found(err.to_string()),
            StorageError::AlreadyExists { .. } => ApiError::conflict(err.to_string()),
            StorageError::PartialWrite { .. } => ApiError::partial_failure(err.to_string()),
            _ => ApiError::internal(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized { message } => ApiError::unauthorized(message),
            AuthError::InvalidToken { .. } => ApiError::unauthorized("Invalid token"),
            AuthError::TokenExpired => ApiError::unauthorized("Token expired"),
            AuthError::Forbidden { message } => ApiError::forbidden(message),
            other @ (AuthError::Configuration { .. } | AuthError::Internal { .. }) => {
                ApiError::internal(other.to_string())
            }
        }
    }
}

impl From<DenyReason> for ApiError {
    fn from(reason: DenyReason) -> Self {
        if reason.is_unauthenticated() {
            ApiError::unauthorized(reason.message)
        } else {
            ApiError::forbidden(reason.message)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::PartialFailure(detail) => {
                tracing::error!(error = %detail, "request left data partially written");
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal server error");
            }
            _ => {}
        }

        let mut response = (status, axum::Json(self.to_body())).into_response();
        let headers = response.headers_mut();
        match &self {
            ApiError::Unauthorized(_) => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            ApiError::TooManyRequests { retry_after, .. } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
            }
            _ => {}
        }
        response
    }
}

/// Result type for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_response_sets_status_and_content_type() {
        let resp = ApiError::bad_request("Only PDF, JPG, and PNG files are allowed").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, &HeaderValue::from_static("application/json"));
    }

    #[test]
    fn api_error_variants_map_to_status() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                ApiError::validation(vec![ValidationIssue::body("time", "Time is required")]),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (ApiError::payload_too_large("x"), StatusCode::PAYLOAD_TOO_LARGE),
            (
                ApiError::too_many_requests("x", 60),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ApiError::partial_failure("x"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases.into_iter() {
            assert_eq!(err.status_code(), status, "{err}");
        }
    }

    #[test]
    fn validation_body_lists_every_issue() {
        let err = ApiError::validation(vec![
            ValidationIssue::body("date", "Invalid or missing date"),
            ValidationIssue::body("time", "Time is required"),
        ]);
        let body = err.to_body();
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
        assert_eq!(body["errors"][1]["path"], "time");
        assert_eq!(body["errors"][0]["location"], "body");
    }

    #[test]
    fn check_passes_empty_issue_list() {
        assert!(ApiError::check(Vec::new()).is_ok());
        let err = ApiError::check(vec![ValidationIssue::body("x", "y")]).unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref v) if v.len() == 1));
    }

    #[test]
    fn internal_details_are_hidden() {
        let body = ApiError::internal("connection refused on 10.0.0.3").to_body();
        assert_eq!(body, json!({"message": "Internal server error"}));
        let body = ApiError::partial_failure("pull failed").to_body();
        assert_eq!(body["code"], "partial_failure");
    }

    #[test]
    fn headers_for_auth_and_rate_limit() {
        let resp = ApiError::unauthorized("Unauthenticated").into_response();
        assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");

        let resp = ApiError::too_many_requests("slow down", 42).into_response();
        assert_eq!(resp.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[test]
    fn storage_errors_convert() {
        let err: ApiError = StorageError::not_found("blogs", "b1").into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        let err: ApiError = StorageError::already_exists("users", "u1").into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        let err: ApiError = StorageError::partial_write("unlink failed").into();
        assert!(matches!(err, ApiError::PartialFailure(_)));
        let err: ApiError = StorageError::connection_error("down").into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn auth_errors_convert() {
        let err: ApiError = AuthError::invalid_token("bad signature").into();
        assert_eq!(err.to_body()["message"], "Invalid token");
        let err: ApiError = AuthError::TokenExpired.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        let err: ApiError = AuthError::configuration("no key").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
