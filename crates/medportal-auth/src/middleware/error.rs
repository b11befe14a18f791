//! Error response handling for authentication failures.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, oauth_error, message) = error_details(&self);

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = format!(
                "Bearer error=\"{oauth_error}\", error_description=\"{}\"",
                message.replace('"', "'")
            );
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(json!({ "message": message }))).into_response()
    }
}

/// Returns (HTTP status, OAuth error code, client-facing message).
fn error_details(error: &AuthError) -> (StatusCode, &'static str, String) {
    match error {
        AuthError::Unauthorized { message } => {
            (StatusCode::UNAUTHORIZED, "invalid_request", message.clone())
        }
        AuthError::InvalidToken { .. } => (
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            "Invalid token".to_string(),
        ),
        AuthError::TokenExpired => (
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            "Token has expired".to_string(),
        ),
        AuthError::Forbidden { message } => {
            (StatusCode::FORBIDDEN, "insufficient_scope", message.clone())
        }
        AuthError::Configuration { message } | AuthError::Internal { message } => {
            tracing::error!(error = %message, "Authentication failed internally");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Internal server error".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_sets_www_authenticate() {
        let resp = AuthError::unauthorized("Unauthenticated").into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let value = resp.headers().get(header::WWW_AUTHENTICATE).unwrap();
        assert!(value.to_str().unwrap().starts_with("Bearer error="));
    }

    #[test]
    fn token_details_are_not_leaked() {
        let resp = AuthError::invalid_token("InvalidSignature at byte 12").into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let value = resp.headers().get(header::WWW_AUTHENTICATE).unwrap();
        assert!(!value.to_str().unwrap().contains("byte 12"));
    }

    #[test]
    fn status_mapping() {
        let cases = vec![
            (AuthError::TokenExpired, StatusCode::UNAUTHORIZED),
            (AuthError::forbidden("x"), StatusCode::FORBIDDEN),
            (AuthError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (AuthError::configuration("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
