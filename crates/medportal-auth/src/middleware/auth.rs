//! Bearer token authentication extractor.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AuthError;
use crate::identity::{Identity, IdentityVerifier};

/// State required for bearer token authentication.
///
/// Include it in the application state and expose it to [`BearerAuth`]
/// through `FromRef`.
#[derive(Clone)]
pub struct AuthState {
    /// Verifier for incoming bearer tokens.
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AuthState {
    /// Creates a new auth state.
    pub fn new(verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self { verifier }
    }
}

/// Axum extractor that validates the `Authorization: Bearer <token>` header
/// and yields the caller's [`Identity`].
///
/// # Errors
///
/// Rejects with [`AuthError`] (401) when the header is missing or malformed,
/// or when the token does not verify.
pub struct BearerAuth(pub Identity);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AuthError::unauthorized("Unauthenticated"))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::unauthorized("Unauthenticated"))?;

        let identity = auth_state.verifier.verify(token).await.map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            e
        })?;

        tracing::debug!(
            subject = %identity.id,
            role = ?identity.role,
            "Token validated successfully"
        );

        Ok(BearerAuth(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::Request;
    use medportal_core::Role;

    struct StaticVerifier;

    #[async_trait]
    impl IdentityVerifier for StaticVerifier {
        async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
            match token {
                "good" => Ok(Identity::new("user_1", Some(Role::Patient))),
                _ => Err(AuthError::invalid_token("bad token")),
            }
        }
    }

    fn state() -> AuthState {
        AuthState::new(Arc::new(StaticVerifier))
    }

    async fn extract(header: Option<&str>) -> Result<BearerAuth, AuthError> {
        let mut builder = Request::builder().uri("/");
        if let Some(h) = header {
            builder = builder.header(AUTHORIZATION, h);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        BearerAuth::from_request_parts(&mut parts, &state()).await
    }

    #[tokio::test]
    async fn accepts_valid_bearer() {
        let BearerAuth(identity) = extract(Some("Bearer good")).await.unwrap();
        assert_eq!(identity.id, "user_1");
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_header() {
        assert!(matches!(
            extract(None).await,
            Err(AuthError::Unauthorized { .. })
        ));
        assert!(matches!(
            extract(Some("Basic abc")).await,
            Err(AuthError::Unauthorized { .. })
        ));
        assert!(matches!(
            extract(Some("Bearer ")).await,
            Err(AuthError::Unauthorized { .. })
        ));
        assert!(matches!(
            extract(Some("Bearer nope")).await,
            Err(AuthError::InvalidToken { .. })
        ));
    }
}
