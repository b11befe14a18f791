//! Caller identity and bearer token verification.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, Validation, decode};
use medportal_core::Role;
use serde_json::Value;

use crate::config::{AuthConfig, JwtAlgorithm};
use crate::error::AuthError;

/// The verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque user id issued by the identity provider.
    pub id: String,
    /// `None` when the token carries no role or an unknown one.
    pub role: Option<Role>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            id: id.into(),
            role,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
        }
    }

    /// Returns `true` if the caller has the given role.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    /// Returns `true` if the caller has any of the given roles.
    #[must_use]
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.has_role(*r))
    }

    /// `"First Last"`, trimmed.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Validates a bearer credential and yields the caller.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` or `AuthError::TokenExpired` when the
    /// credential is not acceptable.
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Verifies JWTs issued by the identity provider.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
    role_claim: Vec<String>,
}

impl JwtVerifier {
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the key material is missing or
    /// cannot be parsed.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        config.validate().map_err(AuthError::configuration)?;
        let key = match config.algorithm {
            JwtAlgorithm::HS256 => {
                DecodingKey::from_secret(config.secret.as_deref().unwrap_or("").as_bytes())
            }
            JwtAlgorithm::RS256 => {
                let pem = config.public_key_pem.as_deref().unwrap_or("");
                DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| AuthError::configuration(format!("invalid RSA key: {e}")))?
            }
        };

        let mut validation = Validation::new(config.algorithm.to_jwt_algorithm());
        validation.validate_exp = true;
        validation.leeway = config.leeway_secs;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            key,
            validation,
            role_claim: config.role_claim.split('.').map(str::to_string).collect(),
        })
    }

    fn identity_from_claims(&self, claims: &Value) -> Result<Identity, AuthError> {
        let id = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::invalid_token("Token has no subject"))?;

        let role = lookup_path(claims, &self.role_claim)
            .and_then(Value::as_str)
            .and_then(|r| r.parse::<Role>().ok());

        Ok(Identity {
            id: id.to_string(),
            role,
            first_name: first_str(claims, &["firstName", "first_name", "given_name"]),
            last_name: first_str(claims, &["lastName", "last_name", "family_name"]),
            email: first_str(claims, &["email", "primary_email"]),
        })
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Value>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::invalid_token(e.to_string()),
            }
        })?;
        self.identity_from_claims(&data.claims)
    }
}

fn lookup_path<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

fn first_str(claims: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| claims.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}
