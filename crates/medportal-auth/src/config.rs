//! Verifier configuration.

use serde::{Deserialize, Serialize};

/// Signature algorithm accepted on bearer tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JwtAlgorithm {
    #[default]
    HS256,
    RS256,
}

impl JwtAlgorithm {
    pub(crate) fn to_jwt_algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            Self::HS256 => jsonwebtoken::Algorithm::HS256,
            Self::RS256 => jsonwebtoken::Algorithm::RS256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub algorithm: JwtAlgorithm,
    /// Shared secret for HS256.
    #[serde(default)]
    pub secret: Option<String>,
    /// PEM-encoded public key for RS256 (the provider's JWT verification key).
    #[serde(default)]
    pub public_key_pem: Option<String>,
    /// Required `iss` claim, if set.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Required `aud` claim, if set.
    #[serde(default)]
    pub audience: Option<String>,
    /// Clock skew tolerance for `exp`/`nbf`.
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
    /// Dotted path of the role claim, e.g. `role` or `metadata.role`.
    #[serde(default = "default_role_claim")]
    pub role_claim: String,
}

fn default_leeway_secs() -> u64 {
    30
}
fn default_role_claim() -> String {
    "role".into()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: JwtAlgorithm::default(),
            secret: None,
            public_key_pem: None,
            issuer: None,
            audience: None,
            leeway_secs: default_leeway_secs(),
            role_claim: default_role_claim(),
        }
    }
}

impl AuthConfig {
    /// HS256 configuration with the given secret.
    #[must_use]
    pub fn hs256(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.algorithm {
            JwtAlgorithm::HS256 => {
                if self.secret.as_deref().unwrap_or("").is_empty() {
                    return Err("auth.secret is required for HS256".into());
                }
            }
            JwtAlgorithm::RS256 => {
                if self.public_key_pem.as_deref().unwrap_or("").is_empty() {
                    return Err("auth.public_key_pem is required for RS256".into());
                }
            }
        }
        if self.role_claim.trim().is_empty() {
            return Err("auth.role_claim must not be empty".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_need_a_secret() {
        let cfg = AuthConfig::default();
        assert_eq!(cfg.algorithm, JwtAlgorithm::HS256);
        assert_eq!(cfg.role_claim, "role");
        assert!(cfg.validate().is_err());
        assert!(AuthConfig::hs256("s3cret").validate().is_ok());
    }

    #[test]
    fn rs256_needs_a_key() {
        let cfg = AuthConfig {
            algorithm: JwtAlgorithm::RS256,
            ..Default::default()
        };
        assert!(cfg.validate().unwrap_err().contains("public_key_pem"));
    }
}
