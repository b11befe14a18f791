//! # medportal-auth
//!
//! Authentication and authorization for the MedPortal server.
//!
//! This crate provides:
//! - Bearer token verification against the external identity provider
//!   (JWT, HS256 or RS256)
//! - The [`BearerAuth`] axum extractor yielding the caller's [`Identity`]
//! - The Authorization Policy: [`policy::decide`] answers whether a caller
//!   may perform an operation on a resource, independent of HTTP
//!
//! ## Modules
//!
//! - [`config`] - Verifier configuration
//! - [`identity`] - Caller identity and token verification
//! - [`middleware`] - HTTP extractors and error responses
//! - [`policy`] - Role and ownership rules per resource type

pub mod config;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod policy;

pub use config::{AuthConfig, JwtAlgorithm};
pub use error::AuthError;
pub use identity::{Identity, IdentityVerifier, JwtVerifier};
pub use middleware::{AuthState, BearerAuth};
pub use policy::{
    AccessDecision, Action, DenyReason, Operation, ResourceKind, authorize, check_role, decide,
};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{AuthConfig, JwtAlgorithm};
    pub use crate::error::AuthError;
    pub use crate::identity::{Identity, IdentityVerifier, JwtVerifier};
    pub use crate::middleware::{AuthState, BearerAuth};
    pub use crate::policy::{
        AccessDecision, Action, DenyReason, Operation, ResourceKind, authorize, check_role, decide,
    };
    pub use crate::AuthResult;
}
