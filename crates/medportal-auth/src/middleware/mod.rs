//! HTTP extractors for authentication.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use medportal_auth::middleware::{AuthState, BearerAuth};
//!
//! async fn whoami(BearerAuth(identity): BearerAuth) -> String {
//!     identity.id
//! }
//!
//! let app = Router::new()
//!     .route("/whoami", get(whoami))
//!     .with_state(auth_state);
//! ```

pub mod auth;
pub mod error;

pub use auth::{AuthState, BearerAuth};
