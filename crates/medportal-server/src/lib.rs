pub mod config;
pub mod form;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod rate_limit;
pub mod reconcile;
pub mod routes;
pub mod server;
pub mod services;
pub mod uploads;
pub mod validation;

pub use config::{AppConfig, CorsConfig, RateLimitConfig, ServerConfig, StorageConfig, UploadsConfig};
pub use observability::{init_tracing, shutdown_tracing};
pub use server::{AppState, MedPortalServer, ServerBuilder, build_app, build_router};
