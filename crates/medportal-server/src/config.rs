use axum::http::HeaderValue;
use medportal_auth::AuthConfig;
use medportal_db_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Bearer token verification
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// File uploads and their static exposure
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Background repair of lab report links
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Storage validation
        if self.storage.backend == StorageBackend::Postgres {
            self.storage.postgres.validate()?;
        }
        // Auth validation
        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;
        // CORS validation
        for origin in &self.cors.allowed_origins {
            if HeaderValue::from_str(origin).is_err() {
                return Err(format!("cors.allowed_origins contains an invalid origin: {origin:?}"));
            }
        }
        // Rate limit validation
        for (name, window) in [
            ("general", &self.rate_limit.general),
            ("sensitive", &self.rate_limit.sensitive),
        ] {
            if window.window_secs == 0 || window.max_requests == 0 {
                return Err(format!(
                    "rate_limit.{name} window_secs and max_requests must be > 0"
                ));
            }
        }
        // Upload validation
        if self.uploads.max_file_bytes == 0 {
            return Err("uploads.max_file_bytes must be > 0".into());
        }
        if self.notifications.webhook_url.as_deref() == Some("") {
            return Err("notifications.webhook_url must not be empty when set".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Used when `backend = "postgres"`
    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".into()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Key clients by the first `X-Forwarded-For` entry instead of the peer address.
    #[serde(default)]
    pub trust_forwarded_for: bool,
    #[serde(default = "default_general_window")]
    pub general: RateWindowConfig,
    #[serde(default = "default_sensitive_window")]
    pub sensitive: RateWindowConfig,
}

/// A fixed window applied to a set of paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateWindowConfig {
    pub window_secs: u64,
    pub max_requests: u32,
    /// Path prefixes (general) or exact paths (sensitive).
    #[serde(default)]
    pub paths: Vec<String>,
}

impl RateWindowConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

fn default_true() -> bool {
    true
}
fn default_general_window() -> RateWindowConfig {
    RateWindowConfig {
        window_secs: 60,
        max_requests: 200,
        paths: ["/api", "/user", "/api/users", "/api/reports", "/record"]
            .into_iter()
            .map(String::from)
            .collect(),
    }
}
fn default_sensitive_window() -> RateWindowConfig {
    RateWindowConfig {
        window_secs: 15 * 60,
        max_requests: 50,
        paths: vec!["/appointment/create-appointment".into()],
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trust_forwarded_for: false,
            general: default_general_window(),
            sensitive: default_sensitive_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,
    /// Serve stored files under `/uploads`. The route has no access control.
    #[serde(default)]
    pub serve_static: bool,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}
fn default_max_file_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            serve_static: false,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// HMAC-SHA256 key for the `X-Signature-256` header
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
            webhook_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReconcileConfig {
    /// 0 disables the job.
    #[serde(default)]
    pub interval_secs: u64,
}

impl ReconcileConfig {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Loads defaults, then the TOML file (if it exists), then
    /// `MEDPORTAL__SECTION__KEY` environment variables, and validates.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("medportal.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., MEDPORTAL__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("MEDPORTAL")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
