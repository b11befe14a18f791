use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    http::{HeaderValue, Method, header},
    middleware,
    routing::get,
};
use medportal_auth::{AuthState, JwtVerifier};
use medportal_notifications::{NotificationDispatcher, WebhookNotifier};
use medportal_storage::DynStore;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{
    config::{AppConfig, NotificationsConfig, StorageBackend},
    handlers,
    middleware as app_middleware,
    rate_limit::{self, RateLimiter},
    reconcile::spawn_reconciler,
    routes::{appointments, blogs, doctors, lab_reports, records, users},
    services::{
        AppointmentService, BlogService, DoctorService, LabReportService, RecordService,
        UserService,
    },
    uploads::{DynFileStore, LocalFileStore},
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: DynStore,
    pub auth: AuthState,
    pub rate_limiter: Arc<RateLimiter>,
    pub users: UserService,
    pub doctors: DoctorService,
    pub appointments: AppointmentService,
    pub lab_reports: LabReportService,
    pub records: RecordService,
    pub blogs: BlogService,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    /// Opens the configured storage backend and builds the state on top of it.
    pub async fn from_config(cfg: AppConfig) -> anyhow::Result<Self> {
        let store = match cfg.storage.backend {
            StorageBackend::Memory => medportal_db_memory::create_store(),
            StorageBackend::Postgres => {
                medportal_db_postgres::create_store(cfg.storage.postgres.clone())
                    .await
                    .context("failed to open postgres store")?
            }
        };
        tracing::info!(
            backend = %store.backend_name(),
            transactional = store.supports_transactions(),
            "document store ready"
        );
        Self::with_store(cfg, store).await
    }

    /// Builds the state over an already opened store and ensures its indexes.
    pub async fn with_store(cfg: AppConfig, store: DynStore) -> anyhow::Result<Self> {
        let verifier = JwtVerifier::from_config(&cfg.auth).context("invalid auth configuration")?;
        let files: DynFileStore = Arc::new(LocalFileStore::new(cfg.uploads.dir.clone()));
        let max_file_bytes = cfg.uploads.max_file_bytes;

        let mut lab_reports = LabReportService::new(store.clone(), files.clone(), max_file_bytes);
        if let Some(dispatcher) = build_dispatcher(&cfg.notifications) {
            lab_reports = lab_reports.with_notifications(dispatcher);
        }

        let state = Self {
            auth: AuthState::new(Arc::new(verifier)),
            rate_limiter: Arc::new(RateLimiter::from_config(&cfg.rate_limit)),
            users: UserService::new(store.clone()),
            doctors: DoctorService::new(store.clone()),
            appointments: AppointmentService::new(store.clone()),
            lab_reports,
            records: RecordService::new(store.clone()),
            blogs: BlogService::new(store.clone(), files, max_file_bytes),
            config: Arc::new(cfg),
            store,
        };
        state.users.init().await.context("failed to prepare users collection")?;
        state.doctors.init().await.context("failed to prepare doctors collection")?;
        Ok(state)
    }
}

fn build_dispatcher(cfg: &NotificationsConfig) -> Option<NotificationDispatcher> {
    if !cfg.enabled {
        return None;
    }
    let mut dispatcher = NotificationDispatcher::with_default_notifiers();
    if let Some(url) = cfg.webhook_url.as_deref().filter(|u| !u.is_empty()) {
        tracing::info!(url, "lab report webhook enabled");
        dispatcher = dispatcher.register(Arc::new(WebhookNotifier::new(
            url,
            cfg.webhook_secret.clone(),
        )));
    }
    Some(dispatcher)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn build_router(state: AppState) -> Router {
    let cfg = state.config.clone();

    let mut router = Router::new()
        .route("/api/health", get(handlers::health))
        .nest("/user", users::user_routes())
        .nest("/api/users", users::user_routes())
        .nest("/doctor", doctors::doctor_routes())
        .nest("/appointment", appointments::appointment_routes())
        .nest("/api/reports", lab_reports::lab_report_routes())
        .nest("/record", records::record_routes())
        .nest("/blog", blogs::blog_routes());

    if cfg.uploads.serve_static {
        router = router.nest_service("/uploads", ServeDir::new(&cfg.uploads.dir));
    }

    // Outermost layer runs first: request id -> security headers -> cors -> compression -> trace -> rate limit -> body limit
    router
        .layer(DefaultBodyLimit::max(cfg.server.body_limit_bytes))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit::rate_limit,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let req_id = req
                        .extensions()
                        .get::<HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = tracing::field::Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record("http.status_code", res.status().as_u16());
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&cfg.cors.allowed_origins))
        .layer(middleware::from_fn(app_middleware::security_headers))
        .layer(middleware::from_fn(app_middleware::request_id))
        .with_state(state)
}

/// Builds the full application from configuration.
pub async fn build_app(cfg: AppConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(cfg).await?;
    Ok(build_router(state))
}

pub struct MedPortalServer {
    addr: SocketAddr,
    state: AppState,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<MedPortalServer> {
        let state = AppState::from_config(self.config).await?;
        Ok(MedPortalServer {
            addr: self.addr,
            state,
        })
    }
}

impl MedPortalServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);

        let mut background = Vec::new();
        if let Some(every) = self.state.config.reconcile.interval() {
            tracing::info!(interval_secs = every.as_secs(), "lab report reconciliation enabled");
            background.push(spawn_reconciler(self.state.store.clone(), every));
        }
        if self.state.config.rate_limit.enabled {
            let limiter = self.state.rate_limiter.clone();
            let every = self.state.config.rate_limit.general.window();
            background.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                loop {
                    ticker.tick().await;
                    let removed = limiter.cleanup_expired();
                    if removed > 0 {
                        tracing::debug!(
                            removed,
                            tracked = limiter.tracked_clients(),
                            "expired rate limit windows dropped"
                        );
                    }
                }
            }));
        }

        let app = build_router(self.state);
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        for task in background {
            task.abort();
        }
        result?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
