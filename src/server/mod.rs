//! HTTP server for the neuroscan MRI classifier service.
//!
//! Features:
//! - Batch tumor-probability prediction over base64 images
//! - PDF analysis reports returned as attachments
//! - Signup/login backed by SQLite with argon2 hashes and HS256 session tokens
//! - Per-IP rate limiting with automatic eviction when the map exceeds 10k entries
//! - JSONL access logging with size-based rotation (configurable via `max_access_log_bytes`)
//! - Structured logging via [`tracing`]

pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod types;

pub use error::ApiError;
pub use logging::{RecordEvent, UsageMetrics, METRICS_PERSIST_INTERVAL_SECS};
pub use types::{
    HealthResponse, LoginResponse, PredictRequest, PredictResponse, ServerConfig,
    SignupResponse, StatsResponse, TestDbResponse, DEFAULT_DATA_DIR, DEV_JWT_SECRET,
};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::middleware as axum_mw;
use axum::routing::{get, post};
use axum::Router;
use eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::auth::{Accounts, TokenIssuer};
use crate::model::{DenseHeadModel, InferenceProvider};
use crate::render::{DocumentRenderer, PdfRenderer};
use crate::users::UserStore;

// ---------------------------------------------------------------------------
// Server state
// ---------------------------------------------------------------------------

pub struct ServerState {
    pub config: ServerConfig,
    /// Absent when no model artifact is configured; predict then answers 503.
    pub provider: Option<Arc<dyn InferenceProvider>>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub accounts: Accounts,
    pub start_time: Instant,
    pub rate_limiters: middleware::RateLimiterCache,
    pub usage: UsageMetrics,
}

impl ServerState {
    /// Assemble state from an already-opened store and optional provider.
    pub fn new(
        config: ServerConfig,
        provider: Option<Arc<dyn InferenceProvider>>,
        store: Arc<UserStore>,
    ) -> Self {
        let usage = UsageMetrics::new(
            &config.access_log_path,
            config.max_access_log_bytes,
            &config.data_dir,
        );
        let tokens = TokenIssuer::new(
            config.jwt_secret.as_bytes(),
            chrono::Duration::seconds(config.token_ttl_secs),
        );

        Self {
            config,
            provider,
            renderer: Arc::new(PdfRenderer),
            accounts: Accounts::new(store, tokens),
            start_time: Instant::now(),
            rate_limiters: middleware::new_rate_limiter_cache(),
            usage,
        }
    }

    /// Open the user database and load the model artifact named in `config`.
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .wrap_err_with(|| format!("failed to create data dir {}", config.data_dir))?;

        let store = UserStore::open(&config.database_path).wrap_err_with(|| {
            format!(
                "failed to open user database {}",
                config.database_path.display()
            )
        })?;

        let provider: Option<Arc<dyn InferenceProvider>> = match &config.model_path {
            Some(path) => {
                let model = DenseHeadModel::load(path)
                    .wrap_err_with(|| format!("failed to load model {}", path.display()))?;
                info!(
                    model = model.name(),
                    hash = model.fingerprint(),
                    "model loaded"
                );
                Some(Arc::new(model))
            }
            None => {
                warn!("no model configured; predict endpoint will answer 503");
                None
            }
        };

        if config.jwt_secret == DEV_JWT_SECRET {
            warn!("using the built-in development JWT secret; set NEUROSCAN_JWT_SECRET in production");
        }

        Ok(Self::new(config, provider, Arc::new(store)))
    }
}

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------

/// Build the application router over shared state.
pub fn router(state: Arc<ServerState>) -> Router {
    // Predict and report sit behind the optional session gate.
    let gated = Router::new()
        .route("/", post(handlers::predict_handler))
        .route("/generate-report", post(handlers::generate_report_handler))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    let admin = Router::new()
        .route("/test-db", get(handlers::test_db_handler))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::admin_key_middleware,
        ));

    // Any origin, method and header for browser clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([axum::http::header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/home", get(handlers::home_handler))
        .route("/health", get(handlers::health_handler))
        .route("/stats", get(handlers::stats_handler))
        .route("/signup", post(handlers::signup_handler))
        .route("/login", post(handlers::login_handler))
        .merge(gated)
        .merge(admin)
        .layer(cors)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` resolves, then persist
/// metrics once more.
pub async fn serve<F>(listener: TcpListener, state: Arc<ServerState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state.clone());
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        state.usage.persist_to_disk();
    })
    .await?;
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let sigterm_recv = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm_recv = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down gracefully"),
        _ = sigterm_recv => info!("received SIGTERM, shutting down gracefully"),
    }
}

/// Run the HTTP server (blocking)
pub async fn run_server(config: ServerConfig) -> Result<()> {
    let bind_addr = config.bind_addr;
    let rate_limit_rpm = config.rate_limit_rpm;
    let require_token = config.require_token;
    let access_log = config.access_log_path.clone();

    let state = tokio::task::spawn_blocking(move || ServerState::from_config(config))
        .await
        .wrap_err("server initialization task failed")??;
    let state = Arc::new(state);

    // Spawn background task to persist metrics to disk periodically
    let metrics_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(
            METRICS_PERSIST_INTERVAL_SECS,
        ));
        loop {
            interval.tick().await;
            metrics_state.usage.persist_to_disk();
        }
    });

    let listener = TcpListener::bind(bind_addr)
        .await
        .wrap_err_with(|| format!("failed to bind {bind_addr}"))?;
    info!(bind = %bind_addr, "neuroscan server listening");
    info!("Endpoints: POST /, POST /generate-report, POST /signup, POST /login, GET /home, GET /test-db, GET /health, GET /stats");
    if rate_limit_rpm > 0 {
        info!(rate_limit_rpm, "rate limiting enabled");
    } else {
        info!("rate limiting disabled");
    }
    if require_token {
        info!("session token required on predict and report");
    }
    info!(access_log = %access_log);

    serve(listener, state, shutdown_signal()).await
}
