//! Request/response types and configuration for the neuroscan server.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::auth::DEFAULT_TOKEN_TTL_SECS;
use crate::users::User;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Signing secret used when none is configured. Fine for local runs only.
pub const DEV_JWT_SECRET: &str = "neuroscan-dev-secret-change-me";

/// Default directory for metrics persistence.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to (defaults to 127.0.0.1:5000; use 0.0.0.0 to expose externally)
    pub bind_addr: SocketAddr,
    /// Rate limit in requests per minute per IP on predict/report (0 = no limit)
    pub rate_limit_rpm: u32,
    /// Path for JSONL access log
    pub access_log_path: String,
    /// Maximum access log file size in bytes before rotation (0 = no limit)
    pub max_access_log_bytes: u64,
    /// Directory for `metrics.json`.
    pub data_dir: String,
    /// SQLite user database.
    pub database_path: PathBuf,
    /// Dense-head model artifact. Without one, the predict endpoint answers 503.
    pub model_path: Option<PathBuf>,
    /// HS256 signing secret for session tokens.
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    /// Require a valid session token on predict and report.
    pub require_token: bool,
    /// Optional bearer key guarding `/test-db`. If None, the endpoint is open.
    pub admin_key: Option<String>,
    /// Request body cap. Batches of base64 images are large.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            rate_limit_rpm: 60,
            access_log_path: "neuroscan-access.jsonl".to_string(),
            max_access_log_bytes: 50 * 1024 * 1024, // 50 MB
            data_dir: DEFAULT_DATA_DIR.to_string(),
            database_path: PathBuf::from("users.db"),
            model_path: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            require_token: false,
            admin_key: None,
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field("access_log_path", &self.access_log_path)
            .field("max_access_log_bytes", &self.max_access_log_bytes)
            .field("data_dir", &self.data_dir)
            .field("database_path", &self.database_path)
            .field("model_path", &self.model_path)
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("require_token", &self.require_token)
            .field("admin_key", &self.admin_key.as_ref().map(|_| "[REDACTED]"))
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Body of `POST /`: base64 images, optionally with a data-URL header.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub image: Vec<String>,
}

/// One tumor probability per submitted image, in order.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub result: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TestDbResponse {
    pub success: bool,
    pub total_users: i64,
    pub users: Vec<User>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_hash: Option<String>,
    pub uptime_seconds: u64,
    pub require_token: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestStats {
    pub total: u64,
    pub errors: u64,
    pub rate_limited: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointStats {
    pub predict: u64,
    pub generate_report: u64,
    pub signup: u64,
    pub login: u64,
    pub stats: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionStats {
    pub images: u64,
    pub positive: u64,
    pub negative: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportStats {
    pub generated: u64,
    pub scans: u64,
    pub image_errors: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub requests: RequestStats,
    pub endpoints: EndpointStats,
    pub predictions: PredictionStats,
    pub reports: ReportStats,
}
