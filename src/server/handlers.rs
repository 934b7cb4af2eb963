//! HTTP endpoint handler functions.
//!
//! Request bodies are read as raw bytes and parsed with serde_json so that
//! malformed input gets the same `{success:false,message}` body as every other
//! error. Blocking work (argon2, SQLite, decoding, inference, PDF) runs on the
//! blocking pool.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::{LoginRequest, SignupRequest};
use crate::imaging::tensor_from_base64;
use crate::model::predict_checked;
use crate::report::{compose_report, ImageSource, ReportRequest, POSITIVE_THRESHOLD};

use super::error::ApiError;
use super::logging::{Endpoint, RecordEvent};
use super::middleware::check_rate_limit;
use super::types::*;
use super::ServerState;

/// Number of users listed by `/test-db`.
const RECENT_USERS: usize = 5;

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Count a failed request once, as rate-limited or as a plain error.
fn track<T>(state: &ServerState, result: Result<T, ApiError>) -> Result<T, ApiError> {
    match &result {
        Err(ApiError::RateLimited(_)) => state.usage.record_rate_limited(),
        Err(_) => state.usage.record_error(),
        Ok(_) => {}
    }
    result
}

// ---------------------------------------------------------------------------
// Predict
// ---------------------------------------------------------------------------

pub async fn predict_handler(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    let result = predict(&state, addr.ip(), &body).await;
    track(&state, result)
}

async fn predict(
    state: &ServerState,
    ip: IpAddr,
    body: &[u8],
) -> Result<Json<PredictResponse>, ApiError> {
    let start = Instant::now();
    check_rate_limit(state, ip).await?;

    let request: PredictRequest = serde_json::from_slice(body).map_err(ApiError::invalid_json)?;
    let provider = state
        .provider
        .clone()
        .ok_or_else(|| ApiError::Unavailable("Model not loaded".into()))?;

    let images = request.image;
    let result = tokio::task::spawn_blocking(move || -> Result<Vec<f32>, ApiError> {
        let batch = images
            .iter()
            .map(|payload| tensor_from_base64(payload))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(predict_checked(&*provider, &batch)?)
    })
    .await??;

    let positive = result
        .iter()
        .filter(|&&p| f64::from(p) > POSITIVE_THRESHOLD)
        .count() as u64;
    let processing_time_ms = elapsed_ms(start);
    state.usage.record(&RecordEvent {
        items: result.len() as u64,
        positive,
        ..RecordEvent::new(Endpoint::Predict, processing_time_ms)
    });
    tracing::info!(images = result.len(), positive, processing_time_ms, "prediction served");

    Ok(Json(PredictResponse { result }))
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

pub async fn generate_report_handler(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let result = generate_report(&state, addr.ip(), &body).await;
    track(&state, result)
}

async fn generate_report(
    state: &ServerState,
    ip: IpAddr,
    body: &[u8],
) -> Result<Response, ApiError> {
    let start = Instant::now();
    check_rate_limit(state, ip).await?;

    let request: ReportRequest = serde_json::from_slice(body).map_err(ApiError::invalid_json)?;
    let renderer = Arc::clone(&state.renderer);
    let (bytes, filename, total, positive, undecodable) = tokio::task::spawn_blocking(move || {
        let (patient, items) = request.into_items()?;
        let undecodable = items
            .iter()
            .filter(|item| matches!(item.image, ImageSource::Invalid(_)))
            .count() as u64;
        let doc = compose_report(&patient, &items, chrono::Utc::now());
        let bytes = renderer.render(&doc)?;
        Ok::<_, ApiError>((
            bytes,
            doc.filename(),
            doc.summary.total,
            doc.summary.positive,
            undecodable,
        ))
    })
    .await??;

    let processing_time_ms = elapsed_ms(start);
    state.usage.record(&RecordEvent {
        items: total as u64,
        positive: positive as u64,
        image_errors: undecodable,
        ..RecordEvent::new(Endpoint::GenerateReport, processing_time_ms)
    });
    tracing::info!(
        scans = total,
        positive,
        bytes = bytes.len(),
        processing_time_ms,
        "report generated"
    );

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| ApiError::Internal(format!("invalid report filename: {e}")))?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(state.renderer.content_type()),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub async fn signup_handler(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let result = signup(&state, &body).await;
    track(&state, result)
}

async fn signup(
    state: &ServerState,
    body: &[u8],
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let start = Instant::now();
    let request: SignupRequest = serde_json::from_slice(body).map_err(ApiError::invalid_json)?;
    let accounts = state.accounts.clone();
    let user = tokio::task::spawn_blocking(move || accounts.signup(&request)).await??;

    state
        .usage
        .record(&RecordEvent::new(Endpoint::Signup, elapsed_ms(start)));
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            success: true,
            message: "User registered successfully".into(),
            user,
        }),
    ))
}

pub async fn login_handler(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<LoginResponse>, ApiError> {
    let result = login(&state, &body).await;
    track(&state, result)
}

async fn login(state: &ServerState, body: &[u8]) -> Result<Json<LoginResponse>, ApiError> {
    let start = Instant::now();
    let request: LoginRequest = serde_json::from_slice(body).map_err(ApiError::invalid_json)?;
    let accounts = state.accounts.clone();
    let (token, user) = tokio::task::spawn_blocking(move || accounts.login(&request)).await??;

    state
        .usage
        .record(&RecordEvent::new(Endpoint::Login, elapsed_ms(start)));
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".into(),
        token,
        user,
    }))
}

// ---------------------------------------------------------------------------
// Informational
// ---------------------------------------------------------------------------

pub async fn home_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Brain Tumor Detection API",
        "version": env!("CARGO_PKG_VERSION"),
        "routes": {
            "POST /": "classify base64 MRI images",
            "POST /generate-report": "download a PDF analysis report",
            "POST /signup": "register a user",
            "POST /login": "obtain a session token",
            "GET /test-db": "user count and most recent users",
            "GET /health": "liveness",
            "GET /stats": "usage counters",
        },
    }))
}

pub async fn test_db_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<TestDbResponse>, ApiError> {
    let accounts = state.accounts.clone();
    let result = tokio::task::spawn_blocking(move || {
        let store = accounts.store();
        Ok::<_, ApiError>((store.count()?, store.recent(RECENT_USERS)?))
    })
    .await
    .map_err(ApiError::from)
    .and_then(|r| r);
    let (total_users, users) = track(&state, result)?;
    Ok(Json(TestDbResponse {
        success: true,
        total_users,
        users,
    }))
}

pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: state.provider.is_some(),
        model_name: state.provider.as_ref().map(|p| p.name().to_string()),
        model_hash: state.provider.as_ref().map(|p| p.fingerprint().to_string()),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        require_token: state.config.require_token,
    })
}

pub async fn stats_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    state.usage.ep_stats.fetch_add(1, Ordering::Relaxed);

    Json(StatsResponse {
        uptime_seconds: state.start_time.elapsed().as_secs(),
        requests: state.usage.request_stats(),
        endpoints: state.usage.endpoint_stats(),
        predictions: state.usage.prediction_stats(),
        reports: state.usage.report_stats(),
    })
}
