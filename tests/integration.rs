//! Integration tests for the neuroscan HTTP server.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use neuroscan::imaging::ImageTensor;
use neuroscan::model::{InferenceProvider, ModelError};
use neuroscan::server::*;
use neuroscan::users::UserStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Scores each image by its mean intensity, so white scans are "positive".
struct BrightnessProvider;

impl InferenceProvider for BrightnessProvider {
    fn name(&self) -> &str {
        "brightness"
    }

    fn fingerprint(&self) -> &str {
        "sha256:test"
    }

    fn predict(&self, batch: &[ImageTensor]) -> Result<Vec<f32>, ModelError> {
        Ok(batch
            .iter()
            .map(|t| {
                let s = t.as_slice();
                s.iter().sum::<f32>() / s.len() as f32 / 255.0
            })
            .collect())
    }
}

struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    client: reqwest::Client,
    _dir: TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }
}

async fn spawn_test_server() -> TestServer {
    spawn_test_server_with(Some(Arc::new(BrightnessProvider)), |_| {}).await
}

async fn spawn_test_server_with(
    provider: Option<Arc<dyn InferenceProvider>>,
    configure: impl FnOnce(&mut ServerConfig),
) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        rate_limit_rpm: 0, // no rate limiting in tests
        access_log_path: dir.path().join("access.jsonl").to_string_lossy().to_string(),
        max_access_log_bytes: 0,
        data_dir: dir.path().to_string_lossy().to_string(),
        database_path: dir.path().join("users.db"),
        jwt_secret: "integration-secret".into(),
        ..ServerConfig::default()
    };
    configure(&mut config);

    let store = Arc::new(UserStore::open(&config.database_path).unwrap());
    let state = Arc::new(ServerState::new(config, provider, store));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, state.clone(), std::future::pending()));

    TestServer {
        addr,
        state,
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

fn png_base64(rgb: [u8; 3]) -> String {
    let img = RgbImage::from_pixel(16, 16, Rgb(rgb));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    base64::engine::general_purpose::STANDARD.encode(out.into_inner())
}

async fn error_message(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    body["message"].as_str().unwrap().to_string()
}

async fn register(server: &TestServer, email: &str, password: &str) -> reqwest::Response {
    server
        .post(
            "/signup",
            json!({"name": "Jane Doe", "email": email, "password": password}),
        )
        .await
}

// ---------------------------------------------------------------------------
// Informational endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_reports_model() {
    let server = spawn_test_server().await;
    let resp = server.get("/health").await;
    assert_eq!(resp.status(), 200);
    let health: HealthResponse = resp.json().await.unwrap();
    assert_eq!(health.status, "ok");
    assert!(health.model_loaded);
    assert_eq!(health.model_name.as_deref(), Some("brightness"));

    let bare = spawn_test_server_with(None, |_| {}).await;
    let health: HealthResponse = bare.get("/health").await.json().await.unwrap();
    assert!(!health.model_loaded);
    assert!(health.model_hash.is_none());
}

#[tokio::test]
async fn test_home_lists_routes() {
    let server = spawn_test_server().await;
    let body: Value = server.get("/home").await.json().await.unwrap();
    assert_eq!(body["message"], "Brain Tumor Detection API");
    assert!(body["routes"]["POST /generate-report"].is_string());
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .request(reqwest::Method::OPTIONS, server.url("/generate-report"))
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()["access-control-allow-origin"].to_str().unwrap(),
        "*"
    );
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_signup_then_duplicate() {
    let server = spawn_test_server().await;

    let resp = register(&server, "jane@example.com", "secret1").await;
    assert_eq!(resp.status(), 201);
    let created: SignupResponse = resp.json().await.unwrap();
    assert!(created.success);
    assert_eq!(created.user.email, "jane@example.com");
    assert_eq!(created.user.name, "Jane Doe");

    let resp = register(&server, "jane@example.com", "another1").await;
    assert_eq!(resp.status(), 400);
    assert_eq!(error_message(resp).await, "Email already registered");
    assert_eq!(server.state.accounts.store().count().unwrap(), 1);
}

#[tokio::test]
async fn test_signup_validation() {
    let server = spawn_test_server().await;

    let resp = register(&server, "jane@example.com", "123").await;
    assert_eq!(resp.status(), 400);
    assert_eq!(error_message(resp).await, "Password too short");

    let resp = register(&server, "not-an-email", "secret1").await;
    assert_eq!(error_message(resp).await, "Invalid email");

    let resp = server.post("/signup", json!({"email": "a@b.co"})).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(error_message(resp).await, "All fields required");

    let resp = server
        .client
        .post(server.url("/signup"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert!(error_message(resp).await.starts_with("Invalid JSON"));
}

#[tokio::test]
async fn test_login_issues_token_with_user_claims() {
    let server = spawn_test_server().await;
    let created: SignupResponse = register(&server, "jane@example.com", "secret1")
        .await
        .json()
        .await
        .unwrap();

    let resp = server
        .post(
            "/login",
            json!({"email": "jane@example.com", "password": "secret1"}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let login: LoginResponse = resp.json().await.unwrap();
    assert!(login.success);
    assert_eq!(login.user, created.user);

    let claims = server.state.accounts.tokens().verify(&login.token).unwrap();
    assert_eq!(claims.user_id, created.user.id);
    assert_eq!(claims.email, "jane@example.com");
}

#[tokio::test]
async fn test_login_wrong_password_is_401() {
    let server = spawn_test_server().await;
    register(&server, "jane@example.com", "secret1").await;

    let resp = server
        .post(
            "/login",
            json!({"email": "jane@example.com", "password": "wrong-one"}),
        )
        .await;
    assert_eq!(resp.status(), 401);
    assert_eq!(error_message(resp).await, "Invalid email or password");

    let resp = server.post("/login", json!({"email": "jane@example.com"})).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(error_message(resp).await, "Email and password required");
}

#[tokio::test]
async fn test_db_lists_recent_users_behind_admin_key() {
    let server = spawn_test_server_with(None, |c| c.admin_key = Some("admin-123".into())).await;
    for i in 0..6 {
        register(&server, &format!("user{i}@example.com"), "secret1").await;
    }

    let resp = server.get("/test-db").await;
    assert_eq!(resp.status(), 401);

    let resp = server
        .client
        .get(server.url("/test-db"))
        .bearer_auth("admin-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let db: TestDbResponse = resp.json().await.unwrap();
    assert_eq!(db.total_users, 6);
    assert_eq!(db.users.len(), 5);
    assert_eq!(db.users[0].email, "user5@example.com");
}

// ---------------------------------------------------------------------------
// Predict
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_predict_returns_one_probability_per_image() {
    let server = spawn_test_server().await;
    let white = png_base64([255, 255, 255]);
    let black = format!("data:image/png;base64,{}", png_base64([0, 0, 0]));

    let resp = server.post("/", json!({"image": [white, black]})).await;
    assert_eq!(resp.status(), 200);
    let predicted: PredictResponse = resp.json().await.unwrap();
    assert_eq!(predicted.result.len(), 2);
    assert!((predicted.result[0] - 1.0).abs() < 1e-4);
    assert!(predicted.result[1].abs() < 1e-4);

    let stats: StatsResponse = server.get("/stats").await.json().await.unwrap();
    assert_eq!(stats.predictions.images, 2);
    assert_eq!(stats.predictions.positive, 1);
    assert_eq!(stats.endpoints.predict, 1);
}

#[tokio::test]
async fn test_predict_empty_batch() {
    let server = spawn_test_server().await;
    let resp = server.post("/", json!({"image": []})).await;
    assert_eq!(resp.status(), 200);
    let predicted: PredictResponse = resp.json().await.unwrap();
    assert!(predicted.result.is_empty());
}

#[tokio::test]
async fn test_predict_without_model_is_503() {
    let server = spawn_test_server_with(None, |_| {}).await;
    let resp = server
        .post("/", json!({"image": [png_base64([1, 2, 3])]}))
        .await;
    assert_eq!(resp.status(), 503);
    assert_eq!(error_message(resp).await, "Model not loaded");
}

#[tokio::test]
async fn test_predict_bad_input() {
    let server = spawn_test_server().await;

    let resp = server.post("/", json!({"images": []})).await;
    assert_eq!(resp.status(), 400);

    let resp = server.post("/", json!({"image": ["!!!not-base64!!!"]})).await;
    assert_eq!(resp.status(), 500);
    assert!(error_message(resp).await.contains("base64"));

    let stats: StatsResponse = server.get("/stats").await.json().await.unwrap();
    assert_eq!(stats.requests.errors, 2);
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let server = spawn_test_server_with(Some(Arc::new(BrightnessProvider)), |c| {
        c.rate_limit_rpm = 1;
    })
    .await;

    let resp = server.post("/", json!({"image": []})).await;
    assert_eq!(resp.status(), 200);
    let resp = server.post("/", json!({"image": []})).await;
    assert_eq!(resp.status(), 429);
    assert!(error_message(resp).await.starts_with("Rate limit exceeded"));

    let stats: StatsResponse = server.get("/stats").await.json().await.unwrap();
    assert_eq!(stats.requests.rate_limited, 1);
}

#[tokio::test]
async fn test_require_token_gates_predict() {
    let server = spawn_test_server_with(Some(Arc::new(BrightnessProvider)), |c| {
        c.require_token = true;
    })
    .await;

    let resp = server.post("/", json!({"image": []})).await;
    assert_eq!(resp.status(), 401);

    let resp = server
        .client
        .post(server.url("/"))
        .bearer_auth("garbage")
        .json(&json!({"image": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert_eq!(error_message(resp).await, "Invalid or expired token");

    register(&server, "jane@example.com", "secret1").await;
    let login: LoginResponse = server
        .post(
            "/login",
            json!({"email": "jane@example.com", "password": "secret1"}),
        )
        .await
        .json()
        .await
        .unwrap();
    let resp = server
        .client
        .post(server.url("/"))
        .bearer_auth(&login.token)
        .json(&json!({"image": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_generate_report_returns_pdf_attachment() {
    let server = spawn_test_server().await;
    let body = json!({
        "user": {"name": "Jane Doe", "email": "jane@example.com"},
        "predictions": {
            "image": [png_base64([200, 200, 200]), png_base64([10, 10, 10])],
            "result": [0.92, 0.30],
        },
    });

    let resp = server.post("/generate-report", body).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/pdf"
    );
    let disposition = resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"Comprehensive_Brain_Tumor_Report_Jane_Doe_"));
    assert!(disposition.ends_with(".pdf\""));

    let bytes = resp.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF-"));

    let stats: StatsResponse = server.get("/stats").await.json().await.unwrap();
    assert_eq!(stats.reports.generated, 1);
    assert_eq!(stats.reports.scans, 2);
}

#[tokio::test]
async fn test_generate_report_tolerates_bad_images() {
    let server = spawn_test_server().await;
    let body = json!({
        "user": {},
        "predictions": {"image": ["@@@"], "result": [0.6]},
    });

    let resp = server.post("/generate-report", body).await;
    assert_eq!(resp.status(), 200);
    let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.contains("Comprehensive_Brain_Tumor_Report_Patient_"));
    assert!(resp.bytes().await.unwrap().starts_with(b"%PDF-"));

    let stats: StatsResponse = server.get("/stats").await.json().await.unwrap();
    assert_eq!(stats.reports.image_errors, 1);
}

#[tokio::test]
async fn test_generate_report_rejects_inconsistent_predictions() {
    let server = spawn_test_server().await;

    let resp = server
        .post(
            "/generate-report",
            json!({"predictions": {"image": ["a", "b"], "result": [0.5]}}),
        )
        .await;
    assert_eq!(resp.status(), 400);
    assert!(error_message(resp).await.contains("2 entries"));

    let resp = server
        .post(
            "/generate-report",
            json!({"predictions": {"image": ["a"], "result": [1.5]}}),
        )
        .await;
    assert_eq!(resp.status(), 400);

    // Validation runs on the blocking pool; failures still count once each.
    let stats: StatsResponse = server.get("/stats").await.json().await.unwrap();
    assert_eq!(stats.requests.errors, 2);
    assert_eq!(stats.reports.generated, 0);
}
