//! Usage metrics, access logging, and metrics persistence.
//!
//! Access log entries carry counts and timings only, never patient names,
//! emails or image data.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use super::types::{EndpointStats, PredictionStats, ReportStats, RequestStats};

/// Maximum number of rotated access log files to keep.
const MAX_ACCESS_LOG_ROTATIONS: usize = 5;

/// Interval in seconds between metrics persistence to disk.
pub const METRICS_PERSIST_INTERVAL_SECS: u64 = 60;

/// Which endpoint a successful request hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Predict,
    GenerateReport,
    Signup,
    Login,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Predict => "predict",
            Self::GenerateReport => "generate_report",
            Self::Signup => "signup",
            Self::Login => "login",
        }
    }
}

/// One completed request, as recorded in counters and the access log.
#[derive(Debug, Clone, Copy)]
pub struct RecordEvent {
    pub endpoint: Endpoint,
    /// Images classified or scans reported.
    pub items: u64,
    /// Items above the positive threshold.
    pub positive: u64,
    /// Report scans whose image payload did not decode.
    pub image_errors: u64,
    pub processing_time_ms: u64,
}

impl RecordEvent {
    pub fn new(endpoint: Endpoint, processing_time_ms: u64) -> Self {
        Self {
            endpoint,
            items: 0,
            positive: 0,
            image_errors: 0,
            processing_time_ms,
        }
    }
}

pub struct UsageMetrics {
    pub total_requests: AtomicU64,
    pub total_errors: AtomicU64,
    pub rate_limited: AtomicU64,

    pub ep_predict: AtomicU64,
    pub ep_generate_report: AtomicU64,
    pub ep_signup: AtomicU64,
    pub ep_login: AtomicU64,
    pub ep_stats: AtomicU64,

    pub images_classified: AtomicU64,
    pub positive_predictions: AtomicU64,

    pub reports_generated: AtomicU64,
    pub report_scans: AtomicU64,
    pub report_image_errors: AtomicU64,

    pub access_log: std::sync::Mutex<Option<File>>,
    access_log_path: String,
    access_log_bytes: AtomicU64,
    max_access_log_bytes: u64,
    metrics_path: String,
}

impl UsageMetrics {
    pub fn new(access_log_path: &str, max_access_log_bytes: u64, data_dir: &str) -> Self {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(access_log_path)
            .ok();
        if file.is_none() {
            warn!(path = access_log_path, "could not open access log");
        }
        let current_size = std::fs::metadata(access_log_path)
            .map(|m| m.len())
            .unwrap_or(0);

        let metrics_path = Path::new(data_dir).join("metrics.json");

        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            ep_predict: AtomicU64::new(0),
            ep_generate_report: AtomicU64::new(0),
            ep_signup: AtomicU64::new(0),
            ep_login: AtomicU64::new(0),
            ep_stats: AtomicU64::new(0),
            images_classified: AtomicU64::new(0),
            positive_predictions: AtomicU64::new(0),
            reports_generated: AtomicU64::new(0),
            report_scans: AtomicU64::new(0),
            report_image_errors: AtomicU64::new(0),
            access_log: std::sync::Mutex::new(file),
            access_log_path: access_log_path.to_string(),
            access_log_bytes: AtomicU64::new(current_size),
            max_access_log_bytes,
            metrics_path: metrics_path.to_string_lossy().to_string(),
        }
    }

    pub fn record(&self, event: &RecordEvent) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        match event.endpoint {
            Endpoint::Predict => {
                self.ep_predict.fetch_add(1, Ordering::Relaxed);
                self.images_classified
                    .fetch_add(event.items, Ordering::Relaxed);
                self.positive_predictions
                    .fetch_add(event.positive, Ordering::Relaxed);
            }
            Endpoint::GenerateReport => {
                self.ep_generate_report.fetch_add(1, Ordering::Relaxed);
                self.reports_generated.fetch_add(1, Ordering::Relaxed);
                self.report_scans.fetch_add(event.items, Ordering::Relaxed);
                self.report_image_errors
                    .fetch_add(event.image_errors, Ordering::Relaxed);
            }
            Endpoint::Signup => {
                self.ep_signup.fetch_add(1, Ordering::Relaxed);
            }
            Endpoint::Login => {
                self.ep_login.fetch_add(1, Ordering::Relaxed);
            }
        }

        let entry = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "endpoint": event.endpoint.as_str(),
            "items": event.items,
            "positive": event.positive,
            "image_errors": event.image_errors,
            "processing_time_ms": event.processing_time_ms,
        });
        self.append_access_log(&entry);
    }

    fn append_access_log(&self, entry: &serde_json::Value) {
        let Ok(mut guard) = self.access_log.try_lock() else {
            return;
        };
        let Some(ref mut file) = *guard else {
            return;
        };

        let mut line = entry.to_string();
        line.push('\n');
        let line_len = line.len() as u64;
        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!(error = %e, "failed to write access log entry");
        }
        let new_size = self.access_log_bytes.fetch_add(line_len, Ordering::Relaxed) + line_len;

        // Rotate if over size limit (0 = no limit)
        if self.max_access_log_bytes > 0 && new_size >= self.max_access_log_bytes {
            for i in (1..MAX_ACCESS_LOG_ROTATIONS).rev() {
                let from = format!("{}.{}", self.access_log_path, i);
                let to = format!("{}.{}", self.access_log_path, i + 1);
                if Path::new(&from).exists() {
                    if let Err(e) = std::fs::rename(&from, &to) {
                        warn!(from = %from, to = %to, error = %e, "log rotation rename failed");
                    }
                }
            }
            let rotated = format!("{}.1", self.access_log_path);
            if let Err(e) = std::fs::rename(&self.access_log_path, &rotated) {
                warn!(from = %self.access_log_path, to = %rotated, error = %e, "log rotation rename failed");
            }
            if let Ok(new_file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.access_log_path)
            {
                *file = new_file;
                self.access_log_bytes.store(0, Ordering::Relaxed);
            }
        }
    }

    pub fn record_error(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
        self.record_error();
    }

    pub fn request_stats(&self) -> RequestStats {
        RequestStats {
            total: self.total_requests.load(Ordering::Relaxed),
            errors: self.total_errors.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }

    pub fn endpoint_stats(&self) -> EndpointStats {
        EndpointStats {
            predict: self.ep_predict.load(Ordering::Relaxed),
            generate_report: self.ep_generate_report.load(Ordering::Relaxed),
            signup: self.ep_signup.load(Ordering::Relaxed),
            login: self.ep_login.load(Ordering::Relaxed),
            stats: self.ep_stats.load(Ordering::Relaxed),
        }
    }

    pub fn prediction_stats(&self) -> PredictionStats {
        let images = self.images_classified.load(Ordering::Relaxed);
        let positive = self.positive_predictions.load(Ordering::Relaxed);
        PredictionStats {
            images,
            positive,
            negative: images.saturating_sub(positive),
        }
    }

    pub fn report_stats(&self) -> ReportStats {
        ReportStats {
            generated: self.reports_generated.load(Ordering::Relaxed),
            scans: self.report_scans.load(Ordering::Relaxed),
            image_errors: self.report_image_errors.load(Ordering::Relaxed),
        }
    }

    /// Persist current metrics snapshot to disk so they survive restarts.
    pub fn persist_to_disk(&self) {
        let snapshot = serde_json::json!({
            "requests": self.request_stats(),
            "endpoints": self.endpoint_stats(),
            "predictions": self.prediction_stats(),
            "reports": self.report_stats(),
        });
        match serde_json::to_vec_pretty(&snapshot) {
            Ok(data) => {
                if let Err(e) = std::fs::write(&self.metrics_path, &data) {
                    warn!(path = %self.metrics_path, error = %e, "failed to persist metrics");
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to serialize metrics snapshot");
            }
        }
    }
}
