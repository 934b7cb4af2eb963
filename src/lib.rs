//! neuroscan: brain MRI tumor classification with analysis reports.
//!
//! A binary classifier scores each scan with a tumor probability. The
//! probability, together with a stable hash of the scan's identifier, selects
//! a classification record from a fixed table:
//! - **No tumor** below 50%
//! - **Indeterminate** from 50% to 55%
//! - **Low-grade / moderate** findings up to 70%
//! - **Moderate / high-grade** findings up to 85%
//! - **Critical** findings above 85%
//!
//! Batches of classified scans are composed into a report document and
//! rendered as PDF. The HTTP service adds signup/login backed by SQLite.
//!
//! Uses structured logging via [`tracing`]. Set the `RUST_LOG` environment
//! variable to control log verbosity (e.g., `RUST_LOG=neuroscan=debug`).

pub mod auth;
pub mod catalog;
pub mod hash;
pub mod imaging;
pub mod model;
pub mod render;
pub mod report;
pub mod server;
pub mod users;

pub use catalog::{classify, ClassificationRecord, Priority, RiskLevel, SeverityTier};
pub use hash::stable_hash;
pub use report::{compose_report, PatientInfo, RenderableDocument, ReportItem, ReportRequest};
