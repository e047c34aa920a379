//! External service ports and their HTTP client implementations
//!
//! Each collaborator is modelled as an async trait so the capture and
//! reconciliation logic can be exercised against in-process fakes.

pub mod camera;
pub mod colorlab;
pub mod orders;
pub mod vision;

pub use camera::RtspCameraClient;
pub use colorlab::ColorAnalysisClient;
pub use orders::OrderSystemClient;
pub use vision::VisionClient;

use crate::models::{CapturedImage, Order};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One candidate returned by the prediction service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictionCandidate {
    /// Label with a leading material-family token, e.g.
    /// `NVL_THIT0125_GIO_HEO_RUT_XUONG`
    pub class: String,
    /// Confidence score; higher wins
    pub confidence: f64,
    /// Bounding-box geometry, unused by the engine but kept so the
    /// full wire payload round-trips
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

/// Prediction service errors
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Color comparison service errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Request exceeded the 5000 ms deadline
    #[error("Color analysis timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Camera capture errors
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Capture failed: {0}")]
    Failed(String),
}

/// Order-system API errors
#[derive(Debug, Error)]
pub enum OrderApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Request body for per-measurement persistence
#[derive(Debug, Clone, Serialize)]
pub struct CreateMeasurementRequest {
    pub po_id: i64,
    pub product_id: i64,
    /// Measured quantity in the material's unit
    pub weight: f64,
    /// Captured photo (inline payload or reference)
    pub photo: CapturedImage,
    /// Color deviation percent
    pub color: f64,
}

/// One disposition line of a batch reconciliation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileItem {
    pub product_id: i64,
    /// 1 = accept into stock, 0 = return to supplier
    pub status: u8,
}

/// Batch reconciliation request for one purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub po_id: i64,
    pub items: Vec<ReconcileItem>,
}

/// A previously persisted measurement as returned by the order system
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteMeasurement {
    pub item_id: i64,
    pub weight: f64,
    #[serde(default)]
    pub color: f64,
    #[serde(default)]
    pub photo: Option<String>,
}

/// Material classification service
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Submit an image, receive candidate labels with confidences
    async fn predict(
        &self,
        image: &CapturedImage,
    ) -> Result<Vec<PredictionCandidate>, PredictionError>;
}

/// Photo color-comparison service
#[async_trait]
pub trait ColorAnalysisService: Send + Sync {
    /// Score the color divergence between the reference photo and the
    /// captured photo, in percent
    async fn compare(
        &self,
        reference_photo: &str,
        captured: &CapturedImage,
        material_code: &str,
    ) -> Result<f64, AnalysisError>;
}

/// Camera capture collaborator
#[async_trait]
pub trait CameraPort: Send + Sync {
    /// Trigger a capture; returns an image reference URL
    async fn capture(&self) -> Result<String, CameraError>;
}

/// Order-system persistence and query API
#[async_trait]
pub trait OrderService: Send + Sync {
    /// All purchase orders for the given date
    async fn get_orders(&self, date: NaiveDate) -> Result<Vec<Order>, OrderApiError>;

    /// Detailed orders for one supplier and date (raw payload,
    /// consumed read-only by the UI)
    async fn get_order_detail(
        &self,
        supplier_code: &str,
        date: NaiveDate,
    ) -> Result<serde_json::Value, OrderApiError>;

    /// Persist one measurement; returns the remote item id
    async fn create_measurement(
        &self,
        request: &CreateMeasurementRequest,
    ) -> Result<i64, OrderApiError>;

    /// Best-effort removal of a previously persisted measurement
    async fn remove_measurement(&self, item_id: i64) -> Result<(), OrderApiError>;

    /// Previously persisted measurements for one order line
    async fn get_measurements(
        &self,
        po_id: i64,
        product_id: i64,
    ) -> Result<Vec<RemoteMeasurement>, OrderApiError>;

    /// Submit one accept/return batch for one purchase order
    async fn submit_reconciliation(
        &self,
        request: &ReconcileRequest,
    ) -> Result<(), OrderApiError>;
}
