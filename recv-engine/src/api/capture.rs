//! Capture flow endpoints

use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::capture::CaptureState;
use crate::error::{ApiResult, EngineError};
use crate::models::{DeviationTier, Measurement};
use crate::AppState;
use recv_common::RecvEvent;

/// Draft or confirmed measurement as shown to the operator
#[derive(Debug, Serialize)]
pub struct MeasurementView {
    pub material_id: i64,
    pub material_code: String,
    pub material_name: String,
    pub unit: String,
    pub standard_quantity: f64,
    /// Acceptable quantity range from the material's allowed deviation
    pub allowed_band: (f64, f64),
    pub measured_quantity: f64,
    pub color_deviation_percent: f64,
    pub quantity_tier: DeviationTier,
    pub color_tier: DeviationTier,
    pub analysis_failed: bool,
    pub reference_photo: Option<String>,
    pub remote_id: Option<i64>,
}

impl MeasurementView {
    pub(crate) fn from_measurement(m: &Measurement) -> Self {
        Self {
            material_id: m.material.id,
            material_code: m.material.code.clone(),
            material_name: m.material.name.clone(),
            unit: m.material.unit.clone(),
            standard_quantity: m.material.standard_quantity,
            allowed_band: m.material.allowed_band(),
            measured_quantity: m.measured_quantity,
            color_deviation_percent: m.color_deviation_percent,
            quantity_tier: m.quantity_tier(),
            color_tier: m.color_tier(),
            analysis_failed: m.analysis_failed,
            reference_photo: m.reference_photo.clone(),
            remote_id: m.remote_id,
        }
    }
}

/// POST /capture request
#[derive(Debug, Default, Deserialize)]
pub struct StartCaptureRequest {
    /// Uploaded image payload (optionally a data URL); when present the
    /// camera is not consulted
    #[serde(default)]
    pub uploaded_image: Option<String>,
}

/// POST /capture response
#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub state: CaptureState,
    pub draft: MeasurementView,
}

/// POST /capture
///
/// Run one capture attempt through classification and color analysis,
/// leaving a draft measurement under review.
pub async fn start_capture(
    State(state): State<AppState>,
    Json(request): Json<StartCaptureRequest>,
) -> ApiResult<Json<CaptureResponse>> {
    let catalog = state.session.lock().await.catalog()?.clone();

    let draft = state
        .capture
        .start_capture(&catalog, request.uploaded_image, state.notifier.as_ref())
        .await?;

    Ok(Json(CaptureResponse {
        state: CaptureState::Reviewing,
        draft: MeasurementView::from_measurement(&draft),
    }))
}

/// POST /capture/material request
#[derive(Debug, Deserialize)]
pub struct OverrideMaterialRequest {
    pub material_id: i64,
}

/// POST /capture/material
///
/// Relabel the draft under review with another catalog material.
pub async fn override_material(
    State(state): State<AppState>,
    Json(request): Json<OverrideMaterialRequest>,
) -> ApiResult<Json<MeasurementView>> {
    let material = {
        let session = state.session.lock().await;
        session
            .catalog()?
            .by_id(request.material_id)
            .cloned()
            .ok_or(EngineError::UnknownMaterial(request.material_id))?
    };

    let draft = state.capture.override_material(material).await?;
    Ok(Json(MeasurementView::from_measurement(&draft)))
}

/// POST /capture/confirm
///
/// Persist the draft to the order system and append it to the ledger.
/// The session lock is held across the confirmation so no other ledger
/// mutation can interleave.
pub async fn confirm_capture(
    State(state): State<AppState>,
) -> ApiResult<Json<MeasurementView>> {
    let mut session = state.session.lock().await;
    let measurement = state.capture.confirm(session.active_orders()).await?;
    session.ledger_mut().append(measurement.clone());
    drop(session);

    state.event_bus.emit(RecvEvent::MeasurementRecorded {
        material_code: measurement.material.code.clone(),
        quantity: measurement.measured_quantity,
        color_deviation: measurement.color_deviation_percent,
        remote_id: measurement.remote_id,
        timestamp: Utc::now(),
    });

    Ok(Json(MeasurementView::from_measurement(&measurement)))
}

/// POST /capture/cancel
pub async fn cancel_capture(State(state): State<AppState>) -> ApiResult<Json<CaptureState>> {
    state.capture.cancel().await?;
    Ok(Json(CaptureState::Idle))
}

/// Build capture routes
pub fn capture_routes() -> Router<AppState> {
    Router::new()
        .route("/capture", post(start_capture))
        .route("/capture/material", post(override_material))
        .route("/capture/confirm", post(confirm_capture))
        .route("/capture/cancel", post(cancel_capture))
}
