//! Ledger, reconciliation, and weight ingest endpoints

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::api::capture::MeasurementView;
use crate::error::ApiResult;
use crate::models::AggregateGroup;
use crate::reconcile::Disposition;
use crate::AppState;
use recv_common::{Notifier, RecvEvent, Severity};

/// One ledger entry with its operator-facing reading number
#[derive(Debug, Serialize)]
pub struct LedgerEntry {
    /// Zero-based position; reading #n is index + 1
    pub index: usize,
    #[serde(flatten)]
    pub measurement: MeasurementView,
    pub timestamp: chrono::DateTime<Utc>,
}

/// GET /ledger
pub async fn list_ledger(State(state): State<AppState>) -> Json<Vec<LedgerEntry>> {
    let session = state.session.lock().await;
    let entries = session
        .ledger()
        .entries()
        .iter()
        .enumerate()
        .map(|(index, m)| LedgerEntry {
            index,
            measurement: MeasurementView::from_measurement(m),
            timestamp: m.timestamp,
        })
        .collect();
    Json(entries)
}

/// One material's aggregate for the finalize review
#[derive(Debug, Serialize)]
pub struct GroupView {
    #[serde(flatten)]
    pub aggregate: AggregateGroup,
    /// Acceptable total range from the material's allowed deviation,
    /// scaled by the reading count
    pub allowed_band: (f64, f64),
}

/// GET /ledger/groups
///
/// Per-material aggregates, recomputed from the current ledger.
pub async fn ledger_groups(State(state): State<AppState>) -> Json<Vec<GroupView>> {
    let groups = state
        .session
        .lock()
        .await
        .ledger()
        .aggregates()
        .into_iter()
        .map(|aggregate| {
            let (low, high) = aggregate.material.allowed_band();
            let count = aggregate.count as f64;
            GroupView {
                allowed_band: (low * count, high * count),
                aggregate,
            }
        })
        .collect();
    Json(groups)
}

/// DELETE /ledger/:index response
#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub index: usize,
    pub material_code: String,
    /// Outcome of the paired remote delete: `None` when the entry was
    /// never persisted, `Some(false)` when the delete failed. The local
    /// entry is gone either way.
    pub remote_deleted: Option<bool>,
}

/// DELETE /ledger/:index
///
/// Remove one reading. A persisted reading also gets a best-effort
/// remote delete; remote failure raises a notice but never restores
/// the local entry.
pub async fn remove_measurement(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> ApiResult<Json<RemoveResponse>> {
    let mut session = state.session.lock().await;
    let removed = session.ledger_mut().remove_at(index)?;

    let remote_deleted = match removed.remote_id {
        Some(remote_id) => match state.order_service.remove_measurement(remote_id).await {
            Ok(()) => Some(true),
            Err(e) => {
                tracing::warn!(remote_id, error = %e, "Remote measurement delete failed");
                state.notifier.notify(
                    "The reading was removed locally but the order system still holds it",
                    Severity::Warning,
                );
                Some(false)
            }
        },
        None => None,
    };
    drop(session);

    state.event_bus.emit(RecvEvent::MeasurementRemoved {
        index,
        material_code: removed.material.code.clone(),
        remote_deleted,
    });

    Ok(Json(RemoveResponse {
        index,
        material_code: removed.material.code,
        remote_deleted,
    }))
}

/// POST /reconcile request
#[derive(Debug, Deserialize)]
pub struct ReconcileRequestBody {
    pub dispositions: Vec<DispositionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct DispositionEntry {
    pub material_id: i64,
    pub disposition: Disposition,
}

/// POST /reconcile response
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub po_ids: Vec<i64>,
    pub item_count: usize,
}

/// POST /reconcile
///
/// Submit the finalize batch. All requests must succeed before the
/// ledger is cleared; any failure leaves it untouched for a retry.
pub async fn reconcile(
    State(state): State<AppState>,
    Json(body): Json<ReconcileRequestBody>,
) -> ApiResult<Json<ReconcileResponse>> {
    let dispositions: HashMap<i64, Disposition> = body
        .dispositions
        .into_iter()
        .map(|entry| (entry.material_id, entry.disposition))
        .collect();

    let mut session = state.session.lock().await;
    let requests = state
        .reconcile
        .plan(session.ledger(), session.active_orders(), &dispositions)?;
    let item_count = requests.iter().map(|r| r.items.len()).sum();

    let po_ids = state.reconcile.submit(&requests).await?;
    session.ledger_mut().clear();
    drop(session);

    state.event_bus.emit(RecvEvent::ReconciliationSubmitted {
        po_ids: po_ids.clone(),
        item_count,
        timestamp: Utc::now(),
    });
    state.event_bus.emit(RecvEvent::LedgerCleared {
        reason: "reconciliation".to_string(),
    });
    state
        .notifier
        .notify("Receiving batch submitted", Severity::Success);

    Ok(Json(ReconcileResponse { po_ids, item_count }))
}

/// POST /weight request
#[derive(Debug, Deserialize)]
pub struct WeightReading {
    /// Raw scale reading in grams
    pub grams: f64,
}

/// POST /weight
///
/// Scale gateway push endpoint; the latest reading feeds capture flows.
pub async fn push_weight(
    State(state): State<AppState>,
    Json(reading): Json<WeightReading>,
) -> Json<serde_json::Value> {
    state.weight_publisher.publish(reading.grams);
    Json(serde_json::json!({ "accepted": true }))
}

/// Build ledger and reconciliation routes
pub fn ledger_routes() -> Router<AppState> {
    Router::new()
        .route("/ledger", get(list_ledger))
        .route("/ledger/groups", get(ledger_groups))
        .route("/ledger/:index", delete(remove_measurement))
        .route("/reconcile", post(reconcile))
        .route("/weight", post(push_weight))
}
