//! Session and supplier management endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::capture::CaptureState;
use crate::error::{ApiError, ApiResult};
use crate::models::Supplier;
use crate::session::SwitchOutcome;
use crate::AppState;
use recv_common::RecvEvent;

/// GET /session response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: uuid::Uuid,
    pub date: NaiveDate,
    pub active_supplier: Option<Supplier>,
    pub pending_switch: Option<String>,
    pub capture_state: CaptureState,
    pub catalog_size: usize,
    pub ledger_size: usize,
}

/// GET /session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let session = state.session.lock().await;
    Json(SessionResponse {
        session_id: session.id(),
        date: session.date(),
        active_supplier: session.active_supplier().cloned(),
        pending_switch: session.pending_switch().map(str::to_string),
        capture_state: state.capture.state().await,
        catalog_size: session.catalog().map(|c| c.len()).unwrap_or(0),
        ledger_size: session.ledger().len(),
    })
}

/// POST /session/orders/refresh response
#[derive(Debug, Serialize)]
pub struct RefreshOrdersResponse {
    pub date: NaiveDate,
    pub order_count: usize,
    pub supplier_count: usize,
}

/// POST /session/orders/refresh
///
/// Reload the day's purchase orders from the order system. The active
/// supplier's catalog is rebuilt from the fresh orders.
pub async fn refresh_orders(
    State(state): State<AppState>,
) -> ApiResult<Json<RefreshOrdersResponse>> {
    let date = state.session.lock().await.date();
    let orders = state.order_service.get_orders(date).await?;
    let order_count = orders.len();

    let mut session = state.session.lock().await;
    session.load_orders(orders);
    Ok(Json(RefreshOrdersResponse {
        date,
        order_count,
        supplier_count: session.suppliers().len(),
    }))
}

/// GET /session/suppliers
pub async fn list_suppliers(State(state): State<AppState>) -> Json<Vec<Supplier>> {
    Json(state.session.lock().await.suppliers())
}

/// POST /session/supplier request
#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    pub supplier_code: String,
}

/// POST /session/supplier
///
/// Request a supplier switch. With a non-empty ledger the response asks
/// for confirmation instead of switching.
pub async fn switch_supplier(
    State(state): State<AppState>,
    Json(request): Json<SwitchRequest>,
) -> ApiResult<Json<SwitchOutcome>> {
    let mut session = state.session.lock().await;
    let outcome = session.request_switch(&request.supplier_code)?;
    drop(session);

    publish_switch_outcome(&state, &outcome).await;
    Ok(Json(outcome))
}

/// POST /session/supplier/confirm request
#[derive(Debug, Deserialize)]
pub struct ConfirmSwitchRequest {
    pub accept: bool,
}

/// POST /session/supplier/confirm
pub async fn confirm_switch(
    State(state): State<AppState>,
    Json(request): Json<ConfirmSwitchRequest>,
) -> ApiResult<Json<SwitchOutcome>> {
    let mut session = state.session.lock().await;
    let outcome = session.confirm_switch(request.accept)?;
    drop(session);

    publish_switch_outcome(&state, &outcome).await;
    Ok(Json(outcome))
}

/// Emit the events an applied or pending switch implies, and reset any
/// in-flight capture when the supplier actually changed
async fn publish_switch_outcome(state: &AppState, outcome: &SwitchOutcome) {
    match outcome {
        SwitchOutcome::Switched { supplier_code } => {
            // Abandon a draft under review; a fresh supplier starts at Idle
            let _ = state.capture.cancel().await;
            state.event_bus.emit(RecvEvent::LedgerCleared {
                reason: "supplier switch".to_string(),
            });
            state.event_bus.emit(RecvEvent::SupplierChanged {
                supplier_code: supplier_code.clone(),
                timestamp: Utc::now(),
            });
        }
        SwitchOutcome::ConfirmationRequired {
            current_code,
            requested_code,
        } => {
            state.event_bus.emit(RecvEvent::SupplierSwitchPending {
                current_code: current_code.clone(),
                requested_code: requested_code.clone(),
            });
        }
        SwitchOutcome::Unchanged { .. } | SwitchOutcome::Reverted { .. } => {}
    }
}

/// GET /orders/detail query
#[derive(Debug, Deserialize)]
pub struct OrderDetailQuery {
    pub supplier_code: String,
    pub date: Option<NaiveDate>,
}

/// GET /orders/detail
///
/// Raw order detail payload for one supplier, passed through for the
/// UI's order view.
pub async fn order_detail(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<OrderDetailQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let date = match query.date {
        Some(date) => date,
        None => state.session.lock().await.date(),
    };
    let detail = state
        .order_service
        .get_order_detail(&query.supplier_code, date)
        .await?;
    Ok(Json(detail))
}

/// GET /orders/measurements query
#[derive(Debug, Deserialize)]
pub struct RemoteMeasurementsQuery {
    pub po_id: i64,
    pub product_id: i64,
}

/// GET /orders/measurements
///
/// Measurements already persisted in the order system for one line.
pub async fn remote_measurements(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<RemoteMeasurementsQuery>,
) -> ApiResult<Json<Vec<crate::services::RemoteMeasurement>>> {
    if query.po_id <= 0 || query.product_id <= 0 {
        return Err(ApiError::BadRequest(
            "po_id and product_id must be positive".to_string(),
        ));
    }
    let measurements = state
        .order_service
        .get_measurements(query.po_id, query.product_id)
        .await?;
    Ok(Json(measurements))
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(get_session))
        .route("/session/orders/refresh", post(refresh_orders))
        .route("/session/suppliers", get(list_suppliers))
        .route("/session/supplier", post(switch_supplier))
        .route("/session/supplier/confirm", post(confirm_switch))
        .route("/orders/detail", get(order_detail))
        .route("/orders/measurements", get(remote_measurements))
}
