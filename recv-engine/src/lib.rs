//! recv-engine library interface
//!
//! Measurement capture and reconciliation engine for warehouse
//! receiving: classifies incoming materials from photos, scores color
//! deviation, records weighed readings in a session ledger, and submits
//! accept/return batches to the external order system.

pub mod api;
pub mod capture;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod reconcile;
pub mod services;
pub mod session;
pub mod weight;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::capture::CaptureEngine;
use crate::reconcile::ReconciliationEngine;
use crate::services::OrderService;
use crate::session::ReceivingSession;
use crate::weight::{WeightFeed, WeightPublisher};
use recv_common::{EventBus, Notifier};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Operator notice sink (bus-backed in production)
    pub notifier: Arc<dyn Notifier>,
    /// Active receiving session; single-writer via this lock
    pub session: Arc<Mutex<ReceivingSession>>,
    /// Capture flow orchestrator
    pub capture: Arc<CaptureEngine>,
    /// Batch reconciliation
    pub reconcile: Arc<ReconciliationEngine>,
    /// Order-system client shared by handlers
    pub order_service: Arc<dyn OrderService>,
    /// Scale reading ingest
    pub weight_publisher: WeightPublisher,
    /// Latest scale reading for capture flows
    pub weight_feed: WeightFeed,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;
    use tower_http::{cors::CorsLayer, trace::TraceLayer};

    Router::new()
        .merge(api::session_routes())
        .merge(api::capture_routes())
        .merge(api::ledger_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        // Local-network UI access
        .layer(CorsLayer::permissive())
        .with_state(state)
}
