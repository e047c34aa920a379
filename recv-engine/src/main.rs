//! recv-engine - Warehouse receiving engine service
//!
//! Captures material photos, classifies them against the day's
//! purchase orders, scores color deviation, and reconciles the
//! session's readings with the external order system.

use anyhow::Result;
use chrono::{Local, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use recv_common::{BusNotifier, EventBus};
use recv_engine::capture::CaptureEngine;
use recv_engine::classifier::{Classifier, ThreadRngSource};
use recv_engine::config::EngineConfig;
use recv_engine::reconcile::ReconciliationEngine;
use recv_engine::services::{
    ColorAnalysisClient, OrderService, OrderSystemClient, RtspCameraClient, VisionClient,
};
use recv_engine::session::ReceivingSession;
use recv_engine::weight::weight_channel;
use recv_engine::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting recv-engine (warehouse receiving)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load()?;

    let event_bus = EventBus::new(100);
    let notifier = Arc::new(BusNotifier::new(event_bus.clone()));

    let order_service: Arc<dyn OrderService> = Arc::new(
        OrderSystemClient::new(config.order_api_base_url.clone())
            .map_err(|e| anyhow::anyhow!("order client init failed: {}", e))?,
    );
    let vision = Arc::new(
        VisionClient::new(
            config.prediction_model_url.clone(),
            config.prediction_api_key.clone(),
        )
        .map_err(|e| anyhow::anyhow!("vision client init failed: {}", e))?,
    );
    let color = Arc::new(
        ColorAnalysisClient::new(config.analysis_base_url.clone())
            .map_err(|e| anyhow::anyhow!("analysis client init failed: {}", e))?,
    );
    let camera = Arc::new(
        RtspCameraClient::new(config.analysis_base_url.clone(), config.rtsp_url.clone())
            .map_err(|e| anyhow::anyhow!("camera client init failed: {}", e))?,
    );

    let (weight_publisher, weight_feed) = weight_channel(event_bus.clone());
    let random = Arc::new(ThreadRngSource);

    let capture = Arc::new(CaptureEngine::new(
        Classifier::new(vision, random.clone()),
        color,
        camera,
        order_service.clone(),
        weight_feed.clone(),
        random,
    ));
    let reconcile = Arc::new(ReconciliationEngine::new(order_service.clone()));

    let today = Local::now().date_naive();
    let mut session = ReceivingSession::new(today);

    // Best effort preload; the UI can refresh later if the order system
    // is not reachable yet
    match order_service.get_orders(today).await {
        Ok(orders) => {
            info!(count = orders.len(), %today, "Purchase orders preloaded");
            session.load_orders(orders);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Order preload failed, starting with an empty day");
        }
    }

    let state = AppState {
        event_bus,
        notifier,
        session: Arc::new(Mutex::new(session)),
        capture,
        reconcile,
        order_service,
        weight_publisher,
        weight_feed,
        startup_time: Utc::now(),
    };

    let app = recv_engine::build_router(state);

    let addr = format!("127.0.0.1:{}", config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
