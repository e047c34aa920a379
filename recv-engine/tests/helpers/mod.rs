//! Shared fixtures for integration tests: in-process fakes for the
//! external services and an engine wired from them.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

use recv_common::{BusNotifier, EventBus};
use recv_engine::capture::CaptureEngine;
use recv_engine::classifier::{Classifier, RandomSource};
use recv_engine::models::{CapturedImage, Order, OrderLineItem};
use recv_engine::reconcile::ReconciliationEngine;
use recv_engine::services::{
    AnalysisError, CameraError, CameraPort, ColorAnalysisService, CreateMeasurementRequest,
    OrderApiError, OrderService, PredictionCandidate, PredictionError, PredictionService,
    ReconcileRequest, RemoteMeasurement,
};
use recv_engine::session::ReceivingSession;
use recv_engine::weight::{weight_channel, WeightPublisher};
use recv_engine::AppState;

pub fn session_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 27).unwrap()
}

pub fn line_item(product_id: i64, code: &str, standard_quantity: f64) -> OrderLineItem {
    OrderLineItem {
        product_id,
        product_code: code.to_string(),
        product_name: format!("Material {}", product_id),
        unit: "kg".to_string(),
        standard_quantity,
        allowed_deviation_percent: Some(1.0),
        reference_photo: Some(format!("https://img.example.com/{}.jpg", code)),
    }
}

pub fn sample_orders() -> Vec<Order> {
    vec![
        Order {
            po_id: 31,
            supplier_id: 1,
            supplier_code: "NCC_MEAT".to_string(),
            supplier_name: "CTY Meat".to_string(),
            line_items: vec![
                line_item(7, "NVL_THIT001", 8.0),
                line_item(8, "NVL_THIT002", 5.0),
            ],
        },
        Order {
            po_id: 40,
            supplier_id: 2,
            supplier_code: "NCC_FISH".to_string(),
            supplier_name: "CTY Fish".to_string(),
            line_items: vec![line_item(20, "NVL_HS004", 3.0)],
        },
    ]
}

pub fn candidate(class: &str, confidence: f64) -> PredictionCandidate {
    PredictionCandidate {
        class: class.to_string(),
        confidence,
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    }
}

/// Prediction fake returning a fixed candidate list
pub struct FakeVision {
    pub candidates: Mutex<Vec<PredictionCandidate>>,
}

impl FakeVision {
    pub fn returning(candidates: Vec<PredictionCandidate>) -> Arc<Self> {
        Arc::new(Self {
            candidates: Mutex::new(candidates),
        })
    }
}

#[async_trait]
impl PredictionService for FakeVision {
    async fn predict(
        &self,
        _image: &CapturedImage,
    ) -> Result<Vec<PredictionCandidate>, PredictionError> {
        Ok(self.candidates.lock().unwrap().clone())
    }
}

/// Color analysis fake returning a fixed deviation
pub struct FakeAnalysis(pub f64);

#[async_trait]
impl ColorAnalysisService for FakeAnalysis {
    async fn compare(
        &self,
        _reference_photo: &str,
        _captured: &CapturedImage,
        _material_code: &str,
    ) -> Result<f64, AnalysisError> {
        Ok(self.0)
    }
}

pub struct FakeCamera;

#[async_trait]
impl CameraPort for FakeCamera {
    async fn capture(&self) -> Result<String, CameraError> {
        Ok("http://cam/shot.jpg".to_string())
    }
}

/// Order-system fake recording every mutation
pub struct FakeOrders {
    pub orders: Mutex<Vec<Order>>,
    pub created: Mutex<Vec<CreateMeasurementRequest>>,
    pub removed: Mutex<Vec<i64>>,
    pub submitted: Mutex<Vec<ReconcileRequest>>,
    pub next_item_id: AtomicI64,
    pub fail_remove: AtomicBool,
    pub fail_submit: AtomicBool,
}

impl FakeOrders {
    pub fn with_orders(orders: Vec<Order>) -> Arc<Self> {
        Arc::new(Self {
            orders: Mutex::new(orders),
            created: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            next_item_id: AtomicI64::new(991),
            fail_remove: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl OrderService for FakeOrders {
    async fn get_orders(&self, _date: NaiveDate) -> Result<Vec<Order>, OrderApiError> {
        Ok(self.orders.lock().unwrap().clone())
    }

    async fn get_order_detail(
        &self,
        supplier_code: &str,
        _date: NaiveDate,
    ) -> Result<serde_json::Value, OrderApiError> {
        Ok(serde_json::json!({ "supplier": supplier_code }))
    }

    async fn create_measurement(
        &self,
        request: &CreateMeasurementRequest,
    ) -> Result<i64, OrderApiError> {
        self.created.lock().unwrap().push(request.clone());
        Ok(self.next_item_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn remove_measurement(&self, item_id: i64) -> Result<(), OrderApiError> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(OrderApiError::Api(500, "remove failed".to_string()));
        }
        self.removed.lock().unwrap().push(item_id);
        Ok(())
    }

    async fn get_measurements(
        &self,
        _po_id: i64,
        _product_id: i64,
    ) -> Result<Vec<RemoteMeasurement>, OrderApiError> {
        Ok(self
            .created
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, c)| RemoteMeasurement {
                item_id: 991 + i as i64,
                weight: c.weight,
                color: c.color,
                photo: None,
            })
            .collect())
    }

    async fn submit_reconciliation(
        &self,
        request: &ReconcileRequest,
    ) -> Result<(), OrderApiError> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(OrderApiError::Api(500, "submit failed".to_string()));
        }
        self.submitted.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// Deterministic random source replaying a fixed sequence
pub struct SeqRandom {
    values: Vec<f64>,
    cursor: Mutex<usize>,
}

impl SeqRandom {
    pub fn new(values: Vec<f64>) -> Arc<Self> {
        Arc::new(Self {
            values,
            cursor: Mutex::new(0),
        })
    }
}

impl RandomSource for SeqRandom {
    fn next_f64(&self) -> f64 {
        let mut cursor = self.cursor.lock().unwrap();
        let value = self.values[*cursor % self.values.len()];
        *cursor += 1;
        value
    }
}

pub struct TestHarness {
    pub state: AppState,
    pub orders: Arc<FakeOrders>,
    pub vision: Arc<FakeVision>,
    pub weight_publisher: WeightPublisher,
}

/// Wire an AppState from fakes; orders are preloaded for the test date
pub fn build_state(
    vision: Arc<FakeVision>,
    analysis: FakeAnalysis,
    orders: Arc<FakeOrders>,
    random: Arc<dyn RandomSource>,
) -> TestHarness {
    let event_bus = EventBus::new(64);
    let notifier = Arc::new(BusNotifier::new(event_bus.clone()));
    let (weight_publisher, weight_feed) = weight_channel(event_bus.clone());

    let capture = Arc::new(CaptureEngine::new(
        Classifier::new(vision.clone(), random.clone()),
        Arc::new(analysis),
        Arc::new(FakeCamera),
        orders.clone(),
        weight_feed.clone(),
        random,
    ));
    let reconcile = Arc::new(ReconciliationEngine::new(orders.clone()));

    let mut session = ReceivingSession::new(session_date());
    session.load_orders(orders.orders.lock().unwrap().clone());

    let state = AppState {
        event_bus,
        notifier,
        session: Arc::new(AsyncMutex::new(session)),
        capture,
        reconcile,
        order_service: orders.clone(),
        weight_publisher: weight_publisher.clone(),
        weight_feed,
        startup_time: chrono::Utc::now(),
    };

    TestHarness {
        state,
        orders,
        vision,
        weight_publisher,
    }
}
