//! Measurement capture flow
//!
//! State machine driving one capture attempt from image acquisition
//! through classification, color analysis, operator review, and remote
//! persistence. Exactly one flow may be in flight at a time.

use crate::catalog::Catalog;
use crate::classifier::{Classifier, RandomSource};
use crate::config::COLOR_ANALYSIS_TIMEOUT;
use crate::error::EngineError;
use crate::models::{CapturedImage, Material, Measurement, Order};
use crate::reconcile::resolve_po_id;
use crate::services::{CameraPort, ColorAnalysisService, CreateMeasurementRequest, OrderService};
use crate::weight::{convert_grams, WeightFeed};
use recv_common::{Notifier, Severity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Capture flow states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing,
    Classifying,
    Analyzing,
    Reviewing,
    Confirmed,
    Cancelled,
}

impl CaptureState {
    /// Whether a transition to `next` is allowed
    pub fn can_transition_to(&self, next: CaptureState) -> bool {
        use CaptureState::*;
        matches!(
            (self, next),
            (Idle, Capturing)
                | (Capturing, Classifying)
                | (Classifying, Analyzing)
                | (Analyzing, Reviewing)
                | (Reviewing, Confirmed)
                | (Reviewing, Cancelled)
                | (Confirmed, Idle)
                | (Cancelled, Idle)
                // Acquisition and service failures abandon the attempt
                | (Capturing, Idle)
                | (Classifying, Idle)
                | (Analyzing, Idle)
        )
    }
}

/// One capture attempt's state and, once reviewing, its draft
#[derive(Debug, Default)]
struct CaptureFlow {
    state: CaptureState,
    draft: Option<Measurement>,
}

impl CaptureFlow {
    fn transition_to(&mut self, next: CaptureState) -> Result<(), EngineError> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::InvalidState(format!(
                "cannot move from {:?} to {:?}",
                self.state, next
            )));
        }
        tracing::debug!(from = ?self.state, to = ?next, "Capture state transition");
        self.state = next;
        Ok(())
    }

    fn reset(&mut self) {
        self.state = CaptureState::Idle;
        self.draft = None;
    }
}

/// Orchestrates classification, color analysis, and weight sampling
/// into a reviewable measurement
pub struct CaptureEngine {
    flow: Mutex<CaptureFlow>,
    classifier: Classifier,
    color_service: Arc<dyn ColorAnalysisService>,
    camera: Arc<dyn CameraPort>,
    order_service: Arc<dyn OrderService>,
    weight_feed: WeightFeed,
    random: Arc<dyn RandomSource>,
}

impl CaptureEngine {
    pub fn new(
        classifier: Classifier,
        color_service: Arc<dyn ColorAnalysisService>,
        camera: Arc<dyn CameraPort>,
        order_service: Arc<dyn OrderService>,
        weight_feed: WeightFeed,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            flow: Mutex::new(CaptureFlow::default()),
            classifier,
            color_service,
            camera,
            order_service,
            weight_feed,
            random,
        }
    }

    pub async fn state(&self) -> CaptureState {
        self.flow.lock().await.state
    }

    /// Draft measurement awaiting review, if any
    pub async fn current_draft(&self) -> Option<Measurement> {
        self.flow.lock().await.draft.clone()
    }

    /// Run one capture attempt through to `Reviewing`
    ///
    /// An uploaded image always wins over camera capture for the
    /// attempt. The flow lock is held for the whole attempt, so a
    /// second caller gets `CaptureInProgress` instead of interleaving.
    pub async fn start_capture(
        &self,
        catalog: &Catalog,
        uploaded: Option<String>,
        notifier: &dyn Notifier,
    ) -> Result<Measurement, EngineError> {
        let mut flow = self
            .flow
            .try_lock()
            .map_err(|_| EngineError::CaptureInProgress)?;
        if flow.state != CaptureState::Idle {
            return Err(EngineError::CaptureInProgress);
        }
        flow.transition_to(CaptureState::Capturing)?;

        match self.run_attempt(&mut flow, catalog, uploaded, notifier).await {
            Ok(draft) => Ok(draft),
            Err(e) => {
                // Abandon the attempt so the next capture can start
                flow.reset();
                Err(e)
            }
        }
    }

    async fn run_attempt(
        &self,
        flow: &mut CaptureFlow,
        catalog: &Catalog,
        uploaded: Option<String>,
        notifier: &dyn Notifier,
    ) -> Result<Measurement, EngineError> {
        let image = match uploaded {
            Some(payload) => CapturedImage::from_upload(&payload),
            None => CapturedImage::Reference(self.camera.capture().await?),
        };

        flow.transition_to(CaptureState::Classifying)?;
        let classification = self.classifier.classify(&image, catalog, notifier).await?;
        let material = classification.material;

        flow.transition_to(CaptureState::Analyzing)?;
        let (color_deviation, analysis_failed) =
            self.analyze_color(&material, &image, notifier).await;

        let measured_quantity = self.sample_quantity(&material);

        let draft = Measurement::new(
            material.clone(),
            measured_quantity,
            color_deviation,
            material.reference_photo.clone(),
            image,
            analysis_failed,
        );

        flow.transition_to(CaptureState::Reviewing)?;
        flow.draft = Some(draft.clone());

        tracing::info!(
            material_code = %material.code,
            measured_quantity,
            color_deviation,
            analysis_failed,
            "Capture ready for review"
        );
        Ok(draft)
    }

    /// Color comparison with a hard deadline; failure degrades to a
    /// zero deviation instead of blocking the flow
    async fn analyze_color(
        &self,
        material: &Material,
        image: &CapturedImage,
        notifier: &dyn Notifier,
    ) -> (f64, bool) {
        // No reference photo means no comparison is possible; the
        // reading is recorded as degraded rather than blocked
        let Some(reference_photo) = material.reference_photo.as_deref() else {
            tracing::debug!(material_code = %material.code, "No reference photo, skipping color analysis");
            return (0.0, true);
        };

        let comparison = tokio::time::timeout(
            COLOR_ANALYSIS_TIMEOUT,
            self.color_service.compare(reference_photo, image, &material.code),
        )
        .await;

        match comparison {
            Ok(Ok(color_difference)) => (color_difference, false),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Color analysis failed");
                notifier.notify(
                    "Color comparison failed, deviation recorded as 0%",
                    Severity::Warning,
                );
                (0.0, true)
            }
            Err(_) => {
                tracing::warn!("Color analysis exceeded its deadline");
                notifier.notify(
                    "Color comparison timed out, deviation recorded as 0%",
                    Severity::Warning,
                );
                (0.0, true)
            }
        }
    }

    /// Latest scale reading converted to the material's unit; without a
    /// live scale, the standard quantity with small jitter stands in
    fn sample_quantity(&self, material: &Material) -> f64 {
        match self.weight_feed.latest_grams() {
            Some(grams) => convert_grams(grams, &material.unit),
            None => {
                let jitter = (self.random.next_f64() - 0.5) * 0.2;
                material.standard_quantity + jitter
            }
        }
    }

    /// Relabel the draft with another catalog material
    ///
    /// Does not re-run classification or color analysis; only the
    /// material reference changes.
    pub async fn override_material(&self, material: Material) -> Result<Measurement, EngineError> {
        let mut flow = self.flow.lock().await;
        if flow.state != CaptureState::Reviewing {
            return Err(EngineError::InvalidState(format!(
                "cannot relabel in {:?}",
                flow.state
            )));
        }
        let draft = flow
            .draft
            .as_mut()
            .ok_or_else(|| EngineError::InvalidState("no draft under review".to_string()))?;

        tracing::info!(
            from = %draft.material.code,
            to = %material.code,
            "Draft relabelled by operator"
        );
        draft.reference_photo = material.reference_photo.clone();
        draft.material = material;
        Ok(draft.clone())
    }

    /// Persist the draft and hand it back for ledger entry
    ///
    /// Persistence failure leaves the flow in `Reviewing` so the
    /// operator can retry or cancel; nothing enters the ledger.
    pub async fn confirm(&self, orders: &[Order]) -> Result<Measurement, EngineError> {
        let mut flow = self.flow.lock().await;
        if flow.state != CaptureState::Reviewing {
            return Err(EngineError::InvalidState(format!(
                "cannot confirm in {:?}",
                flow.state
            )));
        }
        let mut measurement = flow
            .draft
            .clone()
            .ok_or_else(|| EngineError::InvalidState("no draft under review".to_string()))?;

        let po_id = resolve_po_id(orders, measurement.material.id)?;

        let request = CreateMeasurementRequest {
            po_id,
            product_id: measurement.material.id,
            weight: measurement.measured_quantity,
            photo: measurement.captured_photo.clone(),
            color: measurement.color_deviation_percent,
        };
        let remote_id = self.order_service.create_measurement(&request).await?;

        measurement.remote_id = Some(remote_id);
        flow.transition_to(CaptureState::Confirmed)?;
        flow.reset();

        tracing::info!(
            material_code = %measurement.material.code,
            remote_id,
            "Measurement confirmed"
        );
        Ok(measurement)
    }

    /// Abandon the draft under review
    pub async fn cancel(&self) -> Result<(), EngineError> {
        let mut flow = self.flow.lock().await;
        flow.transition_to(CaptureState::Cancelled)?;
        flow.reset();
        tracing::info!("Capture cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        AnalysisError, CameraError, OrderApiError, PredictionCandidate, PredictionError,
        PredictionService, ReconcileRequest, RemoteMeasurement,
    };
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use recv_common::MemoryNotifier;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct FixedPredictions(Vec<PredictionCandidate>);

    #[async_trait]
    impl PredictionService for FixedPredictions {
        async fn predict(
            &self,
            _image: &CapturedImage,
        ) -> Result<Vec<PredictionCandidate>, PredictionError> {
            Ok(self.0.clone())
        }
    }

    enum FakeAnalysis {
        Fixed(f64),
        Hang,
        Fail,
    }

    #[async_trait]
    impl ColorAnalysisService for FakeAnalysis {
        async fn compare(
            &self,
            _reference_photo: &str,
            _captured: &CapturedImage,
            _material_code: &str,
        ) -> Result<f64, AnalysisError> {
            match self {
                FakeAnalysis::Fixed(value) => Ok(*value),
                FakeAnalysis::Hang => {
                    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                    Ok(0.0)
                }
                FakeAnalysis::Fail => Err(AnalysisError::Network("down".to_string())),
            }
        }
    }

    struct FakeCamera(Result<String, ()>);

    #[async_trait]
    impl CameraPort for FakeCamera {
        async fn capture(&self) -> Result<String, CameraError> {
            self.0
                .clone()
                .map_err(|_| CameraError::Failed("stream offline".to_string()))
        }
    }

    struct FakeOrders {
        next_item_id: AtomicI64,
        fail_create: bool,
    }

    impl FakeOrders {
        fn new() -> Self {
            Self {
                next_item_id: AtomicI64::new(991),
                fail_create: false,
            }
        }

        fn failing() -> Self {
            Self {
                next_item_id: AtomicI64::new(991),
                fail_create: true,
            }
        }
    }

    #[async_trait]
    impl OrderService for FakeOrders {
        async fn get_orders(&self, _date: NaiveDate) -> Result<Vec<Order>, OrderApiError> {
            Ok(vec![])
        }

        async fn get_order_detail(
            &self,
            _supplier_code: &str,
            _date: NaiveDate,
        ) -> Result<serde_json::Value, OrderApiError> {
            Ok(serde_json::Value::Null)
        }

        async fn create_measurement(
            &self,
            _request: &CreateMeasurementRequest,
        ) -> Result<i64, OrderApiError> {
            if self.fail_create {
                return Err(OrderApiError::Api(500, "boom".to_string()));
            }
            Ok(self.next_item_id.fetch_add(1, Ordering::SeqCst))
        }

        async fn remove_measurement(&self, _item_id: i64) -> Result<(), OrderApiError> {
            Ok(())
        }

        async fn get_measurements(
            &self,
            _po_id: i64,
            _product_id: i64,
        ) -> Result<Vec<RemoteMeasurement>, OrderApiError> {
            Ok(vec![])
        }

        async fn submit_reconciliation(
            &self,
            _request: &ReconcileRequest,
        ) -> Result<(), OrderApiError> {
            Ok(())
        }
    }

    struct HalfSource;

    impl RandomSource for HalfSource {
        fn next_f64(&self) -> f64 {
            0.5
        }
    }

    fn material(id: i64, code: &str, reference_photo: Option<&str>) -> Material {
        Material {
            id,
            code: code.to_string(),
            name: format!("Material {}", id),
            unit: "kg".to_string(),
            standard_quantity: 8.0,
            allowed_deviation_percent: 1.0,
            reference_photo: reference_photo.map(str::to_string),
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            material(7, "NVL_THIT001", Some("https://img.example.com/thit_bo.jpg")),
            material(8, "NVL_HS004", None),
        ])
    }

    fn orders() -> Vec<Order> {
        vec![Order {
            po_id: 31,
            supplier_id: 1,
            supplier_code: "NCC_MEAT".to_string(),
            supplier_name: "CTY Meat".to_string(),
            line_items: vec![crate::models::OrderLineItem {
                product_id: 7,
                product_code: "NVL_THIT001".to_string(),
                product_name: "Thịt bò".to_string(),
                unit: "kg".to_string(),
                standard_quantity: 8.0,
                allowed_deviation_percent: Some(1.0),
                reference_photo: Some("https://img.example.com/thit_bo.jpg".to_string()),
            }],
        }]
    }

    fn candidate(class: &str, confidence: f64) -> PredictionCandidate {
        PredictionCandidate {
            class: class.to_string(),
            confidence,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        }
    }

    fn engine(analysis: FakeAnalysis, orders: FakeOrders) -> CaptureEngine {
        let bus = recv_common::EventBus::new(16);
        let (_publisher, feed) = crate::weight::weight_channel(bus);
        CaptureEngine::new(
            Classifier::new(
                Arc::new(FixedPredictions(vec![candidate("NVL_THIT001_THIT_BO", 0.91)])),
                Arc::new(HalfSource),
            ),
            Arc::new(analysis),
            Arc::new(FakeCamera(Ok("http://cam/shot.jpg".to_string()))),
            Arc::new(orders),
            feed,
            Arc::new(HalfSource),
        )
    }

    #[test]
    fn transition_table_rejects_skips() {
        use CaptureState::*;
        assert!(Idle.can_transition_to(Capturing));
        assert!(Reviewing.can_transition_to(Cancelled));
        assert!(!Idle.can_transition_to(Reviewing));
        assert!(!Confirmed.can_transition_to(Reviewing));
        assert!(!Analyzing.can_transition_to(Confirmed));
    }

    #[tokio::test]
    async fn full_flow_reaches_reviewing_then_confirmed() {
        let engine = engine(FakeAnalysis::Fixed(3.2), FakeOrders::new());
        let notifier = MemoryNotifier::default();

        let draft = engine
            .start_capture(&catalog(), None, &notifier)
            .await
            .unwrap();
        assert_eq!(engine.state().await, CaptureState::Reviewing);
        assert_eq!(draft.material.id, 7);
        assert!((draft.color_deviation_percent - 3.2).abs() < 1e-9);
        assert!(!draft.analysis_failed);
        // Jitter fallback at r = 0.5 lands exactly on the standard
        assert!((draft.measured_quantity - 8.0).abs() < 1e-9);

        let confirmed = engine.confirm(&orders()).await.unwrap();
        assert_eq!(confirmed.remote_id, Some(991));
        assert_eq!(engine.state().await, CaptureState::Idle);
        assert!(engine.current_draft().await.is_none());
    }

    #[tokio::test]
    async fn uploaded_image_wins_over_camera() {
        let bus = recv_common::EventBus::new(16);
        let (_publisher, feed) = crate::weight::weight_channel(bus);
        let engine = CaptureEngine::new(
            Classifier::new(
                Arc::new(FixedPredictions(vec![candidate("NVL_THIT001_THIT_BO", 0.91)])),
                Arc::new(HalfSource),
            ),
            Arc::new(FakeAnalysis::Fixed(0.0)),
            // Camera would fail if consulted
            Arc::new(FakeCamera(Err(()))),
            Arc::new(FakeOrders::new()),
            feed,
            Arc::new(HalfSource),
        );
        let notifier = MemoryNotifier::default();

        let draft = engine
            .start_capture(&catalog(), Some("data:image/jpeg;base64,AAAA".to_string()), &notifier)
            .await
            .unwrap();
        assert_eq!(draft.captured_photo.as_str(), "AAAA");
    }

    #[tokio::test]
    async fn camera_failure_abandons_the_attempt() {
        let bus = recv_common::EventBus::new(16);
        let (_publisher, feed) = crate::weight::weight_channel(bus);
        let engine = CaptureEngine::new(
            Classifier::new(
                Arc::new(FixedPredictions(vec![])),
                Arc::new(HalfSource),
            ),
            Arc::new(FakeAnalysis::Fixed(0.0)),
            Arc::new(FakeCamera(Err(()))),
            Arc::new(FakeOrders::new()),
            feed,
            Arc::new(HalfSource),
        );
        let notifier = MemoryNotifier::default();

        let result = engine.start_capture(&catalog(), None, &notifier).await;
        assert!(matches!(result, Err(EngineError::Capture(_))));
        assert_eq!(engine.state().await, CaptureState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_color_analysis_degrades_at_the_deadline() {
        let engine = engine(FakeAnalysis::Hang, FakeOrders::new());
        let notifier = MemoryNotifier::default();

        let draft = engine
            .start_capture(&catalog(), None, &notifier)
            .await
            .unwrap();

        assert_eq!(draft.color_deviation_percent, 0.0);
        assert!(draft.analysis_failed);
        assert!(notifier.notices()[0].0.contains("timed out"));
        assert_eq!(engine.state().await, CaptureState::Reviewing);
    }

    #[tokio::test]
    async fn failed_color_analysis_degrades_with_notice() {
        let engine = engine(FakeAnalysis::Fail, FakeOrders::new());
        let notifier = MemoryNotifier::default();

        let draft = engine
            .start_capture(&catalog(), None, &notifier)
            .await
            .unwrap();

        assert_eq!(draft.color_deviation_percent, 0.0);
        assert!(draft.analysis_failed);
        assert!(notifier.notices()[0].0.contains("comparison failed"));
    }

    #[tokio::test]
    async fn missing_reference_photo_skips_analysis() {
        let bus = recv_common::EventBus::new(16);
        let (_publisher, feed) = crate::weight::weight_channel(bus);
        let engine = CaptureEngine::new(
            Classifier::new(
                Arc::new(FixedPredictions(vec![candidate("NVL_HS004_TOM_KHO", 0.8)])),
                Arc::new(HalfSource),
            ),
            // Would hang if consulted
            Arc::new(FakeAnalysis::Hang),
            Arc::new(FakeCamera(Ok("http://cam/shot.jpg".to_string()))),
            Arc::new(FakeOrders::new()),
            feed,
            Arc::new(HalfSource),
        );
        let notifier = MemoryNotifier::default();

        let draft = engine
            .start_capture(&catalog(), None, &notifier)
            .await
            .unwrap();
        assert_eq!(draft.material.id, 8);
        assert_eq!(draft.color_deviation_percent, 0.0);
        assert!(draft.analysis_failed);
    }

    #[tokio::test]
    async fn live_weight_reading_overrides_jitter() {
        let bus = recv_common::EventBus::new(16);
        let (publisher, feed) = crate::weight::weight_channel(bus);
        publisher.publish(7950.0);
        let engine = CaptureEngine::new(
            Classifier::new(
                Arc::new(FixedPredictions(vec![candidate("NVL_THIT001_THIT_BO", 0.91)])),
                Arc::new(HalfSource),
            ),
            Arc::new(FakeAnalysis::Fixed(1.0)),
            Arc::new(FakeCamera(Ok("http://cam/shot.jpg".to_string()))),
            Arc::new(FakeOrders::new()),
            feed,
            Arc::new(HalfSource),
        );
        let notifier = MemoryNotifier::default();

        let draft = engine
            .start_capture(&catalog(), None, &notifier)
            .await
            .unwrap();
        assert!((draft.measured_quantity - 7.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn second_capture_while_reviewing_is_rejected() {
        let engine = engine(FakeAnalysis::Fixed(0.0), FakeOrders::new());
        let notifier = MemoryNotifier::default();

        engine
            .start_capture(&catalog(), None, &notifier)
            .await
            .unwrap();
        let result = engine.start_capture(&catalog(), None, &notifier).await;
        assert!(matches!(result, Err(EngineError::CaptureInProgress)));
    }

    #[tokio::test]
    async fn relabel_keeps_quantity_and_color() {
        let engine = engine(FakeAnalysis::Fixed(3.2), FakeOrders::new());
        let notifier = MemoryNotifier::default();

        let draft = engine
            .start_capture(&catalog(), None, &notifier)
            .await
            .unwrap();
        let relabelled = engine
            .override_material(material(8, "NVL_HS004", None))
            .await
            .unwrap();

        assert_eq!(relabelled.material.id, 8);
        assert_eq!(relabelled.measured_quantity, draft.measured_quantity);
        assert_eq!(relabelled.color_deviation_percent, draft.color_deviation_percent);
        assert!(relabelled.reference_photo.is_none());
    }

    #[tokio::test]
    async fn persistence_failure_stays_in_reviewing() {
        let engine = engine(FakeAnalysis::Fixed(0.0), FakeOrders::failing());
        let notifier = MemoryNotifier::default();

        engine
            .start_capture(&catalog(), None, &notifier)
            .await
            .unwrap();
        let result = engine.confirm(&orders()).await;
        assert!(matches!(result, Err(EngineError::Persistence(_))));
        assert_eq!(engine.state().await, CaptureState::Reviewing);
        assert!(engine.current_draft().await.is_some());

        // Operator can still cancel
        engine.cancel().await.unwrap();
        assert_eq!(engine.state().await, CaptureState::Idle);
    }

    #[tokio::test]
    async fn confirm_without_matching_order_fails() {
        let engine = engine(FakeAnalysis::Fixed(0.0), FakeOrders::new());
        let notifier = MemoryNotifier::default();

        engine
            .start_capture(&catalog(), None, &notifier)
            .await
            .unwrap();
        let result = engine.confirm(&[]).await;
        assert!(matches!(result, Err(EngineError::MissingOrderReference(7))));
        assert_eq!(engine.state().await, CaptureState::Reviewing);
    }

    #[tokio::test]
    async fn cancel_outside_reviewing_is_invalid() {
        let engine = engine(FakeAnalysis::Fixed(0.0), FakeOrders::new());
        let result = engine.cancel().await;
        assert!(matches!(result, Err(EngineError::InvalidState(_))));
    }
}
