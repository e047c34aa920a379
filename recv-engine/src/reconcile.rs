//! Batch reconciliation
//!
//! Aggregates the ledger per material, resolves each material's owning
//! purchase order, and submits accept/return decisions to the order
//! system. Submission is all-or-nothing; the ledger is only cleared by
//! the caller after every request succeeded.

use crate::error::EngineError;
use crate::ledger::MeasurementLedger;
use crate::models::Order;
use crate::services::{OrderService, ReconcileItem, ReconcileRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Operator decision for one material's aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Receive into stock
    Accept,
    /// Send back to the supplier
    Return,
}

impl Disposition {
    /// Wire status code: 1 = accept, 0 = return
    pub fn status(&self) -> u8 {
        match self {
            Disposition::Accept => 1,
            Disposition::Return => 0,
        }
    }
}

/// First order whose line items include the product
pub fn resolve_po_id(orders: &[Order], product_id: i64) -> Result<i64, EngineError> {
    orders
        .iter()
        .find(|order| order.contains_product(product_id))
        .map(|order| order.po_id)
        .ok_or(EngineError::MissingOrderReference(product_id))
}

pub struct ReconciliationEngine {
    order_service: Arc<dyn OrderService>,
}

impl ReconciliationEngine {
    pub fn new(order_service: Arc<dyn OrderService>) -> Self {
        Self { order_service }
    }

    /// Build one request per resolved purchase order
    ///
    /// Every material in the ledger needs a disposition and a resolvable
    /// order before anything is submitted; a single gap fails the whole
    /// plan. Materials keep their ledger first-seen order within each
    /// request.
    pub fn plan(
        &self,
        ledger: &MeasurementLedger,
        orders: &[Order],
        dispositions: &HashMap<i64, Disposition>,
    ) -> Result<Vec<ReconcileRequest>, EngineError> {
        if ledger.is_empty() {
            return Err(EngineError::EmptyLedger);
        }

        let mut requests: Vec<ReconcileRequest> = Vec::new();
        for (material_id, _) in ledger.group_by_material() {
            let disposition = dispositions
                .get(&material_id)
                .ok_or(EngineError::MissingDisposition(material_id))?;
            let po_id = resolve_po_id(orders, material_id)?;

            let item = ReconcileItem {
                product_id: material_id,
                status: disposition.status(),
            };
            match requests.iter_mut().find(|r| r.po_id == po_id) {
                Some(request) => request.items.push(item),
                None => requests.push(ReconcileRequest {
                    po_id,
                    items: vec![item],
                }),
            }
        }
        Ok(requests)
    }

    /// Submit the planned requests in order; the first failure aborts
    ///
    /// Returns the submitted po_ids. On failure the ledger has not been
    /// touched and the whole batch must be retried.
    pub async fn submit(&self, requests: &[ReconcileRequest]) -> Result<Vec<i64>, EngineError> {
        for request in requests {
            self.order_service.submit_reconciliation(request).await?;
        }
        let po_ids = requests.iter().map(|r| r.po_id).collect();
        tracing::info!(?po_ids, "Reconciliation submitted");
        Ok(po_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CapturedImage, Material, Measurement, OrderLineItem};
    use crate::services::{
        CreateMeasurementRequest, OrderApiError, RemoteMeasurement,
    };
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn material(id: i64) -> Material {
        Material {
            id,
            code: format!("NVL_THIT{:03}", id),
            name: format!("Material {}", id),
            unit: "kg".to_string(),
            standard_quantity: 8.0,
            allowed_deviation_percent: 2.0,
            reference_photo: None,
        }
    }

    fn measurement(material_id: i64) -> Measurement {
        Measurement::new(
            material(material_id),
            8.0,
            0.0,
            None,
            CapturedImage::Reference("http://cam/shot.jpg".to_string()),
            false,
        )
    }

    fn order(po_id: i64, product_ids: &[i64]) -> Order {
        Order {
            po_id,
            supplier_id: 1,
            supplier_code: "NCC_MEAT".to_string(),
            supplier_name: "CTY Meat".to_string(),
            line_items: product_ids
                .iter()
                .map(|&product_id| OrderLineItem {
                    product_id,
                    product_code: format!("NVL_THIT{:03}", product_id),
                    product_name: format!("Material {}", product_id),
                    unit: "kg".to_string(),
                    standard_quantity: 8.0,
                    allowed_deviation_percent: None,
                    reference_photo: None,
                })
                .collect(),
        }
    }

    /// Records submissions; optionally fails after the first
    struct RecordingOrders {
        submitted: Mutex<Vec<ReconcileRequest>>,
        fail_after: Option<usize>,
    }

    impl RecordingOrders {
        fn new(fail_after: Option<usize>) -> Self {
            Self {
                submitted: Mutex::new(Vec::new()),
                fail_after,
            }
        }
    }

    #[async_trait]
    impl crate::services::OrderService for RecordingOrders {
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
            Ok(1)
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
            request: &ReconcileRequest,
        ) -> Result<(), OrderApiError> {
            let mut submitted = self.submitted.lock().unwrap();
            if let Some(limit) = self.fail_after {
                if submitted.len() >= limit {
                    return Err(OrderApiError::Api(500, "boom".to_string()));
                }
            }
            submitted.push(request.clone());
            Ok(())
        }
    }

    fn ledger_with(ids: &[i64]) -> MeasurementLedger {
        let mut ledger = MeasurementLedger::new();
        for &id in ids {
            ledger.append(measurement(id));
        }
        ledger
    }

    fn accept_all(ids: &[i64]) -> HashMap<i64, Disposition> {
        ids.iter().map(|&id| (id, Disposition::Accept)).collect()
    }

    #[test]
    fn plan_groups_materials_by_resolved_order() {
        let engine = ReconciliationEngine::new(Arc::new(RecordingOrders::new(None)));
        let ledger = ledger_with(&[7, 9, 8, 7]);
        let orders = vec![order(31, &[7, 8]), order(32, &[9])];
        let mut dispositions = accept_all(&[7, 8]);
        dispositions.insert(9, Disposition::Return);

        let requests = engine.plan(&ledger, &orders, &dispositions).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].po_id, 31);
        assert_eq!(
            requests[0].items,
            vec![
                ReconcileItem { product_id: 7, status: 1 },
                ReconcileItem { product_id: 8, status: 1 },
            ]
        );
        assert_eq!(requests[1].po_id, 32);
        assert_eq!(requests[1].items, vec![ReconcileItem { product_id: 9, status: 0 }]);
    }

    #[test]
    fn po_resolution_takes_first_matching_order() {
        let orders = vec![order(31, &[7]), order(32, &[7])];
        assert_eq!(resolve_po_id(&orders, 7).unwrap(), 31);
        assert!(matches!(
            resolve_po_id(&orders, 99),
            Err(EngineError::MissingOrderReference(99))
        ));
    }

    #[test]
    fn plan_fails_on_missing_disposition() {
        let engine = ReconciliationEngine::new(Arc::new(RecordingOrders::new(None)));
        let ledger = ledger_with(&[7, 8]);
        let orders = vec![order(31, &[7, 8])];
        let dispositions = accept_all(&[7]);

        assert!(matches!(
            engine.plan(&ledger, &orders, &dispositions),
            Err(EngineError::MissingDisposition(8))
        ));
    }

    #[test]
    fn plan_fails_when_any_material_lacks_an_order() {
        let engine = ReconciliationEngine::new(Arc::new(RecordingOrders::new(None)));
        let ledger = ledger_with(&[7, 8]);
        let orders = vec![order(31, &[7])];
        let dispositions = accept_all(&[7, 8]);

        assert!(matches!(
            engine.plan(&ledger, &orders, &dispositions),
            Err(EngineError::MissingOrderReference(8))
        ));
    }

    #[test]
    fn empty_ledger_cannot_be_reconciled() {
        let engine = ReconciliationEngine::new(Arc::new(RecordingOrders::new(None)));
        assert!(matches!(
            engine.plan(&MeasurementLedger::new(), &[], &HashMap::new()),
            Err(EngineError::EmptyLedger)
        ));
    }

    #[tokio::test]
    async fn submit_stops_at_first_failure() {
        let orders_service = Arc::new(RecordingOrders::new(Some(1)));
        let engine = ReconciliationEngine::new(orders_service.clone());
        let ledger = ledger_with(&[7, 9]);
        let orders = vec![order(31, &[7]), order(32, &[9])];
        let requests = engine.plan(&ledger, &orders, &accept_all(&[7, 9])).unwrap();

        let result = engine.submit(&requests).await;
        assert!(matches!(result, Err(EngineError::Persistence(_))));
        assert_eq!(orders_service.submitted.lock().unwrap().len(), 1);
        // Ledger untouched: the whole batch is retried
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn successful_submit_returns_po_ids_in_order() {
        let orders_service = Arc::new(RecordingOrders::new(None));
        let engine = ReconciliationEngine::new(orders_service.clone());
        let ledger = ledger_with(&[7, 9]);
        let orders = vec![order(31, &[7]), order(32, &[9])];
        let requests = engine.plan(&ledger, &orders, &accept_all(&[7, 9])).unwrap();

        let po_ids = engine.submit(&requests).await.unwrap();
        assert_eq!(po_ids, vec![31, 32]);
        assert_eq!(orders_service.submitted.lock().unwrap().len(), 2);
    }
}
