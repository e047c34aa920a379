//! Order-system API client
//!
//! Covers the order-query surface (orders by date, order detail,
//! previously persisted measurements) and the persistence surface
//! (create/remove measurement, batch reconciliation).

use super::{
    CreateMeasurementRequest, OrderApiError, OrderService, ReconcileRequest, RemoteMeasurement,
};
use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::models::{CapturedImage, Order, OrderLineItem};
use async_trait::async_trait;
use base64::Engine as _;
use chrono::NaiveDate;
use serde::Deserialize;

/// Wire shape of one order line item
///
/// Quantities and deviations arrive as strings; photos may be a
/// placeholder image that the engine treats as absent.
#[derive(Debug, Deserialize)]
struct ApiOrderItem {
    product_id: i64,
    product_code: String,
    product_name: String,
    #[serde(default)]
    product_diff_allowed: Option<String>,
    unit_name: String,
    quantity: String,
    #[serde(default)]
    product_photo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiOrder {
    po_id: i64,
    po_supplier_id: i64,
    po_supplier_code: String,
    po_supplier_name: String,
    po_items: Vec<ApiOrderItem>,
}

#[derive(Debug, Deserialize)]
struct ApiOrdersResponse {
    #[serde(default)]
    orders: Vec<ApiOrder>,
}

#[derive(Debug, Deserialize)]
struct CreateMeasurementResponse {
    item_id: i64,
}

impl ApiOrderItem {
    fn into_line_item(self) -> Result<OrderLineItem, OrderApiError> {
        let standard_quantity = self
            .quantity
            .parse::<f64>()
            .map_err(|_| OrderApiError::Parse(format!("bad quantity: {:?}", self.quantity)))?;

        let allowed_deviation_percent = self
            .product_diff_allowed
            .as_deref()
            .and_then(|v| v.parse::<f64>().ok());

        // Placeholder photos are treated as missing
        let reference_photo = self
            .product_photo
            .filter(|p| !p.is_empty() && !p.contains("no_photo.png"));

        Ok(OrderLineItem {
            product_id: self.product_id,
            product_code: self.product_code,
            product_name: self.product_name,
            unit: self.unit_name,
            standard_quantity,
            allowed_deviation_percent,
            reference_photo,
        })
    }
}

impl ApiOrder {
    fn into_order(self) -> Result<Order, OrderApiError> {
        let line_items = self
            .po_items
            .into_iter()
            .map(ApiOrderItem::into_line_item)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Order {
            po_id: self.po_id,
            supplier_id: self.po_supplier_id,
            supplier_code: self.po_supplier_code,
            supplier_name: self.po_supplier_name,
            line_items,
        })
    }
}

/// HTTP client for the order-system API
pub struct OrderSystemClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OrderSystemClient {
    pub fn new(base_url: String) -> Result<Self, OrderApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OrderApiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, OrderApiError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OrderApiError::Api(status.as_u16(), error_text));
        }
        Ok(response)
    }
}

#[async_trait]
impl OrderService for OrderSystemClient {
    async fn get_orders(&self, date: NaiveDate) -> Result<Vec<Order>, OrderApiError> {
        let url = format!("{}/raw/po/get/", self.base_url);
        tracing::debug!(url = %url, %date, "Fetching purchase orders");

        let response = self
            .http_client
            .get(&url)
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await
            .map_err(|e| OrderApiError::Network(e.to_string()))?;

        let parsed: ApiOrdersResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| OrderApiError::Parse(e.to_string()))?;

        let orders = parsed
            .orders
            .into_iter()
            .map(ApiOrder::into_order)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(count = orders.len(), %date, "Purchase orders loaded");
        Ok(orders)
    }

    async fn get_order_detail(
        &self,
        supplier_code: &str,
        date: NaiveDate,
    ) -> Result<serde_json::Value, OrderApiError> {
        let url = format!("{}/raw/po/get/", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("supplier", supplier_code.to_string()),
                ("date", date.format("%Y-%m-%d").to_string()),
            ])
            .send()
            .await
            .map_err(|e| OrderApiError::Network(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| OrderApiError::Parse(e.to_string()))
    }

    async fn create_measurement(
        &self,
        request: &CreateMeasurementRequest,
    ) -> Result<i64, OrderApiError> {
        let photo_part = match &request.photo {
            CapturedImage::Inline(payload) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(payload)
                    .map_err(|e| OrderApiError::Parse(format!("bad photo payload: {}", e)))?;
                reqwest::multipart::Part::bytes(bytes).file_name("capture.jpg")
            }
            CapturedImage::Reference(url) => reqwest::multipart::Part::text(url.clone()),
        };

        let form = reqwest::multipart::Form::new()
            .text("po_id", request.po_id.to_string())
            .text("product_id", request.product_id.to_string())
            .text("weight", request.weight.to_string())
            .text("color", request.color.to_string())
            .part("photo", photo_part);

        let url = format!("{}/raw/po/product", self.base_url);
        tracing::debug!(po_id = request.po_id, product_id = request.product_id,
            "Persisting measurement");

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| OrderApiError::Network(e.to_string()))?;

        let parsed: CreateMeasurementResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| OrderApiError::Parse(e.to_string()))?;

        tracing::info!(item_id = parsed.item_id, "Measurement persisted");
        Ok(parsed.item_id)
    }

    async fn remove_measurement(&self, item_id: i64) -> Result<(), OrderApiError> {
        let form = reqwest::multipart::Form::new().text("item_id", item_id.to_string());

        let url = format!("{}/raw/po/product/remove", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| OrderApiError::Network(e.to_string()))?;

        Self::check(response).await?;
        tracing::info!(item_id, "Remote measurement removed");
        Ok(())
    }

    async fn get_measurements(
        &self,
        po_id: i64,
        product_id: i64,
    ) -> Result<Vec<RemoteMeasurement>, OrderApiError> {
        let url = format!("{}/raw/po/product/get", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("po_id", po_id), ("product_id", product_id)])
            .send()
            .await
            .map_err(|e| OrderApiError::Network(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| OrderApiError::Parse(e.to_string()))
    }

    async fn submit_reconciliation(
        &self,
        request: &ReconcileRequest,
    ) -> Result<(), OrderApiError> {
        let items_json = serde_json::to_string(&request.items)
            .map_err(|e| OrderApiError::Parse(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .text("po_id", request.po_id.to_string())
            .text("items", items_json);

        let url = format!("{}/raw/po/result", self.base_url);
        tracing::debug!(po_id = request.po_id, items = request.items.len(),
            "Submitting reconciliation batch");

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| OrderApiError::Network(e.to_string()))?;

        Self::check(response).await?;
        tracing::info!(po_id = request.po_id, "Reconciliation batch accepted");
        Ok(())
    }
}
