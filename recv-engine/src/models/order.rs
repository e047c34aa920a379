//! Purchase orders as loaded from the order-query API

use super::Material;
use serde::{Deserialize, Serialize};

/// Default allowed deviation (percent) when the order system omits one
pub const DEFAULT_ALLOWED_DEVIATION_PERCENT: f64 = 2.0;

/// One purchase order for the active date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub po_id: i64,
    pub supplier_id: i64,
    pub supplier_code: String,
    pub supplier_name: String,
    pub line_items: Vec<OrderLineItem>,
}

/// One line item of a purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: i64,
    pub product_code: String,
    pub product_name: String,
    pub unit: String,
    pub standard_quantity: f64,
    /// None when the order system did not specify a deviation
    pub allowed_deviation_percent: Option<f64>,
    /// None when missing or a known placeholder image
    pub reference_photo: Option<String>,
}

impl OrderLineItem {
    /// Convert into the session-scoped Material identity
    pub fn to_material(&self) -> Material {
        Material {
            id: self.product_id,
            code: self.product_code.clone(),
            name: self.product_name.clone(),
            unit: self.unit.clone(),
            standard_quantity: self.standard_quantity,
            allowed_deviation_percent: self
                .allowed_deviation_percent
                .unwrap_or(DEFAULT_ALLOWED_DEVIATION_PERCENT),
            reference_photo: self.reference_photo.clone(),
        }
    }
}

impl Order {
    /// Whether any line item references the given product
    pub fn contains_product(&self, product_id: i64) -> bool {
        self.line_items
            .iter()
            .any(|item| item.product_id == product_id)
    }
}
