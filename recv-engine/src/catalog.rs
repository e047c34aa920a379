//! Session-scoped material catalog
//!
//! Built from the active supplier's purchase-order line items when the
//! supplier is selected; immutable until the next supplier switch.

use crate::models::{Material, Order};

/// The active purchase orders' line items, deduplicated by product id
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    materials: Vec<Material>,
}

impl Catalog {
    pub fn new(materials: Vec<Material>) -> Self {
        Self { materials }
    }

    /// Build from the active supplier's orders
    ///
    /// Line items are flattened in order; a product appearing on
    /// multiple orders is kept once (first occurrence wins).
    pub fn from_orders(orders: &[Order]) -> Self {
        let mut materials: Vec<Material> = Vec::new();
        for order in orders {
            for item in &order.line_items {
                if !materials.iter().any(|m| m.id == item.product_id) {
                    materials.push(item.to_material());
                }
            }
        }
        Self { materials }
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn by_id(&self, id: i64) -> Option<&Material> {
        self.materials.iter().find(|m| m.id == id)
    }

    /// First material whose code starts with the given family token
    pub fn by_code_prefix(&self, token: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.code.starts_with(token))
    }
}
