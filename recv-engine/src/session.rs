//! Receiving session state
//!
//! One session covers one operator, one date, one active supplier. The
//! session owns the ledger and the catalog; switching supplier while
//! the ledger holds measurements needs explicit confirmation so a full
//! ledger is never dropped silently.

use crate::catalog::Catalog;
use crate::error::EngineError;
use crate::ledger::MeasurementLedger;
use crate::models::{Order, Supplier};
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// Result of a supplier switch request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SwitchOutcome {
    /// Switch applied; ledger cleared, catalog reloaded
    Switched { supplier_code: String },
    /// Re-selection of the already-active supplier; nothing changed
    Unchanged { supplier_code: String },
    /// Ledger holds measurements; operator must confirm
    ConfirmationRequired {
        current_code: String,
        requested_code: String,
    },
    /// Operator declined; selection reverts to the active supplier
    Reverted { supplier_code: String },
}

pub struct ReceivingSession {
    id: Uuid,
    date: NaiveDate,
    all_orders: Vec<Order>,
    active_supplier: Option<Supplier>,
    active_orders: Vec<Order>,
    catalog: Catalog,
    ledger: MeasurementLedger,
    pending_switch: Option<String>,
}

impl ReceivingSession {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            all_orders: Vec::new(),
            active_supplier: None,
            active_orders: Vec::new(),
            catalog: Catalog::default(),
            ledger: MeasurementLedger::new(),
            pending_switch: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Replace the day's orders, keeping the active supplier's catalog
    /// in sync when it still has orders
    pub fn load_orders(&mut self, orders: Vec<Order>) {
        self.all_orders = orders;
        if let Some(supplier) = self.active_supplier.clone() {
            self.active_orders = self.orders_for(&supplier.code);
            self.catalog = Catalog::from_orders(&self.active_orders);
        }
    }

    /// Suppliers present in the day's orders, first-seen order
    pub fn suppliers(&self) -> Vec<Supplier> {
        let mut suppliers: Vec<Supplier> = Vec::new();
        for order in &self.all_orders {
            if !suppliers.iter().any(|s| s.code == order.supplier_code) {
                suppliers.push(Supplier {
                    id: order.supplier_id,
                    code: order.supplier_code.clone(),
                    name: order.supplier_name.clone(),
                });
            }
        }
        suppliers
    }

    pub fn active_supplier(&self) -> Option<&Supplier> {
        self.active_supplier.as_ref()
    }

    pub fn active_orders(&self) -> &[Order] {
        &self.active_orders
    }

    pub fn pending_switch(&self) -> Option<&str> {
        self.pending_switch.as_deref()
    }

    /// Catalog of the active supplier
    pub fn catalog(&self) -> Result<&Catalog, EngineError> {
        if self.active_supplier.is_none() {
            return Err(EngineError::NoActiveSupplier);
        }
        Ok(&self.catalog)
    }

    pub fn ledger(&self) -> &MeasurementLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut MeasurementLedger {
        &mut self.ledger
    }

    fn orders_for(&self, supplier_code: &str) -> Vec<Order> {
        self.all_orders
            .iter()
            .filter(|order| order.supplier_code == supplier_code)
            .cloned()
            .collect()
    }

    fn supplier_by_code(&self, code: &str) -> Result<Supplier, EngineError> {
        self.suppliers()
            .into_iter()
            .find(|s| s.code == code)
            .ok_or_else(|| EngineError::UnknownSupplier(code.to_string()))
    }

    /// Request a switch to another supplier
    ///
    /// Re-selecting the active supplier changes nothing. A non-empty
    /// ledger turns the request into a pending confirmation instead of
    /// applying it.
    pub fn request_switch(&mut self, supplier_code: &str) -> Result<SwitchOutcome, EngineError> {
        let supplier = self.supplier_by_code(supplier_code)?;

        if let Some(active) = &self.active_supplier {
            if active.code == supplier.code {
                self.pending_switch = None;
                return Ok(SwitchOutcome::Unchanged {
                    supplier_code: supplier.code,
                });
            }
            if !self.ledger.is_empty() {
                self.pending_switch = Some(supplier.code.clone());
                tracing::info!(
                    current = %active.code,
                    requested = %supplier.code,
                    readings = self.ledger.len(),
                    "Supplier switch needs confirmation"
                );
                return Ok(SwitchOutcome::ConfirmationRequired {
                    current_code: active.code.clone(),
                    requested_code: supplier.code,
                });
            }
        }

        self.apply_switch(supplier);
        Ok(SwitchOutcome::Switched {
            supplier_code: self.active_supplier.as_ref().map(|s| s.code.clone()).unwrap_or_default(),
        })
    }

    /// Resolve a pending switch confirmation
    pub fn confirm_switch(&mut self, accept: bool) -> Result<SwitchOutcome, EngineError> {
        let requested_code = self
            .pending_switch
            .take()
            .ok_or_else(|| EngineError::InvalidState("no switch pending".to_string()))?;

        if !accept {
            let supplier_code = self
                .active_supplier
                .as_ref()
                .map(|s| s.code.clone())
                .unwrap_or_default();
            tracing::info!(reverted_to = %supplier_code, "Supplier switch declined");
            return Ok(SwitchOutcome::Reverted { supplier_code });
        }

        let supplier = self.supplier_by_code(&requested_code)?;
        self.apply_switch(supplier);
        Ok(SwitchOutcome::Switched {
            supplier_code: requested_code,
        })
    }

    fn apply_switch(&mut self, supplier: Supplier) {
        tracing::info!(supplier_code = %supplier.code, "Active supplier changed");
        self.active_orders = self.orders_for(&supplier.code);
        self.catalog = Catalog::from_orders(&self.active_orders);
        self.ledger.clear();
        self.pending_switch = None;
        self.active_supplier = Some(supplier);
    }
}
