//! Event types for the receiving event system
//!
//! Provides shared event definitions, the EventBus, and the Notifier
//! port used to surface operator notices. Components receive a
//! `Notifier` explicitly instead of reaching for process-wide state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Severity of an operator notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Danger,
}

/// Receiving engine event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecvEvent {
    /// Operator-facing notice (replaces the global toast mechanism)
    NoticeRaised {
        message: String,
        severity: Severity,
        timestamp: DateTime<Utc>,
    },

    /// Active supplier changed; ledger was cleared and catalog reloaded
    SupplierChanged {
        supplier_code: String,
        timestamp: DateTime<Utc>,
    },

    /// Supplier switch requested while the ledger holds measurements;
    /// waiting for operator confirmation
    SupplierSwitchPending {
        current_code: String,
        requested_code: String,
    },

    /// A confirmed measurement entered the ledger
    MeasurementRecorded {
        material_code: String,
        quantity: f64,
        color_deviation: f64,
        remote_id: Option<i64>,
        timestamp: DateTime<Utc>,
    },

    /// A measurement was removed from the ledger
    MeasurementRemoved {
        index: usize,
        material_code: String,
        /// `Some(false)` when the paired remote delete failed and
        /// `None` when the entry was never persisted (local removal
        /// happens either way)
        remote_deleted: Option<bool>,
    },

    /// Ledger emptied (supplier switch or post-reconciliation)
    LedgerCleared { reason: String },

    /// Latest weight reading from the scale feed, in grams
    WeightUpdated { grams: f64 },

    /// Batch reconciliation accepted by the order system
    ReconciliationSubmitted {
        po_ids: Vec<i64>,
        item_count: usize,
        timestamp: DateTime<Utc>,
    },
}

impl RecvEvent {
    /// Event type name used as the SSE event tag
    pub fn event_type(&self) -> &'static str {
        match self {
            RecvEvent::NoticeRaised { .. } => "NoticeRaised",
            RecvEvent::SupplierChanged { .. } => "SupplierChanged",
            RecvEvent::SupplierSwitchPending { .. } => "SupplierSwitchPending",
            RecvEvent::MeasurementRecorded { .. } => "MeasurementRecorded",
            RecvEvent::MeasurementRemoved { .. } => "MeasurementRemoved",
            RecvEvent::LedgerCleared { .. } => "LedgerCleared",
            RecvEvent::WeightUpdated { .. } => "WeightUpdated",
            RecvEvent::ReconciliationSubmitted { .. } => "ReconciliationSubmitted",
        }
    }
}

/// Broadcast bus for engine events
///
/// Wraps a tokio broadcast channel. Emitting with no subscribers is not
/// an error; events are simply dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RecvEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RecvEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the number of subscribers that received the event.
    pub fn emit(&self, event: RecvEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => 0,
        }
    }
}

/// Notification port
///
/// Single operation: surface a message to the operator at a given
/// severity. Passed into each component that raises notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// EventBus-backed notifier: notices become `NoticeRaised` events
pub struct BusNotifier {
    bus: EventBus,
}

impl BusNotifier {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl Notifier for BusNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        tracing::info!(?severity, "{}", message);
        self.bus.emit(RecvEvent::NoticeRaised {
            message: message.to_string(),
            severity,
            timestamp: Utc::now(),
        });
    }
}

/// Notifier that records notices in memory; intended for tests
#[derive(Default)]
pub struct MemoryNotifier {
    notices: std::sync::Mutex<Vec<(String, Severity)>>,
}

impl MemoryNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<(String, Severity)> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        self.notices
            .lock()
            .unwrap()
            .push((message.to_string(), severity));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_delivers_to_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(RecvEvent::WeightUpdated { grams: 7950.0 });

        match rx.recv().await.unwrap() {
            RecvEvent::WeightUpdated { grams } => assert_eq!(grams, 7950.0),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(16);
        let delivered = bus.emit(RecvEvent::LedgerCleared {
            reason: "test".to_string(),
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn bus_notifier_raises_notice_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let notifier = BusNotifier::new(bus.clone());

        notifier.notify("Color analysis failed.", Severity::Warning);

        match rx.recv().await.unwrap() {
            RecvEvent::NoticeRaised { message, severity, .. } => {
                assert_eq!(message, "Color analysis failed.");
                assert_eq!(severity, Severity::Warning);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = RecvEvent::SupplierChanged {
            supplier_code: "NCC_MEAT".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"SupplierChanged\""));
        assert_eq!(event.event_type(), "SupplierChanged");
    }
}
