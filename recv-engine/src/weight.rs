//! Live scale weight feed
//!
//! The scale gateway pushes raw gram readings into the engine over
//! HTTP; the latest reading is held in a watch channel so capture flows
//! can sample it without blocking. A reading of `None` means no scale
//! has reported since startup.

use recv_common::{EventBus, RecvEvent};
use tokio::sync::watch;

/// Write half of the weight feed; owned by the ingest endpoint
#[derive(Clone)]
pub struct WeightPublisher {
    tx: watch::Sender<Option<f64>>,
    bus: EventBus,
}

/// Read half of the weight feed; sampled during capture
#[derive(Clone)]
pub struct WeightFeed {
    rx: watch::Receiver<Option<f64>>,
}

/// Create a connected publisher/feed pair
pub fn weight_channel(bus: EventBus) -> (WeightPublisher, WeightFeed) {
    let (tx, rx) = watch::channel(None);
    (WeightPublisher { tx, bus }, WeightFeed { rx })
}

impl WeightPublisher {
    /// Record a raw scale reading in grams
    ///
    /// Negative readings are dropped; the scale reports them briefly
    /// while taring.
    pub fn publish(&self, grams: f64) {
        if grams < 0.0 {
            tracing::debug!(grams, "Ignoring negative scale reading");
            return;
        }
        self.tx.send_replace(Some(grams));
        self.bus.emit(RecvEvent::WeightUpdated { grams });
    }
}

impl WeightFeed {
    /// Latest raw reading in grams, if any scale has reported
    pub fn latest_grams(&self) -> Option<f64> {
        *self.rx.borrow()
    }
}

/// Convert a raw gram reading into the material's unit
///
/// Kilogram materials divide by 1000; any other unit passes the raw
/// value through unchanged.
pub fn convert_grams(grams: f64, unit: &str) -> f64 {
    if unit.eq_ignore_ascii_case("kg") {
        grams / 1000.0
    } else {
        grams
    }
}
