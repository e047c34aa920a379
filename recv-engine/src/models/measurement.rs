//! Confirmed measurements and deviation scoring

use super::{CapturedImage, Material};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Absolute quantity deviation above which the reading is flagged
pub const QUANTITY_WARN_THRESHOLD: f64 = 0.1;

/// Color deviation (percent) above which the reading is flagged
pub const COLOR_WARN_THRESHOLD: f64 = 2.0;

/// Color deviation (percent) above which the reading needs review
pub const COLOR_DANGER_THRESHOLD: f64 = 5.0;

/// Three-tier deviation classification for display and warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviationTier {
    Success,
    Warning,
    Danger,
}

/// Quantity tier: warn when the reading strays more than the fixed
/// absolute threshold from the standard quantity
pub fn quantity_tier(measured: f64, standard: f64) -> DeviationTier {
    if (measured - standard).abs() > QUANTITY_WARN_THRESHOLD {
        DeviationTier::Warning
    } else {
        DeviationTier::Success
    }
}

/// Color tier: >5% needs review, >2% is flagged, otherwise fine
pub fn color_tier(color_deviation_percent: f64) -> DeviationTier {
    if color_deviation_percent > COLOR_DANGER_THRESHOLD {
        DeviationTier::Danger
    } else if color_deviation_percent > COLOR_WARN_THRESHOLD {
        DeviationTier::Warning
    } else {
        DeviationTier::Success
    }
}

/// One confirmed capture event
///
/// Immutable after creation except for the `remote_id` backfill set on
/// successful remote persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub material: Material,
    pub measured_quantity: f64,
    pub color_deviation_percent: f64,
    pub timestamp: DateTime<Utc>,
    pub reference_photo: Option<String>,
    pub captured_photo: CapturedImage,
    pub analysis_failed: bool,
    /// Order-system item id, set after successful remote persistence
    pub remote_id: Option<i64>,
}

impl Measurement {
    /// Create a measurement; quantities and deviations are floored at
    /// zero so the stored values are never negative
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        material: Material,
        measured_quantity: f64,
        color_deviation_percent: f64,
        reference_photo: Option<String>,
        captured_photo: CapturedImage,
        analysis_failed: bool,
    ) -> Self {
        Self {
            material,
            measured_quantity: measured_quantity.max(0.0),
            color_deviation_percent: color_deviation_percent.max(0.0),
            timestamp: Utc::now(),
            reference_photo,
            captured_photo,
            analysis_failed,
            remote_id: None,
        }
    }

    pub fn quantity_tier(&self) -> DeviationTier {
        quantity_tier(self.measured_quantity, self.material.standard_quantity)
    }

    pub fn color_tier(&self) -> DeviationTier {
        color_tier(self.color_deviation_percent)
    }
}

/// Per-material aggregate, always recomputed from the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateGroup {
    pub material: Material,
    pub total_quantity: f64,
    pub count: usize,
    pub average_color_deviation: f64,
    pub earliest_timestamp: DateTime<Utc>,
}
