//! Material and supplier identities
//!
//! Materials are loaded from the active purchase orders and are
//! immutable for the lifetime of the receiving session.

use serde::{Deserialize, Serialize};

/// A supplier with at least one purchase order on the active date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// A receivable raw-material type from a purchase-order line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    /// Product id in the order system
    pub id: i64,
    /// Material code, e.g. `NVL_THIT001`
    pub code: String,
    pub name: String,
    /// Measurement unit, e.g. `kg`
    pub unit: String,
    /// Expected quantity per delivery
    pub standard_quantity: f64,
    /// Allowed deviation from the standard quantity, in percent
    pub allowed_deviation_percent: f64,
    /// Reference photo URL; None when the order system only has a
    /// placeholder, in which case color analysis is skipped
    pub reference_photo: Option<String>,
}

impl Material {
    /// Allowed quantity band `standard × (1 ± allowed/100)`
    pub fn allowed_band(&self) -> (f64, f64) {
        let delta = self.standard_quantity * self.allowed_deviation_percent / 100.0;
        (
            self.standard_quantity - delta,
            self.standard_quantity + delta,
        )
    }

    /// Whether this material is weighed in kilograms
    pub fn is_kilograms(&self) -> bool {
        self.unit.eq_ignore_ascii_case("kg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beef() -> Material {
        Material {
            id: 1,
            code: "NVL_THIT001".to_string(),
            name: "Thịt bò".to_string(),
            unit: "kg".to_string(),
            standard_quantity: 8.0,
            allowed_deviation_percent: 1.0,
            reference_photo: Some("https://img.example.com/thit_bo.jpg".to_string()),
        }
    }

    #[test]
    fn allowed_band_follows_deviation_percent() {
        let (low, high) = beef().allowed_band();
        assert!((low - 7.92).abs() < 1e-9);
        assert!((high - 8.08).abs() < 1e-9);
    }

    #[test]
    fn unit_check_is_case_insensitive() {
        let mut m = beef();
        assert!(m.is_kilograms());
        m.unit = "KG".to_string();
        assert!(m.is_kilograms());
        m.unit = "thùng".to_string();
        assert!(!m.is_kilograms());
    }
}
