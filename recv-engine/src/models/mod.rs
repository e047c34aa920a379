//! Domain models for the receiving engine

mod material;
mod measurement;
mod order;

pub use material::{Material, Supplier};
pub use measurement::{
    color_tier, quantity_tier, AggregateGroup, DeviationTier, Measurement, QUANTITY_WARN_THRESHOLD,
};
pub use order::{Order, OrderLineItem};

use serde::{Deserialize, Serialize};

/// A captured image, either carried inline (base64 payload from an
/// upload) or referenced by URL (camera capture result)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CapturedImage {
    /// Base64-encoded payload, data-URL prefix already stripped
    Inline(String),
    /// Image reference resolvable by the external services
    Reference(String),
}

impl CapturedImage {
    /// Build from an uploaded payload; strips a `data:` URL prefix
    pub fn from_upload(payload: &str) -> Self {
        match payload.split_once(',') {
            Some((head, body)) if head.starts_with("data:") => Self::Inline(body.to_string()),
            _ => Self::Inline(payload.to_string()),
        }
    }

    /// Display form used when a single string reference is required
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inline(payload) => payload,
            Self::Reference(url) => url,
        }
    }
}
