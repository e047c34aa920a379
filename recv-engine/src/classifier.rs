//! Material classification
//!
//! Maps prediction-service candidates onto catalog materials. Every
//! failure path degrades to a uniform-random catalog pick with a
//! user-visible notice so the operator can correct the guess during
//! review.

use crate::catalog::Catalog;
use crate::error::EngineError;
use crate::models::{CapturedImage, Material};
use crate::services::{PredictionCandidate, PredictionService};
use rand::Rng;
use recv_common::{Notifier, Severity};
use regex::Regex;
use std::sync::Arc;

/// Source of uniform randoms, injectable so fallback picks are
/// deterministic under test
pub trait RandomSource: Send + Sync {
    /// Uniform value in `[0, 1)`
    fn next_f64(&self) -> f64;

    /// Uniform index in `[0, len)`; `len` must be non-zero
    fn pick(&self, len: usize) -> usize {
        let index = (self.next_f64() * len as f64) as usize;
        index.min(len - 1)
    }
}

/// Thread-local RNG backed source used in production
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// How the classified material was arrived at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationKind {
    /// A prediction candidate matched a catalog code
    Predicted,
    /// Random catalog pick after a failure path
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub material: Material,
    pub kind: ClassificationKind,
}

pub struct Classifier {
    prediction_service: Arc<dyn PredictionService>,
    random: Arc<dyn RandomSource>,
    token_pattern: Regex,
}

impl Classifier {
    pub fn new(
        prediction_service: Arc<dyn PredictionService>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        // Leading material-family token: uppercase words then digits,
        // e.g. NVL_THIT0125 out of NVL_THIT0125_GIO_HEO_RUT_XUONG
        let token_pattern = Regex::new(r"^([A-Z]+(?:_[A-Z]+)*\d+)")
            .expect("family token pattern is valid");

        Self {
            prediction_service,
            random,
            token_pattern,
        }
    }

    /// Classify the captured image against the catalog
    ///
    /// Errors only when the catalog is empty; service failures, empty
    /// candidate lists, and unmatched tokens all fall back to a random
    /// catalog pick, each with its own notice.
    pub async fn classify(
        &self,
        image: &CapturedImage,
        catalog: &Catalog,
        notifier: &dyn Notifier,
    ) -> Result<Classification, EngineError> {
        if catalog.is_empty() {
            return Err(EngineError::EmptyCatalog);
        }

        let candidates = match self.prediction_service.predict(image).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "Prediction service failed, using random pick");
                notifier.notify(
                    "Material recognition failed, a random material was selected",
                    Severity::Warning,
                );
                return Ok(self.random_pick(catalog));
            }
        };

        let Some(best) = best_candidate(&candidates) else {
            tracing::warn!("Prediction returned no candidates, using random pick");
            notifier.notify(
                "No material was recognized in the photo, a random material was selected",
                Severity::Warning,
            );
            return Ok(self.random_pick(catalog));
        };

        let matched = self
            .token_pattern
            .captures(&best.class)
            .and_then(|captures| captures.get(1))
            .and_then(|token| catalog.by_code_prefix(token.as_str()));

        match matched {
            Some(material) => {
                tracing::info!(
                    class = %best.class,
                    confidence = best.confidence,
                    material_code = %material.code,
                    "Material classified"
                );
                Ok(Classification {
                    material: material.clone(),
                    kind: ClassificationKind::Predicted,
                })
            }
            None => {
                tracing::warn!(
                    class = %best.class,
                    "Predicted label matches no catalog material, using random pick"
                );
                notifier.notify(
                    "Recognized material is not on the current orders, a random material was selected",
                    Severity::Warning,
                );
                Ok(self.random_pick(catalog))
            }
        }
    }

    fn random_pick(&self, catalog: &Catalog) -> Classification {
        let index = self.random.pick(catalog.len());
        Classification {
            material: catalog.materials()[index].clone(),
            kind: ClassificationKind::Fallback,
        }
    }
}

/// Highest-confidence candidate; ties keep the earliest in the list
fn best_candidate(candidates: &[PredictionCandidate]) -> Option<&PredictionCandidate> {
    candidates.iter().fold(None, |best, candidate| match best {
        Some(current) if candidate.confidence <= current.confidence => best,
        _ => Some(candidate),
    })
}
