//! Prediction service client (material classification)
//!
//! Submits the captured image to the vision model endpoint and returns
//! the raw candidate list. Inline payloads are posted form-urlencoded;
//! image references are passed as a query parameter.

use super::{PredictionCandidate, PredictionError, PredictionService};
use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::models::CapturedImage;
use async_trait::async_trait;
use serde::Deserialize;

/// Wire response of the prediction endpoint
#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    predictions: Vec<PredictionCandidate>,
}

/// HTTP client for the vision prediction endpoint
pub struct VisionClient {
    http_client: reqwest::Client,
    model_url: String,
    api_key: String,
}

impl VisionClient {
    pub fn new(model_url: String, api_key: String) -> Result<Self, PredictionError> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PredictionError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            model_url,
            api_key,
        })
    }
}

#[async_trait]
impl PredictionService for VisionClient {
    async fn predict(
        &self,
        image: &CapturedImage,
    ) -> Result<Vec<PredictionCandidate>, PredictionError> {
        let request = match image {
            CapturedImage::Inline(payload) => self
                .http_client
                .post(&self.model_url)
                .query(&[("api_key", self.api_key.as_str())])
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(payload.clone()),
            CapturedImage::Reference(url) => self
                .http_client
                .post(&self.model_url)
                .query(&[("api_key", self.api_key.as_str()), ("image", url.as_str())]),
        };

        tracing::debug!(model_url = %self.model_url, "Submitting image for classification");

        let response = request
            .send()
            .await
            .map_err(|e| PredictionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PredictionError::Api(status.as_u16(), error_text));
        }

        let parsed: PredictionResponse = response
            .json()
            .await
            .map_err(|e| PredictionError::Parse(e.to_string()))?;

        tracing::info!(
            candidates = parsed.predictions.len(),
            "Classification response received"
        );

        Ok(parsed.predictions)
    }
}
