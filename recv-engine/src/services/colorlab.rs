//! Color comparison service client
//!
//! Scores visual divergence between a material's reference photo and
//! the captured photo. The request carries the captured image either
//! inline (`base2`) or by reference (`url2`) depending on capture mode.
//! A hard 5000 ms deadline applies; callers treat timeout and transport
//! failures as a degraded result, not a blocked flow.

use super::{AnalysisError, ColorAnalysisService};
use crate::config::COLOR_ANALYSIS_TIMEOUT;
use crate::models::CapturedImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Comparison mode; fixed for now, recognized extension point
const ANALYSIS_MODE: &str = "image_link";

#[derive(Debug, Serialize)]
struct AnalysisRequest<'a> {
    url1: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url2: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base2: Option<&'a str>,
    product_kind: &'a str,
    mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    color_difference: f64,
}

/// HTTP client for the color analysis endpoint
pub struct ColorAnalysisClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ColorAnalysisClient {
    pub fn new(base_url: String) -> Result<Self, AnalysisError> {
        let http_client = reqwest::Client::builder()
            .timeout(COLOR_ANALYSIS_TIMEOUT)
            .build()
            .map_err(|e| AnalysisError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }
}

#[async_trait]
impl ColorAnalysisService for ColorAnalysisClient {
    async fn compare(
        &self,
        reference_photo: &str,
        captured: &CapturedImage,
        material_code: &str,
    ) -> Result<f64, AnalysisError> {
        let (url2, base2) = match captured {
            CapturedImage::Reference(url) => (Some(url.as_str()), None),
            CapturedImage::Inline(payload) => (None, Some(payload.as_str())),
        };

        let request = AnalysisRequest {
            url1: reference_photo,
            url2,
            base2,
            product_kind: material_code,
            mode: ANALYSIS_MODE,
        };

        let url = format!("{}/analyze", self.base_url);
        tracing::debug!(url = %url, material_code, "Requesting color comparison");

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::Timeout
                } else {
                    AnalysisError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Api(status.as_u16(), error_text));
        }

        let parsed: AnalysisResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;

        tracing::info!(
            material_code,
            color_difference = parsed.color_difference,
            "Color comparison completed"
        );

        Ok(parsed.color_difference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_capture_serializes_base2_only() {
        let request = AnalysisRequest {
            url1: "https://img.example.com/thit_bo.jpg",
            url2: None,
            base2: Some("AAAA"),
            product_kind: "NVL_THIT001",
            mode: ANALYSIS_MODE,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"base2\":\"AAAA\""));
        assert!(!json.contains("url2"));
    }

    #[test]
    fn reference_capture_serializes_url2_only() {
        let request = AnalysisRequest {
            url1: "https://img.example.com/thit_bo.jpg",
            url2: Some("http://cam/shot.jpg"),
            base2: None,
            product_kind: "NVL_THIT001",
            mode: ANALYSIS_MODE,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"url2\":\"http://cam/shot.jpg\""));
        assert!(!json.contains("base2"));
    }

    #[test]
    fn response_parses_color_difference() {
        let parsed: AnalysisResponse =
            serde_json::from_str(r#"{"color_difference": 3.2, "extra": 1}"#).unwrap();
        assert!((parsed.color_difference - 3.2).abs() < 1e-9);
    }
}
