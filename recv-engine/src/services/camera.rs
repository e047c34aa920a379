//! RTSP camera capture client
//!
//! The camera is fronted by a capture gateway that grabs one frame from
//! the RTSP stream and hosts it as a fetchable image. The engine only
//! ever deals in the resulting image URL.

use super::{CameraError, CameraPort};
use crate::config::DEFAULT_REQUEST_TIMEOUT;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    success: bool,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the frame-capture gateway
pub struct RtspCameraClient {
    http_client: reqwest::Client,
    base_url: String,
    rtsp_url: String,
}

impl RtspCameraClient {
    pub fn new(base_url: String, rtsp_url: String) -> Result<Self, CameraError> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CameraError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            rtsp_url,
        })
    }
}

#[async_trait]
impl CameraPort for RtspCameraClient {
    async fn capture(&self) -> Result<String, CameraError> {
        let url = format!("{}/capture-image", self.base_url);
        tracing::debug!(url = %url, rtsp_url = %self.rtsp_url, "Requesting frame capture");

        let response = self
            .http_client
            .get(&url)
            .query(&[("mode", "rtsp"), ("rtsp_url", self.rtsp_url.as_str())])
            .send()
            .await
            .map_err(|e| CameraError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CameraError::Api(status.as_u16(), error_text));
        }

        let parsed: CaptureResponse = response
            .json()
            .await
            .map_err(|e| CameraError::Failed(e.to_string()))?;

        match (parsed.success, parsed.image_url) {
            (true, Some(image_url)) => {
                tracing::info!(image_url = %image_url, "Frame captured");
                Ok(image_url)
            }
            _ => Err(CameraError::Failed(
                parsed
                    .message
                    .unwrap_or_else(|| "capture gateway reported failure".to_string()),
            )),
        }
    }
}
