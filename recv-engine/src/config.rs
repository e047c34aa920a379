//! Configuration resolution for recv-engine
//!
//! Resolution priority per field: environment variable → TOML config
//! file → compiled default. The TOML file location is resolved by
//! `recv_common::config::config_file_path`.

use recv_common::config::{config_file_path, load_toml_config, TomlConfig};
use recv_common::Result;
use std::time::Duration;
use tracing::info;

/// Default HTTP listen port for the engine service
pub const DEFAULT_LISTEN_PORT: u16 = 5811;

/// Hard deadline for a color comparison request
pub const COLOR_ANALYSIS_TIMEOUT: Duration = Duration::from_millis(5000);

/// Per-request budget for classification and order-system calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub listen_port: u16,
    pub order_api_base_url: String,
    pub analysis_base_url: String,
    pub prediction_model_url: String,
    pub prediction_api_key: String,
    pub rtsp_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            order_api_base_url: "http://127.0.0.1:8084/api".to_string(),
            analysis_base_url: "http://127.0.0.1:5000".to_string(),
            prediction_model_url: "http://127.0.0.1:9001/raw-materials/1".to_string(),
            prediction_api_key: String::new(),
            rtsp_url: "rtsp://169.254.140.61:554".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the TOML file with env overrides
    pub fn load() -> Result<Self> {
        let path = config_file_path();
        let toml_config = load_toml_config(&path)?;
        let config = Self::from_sources(&toml_config);
        info!(config_file = %path.display(), "Engine configuration resolved");
        Ok(config)
    }

    /// Merge TOML values with env overrides on top of defaults
    pub fn from_sources(toml_config: &TomlConfig) -> Self {
        let defaults = Self::default();

        Self {
            listen_port: env_var("RECV_LISTEN_PORT")
                .and_then(|v| v.parse().ok())
                .or(toml_config.listen_port)
                .unwrap_or(defaults.listen_port),
            order_api_base_url: env_var("RECV_ORDER_API_URL")
                .or_else(|| toml_config.order_api_base_url.clone())
                .unwrap_or(defaults.order_api_base_url),
            analysis_base_url: env_var("RECV_ANALYSIS_URL")
                .or_else(|| toml_config.analysis_base_url.clone())
                .unwrap_or(defaults.analysis_base_url),
            prediction_model_url: env_var("RECV_PREDICTION_URL")
                .or_else(|| toml_config.prediction_model_url.clone())
                .unwrap_or(defaults.prediction_model_url),
            prediction_api_key: env_var("RECV_PREDICTION_API_KEY")
                .or_else(|| toml_config.prediction_api_key.clone())
                .unwrap_or(defaults.prediction_api_key),
            rtsp_url: env_var("RECV_RTSP_URL")
                .or_else(|| toml_config.rtsp_url.clone())
                .unwrap_or(defaults.rtsp_url),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
