//! Configuration loading for the receiving services
//!
//! Resolution priority for the config file location:
//! 1. `RECV_CONFIG` environment variable (explicit path)
//! 2. User config directory (`~/.config/recv/config.toml` on Linux)
//! 3. `/etc/recv/config.toml` (Linux system-wide)
//!
//! Individual fields can additionally be overridden by environment
//! variables at service startup (see the engine's config module).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration shared by the receiving services
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP listen port for the engine service
    pub listen_port: Option<u16>,

    /// Base URL of the order-system API
    pub order_api_base_url: Option<String>,

    /// Base URL of the local analysis gateway (color comparison,
    /// camera capture, weight stream)
    pub analysis_base_url: Option<String>,

    /// Prediction model endpoint for material classification
    pub prediction_model_url: Option<String>,

    /// API key for the prediction service
    pub prediction_api_key: Option<String>,

    /// RTSP URL used by the camera capture collaborator
    pub rtsp_url: Option<String>,

    /// Default baud rate for the scale serial connection
    pub scale_baud_rate: Option<u32>,
}

/// Resolve the configuration file path for this platform
pub fn config_file_path() -> PathBuf {
    if let Ok(path) = std::env::var("RECV_CONFIG") {
        return PathBuf::from(path);
    }

    if let Some(dir) = dirs::config_dir() {
        let user_config = dir.join("recv").join("config.toml");
        if user_config.exists() {
            return user_config;
        }
    }

    let system_config = PathBuf::from("/etc/recv/config.toml");
    if system_config.exists() {
        return system_config;
    }

    // Default write location when no file exists yet
    dirs::config_dir()
        .map(|d| d.join("recv").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("./recv-config.toml"))
}

/// Load TOML configuration from the given path
///
/// A missing file is not an error: defaults apply and every field can
/// still come from environment overrides.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file found, using defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write TOML configuration atomically (write to temp file, then rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;

    Ok(())
}
