//! SDK Configuration
//!
//! Runtime settings for the Docker runner, HTTP instrumentation and the
//! remote runner. Stored in `~/.config/component-sdk/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`COMPONENT_SDK_*`)
//! 2. Config file (`~/.config/component-sdk/config.toml`)
//! 3. Defaults

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DOCKER_TIMEOUT, DEFAULT_MAX_REQUEST_BODY_BYTES, DEFAULT_MAX_RESPONSE_BODY_BYTES,
};
use crate::error::{Result, SdkError};

pub const ENV_DOCKER_BIN: &str = "COMPONENT_SDK_DOCKER_BIN";
pub const ENV_SCRATCH_DIR: &str = "COMPONENT_SDK_SCRATCH_DIR";
pub const ENV_DOCKER_TIMEOUT: &str = "COMPONENT_SDK_DOCKER_TIMEOUT";
pub const ENV_REMOTE_FALLBACK: &str = "COMPONENT_SDK_REMOTE_FALLBACK";
pub const ENV_HTTP_MAX_REQUEST_BYTES: &str = "COMPONENT_SDK_HTTP_MAX_REQUEST_BYTES";
pub const ENV_HTTP_MAX_RESPONSE_BYTES: &str = "COMPONENT_SDK_HTTP_MAX_RESPONSE_BYTES";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SdkConfig {
    #[serde(default)]
    pub docker: DockerSettings,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub remote: RemoteSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DockerSettings {
    /// Container CLI binary (`docker`, `podman`, or an absolute path)
    pub binary: String,

    /// Parent directory for per-invocation scratch dirs (system temp when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_root: Option<PathBuf>,

    /// Used when a runner config leaves `timeout_seconds` at zero
    pub default_timeout_seconds: u64,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            scratch_root: None,
            default_timeout_seconds: DEFAULT_DOCKER_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSettings {
    pub max_request_body_bytes: usize,
    pub max_response_body_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            max_request_body_bytes: DEFAULT_MAX_REQUEST_BODY_BYTES,
            max_response_body_bytes: DEFAULT_MAX_RESPONSE_BODY_BYTES,
            timeout_seconds: None,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteSettings {
    /// Run remote components inline until a remote executor exists
    pub fallback_to_inline: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            fallback_to_inline: true,
        }
    }
}

impl SdkConfig {
    /// Returns `~/.config/component-sdk/` on Unix, `%APPDATA%/component-sdk/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("component-sdk")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default path
    ///
    /// Returns defaults if the file doesn't exist, an error if it is malformed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SdkError::Config {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| SdkError::Config {
            reason: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config {
            reason: format!("Failed to serialize config: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// Set variables win over file values. Unparseable numbers are ignored
    /// with a warning.
    pub fn with_env(mut self) -> Self {
        if let Some(bin) = env_string(ENV_DOCKER_BIN) {
            self.docker.binary = bin;
        }
        if let Some(dir) = env_string(ENV_SCRATCH_DIR) {
            self.docker.scratch_root = Some(PathBuf::from(dir));
        }
        if let Some(secs) = env_parse::<u64>(ENV_DOCKER_TIMEOUT) {
            self.docker.default_timeout_seconds = secs;
        }
        if let Some(fallback) = env_bool(ENV_REMOTE_FALLBACK) {
            self.remote.fallback_to_inline = fallback;
        }
        if let Some(bytes) = env_parse::<usize>(ENV_HTTP_MAX_REQUEST_BYTES) {
            self.http.max_request_body_bytes = bytes;
        }
        if let Some(bytes) = env_parse::<usize>(ENV_HTTP_MAX_RESPONSE_BYTES) {
            self.http.max_response_body_bytes = bytes;
        }
        self
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    let raw = env_string(name)?;
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(var = name, value = %raw, "Ignoring unparseable boolean override");
            None
        }
    }
}
