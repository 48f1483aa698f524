//! Runner configuration attached to a component definition

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::DockerSettings;
use crate::constants::DEFAULT_DOCKER_TIMEOUT;

/// Where and how a component executes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RunnerConfig {
    /// In-process call of the component's `execute`
    Inline {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        concurrency: Option<usize>,
    },
    /// Fresh container per invocation
    Docker(DockerRunnerConfig),
    /// Remote executor (falls back to inline when configured)
    #[serde(rename_all = "camelCase")]
    Remote {
        endpoint: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auth_secret_name: Option<String>,
    },
}

impl RunnerConfig {
    pub fn inline() -> Self {
        Self::Inline { concurrency: None }
    }

    pub fn docker(image: impl Into<String>) -> Self {
        Self::Docker(DockerRunnerConfig::new(image))
    }

    pub fn remote(endpoint: impl Into<String>) -> Self {
        Self::Remote {
            endpoint: endpoint.into(),
            auth_secret_name: None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Inline { .. } => "inline",
            Self::Docker(_) => "docker",
            Self::Remote { .. } => "remote",
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::inline()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    None,
    Bridge,
    Host,
}

impl NetworkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bridge => "bridge",
            Self::Host => "host",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
}

impl VolumeMount {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// `source:target[:ro]` as passed to `-v`
    pub fn to_arg(&self) -> String {
        if self.read_only {
            format!("{}:{}:ro", self.source, self.target)
        } else {
            format!("{}:{}", self.source, self.target)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerRunnerConfig {
    pub image: String,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub network: NetworkMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(default)]
    pub volumes: Vec<VolumeMount>,

    /// Zero means "use the configured default"
    #[serde(default)]
    pub timeout_seconds: u64,

    /// Also write the payload to the container's stdin (stdio transport only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin_json: Option<bool>,
}

impl DockerRunnerConfig {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            command: Vec::new(),
            entrypoint: None,
            env: BTreeMap::new(),
            network: NetworkMode::None,
            platform: None,
            volumes: Vec::new(),
            timeout_seconds: 0,
            stdin_json: None,
        }
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_network(mut self, network: NetworkMode) -> Self {
        self.network = network;
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_volume(mut self, volume: VolumeMount) -> Self {
        self.volumes.push(volume);
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_stdin_json(mut self, enabled: bool) -> Self {
        self.stdin_json = Some(enabled);
        self
    }

    pub fn writes_stdin(&self) -> bool {
        self.stdin_json.unwrap_or(false)
    }

    /// Effective timeout: own value, then settings, then the builtin default
    pub fn timeout(&self, settings: &DockerSettings) -> Duration {
        [self.timeout_seconds, settings.default_timeout_seconds]
            .into_iter()
            .find(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DOCKER_TIMEOUT)
    }
}
