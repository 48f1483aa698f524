//! Runner - executes a component under its configured isolation
//!
//! ```text
//! RunnerConfig::Inline  → direct call of ComponentExecute::execute
//! RunnerConfig::Docker  → fresh container (see docker module)
//! RunnerConfig::Remote  → inline fallback or NotImplementedError
//! ```
//!
//! Component errors pass through untouched; only container failures are
//! translated here.

mod config;
mod docker;

use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::instrument;

use crate::component::{ComponentExecute, ExecutionPayload};
use crate::config::SdkConfig;
use crate::context::ExecutionContext;
use crate::error::ComponentError;

pub use config::{DockerRunnerConfig, NetworkMode, RunnerConfig, VolumeMount};

/// Runner bound to a specific [`SdkConfig`]
#[derive(Debug, Clone, Default)]
pub struct Runner {
    settings: SdkConfig,
}

impl Runner {
    pub fn new(settings: SdkConfig) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SdkConfig {
        &self.settings
    }

    #[instrument(
        name = "run_component",
        skip_all,
        fields(runner = config.kind_name(), node_ref = %ctx.component_ref(), run_id = %ctx.run_id())
    )]
    pub async fn run(
        &self,
        config: &RunnerConfig,
        execute: &dyn ComponentExecute,
        payload: ExecutionPayload,
        ctx: &ExecutionContext,
    ) -> Result<Value, ComponentError> {
        match config {
            RunnerConfig::Inline { .. } => execute.execute(payload, ctx).await,
            RunnerConfig::Docker(docker_config) => {
                docker::run_docker(docker_config, &self.settings.docker, &payload, ctx).await
            }
            RunnerConfig::Remote { endpoint, .. } => {
                if self.settings.remote.fallback_to_inline {
                    ctx.logger().info(format!(
                        "Remote executor {} requested, running inline",
                        endpoint
                    ));
                    execute.execute(payload, ctx).await
                } else {
                    ctx.logger()
                        .warn(format!("Remote executor {} is not available", endpoint));
                    Err(ComponentError::not_implemented(format!(
                        "Remote execution via {} is not implemented",
                        endpoint
                    ))
                    .with_detail("endpoint", endpoint.clone()))
                }
            }
        }
    }
}

static DEFAULT_RUNNER: Lazy<Runner> = Lazy::new(|| {
    let settings = SdkConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to default SDK config");
        SdkConfig::default()
    });
    Runner::new(settings.with_env())
});

/// Process-wide runner built from the user's config file and environment
pub fn default_runner() -> &'static Runner {
    &DEFAULT_RUNNER
}

/// Run `execute` under `config` with the process-wide settings
pub async fn run_component_with_runner(
    config: &RunnerConfig,
    execute: &dyn ComponentExecute,
    payload: ExecutionPayload,
    ctx: &ExecutionContext,
) -> Result<Value, ComponentError> {
    default_runner().run(config, execute, payload, ctx).await
}
