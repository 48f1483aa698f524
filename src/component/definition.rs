//! Component definition and the execute seam

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::ExecutionContext;
use crate::error::{ComponentError, Result, RetryPolicy, SdkError};
use crate::port::{
    extract_parameters, extract_ports, validate_component_schema, ParameterDescriptor,
    PortDescriptor,
};
use crate::runner::RunnerConfig;
use crate::schema::Schema;

/// Argument of [`ComponentExecute::execute`]; also the Docker input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPayload {
    #[serde(default = "empty_object")]
    pub inputs: Value,
    #[serde(default = "empty_object")]
    pub params: Value,
}

fn empty_object() -> Value {
    json!({})
}

impl ExecutionPayload {
    pub fn new(inputs: Value, params: Value) -> Self {
        Self { inputs, params }
    }
}

impl Default for ExecutionPayload {
    fn default() -> Self {
        Self::new(empty_object(), empty_object())
    }
}

#[async_trait]
pub trait ComponentExecute: Send + Sync {
    async fn execute(
        &self,
        payload: ExecutionPayload,
        ctx: &ExecutionContext,
    ) -> std::result::Result<Value, ComponentError>;
}

/// [`ComponentExecute`] backed by an async closure
pub struct FnExecutor<F>(F);

/// Wrap an async closure as a [`ComponentExecute`]
///
/// ```rust
/// use component_sdk::component::execute_fn;
/// use serde_json::json;
///
/// let exec = execute_fn(|payload, _ctx| async move {
///     Ok(json!({ "greeting": format!("hello {}", payload.inputs["name"]) }))
/// });
/// # let _ = exec;
/// ```
pub fn execute_fn<F, Fut>(f: F) -> FnExecutor<F>
where
    F: Fn(ExecutionPayload, ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Value, ComponentError>> + Send + 'static,
{
    FnExecutor(f)
}

#[async_trait]
impl<F, Fut> ComponentExecute for FnExecutor<F>
where
    F: Fn(ExecutionPayload, ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Value, ComponentError>> + Send + 'static,
{
    async fn execute(
        &self,
        payload: ExecutionPayload,
        ctx: &ExecutionContext,
    ) -> std::result::Result<Value, ComponentError> {
        (self.0)(payload, ctx.clone()).await
    }
}

pub type ResolvePortsFn = Arc<dyn Fn(&Value) -> ResolvedPorts + Send + Sync>;

/// Port schemas after parameters have been taken into account
#[derive(Debug, Clone)]
pub struct ResolvedPorts {
    pub inputs: Schema,
    pub outputs: Schema,
}

#[derive(Clone)]
pub struct ComponentDefinition {
    pub id: String,
    pub label: String,
    pub category: String,
    pub description: Option<String>,
    runner: Arc<RunnerConfig>,
    pub inputs: Schema,
    pub outputs: Schema,
    pub parameters: Option<Schema>,
    executor: Arc<dyn ComponentExecute>,
    resolve_ports: Option<ResolvePortsFn>,
    pub retry_policy: Option<RetryPolicy>,
}

impl ComponentDefinition {
    /// Inline component; see [`Self::with_runner`] for other isolation
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        category: impl Into<String>,
        inputs: Schema,
        outputs: Schema,
        executor: impl ComponentExecute + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            category: category.into(),
            description: None,
            runner: Arc::new(RunnerConfig::inline()),
            inputs,
            outputs,
            parameters: None,
            executor: Arc::new(executor),
            resolve_ports: None,
            retry_policy: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = Arc::new(runner);
        self
    }

    pub fn with_parameters(mut self, parameters: Schema) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_resolve_ports<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&Value) -> ResolvedPorts + Send + Sync + 'static,
    {
        self.resolve_ports = Some(Arc::new(resolve));
        self
    }

    pub fn runner(&self) -> &RunnerConfig {
        &self.runner
    }

    pub fn executor(&self) -> &dyn ComponentExecute {
        self.executor.as_ref()
    }

    /// Port schemas for `params`; the static ones without a resolver
    pub fn resolve_ports(&self, params: &Value) -> ResolvedPorts {
        match &self.resolve_ports {
            Some(resolve) => resolve(params),
            None => ResolvedPorts {
                inputs: self.inputs.clone(),
                outputs: self.outputs.clone(),
            },
        }
    }

    pub fn input_ports(&self, params: &Value) -> Result<Vec<PortDescriptor>> {
        let ports = self.resolve_ports(params);
        extract_ports(&ports.inputs).map_err(|source| self.schema_error("inputs", source))
    }

    pub fn output_ports(&self, params: &Value) -> Result<Vec<PortDescriptor>> {
        let ports = self.resolve_ports(params);
        extract_ports(&ports.outputs).map_err(|source| self.schema_error("outputs", source))
    }

    pub fn parameter_descriptors(&self) -> Result<Vec<ParameterDescriptor>> {
        match &self.parameters {
            Some(schema) => {
                extract_parameters(schema).map_err(|source| self.schema_error("parameters", source))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Registration-time checks: id present, every port field annotated and derivable
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(SdkError::EmptyComponentId);
        }
        validate_component_schema(&self.inputs)
            .map_err(|source| self.schema_error("inputs", source))?;
        validate_component_schema(&self.outputs)
            .map_err(|source| self.schema_error("outputs", source))?;
        self.parameter_descriptors()?;
        Ok(())
    }

    fn schema_error(&self, section: &'static str, source: crate::port::PortError) -> SdkError {
        SdkError::InvalidComponentSchema {
            id: self.id.clone(),
            section,
            source,
        }
    }
}

impl std::fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("category", &self.category)
            .field("runner", &self.runner.kind_name())
            .field("parameters", &self.parameters.is_some())
            .field("resolve_ports", &self.resolve_ports.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::meta::{EditorHint, ParamMetadata, PortMetadata};
    use crate::port::ConnectionType;

    fn echo() -> impl ComponentExecute {
        execute_fn(|payload, _ctx| async move { Ok(payload.inputs) })
    }

    fn text_port(label: &str) -> Schema {
        Schema::string().with_port(PortMetadata::new(label))
    }

    #[test]
    fn payload_defaults_to_empty_objects() {
        let payload: ExecutionPayload = serde_json::from_value(json!({})).unwrap();
        assert_eq!(payload, ExecutionPayload::default());
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"inputs": {}, "params": {}})
        );
    }

    #[test]
    fn valid_definition_passes() {
        let def = ComponentDefinition::new(
            "core.echo",
            "Echo",
            "core",
            Schema::object([("text", text_port("Text"))]),
            Schema::object([("text", text_port("Text"))]),
            echo(),
        )
        .with_parameters(Schema::object([(
            "mode",
            Schema::string().with_param(ParamMetadata::new("Mode", EditorHint::Text)),
        )]));

        def.validate().unwrap();
        assert_eq!(def.runner(), &RunnerConfig::inline());
        assert_eq!(def.parameter_descriptors().unwrap().len(), 1);
    }

    #[test]
    fn unannotated_field_is_rejected_with_section() {
        let def = ComponentDefinition::new(
            "core.bad",
            "Bad",
            "core",
            Schema::object([("raw", Schema::string())]),
            Schema::object([] as [(&str, Schema); 0]),
            echo(),
        );
        let err = def.validate().unwrap_err();
        assert!(matches!(
            err,
            SdkError::InvalidComponentSchema {
                section: "inputs",
                ..
            }
        ));
    }

    #[test]
    fn blank_id_is_rejected() {
        let def = ComponentDefinition::new(
            "  ",
            "Nothing",
            "core",
            Schema::object([] as [(&str, Schema); 0]),
            Schema::object([] as [(&str, Schema); 0]),
            echo(),
        );
        assert!(matches!(def.validate(), Err(SdkError::EmptyComponentId)));
    }

    #[test]
    fn resolver_changes_ports_per_params() {
        let def = ComponentDefinition::new(
            "core.dynamic",
            "Dynamic",
            "core",
            Schema::object([("value", text_port("Value"))]),
            Schema::object([("value", text_port("Value"))]),
            echo(),
        )
        .with_resolve_ports(|params| {
            let value = if params["numeric"] == json!(true) {
                Schema::number().with_port(PortMetadata::new("Value"))
            } else {
                Schema::string().with_port(PortMetadata::new("Value"))
            };
            ResolvedPorts {
                inputs: Schema::object([("value", value.clone())]),
                outputs: Schema::object([("value", value)]),
            }
        });

        let numeric = def.input_ports(&json!({"numeric": true})).unwrap();
        assert_eq!(numeric[0].connection_type, ConnectionType::number());
        let text = def.output_ports(&json!({})).unwrap();
        assert_eq!(text[0].connection_type, ConnectionType::text());
    }
}
