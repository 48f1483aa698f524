//! One full invocation: validate, trace, run, validate outputs

use serde_json::{json, Value};
use tracing::instrument;

use super::definition::{ComponentDefinition, ExecutionPayload};
use crate::context::{ExecutionContext, TraceEventKind};
use crate::error::ComponentError;
use crate::runner::{default_runner, Runner};
use crate::schema::json_type;

/// Invoke `definition` with the process-wide runner
pub async fn invoke_component(
    definition: &ComponentDefinition,
    payload: ExecutionPayload,
    ctx: &ExecutionContext,
) -> Result<Value, ComponentError> {
    invoke_component_with(default_runner(), definition, payload, ctx).await
}

/// Parse inputs and params, emit `NODE_STARTED`, run, parse outputs and emit
/// `NODE_COMPLETED` or `NODE_FAILED`
#[instrument(skip_all, fields(component = %definition.id, run_id = %ctx.run_id()))]
pub async fn invoke_component_with(
    runner: &Runner,
    definition: &ComponentDefinition,
    payload: ExecutionPayload,
    ctx: &ExecutionContext,
) -> Result<Value, ComponentError> {
    let result = run(runner, definition, payload, ctx).await;

    if let Some(trace) = ctx.trace() {
        match &result {
            Ok(output) => trace.record(TraceEventKind::NodeCompleted {
                output_summary: Some(summarize(output)),
            }),
            Err(err) => trace.record(TraceEventKind::NodeFailed {
                error: err.to_payload(),
            }),
        }
    }
    if let Err(err) = &result {
        tracing::debug!(error_type = err.error_type(), retryable = err.is_retryable(), "{}", err);
    }
    result
}

async fn run(
    runner: &Runner,
    definition: &ComponentDefinition,
    payload: ExecutionPayload,
    ctx: &ExecutionContext,
) -> Result<Value, ComponentError> {
    let params = match &definition.parameters {
        Some(schema) => schema.parse(&payload.params)?,
        None => payload.params,
    };
    let ports = definition.resolve_ports(&params);
    let inputs = ports.inputs.parse(&payload.inputs)?;

    if let Some(trace) = ctx.trace() {
        trace.record(TraceEventKind::NodeStarted);
    }

    let output = runner
        .run(
            definition.runner(),
            definition.executor(),
            ExecutionPayload::new(inputs, params),
            ctx,
        )
        .await?;

    Ok(ports.outputs.parse(&output)?)
}

fn summarize(output: &Value) -> Value {
    match output {
        Value::Object(map) => json!({ "fields": map.keys().collect::<Vec<_>>() }),
        other => json!({ "type": json_type(other) }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::execute_fn;
    use crate::context::{create_execution_context, ExecutionContextOptions, MemoryTraceSink};
    use crate::port::meta::PortMetadata;
    use crate::schema::Schema;
    use std::sync::Arc;

    fn doubler() -> ComponentDefinition {
        ComponentDefinition::new(
            "math.double",
            "Double",
            "math",
            Schema::object([(
                "n",
                Schema::number()
                    .with_default(2)
                    .with_port(PortMetadata::new("N")),
            )]),
            Schema::object([("n", Schema::number().with_port(PortMetadata::new("N")))]),
            execute_fn(|payload, _ctx| async move {
                let n = payload.inputs["n"].as_f64().unwrap_or_default();
                Ok(json!({ "n": n * 2.0, "debug": true }))
            }),
        )
    }

    fn traced() -> (ExecutionContext, Arc<MemoryTraceSink>) {
        let sink = Arc::new(MemoryTraceSink::new());
        let ctx = create_execution_context(
            ExecutionContextOptions::new("run-9", "double-1").trace_sink(sink.clone()),
        );
        (ctx, sink)
    }

    #[tokio::test]
    async fn defaults_applied_and_outputs_stripped() {
        let (ctx, sink) = traced();
        let out = invoke_component_with(&Runner::default(), &doubler(), ExecutionPayload::default(), &ctx)
            .await
            .unwrap();
        assert_eq!(out, json!({"n": 4.0}));

        let types: Vec<_> = sink.events().iter().map(|e| e.kind.type_name()).collect();
        assert_eq!(types, ["NODE_STARTED", "NODE_COMPLETED"]);
    }

    #[tokio::test]
    async fn invalid_inputs_fail_before_start() {
        let (ctx, sink) = traced();
        let err = invoke_component_with(
            &Runner::default(),
            &doubler(),
            ExecutionPayload::new(json!({"n": "four"}), json!({})),
            &ctx,
        )
        .await
        .unwrap_err();

        assert_eq!(err.error_type(), "ValidationError");
        assert!(err.field_errors().unwrap().contains_key("n"));
        let types: Vec<_> = sink.events().iter().map(|e| e.kind.type_name()).collect();
        assert_eq!(types, ["NODE_FAILED"]);
    }
}
