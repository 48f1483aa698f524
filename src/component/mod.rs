//! Components - definitions, the execute seam, registry and invocation

mod definition;
mod invoke;
mod registry;

pub use definition::{
    execute_fn, ComponentDefinition, ComponentExecute, ExecutionPayload, FnExecutor,
    ResolvePortsFn, ResolvedPorts,
};
pub use invoke::{invoke_component, invoke_component_with};
pub use registry::{registry, ComponentRegistry};
