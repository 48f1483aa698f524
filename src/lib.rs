//! Component SDK - typed, observable units of work for workflow automation
//!
//! A component declares its inputs, outputs and parameters as [`Schema`]s
//! annotated with port metadata, and runs inline, in a fresh container or on
//! a remote executor. Progress, logs, terminal bytes and HTTP traffic flow to
//! the sinks attached to its [`ExecutionContext`].
//!
//! ```text
//! ComponentDefinition ──register──▶ ComponentRegistry
//!        │
//!        ▼ invoke_component
//! Schema::parse ─▶ Runner (Inline | Docker | Remote) ─▶ Schema::parse
//!        │                  │
//!        └──── ExecutionContext: logger, trace, terminal, http ────┘
//! ```

pub mod component;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod http;
pub mod port;
pub mod runner;
pub mod schema;

pub use component::{
    execute_fn, invoke_component, registry, ComponentDefinition, ComponentExecute,
    ComponentRegistry, ExecutionPayload,
};
pub use config::SdkConfig;
pub use context::{create_execution_context, ExecutionContext, ExecutionContextOptions};
pub use error::{ComponentError, ErrorKind, RetryPolicy, SdkError};
pub use http::{create_http_client, HttpClient};
pub use port::{can_connect, coerce, derive_connection_type, ConnectionType, PortMetadata};
pub use runner::{run_component_with_runner, Runner, RunnerConfig};
pub use schema::Schema;
