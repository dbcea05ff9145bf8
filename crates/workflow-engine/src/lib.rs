//! Workflow Engine - Graph model, validation and execution for automation workflows
//!
//! A workflow is a directed graph of typed nodes (trigger, condition, action,
//! agent, delay, loop, transform, notification, webhook, end). This crate
//! provides:
//!
//! - A graph editor that keeps nodes and edges consistent under edits
//! - Deterministic validation with located errors and warnings
//! - An async executor with branching, loops, `{{path}}` interpolation,
//!   token budgets, deadlines, retries and a per-node audit log
//! - Compressed snapshot-based undo/redo
//!
//! # Architecture
//!
//! Leaves first:
//!
//! - `WorkflowEditor`: CRUD over nodes and edges, optional `HistoryManager`
//! - `validate`: classifies a workflow as executable or not
//! - `WorkflowExecutor`: walks the graph, delegating action, agent,
//!   notification and webhook nodes to `NodeExecutor`s from an
//!   `ExecutorRegistry`
//! - `EventSink`: generic progress streaming
//! - `WorkflowRepository` / `WorkflowService`: storage boundary
//!
//! # Example
//!
//! ```ignore
//! use workflow_engine::{ExecutorRegistry, WorkflowBuilder, WorkflowExecutor};
//!
//! let workflow = WorkflowBuilder::new("wf-1", "Hello")
//!     .trigger("start")
//!     .end("done")
//!     .connect("start", "done")
//!     .build();
//!
//! let executor = WorkflowExecutor::new(Arc::new(ExecutorRegistry::new()));
//! let execution = executor
//!     .execute(&workflow, json!({}), CancellationToken::new())
//!     .await?;
//! ```

pub mod builder;
pub mod condition;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod events;
pub mod execution;
pub mod executor;
pub mod graph;
pub mod history;
pub mod interpolate;
pub mod registry;
pub mod repository;
pub mod service;
pub mod template;
pub mod transform;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::WorkflowBuilder;
pub use config::{ConfigError, EngineConfig};
pub use context::ExecutionContext;
pub use error::{NodeError, Result, WorkflowEngineError};
pub use events::{
    ChannelEventSink, EventError, EventSink, ExecutionEvent, NullEventSink, VecEventSink,
};
pub use execution::{ExecutionError, ExecutionLog, ExecutionStatus, LogLevel, WorkflowExecution};
pub use executor::WorkflowExecutor;
pub use graph::{EdgePatch, NodePatch, WorkflowEditor, WorkflowSettings};
pub use history::HistoryManager;
pub use interpolate::{interpolate_text, interpolate_value, Interpolated};
pub use registry::{
    CallbackNodeExecutor, ExecutorRegistry, NodeExecutor, NodeInvocation, NodeOutput,
    SyncCallbackNodeExecutor,
};
pub use repository::{
    FileWorkflowRepository, InMemoryWorkflowRepository, WorkflowRepository, WorkflowSummary,
};
pub use service::WorkflowService;
pub use template::{
    node_palette, DefaultInstantiator, NodeTemplate, TemplateInstantiator, WorkflowTemplate,
};
pub use types::*;
pub use validation::{
    is_valid, validate, Severity, ValidationCode, ValidationIssue, ValidationReport,
};
