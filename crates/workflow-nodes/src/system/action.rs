//! Action Executor
//!
//! Runs action nodes by dispatching on their `actionType` to a named
//! handler. Hosts add their own handlers next to the built-in ones.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use workflow_engine::{NodeError, NodeExecutor, NodeInvocation, NodeKind, NodeOutput};

/// Handler for one action type
///
/// Receives the action's resolved parameters and returns its outputs.
pub type ActionHandler =
    Arc<dyn Fn(&Map<String, Value>) -> Result<Map<String, Value>, NodeError> + Send + Sync>;

/// Action Executor
///
/// # Built-in actions
/// - `log` - Writes `message` to the log at `level` (default `info`)
/// - `echo` - Returns its parameters unchanged
/// - `fail` - Fails with `message`
#[derive(Clone)]
pub struct ActionExecutor {
    handlers: HashMap<String, ActionHandler>,
}

impl ActionExecutor {
    /// Create an executor with the built-in actions
    pub fn new() -> Self {
        let mut executor = Self::empty();
        executor.register("log", log_action);
        executor.register("echo", |parameters| Ok(parameters.clone()));
        executor.register("fail", |parameters| {
            let message = parameters
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Action failed");
            Err(NodeError::failed(message))
        });
        executor
    }

    /// Create an executor without any actions
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous one for the same name
    pub fn register<F>(&mut self, action_type: impl Into<String>, handler: F)
    where
        F: Fn(&Map<String, Value>) -> Result<Map<String, Value>, NodeError> + Send + Sync + 'static,
    {
        self.handlers.insert(action_type.into(), Arc::new(handler));
    }

    pub fn with_action<F>(mut self, action_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Map<String, Value>, NodeError> + Send + Sync + 'static,
    {
        self.register(action_type, handler);
        self
    }

    /// Registered action names, sorted
    pub fn action_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn log_action(parameters: &Map<String, Value>) -> Result<Map<String, Value>, NodeError> {
    let message = parameters
        .get("message")
        .map(|m| match m {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    let level = parameters
        .get("level")
        .and_then(Value::as_str)
        .unwrap_or("info");
    match level {
        "debug" => log::debug!("{}", message),
        "warn" | "warning" => log::warn!("{}", message),
        "error" => log::error!("{}", message),
        _ => log::info!("{}", message),
    }

    let mut outputs = Map::new();
    outputs.insert("logged".to_string(), json!(message));
    Ok(outputs)
}

#[async_trait]
impl NodeExecutor for ActionExecutor {
    async fn execute(&self, invocation: NodeInvocation) -> Result<NodeOutput, NodeError> {
        let NodeKind::Action(config) = &invocation.config else {
            return Err(NodeError::InvalidConfig(format!(
                "action executor cannot run '{}' nodes",
                invocation.node_type()
            )));
        };
        let handler = self.handlers.get(&config.action_type).ok_or_else(|| {
            NodeError::InvalidConfig(format!("Unknown action type '{}'", config.action_type))
        })?;

        log::debug!(
            "ActionExecutor {}: running '{}'",
            invocation.node_id,
            config.action_type
        );
        let outputs = handler(&config.parameters)?;
        Ok(NodeOutput {
            outputs,
            tokens_used: None,
        })
    }
}
