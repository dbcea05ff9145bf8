//! External node executors and their registry
//!
//! Action, agent, notification and webhook nodes do not run inside the
//! engine: each hands its resolved configuration to a `NodeExecutor`
//! registered for its node type. How the executor does its work (an HTTP
//! call, an in-process agent runtime, a test double) is its own business.
//!
//! # Usage
//!
//! ```ignore
//! use workflow_engine::{ExecutorRegistry, NodeOutput, NodeType};
//!
//! let mut registry = ExecutorRegistry::new();
//! registry.register(NodeType::Webhook, Arc::new(MyWebhookExecutor::new()));
//! registry.register_callback(NodeType::Agent, |invocation| async move {
//!     Ok(NodeOutput::new().with("text", json!("hello")).with_tokens(12))
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::NodeError;
use crate::types::{NodeId, NodeKind, NodeType};

/// Everything an executor gets to see for one node visit.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInvocation {
    pub execution_id: String,
    pub node_id: NodeId,
    pub label: String,
    /// Node configuration with every `{{path}}` placeholder resolved
    pub config: NodeKind,
    /// Named inputs resolved from the node's input mapping (agents only)
    pub inputs: Map<String, Value>,
    /// Snapshot of the run context at dispatch time
    pub context: Value,
}

impl NodeInvocation {
    pub fn node_type(&self) -> NodeType {
        self.config.node_type()
    }
}

/// What an executor hands back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeOutput {
    /// Declared outputs, written to the context through the output mapping
    pub outputs: Map<String, Value>,
    /// Tokens consumed, reported by agent executors
    pub tokens_used: Option<u64>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one output value
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.outputs.insert(key.into(), value);
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }
}

/// Per-node-type executor
///
/// Implementations must be safe to call from independent runs at the same
/// time.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(&self, invocation: NodeInvocation) -> Result<NodeOutput, NodeError>;
}

/// Registry of executors for the delegating node types
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<NodeType, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the executor for a node type, replacing any previous one
    pub fn register(&mut self, node_type: NodeType, executor: Arc<dyn NodeExecutor>) {
        if !node_type.is_delegating() {
            log::warn!(
                "Registering an executor for '{}' nodes, which the engine runs itself",
                node_type
            );
        }
        self.executors.insert(node_type, executor);
    }

    /// Register a node type using an async callback function
    pub fn register_callback<F, Fut>(&mut self, node_type: NodeType, callback: F)
    where
        F: Fn(NodeInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<NodeOutput, NodeError>> + Send + 'static,
    {
        let executor = CallbackNodeExecutor {
            callback: Box::new(move |invocation| Box::pin(callback(invocation))),
        };
        self.register(node_type, Arc::new(executor));
    }

    /// Get the executor for a node type
    pub fn get(&self, node_type: NodeType) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(&node_type).cloned()
    }

    /// Check if a node type has an executor
    pub fn contains(&self, node_type: NodeType) -> bool {
        self.executors.contains_key(&node_type)
    }

    /// Registered node types, in palette order
    pub fn node_types(&self) -> Vec<NodeType> {
        NodeType::ALL
            .iter()
            .copied()
            .filter(|t| self.executors.contains_key(t))
            .collect()
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` for the same node type.
    pub fn merge(&mut self, other: ExecutorRegistry) {
        self.executors.extend(other.executors);
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}

type BoxedCallback = Box<
    dyn Fn(NodeInvocation) -> Pin<Box<dyn Future<Output = Result<NodeOutput, NodeError>> + Send>>
        + Send
        + Sync,
>;

/// Async callback-based NodeExecutor
pub struct CallbackNodeExecutor {
    callback: BoxedCallback,
}

#[async_trait]
impl NodeExecutor for CallbackNodeExecutor {
    async fn execute(&self, invocation: NodeInvocation) -> Result<NodeOutput, NodeError> {
        (self.callback)(invocation).await
    }
}

/// Synchronous callback-based NodeExecutor
///
/// Wraps a synchronous closure for executors that never wait.
pub struct SyncCallbackNodeExecutor {
    callback: Box<dyn Fn(&NodeInvocation) -> Result<NodeOutput, NodeError> + Send + Sync>,
}

impl SyncCallbackNodeExecutor {
    pub fn new(
        callback: impl Fn(&NodeInvocation) -> Result<NodeOutput, NodeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl NodeExecutor for SyncCallbackNodeExecutor {
    async fn execute(&self, invocation: NodeInvocation) -> Result<NodeOutput, NodeError> {
        (self.callback)(&invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invocation(node_type: NodeType) -> NodeInvocation {
        NodeInvocation {
            execution_id: "exec-1".to_string(),
            node_id: "n1".to_string(),
            label: "Node".to_string(),
            config: NodeKind::default_for(node_type),
            inputs: Map::new(),
            context: json!({}),
        }
    }

    #[tokio::test]
    async fn test_register_callback() {
        let mut registry = ExecutorRegistry::new();
        registry.register_callback(NodeType::Action, |invocation| async move {
            Ok(NodeOutput::new().with("node", json!(invocation.node_id)))
        });

        assert!(registry.contains(NodeType::Action));
        assert!(!registry.contains(NodeType::Agent));

        let executor = registry.get(NodeType::Action).unwrap();
        let output = executor.execute(invocation(NodeType::Action)).await.unwrap();
        assert_eq!(output.outputs.get("node"), Some(&json!("n1")));
        assert_eq!(output.tokens_used, None);
    }

    #[tokio::test]
    async fn test_sync_callback_executor() {
        let executor = SyncCallbackNodeExecutor::new(|invocation| {
            if invocation.node_type() == NodeType::Agent {
                Ok(NodeOutput::new().with_tokens(7))
            } else {
                Err(NodeError::failed("unsupported"))
            }
        });

        let output = executor.execute(invocation(NodeType::Agent)).await.unwrap();
        assert_eq!(output.tokens_used, Some(7));
        assert!(executor.execute(invocation(NodeType::Webhook)).await.is_err());
    }

    #[test]
    fn test_merge_override() {
        let mut first = ExecutorRegistry::new();
        first.register(
            NodeType::Webhook,
            Arc::new(SyncCallbackNodeExecutor::new(|_| Ok(NodeOutput::new()))),
        );
        let mut second = ExecutorRegistry::new();
        second.register(
            NodeType::Notification,
            Arc::new(SyncCallbackNodeExecutor::new(|_| Ok(NodeOutput::new()))),
        );

        first.merge(second);
        assert_eq!(
            first.node_types(),
            vec![NodeType::Notification, NodeType::Webhook]
        );
    }
}
