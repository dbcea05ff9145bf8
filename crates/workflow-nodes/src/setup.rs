//! Registry setup for host applications.
//!
//! Hosts call [`builtin_registry`] at startup to get an `ExecutorRegistry`
//! with the built-in executors, then merge in their own (agent executors in
//! particular). Keeping the wiring here means host crates don't need to know
//! which executor type serves which node type.

use std::sync::Arc;

use workflow_engine::{ExecutorRegistry, NodeType};

use crate::{ActionExecutor, NotificationExecutor, WebhookExecutor};

/// Built-in executors, for hosts that want to configure or inspect them
/// before registration.
#[derive(Clone)]
pub struct BuiltinExecutors {
    pub actions: Arc<ActionExecutor>,
    pub notifications: Arc<NotificationExecutor>,
    pub webhooks: Arc<WebhookExecutor>,
}

impl Default for BuiltinExecutors {
    fn default() -> Self {
        Self {
            actions: Arc::new(ActionExecutor::new()),
            notifications: Arc::new(NotificationExecutor::new()),
            webhooks: Arc::new(WebhookExecutor::new()),
        }
    }
}

impl BuiltinExecutors {
    /// Register every executor for its node type.
    pub fn register(&self, registry: &mut ExecutorRegistry) {
        registry.register(NodeType::Action, self.actions.clone());
        registry.register(NodeType::Notification, self.notifications.clone());
        registry.register(NodeType::Webhook, self.webhooks.clone());
    }

    pub fn into_registry(self) -> ExecutorRegistry {
        let mut registry = ExecutorRegistry::new();
        self.register(&mut registry);
        registry
    }
}

/// Registry with default built-in executors for action, notification and
/// webhook nodes.
///
/// # Example
///
/// ```ignore
/// let mut registry = workflow_nodes::builtin_registry();
/// registry.register(NodeType::Agent, Arc::new(MyAgentExecutor::new()));
/// let executor = WorkflowExecutor::new(Arc::new(registry));
/// ```
pub fn builtin_registry() -> ExecutorRegistry {
    BuiltinExecutors::default().into_registry()
}
