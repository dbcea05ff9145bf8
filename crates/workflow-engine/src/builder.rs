//! Fluent builder for workflows
//!
//! Provides a compact API for constructing workflows programmatically, in
//! tests and in host code that ships fixed workflows.

use crate::types::{
    ActionConfig, AgentConfig, ConditionConfig, EndConfig, EndStatus, LoopConfig, NodeKind,
    NodeType, Position, RetryPolicy, TransformConfig, Workflow, WorkflowEdge, WorkflowNode,
};

/// Fluent builder for constructing workflows
///
/// Nodes are laid out left to right in the order they are added. Edges get
/// sequential IDs (`edge-1`, `edge-2`, ...).
///
/// # Example
///
/// ```ignore
/// let workflow = WorkflowBuilder::new("wf-1", "Greeting")
///     .trigger("start")
///     .action("greet", "send_email")
///     .end("done")
///     .connect("start", "greet")
///     .connect("greet", "done")
///     .build();
/// ```
pub struct WorkflowBuilder {
    workflow: Workflow,
    edge_counter: usize,
}

impl WorkflowBuilder {
    /// Create a new workflow builder
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            workflow: Workflow::with_id(id, name),
            edge_counter: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.workflow.description = description.into();
        self
    }

    pub fn with_token_budget(mut self, budget: u64) -> Self {
        self.workflow.token_budget = Some(budget);
        self
    }

    /// Wall-clock limit for a run, in milliseconds
    pub fn with_max_execution_time(mut self, millis: u64) -> Self {
        self.workflow.max_execution_time = Some(millis);
        self
    }

    pub fn with_retry_policy(mut self, max_retries: u32, retry_delay: u64) -> Self {
        self.workflow.retry_policy = Some(RetryPolicy {
            max_retries,
            retry_delay,
        });
        self
    }

    /// Add a node with an explicit configuration
    pub fn node(mut self, id: impl Into<String>, kind: NodeKind) -> Self {
        let id = id.into();
        let position = Position::new(self.workflow.nodes.len() as f64 * 200.0, 0.0);
        self.workflow
            .nodes
            .push(WorkflowNode::new(id.clone(), id, kind).at(position));
        self
    }

    /// Set the label of the most recently added node
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        if let Some(node) = self.workflow.nodes.last_mut() {
            node.label = label.into();
        }
        self
    }

    /// Add a manual trigger node
    pub fn trigger(self, id: impl Into<String>) -> Self {
        self.node(id, NodeKind::default_for(NodeType::Trigger))
    }

    pub fn condition(self, id: impl Into<String>, config: ConditionConfig) -> Self {
        self.node(id, NodeKind::Condition(config))
    }

    /// Add an action node with no parameters
    pub fn action(self, id: impl Into<String>, action_type: impl Into<String>) -> Self {
        self.node(
            id,
            NodeKind::Action(ActionConfig {
                action_type: action_type.into(),
                ..Default::default()
            }),
        )
    }

    pub fn agent(self, id: impl Into<String>, config: AgentConfig) -> Self {
        self.node(id, NodeKind::Agent(config))
    }

    pub fn for_each(self, id: impl Into<String>, config: LoopConfig) -> Self {
        self.node(id, NodeKind::Loop(config))
    }

    pub fn transform(self, id: impl Into<String>, config: TransformConfig) -> Self {
        self.node(id, NodeKind::Transform(config))
    }

    /// Add an end node with `success` status
    pub fn end(self, id: impl Into<String>) -> Self {
        self.end_with(id, EndStatus::Success)
    }

    pub fn end_with(self, id: impl Into<String>, status: EndStatus) -> Self {
        self.node(id, NodeKind::End(EndConfig { status }))
    }

    /// Add an unlabelled edge (auto-generates edge ID)
    pub fn connect(self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.add_edge(source.into(), target.into(), None)
    }

    /// Add an edge leaving through a source handle (`true`, `false`, `complete`)
    pub fn connect_via(
        self,
        source: impl Into<String>,
        handle: &str,
        target: impl Into<String>,
    ) -> Self {
        self.add_edge(source.into(), target.into(), Some(handle))
    }

    fn add_edge(mut self, source: String, target: String, handle: Option<&str>) -> Self {
        self.edge_counter += 1;
        let id = format!("edge-{}", self.edge_counter);
        self.workflow
            .edges
            .push(WorkflowEdge::new(id, source, target, handle));
        self
    }

    /// Build the workflow without validation
    pub fn build(self) -> Workflow {
        self.workflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HANDLE_COMPLETE;
    use crate::validation::validate;

    #[test]
    fn test_builder_produces_valid_workflow() {
        let workflow = WorkflowBuilder::new("wf-1", "Digest")
            .with_token_budget(500)
            .trigger("start")
            .for_each(
                "each",
                LoopConfig {
                    iterate_over: "items".to_string(),
                    ..Default::default()
                },
            )
            .action("send", "send_email")
            .labelled("Send email")
            .end("done")
            .connect("start", "each")
            .connect("each", "send")
            .connect_via("each", HANDLE_COMPLETE, "done")
            .build();

        assert_eq!(workflow.nodes.len(), 4);
        assert_eq!(workflow.token_budget, Some(500));
        assert_eq!(workflow.find_node("send").unwrap().label, "Send email");
        assert_eq!(workflow.edges[2].id, "edge-3");
        assert!(workflow.edges[2].has_handle(HANDLE_COMPLETE));

        // `send` has no outgoing edge, which is only a warning
        let report = validate(&workflow);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }
}
