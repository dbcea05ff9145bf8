//! Core types for workflow graphs
//!
//! These types define the structure of a workflow: its nodes (a closed
//! tagged union over the node types), the edges connecting them, and the
//! workflow-level execution settings.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::defaults;
use crate::execution::WorkflowExecution;

/// Unique identifier for a workflow
pub type WorkflowId = String;

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Source handle selecting the branch taken when a condition holds
pub const HANDLE_TRUE: &str = "true";

/// Source handle selecting the branch taken when a condition fails
pub const HANDLE_FALSE: &str = "false";

/// Source handle marking the edge a loop continues along once it is done
pub const HANDLE_COMPLETE: &str = "complete";

/// Lifecycle state of a workflow definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Archived,
}

/// Re-attempt policy for failed nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// How many times the same node is re-attempted after its first failure
    pub max_retries: u32,
    /// Wait between attempts, in milliseconds
    pub retry_delay: u64,
}

/// Editor position of a node (x, y)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A workflow definition: typed nodes, directed edges and run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique identifier for this workflow
    pub id: WorkflowId,
    /// Human-readable name
    pub name: String,
    /// Description of what this workflow does
    #[serde(default)]
    pub description: String,
    /// Definition version, carried onto every execution record
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub status: WorkflowStatus,
    /// Nodes in insertion order
    pub nodes: Vec<WorkflowNode>,
    /// Edges in insertion order
    pub edges: Vec<WorkflowEdge>,
    /// Upper bound on tokens consumed by agent nodes in one run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<u64>,
    /// Wall-clock limit for one run, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_execution_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
    /// Number of runs that reached a terminal status
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed_at: Option<DateTime<Utc>>,
    /// ID of the last execution folded into the counters above
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl Workflow {
    /// Create a new empty draft workflow with a fresh ID.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), name)
    }

    /// Create a new empty draft workflow with an explicit ID.
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: default_version(),
            status: WorkflowStatus::Draft,
            nodes: Vec::new(),
            edges: Vec::new(),
            token_budget: None,
            max_execution_time: None,
            retry_policy: None,
            execution_count: 0,
            last_executed_at: None,
            last_execution_id: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Find a node by its ID.
    pub fn find_node(&self, node_id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Find an edge by its ID.
    pub fn find_edge(&self, edge_id: &str) -> Option<&WorkflowEdge> {
        self.edges.iter().find(|e| e.id == edge_id)
    }

    /// Whether a node with the given ID exists.
    pub fn contains_node(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == node_id)
    }

    /// All trigger nodes, in insertion order.
    pub fn trigger_nodes(&self) -> Vec<&WorkflowNode> {
        self.nodes_of_type(NodeType::Trigger)
    }

    /// All nodes of one type, in insertion order.
    pub fn nodes_of_type(&self, node_type: NodeType) -> Vec<&WorkflowNode> {
        self.nodes
            .iter()
            .filter(|n| n.node_type() == node_type)
            .collect()
    }

    /// Get all edges leaving a given node, in insertion order.
    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&WorkflowEdge> {
        self.edges.iter().filter(|e| e.source == node_id).collect()
    }

    /// Get all edges entering a given node, in insertion order.
    pub fn incoming_edges(&self, node_id: &str) -> Vec<&WorkflowEdge> {
        self.edges.iter().filter(|e| e.target == node_id).collect()
    }

    /// Whether an edge already connects `source` to `target`.
    pub fn has_edge_between(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target)
    }

    /// Bump `updated_at` after a mutation.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Fold a finished execution into the run counters.
    ///
    /// Only terminal executions of this workflow are counted, and each
    /// execution is counted once. Returns whether the counters changed.
    pub fn record_execution(&mut self, execution: &WorkflowExecution) -> bool {
        if execution.workflow_id != self.id || !execution.status.is_terminal() {
            return false;
        }
        if self.last_execution_id.as_deref() == Some(execution.id.as_str()) {
            return false;
        }
        self.execution_count += 1;
        self.last_executed_at = Some(execution.completed_at.unwrap_or_else(Utc::now));
        self.last_execution_id = Some(execution.id.clone());
        true
    }
}

/// The type of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Trigger,
    Condition,
    Action,
    Agent,
    Delay,
    Loop,
    Transform,
    Notification,
    Webhook,
    End,
}

impl NodeType {
    /// Every node type, in palette order.
    pub const ALL: [NodeType; 10] = [
        NodeType::Trigger,
        NodeType::Condition,
        NodeType::Action,
        NodeType::Agent,
        NodeType::Delay,
        NodeType::Loop,
        NodeType::Transform,
        NodeType::Notification,
        NodeType::Webhook,
        NodeType::End,
    ];

    /// Wire name of this node type.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Trigger => "trigger",
            NodeType::Condition => "condition",
            NodeType::Action => "action",
            NodeType::Agent => "agent",
            NodeType::Delay => "delay",
            NodeType::Loop => "loop",
            NodeType::Transform => "transform",
            NodeType::Notification => "notification",
            NodeType::Webhook => "webhook",
            NodeType::End => "end",
        }
    }

    /// Get a human-readable label for this node type.
    pub fn label(&self) -> &'static str {
        match self {
            NodeType::Trigger => "Trigger",
            NodeType::Condition => "Condition",
            NodeType::Action => "Action",
            NodeType::Agent => "AI Agent",
            NodeType::Delay => "Delay",
            NodeType::Loop => "Loop",
            NodeType::Transform => "Transform",
            NodeType::Notification => "Notification",
            NodeType::Webhook => "Webhook",
            NodeType::End => "End",
        }
    }

    /// Whether nodes of this type hand their work to an external `NodeExecutor`.
    pub fn is_delegating(&self) -> bool {
        matches!(
            self,
            NodeType::Action | NodeType::Agent | NodeType::Notification | NodeType::Webhook
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in a workflow graph.
///
/// On the wire the node type and its configuration sit side by side:
/// `{"id": "...", "type": "delay", "config": {"duration": 5, "unit": "seconds"}, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    /// Unique identifier for this node
    pub id: NodeId,
    /// Node type and type-specific configuration
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Position in the visual editor
    #[serde(default)]
    pub position: Position,
    /// Result of the last validation pass for this node
    #[serde(default = "default_is_valid")]
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

fn default_is_valid() -> bool {
    true
}

impl WorkflowNode {
    /// Create a node from its configuration.
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            position: Position::default(),
            is_valid: true,
            errors: None,
        }
    }

    /// Set the editor position.
    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Label used in logs: the display label, or the ID when unlabeled.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// Node type together with its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum NodeKind {
    Trigger(TriggerConfig),
    Condition(ConditionConfig),
    Action(ActionConfig),
    Agent(AgentConfig),
    Delay(DelayConfig),
    Loop(LoopConfig),
    Transform(TransformConfig),
    Notification(NotificationConfig),
    Webhook(WebhookConfig),
    End(EndConfig),
}

impl NodeKind {
    /// Default configuration for a node type.
    pub fn default_for(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Trigger => NodeKind::Trigger(TriggerConfig::default()),
            NodeType::Condition => NodeKind::Condition(ConditionConfig::default()),
            NodeType::Action => NodeKind::Action(ActionConfig::default()),
            NodeType::Agent => NodeKind::Agent(AgentConfig::default()),
            NodeType::Delay => NodeKind::Delay(DelayConfig::default()),
            NodeType::Loop => NodeKind::Loop(LoopConfig::default()),
            NodeType::Transform => NodeKind::Transform(TransformConfig::default()),
            NodeType::Notification => NodeKind::Notification(NotificationConfig::default()),
            NodeType::Webhook => NodeKind::Webhook(WebhookConfig::default()),
            NodeType::End => NodeKind::End(EndConfig::default()),
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Trigger(_) => NodeType::Trigger,
            NodeKind::Condition(_) => NodeType::Condition,
            NodeKind::Action(_) => NodeType::Action,
            NodeKind::Agent(_) => NodeType::Agent,
            NodeKind::Delay(_) => NodeType::Delay,
            NodeKind::Loop(_) => NodeType::Loop,
            NodeKind::Transform(_) => NodeType::Transform,
            NodeKind::Notification(_) => NodeType::Notification,
            NodeKind::Webhook(_) => NodeType::Webhook,
            NodeKind::End(_) => NodeType::End,
        }
    }

    /// The configuration alone, as JSON.
    pub fn config_value(&self) -> serde_json::Result<Value> {
        let mut tagged = serde_json::to_value(self)?;
        Ok(tagged
            .get_mut("config")
            .map(Value::take)
            .unwrap_or(Value::Object(Map::new())))
    }

    /// Rebuild a node configuration of the given type from JSON.
    pub fn from_config_value(node_type: NodeType, config: Value) -> serde_json::Result<Self> {
        serde_json::from_value(serde_json::json!({
            "type": node_type.as_str(),
            "config": config,
        }))
    }

    /// Where a delegating node's outputs are written in the context.
    pub fn output_mapping(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            NodeKind::Action(c) => Some(&c.output_mapping),
            NodeKind::Agent(c) => Some(&c.output_mapping),
            NodeKind::Notification(c) => Some(&c.output_mapping),
            NodeKind::Webhook(c) => Some(&c.output_mapping),
            _ => None,
        }
    }
}

/// How a trigger starts the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    #[default]
    Manual,
    Schedule,
    Webhook,
    Event,
}

/// Configuration for a Trigger node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TriggerConfig {
    pub trigger_type: TriggerType,
    /// Cron expression for scheduled triggers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

/// How the individual checks of a condition node are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionLogic {
    #[default]
    And,
    Or,
}

/// Comparison applied by a single condition check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    Matches,
}

/// A single check: `field` (a context path) compared to `value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// Configuration for a Condition node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionConfig {
    pub conditions: Vec<Condition>,
    pub logic: ConditionLogic,
}

/// Configuration for an Action node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionConfig {
    /// Name of the action the executor should perform
    pub action_type: String,
    pub parameters: Map<String, Value>,
    /// Output key -> context path
    pub output_mapping: BTreeMap<String, String>,
}

/// Configuration for an AI agent node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    pub agent_id: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Agent input name -> context path
    pub input_mapping: BTreeMap<String, String>,
    /// Output key -> context path
    pub output_mapping: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Call timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Time unit of a delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
}

/// Configuration for a Delay node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelayConfig {
    pub duration: u64,
    pub unit: DelayUnit,
}

impl DelayConfig {
    pub fn as_duration(&self) -> std::time::Duration {
        let millis = match self.unit {
            DelayUnit::Milliseconds => self.duration,
            DelayUnit::Seconds => self.duration.saturating_mul(1_000),
            DelayUnit::Minutes => self.duration.saturating_mul(60_000),
            DelayUnit::Hours => self.duration.saturating_mul(3_600_000),
        };
        std::time::Duration::from_millis(millis)
    }
}

/// Configuration for a Loop node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoopConfig {
    /// Context path of the collection to iterate
    pub iterate_over: String,
    /// Context key the current item is bound to inside the body
    pub item_variable: String,
    /// Iteration cap (defaults to 100 when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            iterate_over: String::new(),
            item_variable: "item".to_string(),
            max_iterations: None,
        }
    }
}

impl LoopConfig {
    pub fn iteration_cap(&self) -> u32 {
        self.max_iterations.unwrap_or(defaults::LOOP_MAX_ITERATIONS)
    }
}

/// Operation applied by a single transformation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    #[default]
    Copy,
    Format,
    Extract,
    Combine,
    Calculate,
}

/// One step of a Transform node, writing its result to `target`.
///
/// Which of the optional fields are read depends on the kind:
/// `copy` reads `source`; `format` reads `template`; `extract` reads
/// `source` plus `path` and/or `pattern`; `combine` reads `sources` and
/// `separator`; `calculate` reads `expression`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Transformation {
    #[serde(rename = "type")]
    pub kind: TransformKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// Configuration for a Transform node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformConfig {
    pub transformations: Vec<Transformation>,
}

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationChannel {
    Email,
    Slack,
    Webhook,
    #[default]
    InApp,
}

/// Configuration for a Notification node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationConfig {
    pub channel: NotificationChannel,
    pub recipients: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
    pub output_mapping: BTreeMap<String, String>,
}

/// HTTP method of a webhook call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

/// Configuration for a Webhook node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookConfig {
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub output_mapping: BTreeMap<String, String>,
}

/// Terminal status requested by an End node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndStatus {
    #[default]
    Success,
    Failure,
    Cancelled,
}

/// Configuration for an End node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndConfig {
    pub status: EndStatus,
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Target node ID
    pub target: NodeId,
    /// Output of the source node this edge leaves from ("true", "false", "complete", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub animated: bool,
}

impl WorkflowEdge {
    /// Create a new edge.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        source_handle: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: source_handle.map(str::to_string),
            label: None,
            animated: false,
        }
    }

    /// Whether this edge leaves from the given handle.
    pub fn has_handle(&self, handle: &str) -> bool {
        self.source_handle.as_deref() == Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_wire_format() {
        let node = WorkflowNode::new(
            "wait",
            "Wait a bit",
            NodeKind::Delay(DelayConfig {
                duration: 5,
                unit: DelayUnit::Seconds,
            }),
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "delay");
        assert_eq!(json["config"], json!({"duration": 5, "unit": "seconds"}));
        assert_eq!(json["isValid"], true);

        let back: WorkflowNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let node: WorkflowNode = serde_json::from_value(json!({
            "id": "loop-1",
            "type": "loop",
            "label": "Each order",
            "config": {"iterateOver": "orders"}
        }))
        .unwrap();

        match &node.kind {
            NodeKind::Loop(config) => {
                assert_eq!(config.iterate_over, "orders");
                assert_eq!(config.item_variable, "item");
                assert_eq!(config.iteration_cap(), 100);
            }
            other => panic!("Expected loop config, got {:?}", other),
        }
        assert!(node.is_valid);
    }

    #[test]
    fn test_config_value_round_trip() {
        let kind = NodeKind::End(EndConfig {
            status: EndStatus::Failure,
        });
        let value = kind.config_value().unwrap();
        assert_eq!(value, json!({"status": "failure"}));
        assert_eq!(
            NodeKind::from_config_value(NodeType::End, value).unwrap(),
            kind
        );
    }

    #[test]
    fn test_workflow_dates_are_iso8601() {
        let workflow = Workflow::with_id("wf-1", "Dates");
        let json = serde_json::to_value(&workflow).unwrap();
        let created = json["createdAt"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(created).is_ok());

        let back: Workflow = serde_json::from_value(json).unwrap();
        assert_eq!(back, workflow);
    }

    #[test]
    fn test_delay_duration_units() {
        let delay = DelayConfig {
            duration: 2,
            unit: DelayUnit::Minutes,
        };
        assert_eq!(delay.as_duration(), std::time::Duration::from_secs(120));
    }

    #[test]
    fn test_http_method_wire_names() {
        assert_eq!(serde_json::to_value(HttpMethod::Patch).unwrap(), json!("PATCH"));
    }
}
