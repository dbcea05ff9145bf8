//! Execution records
//!
//! A `WorkflowExecution` is created when a run starts, mutated only by the
//! executor while the run is live, and handed out by value once terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::id_prefixes;
use crate::types::{NodeId, Workflow, WorkflowNode};

/// Status of a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Suspended in a delay node
    Waiting,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// Where and why a run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    pub message: String,
}

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLog {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    pub level: LogLevel,
    pub message: String,
}

/// Record of one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: String,
    pub workflow_id: String,
    pub workflow_version: u32,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<NodeId>,
    /// Node IDs in visitation order
    pub completed_nodes: Vec<NodeId>,
    pub trigger_data: Value,
    /// Final (or current) context of the run
    pub context: Map<String, Value>,
    /// Raw outputs of delegating nodes and loop summaries, keyed by node ID
    pub outputs: Map<String, Value>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    pub logs: Vec<ExecutionLog>,
    pub tokens_used: u64,
}

impl WorkflowExecution {
    /// Create a pending execution record for a workflow.
    pub fn new(workflow: &Workflow, trigger_data: Value) -> Self {
        Self {
            id: format!("{}-{}", id_prefixes::EXECUTION, uuid::Uuid::new_v4()),
            workflow_id: workflow.id.clone(),
            workflow_version: workflow.version,
            status: ExecutionStatus::Pending,
            current_node_id: None,
            completed_nodes: Vec::new(),
            trigger_data,
            context: Map::new(),
            outputs: Map::new(),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            logs: Vec::new(),
            tokens_used: 0,
        }
    }

    /// Append a log entry, optionally attributed to a node.
    pub(crate) fn log(&mut self, node: Option<&WorkflowNode>, level: LogLevel, message: impl Into<String>) {
        self.logs.push(ExecutionLog {
            timestamp: Utc::now(),
            node_id: node.map(|n| n.id.clone()),
            node_name: node.map(|n| n.display_name().to_string()),
            level,
            message: message.into(),
        });
    }

    /// Move to a terminal status. Terminal records are never changed again.
    pub(crate) fn finish(&mut self, status: ExecutionStatus, error: Option<ExecutionError>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
    }

    /// Log entries attributed to one node.
    pub fn logs_for(&self, node_id: &str) -> Vec<&ExecutionLog> {
        self.logs
            .iter()
            .filter(|l| l.node_id.as_deref() == Some(node_id))
            .collect()
    }

    /// Wall-clock duration of a finished run, in milliseconds.
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}
