//! Structural editing of a workflow graph
//!
//! `WorkflowEditor` owns one workflow and is the only way the editor mutates
//! it. Every operation is total: references to nodes or edges that do not
//! exist turn the call into a no-op, and self-loops, duplicate edges and
//! edges to unknown nodes are rejected silently. The graph invariants hold
//! after every call:
//!
//! 1. every edge endpoint names a node of the workflow
//! 2. no edge connects a node to itself
//! 3. at most one edge per `(source, target)` pair
//! 4. deleting a node deletes its edges with it
//! 5. nodes and edges keep their insertion order
//!
//! The editor is single-writer; callers serialize concurrent edits.

use serde_json::Value;

use crate::constants::id_prefixes;
use crate::error::Result;
use crate::history::HistoryManager;
use crate::template::{merge_json, NodeTemplate};
use crate::types::{
    EdgeId, NodeId, NodeKind, Position, RetryPolicy, Workflow, WorkflowEdge, WorkflowNode,
    WorkflowStatus,
};
use crate::validation::{validate, ValidationReport};

/// Partial update of a node. Unset fields are left alone.
///
/// There is deliberately no way to change a node's type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub label: Option<String>,
    /// JSON merge patch applied to the node's config
    pub config: Option<Value>,
    pub is_valid: Option<bool>,
    pub errors: Option<Vec<String>>,
}

impl NodePatch {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn config(config: Value) -> Self {
        Self {
            config: Some(config),
            ..Default::default()
        }
    }
}

/// Partial update of an edge's presentation and branch handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgePatch {
    pub label: Option<String>,
    pub animated: Option<bool>,
    pub source_handle: Option<String>,
}

/// Workflow-level run settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowSettings {
    pub token_budget: Option<u64>,
    pub max_execution_time: Option<u64>,
    pub retry_policy: Option<RetryPolicy>,
}

/// Editor over a single workflow, with optional undo/redo.
#[derive(Debug, Clone)]
pub struct WorkflowEditor {
    workflow: Workflow,
    history: Option<HistoryManager>,
}

impl WorkflowEditor {
    /// Edit a workflow without history.
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow,
            history: None,
        }
    }

    /// Edit a workflow, recording each change in `history`.
    pub fn with_history(workflow: Workflow, history: HistoryManager) -> Self {
        Self {
            workflow,
            history: Some(history),
        }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn into_workflow(self) -> Workflow {
        self.workflow
    }

    pub fn history(&self) -> Option<&HistoryManager> {
        self.history.as_ref()
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Add a node built from a template. Always succeeds.
    pub fn add_node(&mut self, template: &NodeTemplate, position: Position) -> NodeId {
        self.record();
        let id = format!("{}-{}", id_prefixes::NODE, uuid::Uuid::new_v4());
        let node = WorkflowNode::new(id.clone(), template.label.clone(), template.node_kind()).at(position);
        self.workflow.nodes.push(node);
        self.workflow.touch();
        log::debug!("Added {} node '{}'", template.node_type, id);
        id
    }

    /// Merge a patch into a node. Returns whether the node exists.
    ///
    /// A config patch that does not fit the node's own config type leaves
    /// the config unchanged; the other patch fields still apply.
    pub fn update_node(&mut self, node_id: &str, patch: NodePatch) -> bool {
        let Some(index) = self.node_index(node_id) else {
            return false;
        };

        let new_kind = match &patch.config {
            Some(config_patch) => merged_kind(&self.workflow.nodes[index].kind, config_patch),
            None => None,
        };

        self.record();
        let node = &mut self.workflow.nodes[index];
        if let Some(label) = patch.label {
            node.label = label;
        }
        if let Some(kind) = new_kind {
            node.kind = kind;
        }
        if let Some(is_valid) = patch.is_valid {
            node.is_valid = is_valid;
        }
        if let Some(errors) = patch.errors {
            node.errors = if errors.is_empty() { None } else { Some(errors) };
        }
        self.workflow.touch();
        true
    }

    /// Delete a node and every edge touching it. Returns whether it existed.
    pub fn delete_node(&mut self, node_id: &str) -> bool {
        if self.node_index(node_id).is_none() {
            return false;
        }
        self.record();
        self.workflow.nodes.retain(|n| n.id != node_id);
        let before = self.workflow.edges.len();
        self.workflow
            .edges
            .retain(|e| e.source != node_id && e.target != node_id);
        self.workflow.touch();
        log::debug!(
            "Deleted node '{}' and {} edge(s)",
            node_id,
            before - self.workflow.edges.len()
        );
        true
    }

    /// Move a node. Validation state is left untouched.
    pub fn move_node(&mut self, node_id: &str, position: Position) -> bool {
        let Some(index) = self.node_index(node_id) else {
            return false;
        };
        self.record();
        self.workflow.nodes[index].position = position;
        self.workflow.touch();
        true
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Connect two nodes.
    ///
    /// Returns `None`, without changing anything, for self-loops, for a pair
    /// that is already connected and for unknown endpoints.
    pub fn add_edge(&mut self, source: &str, target: &str, source_handle: Option<&str>) -> Option<EdgeId> {
        if source == target
            || self.workflow.has_edge_between(source, target)
            || !self.workflow.contains_node(source)
            || !self.workflow.contains_node(target)
        {
            log::debug!("Rejected edge {} -> {}", source, target);
            return None;
        }
        self.record();
        let id = format!("{}-{}", id_prefixes::EDGE, uuid::Uuid::new_v4());
        self.workflow
            .edges
            .push(WorkflowEdge::new(id.clone(), source, target, source_handle));
        self.workflow.touch();
        Some(id)
    }

    /// Delete an edge. Returns whether it existed.
    pub fn delete_edge(&mut self, edge_id: &str) -> bool {
        if self.workflow.find_edge(edge_id).is_none() {
            return false;
        }
        self.record();
        self.workflow.edges.retain(|e| e.id != edge_id);
        self.workflow.touch();
        true
    }

    /// Merge a patch into an edge. Returns whether the edge exists.
    pub fn update_edge(&mut self, edge_id: &str, patch: EdgePatch) -> bool {
        let Some(index) = self.workflow.edges.iter().position(|e| e.id == edge_id) else {
            return false;
        };
        self.record();
        let edge = &mut self.workflow.edges[index];
        if let Some(label) = patch.label {
            edge.label = Some(label).filter(|l| !l.is_empty());
        }
        if let Some(animated) = patch.animated {
            edge.animated = animated;
        }
        if let Some(handle) = patch.source_handle {
            edge.source_handle = Some(handle).filter(|h| !h.is_empty());
        }
        self.workflow.touch();
        true
    }

    // =========================================================================
    // Workflow-level
    // =========================================================================

    /// Replace the run settings.
    pub fn set_settings(&mut self, settings: WorkflowSettings) {
        self.record();
        self.workflow.token_budget = settings.token_budget;
        self.workflow.max_execution_time = settings.max_execution_time;
        self.workflow.retry_policy = settings.retry_policy;
        self.workflow.touch();
    }

    pub fn set_status(&mut self, status: WorkflowStatus) {
        self.record();
        self.workflow.status = status;
        self.workflow.touch();
    }

    pub fn rename(&mut self, name: impl Into<String>, description: impl Into<String>) {
        self.record();
        self.workflow.name = name.into();
        self.workflow.description = description.into();
        self.workflow.touch();
    }

    /// Validate the workflow and write the result onto each node.
    ///
    /// Not recorded in history: validity flags are derived state.
    pub fn revalidate(&mut self) -> ValidationReport {
        let report = validate(&self.workflow);
        for node in &mut self.workflow.nodes {
            let messages: Vec<String> = report
                .errors
                .iter()
                .filter(|issue| issue.node_id.as_deref() == Some(node.id.as_str()))
                .map(|issue| issue.message.clone())
                .collect();
            node.is_valid = messages.is_empty();
            node.errors = if messages.is_empty() { None } else { Some(messages) };
        }
        report
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn node(&self, node_id: &str) -> Option<&WorkflowNode> {
        self.workflow.find_node(node_id)
    }

    pub fn edge(&self, edge_id: &str) -> Option<&WorkflowEdge> {
        self.workflow.find_edge(edge_id)
    }

    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&WorkflowEdge> {
        self.workflow.outgoing_edges(node_id)
    }

    pub fn incoming_edges(&self, node_id: &str) -> Vec<&WorkflowEdge> {
        self.workflow.incoming_edges(node_id)
    }

    pub fn trigger_nodes(&self) -> Vec<&WorkflowNode> {
        self.workflow.trigger_nodes()
    }

    // =========================================================================
    // History
    // =========================================================================

    pub fn can_undo(&self) -> bool {
        self.history.as_ref().is_some_and(HistoryManager::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.history.as_ref().is_some_and(HistoryManager::can_redo)
    }

    /// Restore the state before the last change. Returns whether anything
    /// was undone.
    pub fn undo(&mut self) -> Result<bool> {
        let Some(history) = self.history.as_mut() else {
            return Ok(false);
        };
        match history.undo(&self.workflow) {
            Some(restored) => {
                self.workflow = restored?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-apply the last undone change. Returns whether anything was redone.
    pub fn redo(&mut self) -> Result<bool> {
        let Some(history) = self.history.as_mut() else {
            return Ok(false);
        };
        match history.redo(&self.workflow) {
            Some(restored) => {
                self.workflow = restored?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn node_index(&self, node_id: &str) -> Option<usize> {
        self.workflow.nodes.iter().position(|n| n.id == node_id)
    }

    /// Snapshot the current state before a mutation.
    fn record(&mut self) {
        if let Some(history) = self.history.as_mut() {
            if let Err(e) = history.push_history(&self.workflow) {
                log::warn!("Failed to record history for '{}': {}", self.workflow.id, e);
            }
        }
    }
}

/// Merge a config patch into a node's config, keeping its type.
fn merged_kind(kind: &NodeKind, patch: &Value) -> Option<NodeKind> {
    let mut config = match kind.config_value() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Cannot read {} config: {}", kind.node_type(), e);
            return None;
        }
    };
    merge_json(&mut config, patch);
    match NodeKind::from_config_value(kind.node_type(), config) {
        Ok(merged) => Some(merged),
        Err(e) => {
            log::warn!("Ignoring config patch for {} node: {}", kind.node_type(), e);
            None
        }
    }
}
