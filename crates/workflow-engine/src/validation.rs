//! Workflow validation
//!
//! Classifies a workflow as executable or not. Checks run in a fixed order
//! and walk nodes and edges in insertion order, so the same workflow always
//! produces the same report.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{NodeType, Workflow, WorkflowNode, HANDLE_FALSE, HANDLE_TRUE};

/// How serious a validation issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks execution
    Error,
    /// Likely authoring mistake; never blocks execution
    Warning,
}

/// Stable identifier of the rule that produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCode {
    /// The workflow has no trigger node
    MissingTrigger,
    /// The workflow has no end node
    MissingEnd,
    /// A non-trigger node has no incoming edge
    DanglingInput,
    /// A non-end node has no outgoing edge
    DanglingOutput,
    /// A condition node lacks a `true` or `false` branch
    MissingBranch,
    /// A condition node has more than one edge for the same branch
    DuplicateBranch,
    /// An edge references a node that does not exist
    UnknownNode,
}

impl ValidationCode {
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingEnd | Self::DanglingInput | Self::DanglingOutput => Severity::Warning,
            Self::MissingTrigger
            | Self::MissingBranch
            | Self::DuplicateBranch
            | Self::UnknownNode => Severity::Error,
        }
    }
}

/// A single finding, located at a node or edge where possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
    pub code: ValidationCode,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            node_id: None,
            edge_id: None,
            code,
            message: message.into(),
            severity: code.severity(),
        }
    }

    fn at_node(mut self, node: &WorkflowNode) -> Self {
        self.node_id = Some(node.id.clone());
        self
    }

    fn at_edge(mut self, edge_id: &str) -> Self {
        self.edge_id = Some(edge_id.to_string());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Errors and warnings for one workflow, each in check order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Whether the workflow can be executed.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Every issue attributed to a node, errors first.
    pub fn issues_for_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a ValidationIssue> + 'a {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .filter(move |issue| issue.node_id.as_deref() == Some(node_id))
    }

    fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
        }
    }
}

/// Whether a report allows execution.
pub fn is_valid(report: &ValidationReport) -> bool {
    report.is_valid()
}

/// Validate a workflow.
///
/// Never fails: every finding is returned as data.
pub fn validate(workflow: &Workflow) -> ValidationReport {
    let mut report = ValidationReport::default();

    validate_trigger_presence(workflow, &mut report);
    validate_end_presence(workflow, &mut report);
    validate_inputs(workflow, &mut report);
    validate_outputs(workflow, &mut report);
    validate_condition_branches(workflow, &mut report);
    validate_edge_references(workflow, &mut report);

    report
}

fn validate_trigger_presence(workflow: &Workflow, report: &mut ValidationReport) {
    if workflow.trigger_nodes().is_empty() {
        report.push(ValidationIssue::new(
            ValidationCode::MissingTrigger,
            "Workflow has no trigger node",
        ));
    }
}

fn validate_end_presence(workflow: &Workflow, report: &mut ValidationReport) {
    if workflow.nodes_of_type(NodeType::End).is_empty() {
        report.push(ValidationIssue::new(
            ValidationCode::MissingEnd,
            "Workflow has no end node",
        ));
    }
}

/// Triggers are graph roots and are exempt.
fn validate_inputs(workflow: &Workflow, report: &mut ValidationReport) {
    let targets: HashSet<&str> = workflow.edges.iter().map(|e| e.target.as_str()).collect();
    for node in &workflow.nodes {
        if node.node_type() != NodeType::Trigger && !targets.contains(node.id.as_str()) {
            report.push(
                ValidationIssue::new(
                    ValidationCode::DanglingInput,
                    format!("Node '{}' has no incoming connection", node.display_name()),
                )
                .at_node(node),
            );
        }
    }
}

fn validate_outputs(workflow: &Workflow, report: &mut ValidationReport) {
    let sources: HashSet<&str> = workflow.edges.iter().map(|e| e.source.as_str()).collect();
    for node in &workflow.nodes {
        if node.node_type() != NodeType::End && !sources.contains(node.id.as_str()) {
            report.push(
                ValidationIssue::new(
                    ValidationCode::DanglingOutput,
                    format!("Node '{}' has no outgoing connection", node.display_name()),
                )
                .at_node(node),
            );
        }
    }
}

/// Each condition needs exactly one `true` and one `false` edge.
fn validate_condition_branches(workflow: &Workflow, report: &mut ValidationReport) {
    for node in workflow.nodes_of_type(NodeType::Condition) {
        let outgoing = workflow.outgoing_edges(&node.id);
        for handle in [HANDLE_TRUE, HANDLE_FALSE] {
            let count = outgoing.iter().filter(|e| e.has_handle(handle)).count();
            if count == 0 {
                report.push(
                    ValidationIssue::new(
                        ValidationCode::MissingBranch,
                        format!(
                            "Condition '{}' is missing its '{}' branch",
                            node.display_name(),
                            handle
                        ),
                    )
                    .at_node(node),
                );
            } else if count > 1 {
                report.push(
                    ValidationIssue::new(
                        ValidationCode::DuplicateBranch,
                        format!(
                            "Condition '{}' has {} '{}' branches",
                            node.display_name(),
                            count,
                            handle
                        ),
                    )
                    .at_node(node),
                );
            }
        }
    }
}

/// Cannot happen through the editor, only in documents loaded from storage.
fn validate_edge_references(workflow: &Workflow, report: &mut ValidationReport) {
    let node_ids: HashSet<&str> = workflow.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &workflow.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !node_ids.contains(endpoint.as_str()) {
                report.push(
                    ValidationIssue::new(
                        ValidationCode::UnknownNode,
                        format!("Edge '{}' references unknown node '{}'", edge.id, endpoint),
                    )
                    .at_edge(&edge.id),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeKind, WorkflowEdge};

    fn node(id: &str, node_type: NodeType) -> WorkflowNode {
        WorkflowNode::new(id, id, NodeKind::default_for(node_type))
    }

    fn edge(source: &str, target: &str, handle: Option<&str>) -> WorkflowEdge {
        WorkflowEdge::new(format!("{}->{}", source, target), source, target, handle)
    }

    fn linear() -> Workflow {
        let mut workflow = Workflow::with_id("wf", "Linear");
        workflow.nodes = vec![
            node("start", NodeType::Trigger),
            node("act", NodeType::Action),
            node("done", NodeType::End),
        ];
        workflow.edges = vec![edge("start", "act", None), edge("act", "done", None)];
        workflow
    }

    #[test]
    fn test_valid_workflow() {
        let report = validate(&linear());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_empty_workflow() {
        let report = validate(&Workflow::with_id("wf", "Empty"));
        assert!(!is_valid(&report));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, ValidationCode::MissingTrigger);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].code, ValidationCode::MissingEnd);
    }

    #[test]
    fn test_dangling_nodes_are_warnings() {
        let mut workflow = linear();
        workflow.nodes.push(node("orphan", NodeType::Delay));
        let report = validate(&workflow);

        assert!(report.is_valid());
        let codes: Vec<_> = report.warnings.iter().map(|w| w.code).collect();
        assert_eq!(
            codes,
            vec![ValidationCode::DanglingInput, ValidationCode::DanglingOutput]
        );
        assert!(report
            .warnings
            .iter()
            .all(|w| w.node_id.as_deref() == Some("orphan")));
    }

    #[test]
    fn test_condition_branch_round_trip() {
        let mut workflow = linear();
        workflow.nodes.insert(1, node("check", NodeType::Condition));
        workflow.edges = vec![
            edge("start", "check", None),
            edge("check", "act", Some(HANDLE_TRUE)),
            edge("act", "done", None),
        ];

        let before = validate(&workflow);
        assert_eq!(before.errors.len(), 1);
        assert_eq!(before.errors[0].node_id.as_deref(), Some("check"));
        assert_eq!(before.errors[0].code, ValidationCode::MissingBranch);
        assert!(before.errors[0].message.contains("'false'"));

        workflow.edges.push(edge("check", "done", Some(HANDLE_FALSE)));
        let after = validate(&workflow);
        assert!(after.errors.is_empty());
        assert_eq!(after.warnings, before.warnings);
    }

    #[test]
    fn test_duplicate_branch() {
        let mut workflow = linear();
        workflow.nodes.insert(1, node("check", NodeType::Condition));
        workflow.edges = vec![
            edge("start", "check", None),
            edge("check", "act", Some(HANDLE_TRUE)),
            edge("check", "done", Some(HANDLE_TRUE)),
            WorkflowEdge::new("f", "check", "act", Some(HANDLE_FALSE)),
            edge("act", "done", None),
        ];
        let report = validate(&workflow);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, ValidationCode::DuplicateBranch);
    }

    #[test]
    fn test_unknown_edge_endpoint() {
        let mut workflow = linear();
        workflow.edges.push(edge("act", "ghost", None));
        let report = validate(&workflow);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, ValidationCode::UnknownNode);
        assert_eq!(report.errors[0].edge_id.as_deref(), Some("act->ghost"));
    }

    #[test]
    fn test_deterministic() {
        let mut workflow = linear();
        workflow.nodes.push(node("orphan", NodeType::Condition));
        let first = serde_json::to_string(&validate(&workflow)).unwrap();
        let second = serde_json::to_string(&validate(&workflow)).unwrap();
        assert_eq!(first, second);
    }
}
