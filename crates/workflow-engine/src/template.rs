//! Node palette defaults and workflow templates
//!
//! A `NodeTemplate` supplies the starting configuration for a node added in
//! the editor. A `WorkflowTemplate` is a reusable workflow blueprint; it only
//! becomes something the engines can see once a `TemplateInstantiator` has
//! turned it into a fresh `Workflow`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{NodeKind, NodeType, RetryPolicy, Workflow, WorkflowEdge, WorkflowNode, WorkflowStatus};

/// Starting point for a new node: its type, label and config defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTemplate {
    pub node_type: NodeType,
    pub label: String,
    /// Config fields that override the type's defaults
    #[serde(default)]
    pub config: Value,
}

impl NodeTemplate {
    /// Palette entry for a node type, with the type's default config.
    pub fn for_type(node_type: NodeType) -> Self {
        Self {
            node_type,
            label: node_type.label().to_string(),
            config: Value::Null,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Override config fields; merged over the type defaults.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Resolve the template to a concrete node configuration.
    ///
    /// Template fields that do not fit the type's config are dropped in
    /// favour of the type defaults.
    pub fn node_kind(&self) -> NodeKind {
        let defaults = NodeKind::default_for(self.node_type);
        if self.config.is_null() {
            return defaults;
        }
        let mut config = defaults.config_value().unwrap_or(Value::Null);
        merge_json(&mut config, &self.config);
        match NodeKind::from_config_value(self.node_type, config) {
            Ok(kind) => kind,
            Err(e) => {
                log::warn!(
                    "Template config for '{}' node ignored: {}",
                    self.node_type,
                    e
                );
                defaults
            }
        }
    }
}

/// Palette of every node type, in display order.
pub fn node_palette() -> Vec<NodeTemplate> {
    NodeType::ALL.iter().copied().map(NodeTemplate::for_type).collect()
}

/// A reusable workflow blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_execution_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
}

/// Turns templates into workflows.
///
/// Implementations must hand out a fresh workflow ID and reset timestamps
/// and run counters.
pub trait TemplateInstantiator: Send + Sync {
    fn instantiate(&self, template: &WorkflowTemplate, created_by: &str) -> Workflow;
}

/// Copies the template's graph and settings into a new draft workflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInstantiator;

impl TemplateInstantiator for DefaultInstantiator {
    fn instantiate(&self, template: &WorkflowTemplate, created_by: &str) -> Workflow {
        let mut workflow = Workflow::new(template.name.clone());
        workflow.description = template.description.clone();
        workflow.status = WorkflowStatus::Draft;
        workflow.nodes = template.nodes.clone();
        workflow.edges = template.edges.clone();
        workflow.token_budget = template.token_budget;
        workflow.max_execution_time = template.max_execution_time;
        workflow.retry_policy = template.retry_policy;
        workflow.created_by = Some(created_by.to_string());
        log::debug!(
            "Instantiated template '{}' as workflow '{}'",
            template.id,
            workflow.id
        );
        workflow
    }
}

/// Apply a JSON merge patch: objects merge key by key, `null` removes a
/// key, anything else replaces the target.
pub fn merge_json(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_json(
                    target_map.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DelayUnit, EndStatus};
    use serde_json::json;

    #[test]
    fn test_for_type_uses_defaults() {
        let template = NodeTemplate::for_type(NodeType::Agent);
        assert_eq!(template.label, "AI Agent");
        assert_eq!(template.node_kind(), NodeKind::default_for(NodeType::Agent));
    }

    #[test]
    fn test_template_config_merged_over_defaults() {
        let template = NodeTemplate::for_type(NodeType::Delay).with_config(json!({"duration": 30}));
        match template.node_kind() {
            NodeKind::Delay(config) => {
                assert_eq!(config.duration, 30);
                assert_eq!(config.unit, DelayUnit::Seconds);
            }
            other => panic!("Expected delay, got {:?}", other),
        }
    }

    #[test]
    fn test_ill_typed_template_config_falls_back() {
        let template = NodeTemplate::for_type(NodeType::End).with_config(json!({"status": "exploded"}));
        assert_eq!(
            template.node_kind(),
            NodeKind::End(crate::types::EndConfig {
                status: EndStatus::Success
            })
        );
    }

    #[test]
    fn test_palette_covers_all_types() {
        let palette = node_palette();
        assert_eq!(palette.len(), NodeType::ALL.len());
        assert_eq!(palette[0].node_type, NodeType::Trigger);
    }

    #[test]
    fn test_instantiate_resets_identity() {
        let template = WorkflowTemplate {
            id: "tpl-onboarding".to_string(),
            name: "Onboarding".to_string(),
            description: "Welcome new users".to_string(),
            category: "crm".to_string(),
            nodes: vec![WorkflowNode::new(
                "start",
                "Start",
                NodeKind::default_for(NodeType::Trigger),
            )],
            edges: Vec::new(),
            token_budget: Some(500),
            max_execution_time: None,
            retry_policy: None,
        };

        let first = DefaultInstantiator.instantiate(&template, "ada");
        let second = DefaultInstantiator.instantiate(&template, "ada");

        assert_ne!(first.id, second.id);
        assert_ne!(first.id, template.id);
        assert_eq!(first.status, WorkflowStatus::Draft);
        assert_eq!(first.version, 1);
        assert_eq!(first.execution_count, 0);
        assert_eq!(first.created_by.as_deref(), Some("ada"));
        assert_eq!(first.token_budget, Some(500));
        assert_eq!(first.nodes, template.nodes);
    }

    #[test]
    fn test_merge_json() {
        let mut target = json!({"a": 1, "b": {"c": 2, "d": 3}});
        merge_json(&mut target, &json!({"b": {"c": 5, "d": null}, "e": [1]}));
        assert_eq!(target, json!({"a": 1, "b": {"c": 5}, "e": [1]}));
    }
}
