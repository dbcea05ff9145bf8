//! Undo/redo history using compressed snapshots
//!
//! Every entry is a full copy of a workflow, serialized to JSON and
//! zstd-compressed. The past and future stacks are bounded independently;
//! pushing past the limit evicts the oldest entry.

use std::collections::VecDeque;

use crate::config::EngineConfig;
use crate::constants::defaults;
use crate::error::{Result, WorkflowEngineError};
use crate::types::Workflow;

/// Bounded past/future stacks of workflow snapshots.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    /// Compressed states to return to on undo, oldest first
    past: VecDeque<Vec<u8>>,
    /// Compressed states to return to on redo, oldest first
    future: VecDeque<Vec<u8>>,
    /// Maximum number of snapshots kept on each stack
    limit: usize,
}

impl HistoryManager {
    /// Create a history keeping at most `limit` snapshots per stack
    pub fn new(limit: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Create a history sized by `historyLimit`
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.history_limit)
    }

    /// Record a state to return to.
    ///
    /// Any redo history is discarded.
    pub fn push_history(&mut self, workflow: &Workflow) -> Result<()> {
        let snapshot = compress(workflow)?;
        self.future.clear();
        push_bounded(&mut self.past, snapshot, self.limit);
        Ok(())
    }

    /// Step back one state.
    ///
    /// `current` is kept for redo. Returns `None` when there is nothing to
    /// undo. On error the history is left unchanged.
    pub fn undo(&mut self, current: &Workflow) -> Option<Result<Workflow>> {
        let previous = self.past.back()?;
        let restored = match decompress(previous) {
            Ok(workflow) => workflow,
            Err(e) => return Some(Err(e)),
        };
        let snapshot = match compress(current) {
            Ok(snapshot) => snapshot,
            Err(e) => return Some(Err(e)),
        };
        self.past.pop_back();
        push_bounded(&mut self.future, snapshot, self.limit);
        log::debug!("Undo restored workflow '{}'", restored.id);
        Some(Ok(restored))
    }

    /// Step forward one state, the mirror of [`undo`](Self::undo).
    pub fn redo(&mut self, current: &Workflow) -> Option<Result<Workflow>> {
        let next = self.future.back()?;
        let restored = match decompress(next) {
            Ok(workflow) => workflow,
            Err(e) => return Some(Err(e)),
        };
        let snapshot = match compress(current) {
            Ok(snapshot) => snapshot,
            Err(e) => return Some(Err(e)),
        };
        self.future.pop_back();
        push_bounded(&mut self.past, snapshot, self.limit);
        log::debug!("Redo restored workflow '{}'", restored.id);
        Some(Ok(restored))
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of states available to undo
    pub fn undo_len(&self) -> usize {
        self.past.len()
    }

    /// Number of states available to redo
    pub fn redo_len(&self) -> usize {
        self.future.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Drop all history
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    /// Get the total compressed size of all snapshots
    pub fn compressed_size(&self) -> usize {
        self.past.iter().chain(self.future.iter()).map(Vec::len).sum()
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(defaults::HISTORY_LIMIT)
    }
}

fn push_bounded(stack: &mut VecDeque<Vec<u8>>, snapshot: Vec<u8>, limit: usize) {
    stack.push_back(snapshot);
    while stack.len() > limit {
        stack.pop_front();
    }
}

fn compress(workflow: &Workflow) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(workflow)?;
    zstd::encode_all(&json[..], defaults::SNAPSHOT_COMPRESSION_LEVEL)
        .map_err(|e| WorkflowEngineError::Compression(e.to_string()))
}

fn decompress(snapshot: &[u8]) -> Result<Workflow> {
    let json = zstd::decode_all(snapshot).map_err(|e| WorkflowEngineError::Compression(e.to_string()))?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeKind, NodeType, WorkflowNode};

    fn workflow_with_nodes(count: usize) -> Workflow {
        let mut workflow = Workflow::with_id("wf", "History");
        for i in 0..count {
            workflow.nodes.push(WorkflowNode::new(
                format!("n{}", i),
                format!("Node {}", i),
                NodeKind::default_for(NodeType::Action),
            ));
        }
        workflow
    }

    #[test]
    fn test_from_config_uses_history_limit() {
        let config = EngineConfig {
            history_limit: 3,
            ..Default::default()
        };
        assert_eq!(HistoryManager::from_config(&config).limit(), 3);
    }

    #[test]
    fn test_undo_redo_symmetry() {
        let mut history = HistoryManager::default();
        let w0 = workflow_with_nodes(1);
        let w1 = workflow_with_nodes(2);

        history.push_history(&w0).unwrap();
        let undone = history.undo(&w1).unwrap().unwrap();
        assert_eq!(undone, w0);

        let redone = history.redo(&undone).unwrap().unwrap();
        assert_eq!(redone, w1);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_empty_history() {
        let mut history = HistoryManager::default();
        let current = workflow_with_nodes(0);
        assert!(history.undo(&current).is_none());
        assert!(history.redo(&current).is_none());
        assert!(!history.can_undo());
    }

    #[test]
    fn test_push_clears_redo() {
        let mut history = HistoryManager::default();
        history.push_history(&workflow_with_nodes(0)).unwrap();
        history.undo(&workflow_with_nodes(1)).unwrap().unwrap();
        assert!(history.can_redo());

        history.push_history(&workflow_with_nodes(2)).unwrap();
        assert!(!history.can_redo());
    }

    #[test]
    fn test_oldest_snapshot_evicted() {
        let mut history = HistoryManager::new(20);
        for i in 0..25 {
            history.push_history(&workflow_with_nodes(i)).unwrap();
        }
        assert_eq!(history.undo_len(), 20);

        // Walk back to the oldest surviving snapshot: it holds 5 nodes
        let mut current = workflow_with_nodes(25);
        while let Some(previous) = history.undo(&current) {
            current = previous.unwrap();
        }
        assert_eq!(current.nodes.len(), 5);
        assert_eq!(history.redo_len(), 20);
    }

    #[test]
    fn test_clear() {
        let mut history = HistoryManager::default();
        history.push_history(&workflow_with_nodes(1)).unwrap();
        assert!(history.compressed_size() > 0);
        history.clear();
        assert!(!history.can_undo());
        assert_eq!(history.compressed_size(), 0);
    }
}
