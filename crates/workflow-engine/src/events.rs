//! Event types for streaming execution progress
//!
//! Events are sent from the executor to any consumer (a UI, a log tail, a
//! test) while a run is live. The execution record stays the source of
//! truth; events are a convenience view of it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::execution::ExecutionStatus;
use crate::types::NodeType;

/// Trait for sending execution events
///
/// This abstracts over the transport mechanism (mpsc, websocket, etc.)
/// allowing the executor to be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: ExecutionEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExecutionEvent {
    /// The run moved to `running`
    #[serde(rename_all = "camelCase")]
    ExecutionStarted {
        workflow_id: String,
        execution_id: String,
    },

    /// A node visit began
    #[serde(rename_all = "camelCase")]
    NodeStarted {
        execution_id: String,
        node_id: String,
        node_type: NodeType,
    },

    /// A node visit finished
    #[serde(rename_all = "camelCase")]
    NodeCompleted {
        execution_id: String,
        node_id: String,
        output: Option<Value>,
    },

    /// A node attempt failed
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        execution_id: String,
        node_id: String,
        error: String,
        attempt: u32,
    },

    /// A failed node will be attempted again after a pause
    #[serde(rename_all = "camelCase")]
    NodeRetrying {
        execution_id: String,
        node_id: String,
        attempt: u32,
        delay_ms: u64,
    },

    /// The run is suspended in a delay node
    #[serde(rename_all = "camelCase")]
    ExecutionWaiting {
        execution_id: String,
        node_id: String,
        duration_ms: u64,
    },

    /// A loop node started one pass over its body
    #[serde(rename_all = "camelCase")]
    LoopIteration {
        execution_id: String,
        node_id: String,
        index: usize,
    },

    /// The run reached a terminal status
    #[serde(rename_all = "camelCase")]
    ExecutionFinished {
        workflow_id: String,
        execution_id: String,
        status: ExecutionStatus,
        error: Option<String>,
    },
}

impl ExecutionEvent {
    /// ID of the run the event belongs to
    pub fn execution_id(&self) -> &str {
        match self {
            Self::ExecutionStarted { execution_id, .. }
            | Self::NodeStarted { execution_id, .. }
            | Self::NodeCompleted { execution_id, .. }
            | Self::NodeFailed { execution_id, .. }
            | Self::NodeRetrying { execution_id, .. }
            | Self::ExecutionWaiting { execution_id, .. }
            | Self::LoopIteration { execution_id, .. }
            | Self::ExecutionFinished { execution_id, .. } => execution_id,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: ExecutionEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
#[derive(Default)]
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<ExecutionEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: ExecutionEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
        Ok(())
    }
}

/// Forwards events into a tokio channel
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelEventSink {
    pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
        Self { sender }
    }

    /// Create a sink together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: ExecutionEvent) -> Result<(), EventError> {
        self.sender
            .send(event)
            .map_err(|_| EventError::channel_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> ExecutionEvent {
        ExecutionEvent::ExecutionStarted {
            workflow_id: "wf".to_string(),
            execution_id: "exec-1".to_string(),
        }
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(started()).unwrap();
        assert_eq!(json["type"], "executionStarted");
        assert_eq!(json["workflowId"], "wf");
        assert_eq!(json["executionId"], "exec-1");
    }

    #[test]
    fn test_vec_sink_collects() {
        let sink = VecEventSink::new();
        sink.send(started()).unwrap();
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.events()[0].execution_id(), "exec-1");
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (sink, mut receiver) = ChannelEventSink::channel();
        sink.send(started()).unwrap();
        assert_eq!(receiver.recv().await, Some(started()));

        drop(receiver);
        assert!(sink.send(started()).is_err());
    }
}
