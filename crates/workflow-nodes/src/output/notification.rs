//! Notification Executor
//!
//! Delivers notification nodes. Slack and webhook channels post to a
//! configured URL; every other channel lands in an in-process outbox that
//! the host drains (and mirrors to the log).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use workflow_engine::{
    NodeError, NodeExecutor, NodeInvocation, NodeKind, NodeOutput, NotificationChannel,
};

/// A notification that was handed to the outbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredNotification {
    pub execution_id: String,
    pub node_id: String,
    pub channel: NotificationChannel,
    pub recipients: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// Notification Executor
///
/// # Outputs
/// - `channel` - Channel the notification went out on
/// - `delivered` - Number of recipients (1 for posted channels)
/// - `sentAt` - RFC 3339 delivery time
#[derive(Default)]
pub struct NotificationExecutor {
    client: reqwest::Client,
    /// Post URLs for channels delivered over HTTP
    endpoints: HashMap<String, String>,
    outbox: Mutex<Vec<DeliveredNotification>>,
}

impl NotificationExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post notifications on `channel` to `url` instead of the outbox.
    ///
    /// Only Slack and webhook channels can be posted.
    pub fn with_endpoint(mut self, channel: NotificationChannel, url: impl Into<String>) -> Self {
        self.endpoints.insert(channel_name(channel).to_string(), url.into());
        self
    }

    /// Notifications delivered to the outbox so far
    pub fn outbox(&self) -> Vec<DeliveredNotification> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Take every notification out of the outbox
    pub fn drain(&self) -> Vec<DeliveredNotification> {
        std::mem::take(
            &mut *self
                .outbox
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    async fn post(&self, url: &str, notification: &DeliveredNotification) -> Result<(), NodeError> {
        let text = match &notification.subject {
            Some(subject) => format!("*{}*\n{}", subject, notification.message),
            None => notification.message.clone(),
        };
        let payload = match notification.channel {
            NotificationChannel::Slack => json!({ "text": text }),
            _ => serde_json::to_value(notification)
                .map_err(|e| NodeError::failed(format!("Failed to encode notification: {}", e)))?,
        };

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NodeError::failed(format!("Failed to post notification to {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(NodeError::failed(format!(
                "Notification endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

fn channel_name(channel: NotificationChannel) -> &'static str {
    match channel {
        NotificationChannel::Email => "email",
        NotificationChannel::Slack => "slack",
        NotificationChannel::Webhook => "webhook",
        NotificationChannel::InApp => "inApp",
    }
}

#[async_trait]
impl NodeExecutor for NotificationExecutor {
    async fn execute(&self, invocation: NodeInvocation) -> Result<NodeOutput, NodeError> {
        let NodeKind::Notification(config) = &invocation.config else {
            return Err(NodeError::InvalidConfig(format!(
                "notification executor cannot run '{}' nodes",
                invocation.node_type()
            )));
        };
        if config.message.trim().is_empty() {
            return Err(NodeError::InvalidConfig(
                "Notification message is empty".to_string(),
            ));
        }

        let notification = DeliveredNotification {
            execution_id: invocation.execution_id.clone(),
            node_id: invocation.node_id.clone(),
            channel: config.channel,
            recipients: config.recipients.clone(),
            subject: config.subject.clone(),
            message: config.message.clone(),
            sent_at: Utc::now(),
        };
        let name = channel_name(config.channel);

        let delivered = match self.endpoints.get(name) {
            Some(url) => {
                self.post(url, &notification).await?;
                log::debug!("Posted {} notification from node '{}'", name, invocation.node_id);
                1
            }
            None => {
                if matches!(
                    config.channel,
                    NotificationChannel::Slack | NotificationChannel::Webhook
                ) {
                    log::warn!(
                        "No endpoint configured for {} notifications; keeping it in the outbox",
                        name
                    );
                }
                log::info!(
                    "[{}] to {}: {}",
                    name,
                    notification.recipients.join(", "),
                    notification.message
                );
                let count = notification.recipients.len();
                self.outbox
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(notification.clone());
                count
            }
        };

        Ok(NodeOutput::new()
            .with("channel", json!(name))
            .with("delivered", json!(delivered))
            .with("sentAt", json!(notification.sent_at.to_rfc3339())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{Reply, TestServer};
    use serde_json::Map;
    use workflow_engine::NotificationConfig;

    fn invocation(config: NotificationConfig) -> NodeInvocation {
        NodeInvocation {
            execution_id: "exec-1".to_string(),
            node_id: "notify".to_string(),
            label: "Notify".to_string(),
            config: NodeKind::Notification(config),
            inputs: Map::new(),
            context: json!({}),
        }
    }

    #[tokio::test]
    async fn test_email_goes_to_outbox() {
        let executor = NotificationExecutor::new();
        let output = executor
            .execute(invocation(NotificationConfig {
                channel: NotificationChannel::Email,
                recipients: vec!["ops@example.com".to_string(), "cto@example.com".to_string()],
                subject: Some("Disk almost full".to_string()),
                message: "92% used".to_string(),
                ..Default::default()
            }))
            .await
            .unwrap();

        assert_eq!(output.outputs["delivered"], json!(2));
        let outbox = executor.drain();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].subject.as_deref(), Some("Disk almost full"));
        assert!(executor.outbox().is_empty());
    }

    #[tokio::test]
    async fn test_slack_posts_text() {
        let server = TestServer::start(vec![Reply::text(200, "ok")]).await;
        let executor = NotificationExecutor::new()
            .with_endpoint(NotificationChannel::Slack, server.url("/slack"));

        let output = executor
            .execute(invocation(NotificationConfig {
                channel: NotificationChannel::Slack,
                message: "Deploy finished".to_string(),
                ..Default::default()
            }))
            .await
            .unwrap();

        assert_eq!(output.outputs["channel"], json!("slack"));
        assert!(executor.outbox().is_empty());
        let request = server.requests().await.remove(0);
        assert_eq!(request.json(), json!({"text": "Deploy finished"}));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let error = NotificationExecutor::new()
            .execute(invocation(NotificationConfig::default()))
            .await
            .unwrap_err();
        assert!(matches!(error, NodeError::InvalidConfig(_)));
    }
}
