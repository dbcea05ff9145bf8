//! Webhook Executor
//!
//! Sends the node's request to an HTTP endpoint and hands the response back
//! to the engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Map, Value};
use workflow_engine::{HttpMethod, NodeError, NodeExecutor, NodeInvocation, NodeKind, NodeOutput};

/// Webhook Executor
///
/// The request body is sent as JSON. A JSON response body is decoded, any
/// other response body is returned as text. Non-2xx responses fail the node
/// so the workflow's retry policy can take over.
///
/// # Outputs
/// - `status` - HTTP status code
/// - `body` - Decoded response body
/// - `headers` - Response headers (lower-cased names)
#[derive(Clone)]
pub struct WebhookExecutor {
    client: reqwest::Client,
}

impl WebhookExecutor {
    /// Output key for the status code
    pub const OUTPUT_STATUS: &'static str = "status";
    /// Output key for the response body
    pub const OUTPUT_BODY: &'static str = "body";
    /// Output key for the response headers
    pub const OUTPUT_HEADERS: &'static str = "headers";

    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Create with a request timeout applied to every call
    pub fn with_timeout(timeout: Duration) -> Result<Self, NodeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NodeError::failed(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for WebhookExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn header_map<'a>(headers: impl IntoIterator<Item = (&'a String, &'a String)>) -> Result<HeaderMap, NodeError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| NodeError::InvalidConfig(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| NodeError::InvalidConfig(format!("Invalid value for header '{}': {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl NodeExecutor for WebhookExecutor {
    async fn execute(&self, invocation: NodeInvocation) -> Result<NodeOutput, NodeError> {
        let NodeKind::Webhook(config) = &invocation.config else {
            return Err(NodeError::InvalidConfig(format!(
                "webhook executor cannot run '{}' nodes",
                invocation.node_type()
            )));
        };
        if config.url.trim().is_empty() {
            return Err(NodeError::InvalidConfig("Webhook URL is empty".to_string()));
        }

        let mut request = self
            .client
            .request(method(config.method), &config.url)
            .headers(header_map(&config.headers)?);
        if let Some(body) = &config.body {
            request = request.json(body);
        }

        log::debug!(
            "WebhookExecutor {}: {:?} {}",
            invocation.node_id,
            config.method,
            config.url
        );

        let response = request.send().await.map_err(|e| {
            NodeError::failed(format!("Request to {} failed: {}", config.url, e))
        })?;

        let status = response.status();
        let mut headers = Map::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), json!(value));
            }
        }
        let text = response.text().await.map_err(|e| {
            NodeError::failed(format!("Failed to read response from {}: {}", config.url, e))
        })?;

        if !status.is_success() {
            return Err(NodeError::failed(format!(
                "Webhook returned {}: {}",
                status, text
            )));
        }

        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        Ok(NodeOutput::new()
            .with(Self::OUTPUT_STATUS, json!(status.as_u16()))
            .with(Self::OUTPUT_BODY, body)
            .with(Self::OUTPUT_HEADERS, Value::Object(headers)))
    }
}
