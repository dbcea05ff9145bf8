//! HTTP nodes
//!
//! Executors that call out to HTTP endpoints.

mod webhook;

pub use webhook::WebhookExecutor;
