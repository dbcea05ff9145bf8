use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use workflow_engine::{validate, ExecutionStatus, Workflow, WorkflowExecutor};
use workflow_nodes::BuiltinExecutors;

fn demo(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name);
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn order_alerts_demo_runs_with_builtins() {
    let workflow: Workflow = serde_json::from_str(&demo("order-alerts.json")).unwrap();
    let trigger: Value = serde_json::from_str(&demo("order-batch.json")).unwrap();
    assert!(validate(&workflow).is_valid());

    let builtins = BuiltinExecutors::default();
    let notifications = builtins.notifications.clone();
    let executor = WorkflowExecutor::new(Arc::new(builtins.into_registry()));

    let execution = executor
        .execute(&workflow, trigger, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.context["largeOrders"], json!(2));
    assert_eq!(
        execution.outputs["summary"]["logged"],
        json!("2 large order(s) in this batch")
    );
    assert_eq!(execution.outputs["each-order"]["iterations"], json!(3));

    let messages: Vec<String> = notifications
        .outbox()
        .into_iter()
        .map(|n| n.message)
        .collect();
    assert_eq!(
        messages,
        vec![
            "Order A-100 from Acme totals 2500",
            "Order A-102 from Initech totals 1800",
        ]
    );
}
