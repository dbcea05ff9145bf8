//! Workflow executor.
//!
//! Walks a validated workflow from its first trigger node. Continuations are
//! queued first-in first-out in edge insertion order, and within one
//! traversal scope (the whole run, or one loop iteration) each node is
//! visited at most once. Inside a loop body an end node only closes the
//! iteration; it is applied once, after the last iteration.
//!
//! The executor is shared between runs: all per-run state lives in a
//! private `Run` value, so independent runs never touch the same context.
//! A run only suspends in delay nodes, retry waits and `NodeExecutor` calls.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::condition;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::error::{NodeError, Result, WorkflowEngineError};
use crate::events::{EventSink, ExecutionEvent, NullEventSink};
use crate::execution::{ExecutionError, ExecutionStatus, LogLevel, WorkflowExecution};
use crate::interpolate::{interpolate_strings, interpolate_value};
use crate::registry::{ExecutorRegistry, NodeInvocation};
use crate::transform;
use crate::types::{
    DelayConfig, EndStatus, LoopConfig, NodeId, NodeKind, Workflow, WorkflowEdge, WorkflowNode,
    HANDLE_COMPLETE, HANDLE_FALSE, HANDLE_TRUE,
};
use crate::validation::validate;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs workflows against a registry of node executors.
pub struct WorkflowExecutor {
    registry: Arc<ExecutorRegistry>,
    config: EngineConfig,
    event_sink: Arc<dyn EventSink>,
}

/// State of one live run.
struct Run<'w> {
    workflow: &'w Workflow,
    execution: WorkflowExecution,
    context: ExecutionContext,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    steps: u32,
}

/// How a traversal scope ended.
enum Flow {
    /// No continuations left. Carries the end nodes reached inside a loop
    /// body, which the loop applies after its last iteration.
    Drained(Vec<NodeId>),
    /// The run reached a terminal status
    Halted,
}

/// Why a node visit stopped short.
enum Interrupt {
    Cancelled,
    TimedOut,
    Failed(NodeError),
}

impl From<NodeError> for Interrupt {
    fn from(error: NodeError) -> Self {
        Interrupt::Failed(error)
    }
}

/// Result of a successful node visit.
struct Completion {
    /// Nodes to continue with, or `None` when the run has halted
    next: Option<Vec<NodeId>>,
    message: String,
    output: Option<Value>,
}

impl Completion {
    fn next(targets: Vec<NodeId>, message: impl Into<String>) -> Self {
        Self {
            next: Some(targets),
            message: message.into(),
            output: None,
        }
    }

    fn halt(message: impl Into<String>) -> Self {
        Self {
            next: None,
            message: message.into(),
            output: None,
        }
    }

    fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }
}

impl WorkflowExecutor {
    /// Create an executor with default limits and no event consumer.
    pub fn new(registry: Arc<ExecutorRegistry>) -> Self {
        Self {
            registry,
            config: EngineConfig::default(),
            event_sink: Arc::new(NullEventSink),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Stream progress events to a sink.
    pub fn with_event_sink(mut self, event_sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = event_sink;
        self
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a workflow to a terminal status.
    ///
    /// Node-level failures, timeouts and cancellation end up on the returned
    /// execution record. The only error is `ValidationFailed`, returned
    /// before anything runs.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        trigger_data: Value,
        cancel: CancellationToken,
    ) -> Result<WorkflowExecution> {
        let report = validate(workflow);
        let start = workflow.trigger_nodes().first().map(|n| n.id.clone());
        let Some(start) = start.filter(|_| report.is_valid()) else {
            log::warn!(
                "Refusing to run workflow '{}': {} validation error(s)",
                workflow.id,
                report.errors.len()
            );
            return Err(WorkflowEngineError::ValidationFailed {
                workflow_id: workflow.id.clone(),
                report,
            });
        };

        let mut execution = WorkflowExecution::new(workflow, trigger_data);
        let context = ExecutionContext::from_trigger(&execution.trigger_data);
        execution.status = ExecutionStatus::Running;
        execution.log(None, LogLevel::Info, format!("Execution of '{}' started", workflow.name));
        log::info!(
            "Starting execution {} of workflow '{}'",
            execution.id,
            workflow.id
        );
        self.emit(ExecutionEvent::ExecutionStarted {
            workflow_id: workflow.id.clone(),
            execution_id: execution.id.clone(),
        });

        let mut run = Run {
            workflow,
            execution,
            context,
            cancel,
            deadline: workflow
                .max_execution_time
                .map(|ms| Instant::now() + Duration::from_millis(ms)),
            steps: 0,
        };

        if let Flow::Drained(_) = self.traverse(&mut run, vec![start], None).await {
            run.execution.finish(ExecutionStatus::Completed, None);
        }

        let Run {
            mut execution,
            context,
            ..
        } = run;
        execution.context = context.into_data();
        let summary = match &execution.error {
            Some(error) => format!("Execution finished ({:?}): {}", execution.status, error.message),
            None => format!("Execution finished ({:?})", execution.status),
        };
        let level = match execution.status {
            ExecutionStatus::Failed => LogLevel::Error,
            ExecutionStatus::Cancelled => LogLevel::Warning,
            _ => LogLevel::Info,
        };
        execution.log(None, level, summary);

        log::info!(
            "Execution {} finished with status {:?} after {} node visit(s)",
            execution.id,
            execution.status,
            execution.completed_nodes.len()
        );
        self.emit(ExecutionEvent::ExecutionFinished {
            workflow_id: workflow.id.clone(),
            execution_id: execution.id.clone(),
            status: execution.status,
            error: execution.error.as_ref().map(|e| e.message.clone()),
        });

        Ok(execution)
    }

    /// Visit nodes breadth-first from `start` until the queue drains or the
    /// run halts. Reaching `boundary` (a loop node, from inside its body)
    /// ends the branch instead of visiting it, and so does an end node while
    /// a boundary is set.
    fn traverse<'a, 'w: 'a>(
        &'a self,
        run: &'a mut Run<'w>,
        start: Vec<NodeId>,
        boundary: Option<&'a str>,
    ) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            let workflow = run.workflow;
            let mut queue: VecDeque<NodeId> = start.into();
            let mut visited: HashSet<NodeId> = HashSet::new();
            let mut ends = Vec::new();

            while let Some(node_id) = queue.pop_front() {
                if boundary == Some(node_id.as_str()) || !visited.insert(node_id.clone()) {
                    continue;
                }
                let Some(node) = workflow.find_node(&node_id) else {
                    continue;
                };
                if boundary.is_some() && matches!(node.kind, NodeKind::End(_)) {
                    ends.push(node_id);
                    continue;
                }
                match self.visit(run, node).await {
                    Some(targets) => queue.extend(targets),
                    None => return Flow::Halted,
                }
            }
            Flow::Drained(ends)
        })
    }

    /// Visit one node, retrying per the workflow's policy. Returns the nodes
    /// to continue with, or `None` once the run has halted.
    async fn visit<'w>(&self, run: &mut Run<'w>, node: &'w WorkflowNode) -> Option<Vec<NodeId>> {
        if run.cancel.is_cancelled() {
            self.halt(run, None, Interrupt::Cancelled);
            return None;
        }
        if deadline_passed(run.deadline) {
            self.halt(run, None, Interrupt::TimedOut);
            return None;
        }
        if run.steps >= self.config.max_steps {
            let error = NodeError::failed(format!(
                "Exceeded the limit of {} node visits",
                self.config.max_steps
            ));
            self.halt(run, Some(node), Interrupt::Failed(error));
            return None;
        }

        run.steps += 1;
        run.execution.current_node_id = Some(node.id.clone());
        run.execution.completed_nodes.push(node.id.clone());
        log::debug!("Visiting {} node '{}'", node.node_type(), node.id);
        self.emit(ExecutionEvent::NodeStarted {
            execution_id: run.execution.id.clone(),
            node_id: node.id.clone(),
            node_type: node.node_type(),
        });

        let retry = run.workflow.retry_policy;
        let mut attempt: u32 = 0;
        let outcome = loop {
            let outcome = self.dispatch(run, node, attempt).await;
            let retry_after = match &outcome {
                Err(Interrupt::Failed(error)) if error.is_retryable() => retry
                    .filter(|policy| attempt < policy.max_retries)
                    .map(|policy| (policy, error.to_string())),
                _ => None,
            };
            let Some((policy, message)) = retry_after else {
                break outcome;
            };

            attempt += 1;
            run.execution.log(
                Some(node),
                LogLevel::Warning,
                format!(
                    "Attempt {} failed: {}; retrying in {} ms",
                    attempt, message, policy.retry_delay
                ),
            );
            self.emit(ExecutionEvent::NodeFailed {
                execution_id: run.execution.id.clone(),
                node_id: node.id.clone(),
                error: message,
                attempt,
            });
            self.emit(ExecutionEvent::NodeRetrying {
                execution_id: run.execution.id.clone(),
                node_id: node.id.clone(),
                attempt: attempt + 1,
                delay_ms: policy.retry_delay,
            });
            if let Err(interrupt) = self.pause(run, Duration::from_millis(policy.retry_delay)).await {
                break Err(interrupt);
            }
        };

        match outcome {
            Ok(completion) => {
                run.execution.log(Some(node), LogLevel::Info, completion.message);
                self.emit(ExecutionEvent::NodeCompleted {
                    execution_id: run.execution.id.clone(),
                    node_id: node.id.clone(),
                    output: completion.output,
                });
                completion.next
            }
            Err(interrupt) => {
                if let Interrupt::Failed(error) = &interrupt {
                    self.emit(ExecutionEvent::NodeFailed {
                        execution_id: run.execution.id.clone(),
                        node_id: node.id.clone(),
                        error: error.to_string(),
                        attempt: attempt + 1,
                    });
                }
                self.halt(run, Some(node), interrupt);
                None
            }
        }
    }

    /// Run one attempt of a node.
    async fn dispatch<'w>(
        &self,
        run: &mut Run<'w>,
        node: &'w WorkflowNode,
        attempt: u32,
    ) -> std::result::Result<Completion, Interrupt> {
        let workflow = run.workflow;

        // Transformations resolve their own templates step by step
        let config = match &node.kind {
            NodeKind::Transform(_) => node.kind.clone(),
            _ => self.resolve_config(run, node, attempt == 0)?,
        };

        match config {
            NodeKind::Trigger(_) => Ok(Completion::next(
                targets(workflow, &node.id, |_| true),
                "Triggered",
            )),
            NodeKind::Condition(config) => {
                let result = condition::evaluate(&config, &run.context)?;
                let handle = if result { HANDLE_TRUE } else { HANDLE_FALSE };
                Ok(Completion::next(
                    targets(workflow, &node.id, |e| e.has_handle(handle)),
                    format!("Condition evaluated to {}", result),
                )
                .with_output(json!({ "result": result })))
            }
            NodeKind::Delay(config) => self.delay(run, node, &config).await,
            NodeKind::Loop(config) => self.run_loop(run, node, &config).await,
            NodeKind::Transform(config) => {
                let unresolved = transform::apply(&config, &mut run.context)?;
                if !unresolved.is_empty() {
                    warn_unresolved(run, node, &unresolved);
                }
                Ok(Completion::next(
                    targets(workflow, &node.id, |_| true),
                    format!(
                        "Applied {} transformation(s)",
                        config.transformations.len()
                    ),
                ))
            }
            NodeKind::End(config) => {
                let (status, error) = match config.status {
                    EndStatus::Success => (ExecutionStatus::Completed, None),
                    EndStatus::Failure => (
                        ExecutionStatus::Failed,
                        Some(ExecutionError {
                            node_id: Some(node.id.clone()),
                            message: "Workflow ended with failure status".to_string(),
                        }),
                    ),
                    EndStatus::Cancelled => (ExecutionStatus::Cancelled, None),
                };
                run.execution.finish(status, error);
                Ok(Completion::halt(format!("Reached end ({:?})", config.status)))
            }
            kind @ (NodeKind::Action(_)
            | NodeKind::Agent(_)
            | NodeKind::Notification(_)
            | NodeKind::Webhook(_)) => self.delegate(run, node, kind).await,
        }
    }

    /// Interpolate `{{path}}` placeholders in a node's config.
    ///
    /// Placeholders that fill a whole string keep the referenced value's
    /// type when the config accepts it, and fall back to text otherwise.
    fn resolve_config(
        &self,
        run: &mut Run<'_>,
        node: &WorkflowNode,
        report_unresolved: bool,
    ) -> std::result::Result<NodeKind, NodeError> {
        let node_type = node.node_type();
        let raw = node
            .kind
            .config_value()
            .map_err(|e| NodeError::InvalidConfig(e.to_string()))?;

        let typed = interpolate_value(&raw, &run.context);
        let (kind, unresolved) = match NodeKind::from_config_value(node_type, typed.value) {
            Ok(kind) => (kind, typed.unresolved),
            Err(_) => {
                let text = interpolate_strings(&raw, &run.context);
                let kind = NodeKind::from_config_value(node_type, text.value)
                    .map_err(|e| NodeError::InvalidConfig(e.to_string()))?;
                (kind, text.unresolved)
            }
        };

        if report_unresolved && !unresolved.is_empty() {
            warn_unresolved(run, node, &unresolved);
        }
        Ok(kind)
    }

    async fn delay<'w>(
        &self,
        run: &mut Run<'w>,
        node: &'w WorkflowNode,
        config: &DelayConfig,
    ) -> std::result::Result<Completion, Interrupt> {
        let duration = config.as_duration();
        let duration_ms = duration.as_millis() as u64;

        run.execution.status = ExecutionStatus::Waiting;
        self.emit(ExecutionEvent::ExecutionWaiting {
            execution_id: run.execution.id.clone(),
            node_id: node.id.clone(),
            duration_ms,
        });
        let waited = self.pause(run, duration).await;
        run.execution.status = ExecutionStatus::Running;
        waited?;

        Ok(Completion::next(
            targets(run.workflow, &node.id, |_| true),
            format!("Waited {} ms", duration_ms),
        ))
    }

    /// Run the loop body once per item, then continue along the `complete`
    /// edges. Every other outgoing edge leads into the body.
    ///
    /// Without `complete` edges the loop continues to the end nodes its body
    /// reached, so `loop -> work -> end` still runs once per item.
    async fn run_loop<'w>(
        &self,
        run: &mut Run<'w>,
        node: &'w WorkflowNode,
        config: &LoopConfig,
    ) -> std::result::Result<Completion, Interrupt> {
        let workflow = run.workflow;
        let items = match run.context.get_path(&config.iterate_over) {
            Some(Value::Array(items)) => items.clone(),
            None | Some(Value::Null) => {
                run.execution.log(
                    Some(node),
                    LogLevel::Warning,
                    format!("'{}' is not set; nothing to iterate", config.iterate_over),
                );
                Vec::new()
            }
            Some(_) => {
                return Err(NodeError::Evaluation(format!(
                    "'{}' is not a list",
                    config.iterate_over
                ))
                .into())
            }
        };

        let cap = config
            .max_iterations
            .unwrap_or(self.config.default_max_iterations) as usize;
        let total = items.len();
        if total > cap {
            run.execution.log(
                Some(node),
                LogLevel::Warning,
                format!("Loop capped at {} of {} item(s)", cap, total),
            );
        }

        let body = targets(workflow, &node.id, |e| !e.has_handle(HANDLE_COMPLETE));
        let index_variable = format!("{}Index", config.item_variable);
        let skip = [config.item_variable.as_str(), index_variable.as_str()];
        let mut iterations = 0usize;
        let mut reached_ends: Vec<NodeId> = Vec::new();

        for (index, item) in items.into_iter().take(cap).enumerate() {
            self.emit(ExecutionEvent::LoopIteration {
                execution_id: run.execution.id.clone(),
                node_id: node.id.clone(),
                index,
            });

            let mut child = run.context.clone();
            child.set(config.item_variable.clone(), item);
            child.set(index_variable.clone(), json!(index));
            let parent = std::mem::replace(&mut run.context, child);
            let flow = self.traverse(run, body.clone(), Some(node.id.as_str())).await;
            let child = std::mem::replace(&mut run.context, parent);
            run.context.merge_from(&child, &skip);
            iterations += 1;

            match flow {
                Flow::Drained(ends) => {
                    for end in ends {
                        if !reached_ends.contains(&end) {
                            reached_ends.push(end);
                        }
                    }
                }
                Flow::Halted => {
                    let summary = json!({ "iterations": iterations, "total": total });
                    record_output(run, node, summary.clone());
                    return Ok(Completion::halt(format!(
                        "Loop stopped during iteration {}",
                        iterations
                    ))
                    .with_output(summary));
                }
            }
        }

        let summary = json!({ "iterations": iterations, "total": total });
        record_output(run, node, summary.clone());
        let mut next = targets(workflow, &node.id, |e| e.has_handle(HANDLE_COMPLETE));
        if next.is_empty() {
            next = reached_ends;
        }
        Ok(Completion::next(
            next,
            format!("Loop finished after {} iteration(s)", iterations),
        )
        .with_output(summary))
    }

    /// Hand a node to its registered executor and fold the result back into
    /// the run.
    async fn delegate<'w>(
        &self,
        run: &mut Run<'w>,
        node: &'w WorkflowNode,
        mut config: NodeKind,
    ) -> std::result::Result<Completion, Interrupt> {
        let node_type = node.node_type();
        let executor = self
            .registry
            .get(node_type)
            .ok_or_else(|| NodeError::MissingExecutor(node_type.to_string()))?;

        let remaining = run
            .workflow
            .token_budget
            .map(|budget| budget.saturating_sub(run.execution.tokens_used));
        let mut inputs = Map::new();
        let mut call_timeout = self.config.default_node_timeout();

        if let NodeKind::Agent(agent) = &mut config {
            if remaining == Some(0) {
                return Err(NodeError::BudgetExceeded.into());
            }
            if let Some(remaining) = remaining {
                agent.max_tokens = Some(agent.max_tokens.map_or(remaining, |m| m.min(remaining)));
            }
            for (name, path) in &agent.input_mapping {
                let value = run.context.get_path(path).cloned().unwrap_or(Value::Null);
                inputs.insert(name.clone(), value);
            }
            if let Some(ms) = agent.timeout {
                call_timeout = Some(Duration::from_millis(ms));
            }
        }
        let max_tokens = match &config {
            NodeKind::Agent(agent) => agent.max_tokens,
            _ => None,
        };

        let invocation = NodeInvocation {
            execution_id: run.execution.id.clone(),
            node_id: node.id.clone(),
            label: node.label.clone(),
            config,
            inputs,
            context: run.context.to_value(),
        };
        let call = async move {
            match call_timeout {
                Some(limit) => match tokio::time::timeout(limit, executor.execute(invocation)).await {
                    Ok(result) => result,
                    Err(_) => Err(NodeError::Timeout(limit.as_millis() as u64)),
                },
                None => executor.execute(invocation).await,
            }
        };

        let deadline = run.deadline;
        let output = tokio::select! {
            biased;
            _ = wait_for_deadline(deadline) => return Err(Interrupt::TimedOut),
            result = call => result?,
        };

        let tokens = output.tokens_used.unwrap_or(0);
        if remaining.is_some_and(|remaining| tokens > remaining) {
            return Err(NodeError::BudgetExceeded.into());
        }
        if let Some(limit) = max_tokens.filter(|limit| tokens > *limit) {
            return Err(NodeError::TokenLimit {
                used: tokens,
                limit,
            }
            .into());
        }
        run.execution.tokens_used += tokens;

        if let Some(mapping) = node.kind.output_mapping() {
            for (key, path) in mapping {
                if let Some(value) = output.outputs.get(key) {
                    run.context.set_path(path, value.clone());
                }
            }
        }
        let value = Value::Object(output.outputs);
        record_output(run, node, value.clone());

        let message = if tokens > 0 {
            format!("{} completed ({} tokens)", node_type.label(), tokens)
        } else {
            format!("{} completed", node_type.label())
        };
        Ok(Completion::next(targets(run.workflow, &node.id, |_| true), message).with_output(value))
    }

    /// Sleep, giving way to cancellation and the run deadline.
    async fn pause(&self, run: &Run<'_>, duration: Duration) -> std::result::Result<(), Interrupt> {
        tokio::select! {
            biased;
            _ = run.cancel.cancelled() => Err(Interrupt::Cancelled),
            _ = wait_for_deadline(run.deadline) => Err(Interrupt::TimedOut),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Move the run to its terminal status. When `node` is set this is the
    /// node's visit entry in the log.
    fn halt(&self, run: &mut Run<'_>, node: Option<&WorkflowNode>, interrupt: Interrupt) {
        let node_id = node
            .map(|n| n.id.clone())
            .or_else(|| run.execution.current_node_id.clone());
        match interrupt {
            Interrupt::Cancelled => {
                log::info!("Execution {} cancelled", run.execution.id);
                run.execution.log(node, LogLevel::Warning, "Cancelled");
                run.execution.finish(ExecutionStatus::Cancelled, None);
            }
            Interrupt::TimedOut => {
                let message = format!(
                    "Execution timed out after {} ms",
                    run.workflow.max_execution_time.unwrap_or_default()
                );
                log::warn!("Execution {}: {}", run.execution.id, message);
                run.execution.log(node, LogLevel::Error, message.clone());
                run.execution.finish(
                    ExecutionStatus::Failed,
                    Some(ExecutionError { node_id, message }),
                );
            }
            Interrupt::Failed(error) => {
                let message = error.to_string();
                log::warn!(
                    "Execution {} failed at node {:?}: {}",
                    run.execution.id,
                    node_id,
                    message
                );
                run.execution
                    .log(node, LogLevel::Error, format!("Failed: {}", message));
                run.execution.finish(
                    ExecutionStatus::Failed,
                    Some(ExecutionError { node_id, message }),
                );
            }
        }
    }

    fn emit(&self, event: ExecutionEvent) {
        let _ = self.event_sink.send(event);
    }
}

/// Targets of a node's outgoing edges that pass `filter`, in edge order.
fn targets(workflow: &Workflow, node_id: &str, filter: impl Fn(&WorkflowEdge) -> bool) -> Vec<NodeId> {
    workflow
        .outgoing_edges(node_id)
        .into_iter()
        .filter(|edge| filter(*edge))
        .map(|e| e.target.clone())
        .collect()
}

fn record_output(run: &mut Run<'_>, node: &WorkflowNode, value: Value) {
    run.execution.outputs.insert(node.id.clone(), value.clone());
    run.context.set(node.id.clone(), value);
}

fn warn_unresolved(run: &mut Run<'_>, node: &WorkflowNode, unresolved: &[String]) {
    run.execution.log(
        Some(node),
        LogLevel::Warning,
        format!("Unresolved template reference(s): {}", unresolved.join(", ")),
    );
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
