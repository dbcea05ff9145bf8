use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use workflow_engine::{
    validate, ChannelEventSink, EngineConfig, ExecutionStatus, FileWorkflowRepository,
    Result, Workflow, WorkflowExecutor, WorkflowRepository,
};

#[derive(Parser)]
#[command(name = "flowrun", version, about = "Validate and run workflow documents")]
struct Cli {
    /// Path to the engine config file
    #[arg(short, long, default_value = "flowrun.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a workflow document and print its validation report
    Validate {
        /// Workflow JSON file
        file: PathBuf,
    },
    /// Run a workflow document to completion
    Run {
        /// Workflow JSON file
        file: PathBuf,
        /// Trigger data: inline JSON, or @path to a JSON file
        #[arg(short, long)]
        trigger: Option<String>,
        /// Print progress events as JSON lines while running
        #[arg(long)]
        events: bool,
    },
    /// List the workflows stored in a directory
    List {
        /// Directory with one JSON document per workflow
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config = EngineConfig::load(&cli.config).await?;

    match cli.command {
        Commands::Validate { file } => {
            let workflow = read_workflow(&file).await?;
            let report = validate(&workflow);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Run {
            file,
            trigger,
            events,
        } => {
            let workflow = read_workflow(&file).await?;
            let trigger_data = match trigger {
                Some(arg) => parse_trigger(&arg).await?,
                None => Value::Object(Default::default()),
            };
            run(workflow, trigger_data, config, events).await
        }
        Commands::List { dir } => {
            let repository = FileWorkflowRepository::new(dir);
            for summary in repository.list().await? {
                println!(
                    "{}\t{}\t{:?}\t{} node(s)\t{} run(s)",
                    summary.id,
                    summary.name,
                    summary.status,
                    summary.node_count,
                    summary.execution_count
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(
    workflow: Workflow,
    trigger_data: Value,
    config: EngineConfig,
    stream_events: bool,
) -> Result<ExitCode> {
    let registry = Arc::new(workflow_nodes::builtin_registry());
    let mut executor = WorkflowExecutor::new(registry).with_config(config);

    let printer = if stream_events {
        let (sink, mut receiver) = ChannelEventSink::channel();
        executor = executor.with_event_sink(Arc::new(sink));
        Some(tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let Ok(line) = serde_json::to_string(&event) {
                    println!("{}", line);
                }
            }
        }))
    } else {
        None
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling the run");
            on_interrupt.cancel();
        }
    });

    let execution = executor.execute(&workflow, trigger_data, cancel).await?;

    // Dropping the executor closes the event channel
    drop(executor);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if !stream_events {
        println!("{}", serde_json::to_string_pretty(&execution)?);
    }
    log::info!(
        "Workflow '{}' finished: {:?}, {} tokens",
        workflow.name,
        execution.status,
        execution.tokens_used
    );

    Ok(match execution.status {
        ExecutionStatus::Completed => ExitCode::SUCCESS,
        ExecutionStatus::Cancelled => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    })
}

async fn read_workflow(path: &Path) -> Result<Workflow> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&contents)?)
}

async fn parse_trigger(arg: &str) -> Result<Value> {
    let contents = match arg.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => arg.to_string(),
    };
    Ok(serde_json::from_str(&contents)?)
}
