// crates/canvascli/src/main.rs

use anyhow::{bail, Context, Result};
use canvascore::{ExecutionEvent, NodeEvent, PipelineRecord, Position};
use canvasruntime::{
    list_or_empty, Canvas, CanvasConfig, Connection, CyclePolicy, ErrorHandling,
    HttpPipelineStore, MockStepExecutor, NodeRegistry, PipelineStore, SimulatorConfig,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "canvas")]
#[command(about = "Workflow canvas CLI", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a run over a pipeline file
    Run {
        /// Path to pipeline JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Initial input for root nodes, as a JSON string
        #[arg(short, long)]
        input: Option<String>,

        #[arg(long, default_value_t = 300)]
        min_delay_ms: u64,

        #[arg(long, default_value_t = 800)]
        max_delay_ms: u64,

        /// Node ids that should fail
        #[arg(long = "fail")]
        fail: Vec<String>,

        /// Keep running after a node fails
        #[arg(long)]
        continue_on_error: bool,

        /// Refuse to run graphs with cycles
        #[arg(long)]
        strict: bool,
    },

    /// Validate node configs and graph structure
    Validate {
        /// Path to pipeline JSON file
        file: PathBuf,
    },

    /// Print the execution order
    Order {
        /// Path to pipeline JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create an example pipeline file
    Init {
        #[arg(short, long, default_value = "pipeline.json")]
        output: PathBuf,
    },

    /// Download pipelines from the backend
    Pull {
        #[arg(long, env = "AGENT_OS_API_URL")]
        api: String,

        /// Directory to write pipeline files into
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Save a pipeline file to the backend
    Push {
        #[arg(long, env = "AGENT_OS_API_URL")]
        api: String,

        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run {
            file,
            input,
            min_delay_ms,
            max_delay_ms,
            fail,
            continue_on_error,
            strict,
        } => {
            let simulator = SimulatorConfig {
                min_delay_ms,
                max_delay_ms,
                on_error: if continue_on_error {
                    ErrorHandling::ContinueOnError
                } else {
                    ErrorHandling::StopWorkflow
                },
                on_cycle: if strict { CyclePolicy::Reject } else { CyclePolicy::Skip },
                ..SimulatorConfig::default()
            };
            let executor = fail
                .into_iter()
                .fold(MockStepExecutor::new(min_delay_ms, max_delay_ms), |executor, id| {
                    executor.fail_node(id)
                });
            run_pipeline(&file, input, simulator, executor).await?;
        }
        Commands::Validate { file } => validate_pipeline(&file)?,
        Commands::Order { file } => print_order(&file)?,
        Commands::Nodes => list_nodes(),
        Commands::Init { output } => create_example_pipeline(&output)?,
        Commands::Pull { api, dir } => pull_pipelines(&api, &dir).await?,
        Commands::Push { api, file } => push_pipeline(&api, &file).await?,
    }

    Ok(())
}

fn registry() -> Arc<NodeRegistry> {
    Arc::new(canvasnodes::default_registry())
}

fn read_record(file: &Path) -> Result<PipelineRecord> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let record: PipelineRecord = serde_json::from_str(&json)
        .with_context(|| format!("parsing {}", file.display()))?;
    Ok(record)
}

fn load_canvas(file: &Path, config: CanvasConfig, executor: Option<MockStepExecutor>) -> Result<(Canvas, PipelineRecord)> {
    let record = read_record(file)?;
    let mut canvas = match executor {
        Some(executor) => Canvas::with_executor(registry(), Arc::new(executor), config),
        None => Canvas::with_config(registry(), config),
    };
    canvas.load_record(&record)?;
    Ok((canvas, record))
}

async fn run_pipeline(
    file: &Path,
    input: Option<String>,
    simulator: SimulatorConfig,
    executor: MockStepExecutor,
) -> Result<()> {
    let config = CanvasConfig {
        simulator,
        ..CanvasConfig::default()
    };
    let (mut canvas, record) = load_canvas(file, config, Some(executor))?;

    println!("Pipeline: {}", record.name);
    println!("   Nodes: {}", canvas.graph().nodes().len());
    println!("   Edges: {}", canvas.graph().edges().len());
    println!();

    let input = match input {
        Some(raw) => {
            let json: serde_json::Value = serde_json::from_str(&raw)?;
            if !json.is_object() {
                bail!("Input must be a JSON object");
            }
            json
        }
        None => serde_json::json!({}),
    };

    let mut events = canvas.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::RunStarted { queued, .. } => {
                    println!("Run started, {} node(s) queued", queued.len());
                }
                ExecutionEvent::NodeStarted { node_id, node_type, .. } => {
                    println!("  running  {} ({})", node_id, node_type);
                }
                ExecutionEvent::NodeCompleted { node_id, duration_ms, output, .. } => {
                    println!("  success  {} in {}ms -> {}", node_id, duration_ms, output);
                }
                ExecutionEvent::NodeFailed { node_id, error, .. } => {
                    println!("  error    {}: {}", node_id, error);
                }
                ExecutionEvent::NodeSkipped { node_id, reason, .. } => {
                    println!("  skipped  {} ({})", node_id, reason);
                }
                ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
                    NodeEvent::Info { message } => println!("           [{}] {}", node_id, message),
                    NodeEvent::Warning { message } => println!("           [{}] warning: {}", node_id, message),
                    _ => {}
                },
                ExecutionEvent::RunCompleted { success, cancelled, duration_ms, .. } => {
                    let outcome = if cancelled {
                        "cancelled"
                    } else if success {
                        "completed"
                    } else {
                        "failed"
                    };
                    println!("Run {} after {}ms", outcome, duration_ms);
                    break;
                }
                ExecutionEvent::EdgeActivity { .. } | ExecutionEvent::NodeStatus { .. } => {}
            }
        }
    });

    let cancellation = CancellationToken::new();
    let ctrl_c = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let summary = match canvas.run_with(input, cancellation).await {
        Ok(summary) => {
            let _ = event_task.await;
            summary
        }
        Err(e) => {
            event_task.abort();
            return Err(e.into());
        }
    };

    println!();
    println!("Summary:");
    println!("   Execution ID: {}", summary.execution_id);
    println!("   Executed: {}", summary.executed.join(", "));
    if !summary.failed.is_empty() {
        println!("   Failed: {}", summary.failed.join(", "));
    }
    if !summary.skipped.is_empty() {
        println!("   Skipped: {}", summary.skipped.join(", "));
    }

    if !summary.success() {
        bail!("run did not complete successfully");
    }
    Ok(())
}

fn validate_pipeline(file: &Path) -> Result<()> {
    let (canvas, record) = load_canvas(file, CanvasConfig::default(), None)?;
    let report = canvas.validate();

    println!("Validating pipeline: {}", record.name);
    for issue in &report.issues {
        println!("  issue: {}", serde_json::to_string(issue)?);
    }
    for (node_id, node_report) in &report.nodes {
        for (field, message) in &node_report.errors {
            println!("  error   {}.{}: {}", node_id, field, message);
        }
        for (field, message) in &node_report.warnings {
            println!("  warning {}.{}: {}", node_id, field, message);
        }
    }

    if report.is_valid() {
        println!("Pipeline is valid");
    } else {
        println!("{} problem(s) found", report.error_count());
    }
    Ok(())
}

fn print_order(file: &Path) -> Result<()> {
    let (canvas, _) = load_canvas(file, CanvasConfig::default(), None)?;
    let plan = canvas.execution_order();

    for (step, node_id) in plan.order.iter().enumerate() {
        let node_type = canvas
            .graph()
            .node(node_id)
            .map(|n| n.node_type.as_str())
            .unwrap_or("?");
        println!("{:>3}. {} ({})", step + 1, node_id, node_type);
    }
    if !plan.blocked.is_empty() {
        println!("Blocked by cycles: {}", plan.blocked.join(", "));
        for cycle in &plan.cycles {
            println!("   cycle: {}", cycle.join(" -> "));
        }
    }
    Ok(())
}

fn list_nodes() {
    println!("Available node types:");
    let registry = registry();

    for category in registry.categories() {
        println!();
        println!("{}", category);
        for definition in registry.by_category(&category) {
            println!("  - {} ({})", definition.node_type, definition.label);
            if !definition.description.is_empty() {
                println!("    {}", definition.description);
            }
            let targets = registry.allowed_targets(&definition.node_type);
            if !targets.is_empty() {
                println!("    connects to: {}", targets.join(", "));
            }
        }
    }
}

fn create_example_pipeline(output: &Path) -> Result<()> {
    let mut canvas = Canvas::new(registry());

    let trigger = canvas.add_node("trigger", Position::new(100.0, 100.0))?;
    let agent = canvas.add_node("agent", Position::new(300.0, 100.0))?;
    canvas.set_config_value(&agent, "agent_id", serde_json::json!("support-triage"))?;
    let approval = canvas.add_node("hitl", Position::new(500.0, 100.0))?;
    canvas.set_config_value(&approval, "approvers", serde_json::json!("ops@example.com"))?;
    let done = canvas.add_node("output", Position::new(700.0, 100.0))?;

    canvas.connect(Connection::new(trigger, agent.clone()))?;
    canvas.connect(Connection::new(agent, approval.clone()))?;
    canvas.connect(Connection::new(approval, done))?;

    let mut record = canvas.to_record("Example triage pipeline");
    record.description = Some("Triggers an agent and asks for approval before finishing".to_string());

    std::fs::write(output, serde_json::to_string_pretty(&record)?)?;
    println!("Created example pipeline: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  canvas run --file {}", output.display());
    Ok(())
}

fn file_name_for(record: &PipelineRecord, index: usize) -> String {
    let stem: String = record
        .id
        .clone()
        .unwrap_or_else(|| format!("pipeline-{}", index))
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}.json", stem)
}

async fn pull_pipelines(api: &str, dir: &Path) -> Result<()> {
    let store = HttpPipelineStore::new(api);
    let records = list_or_empty(&store).await;

    std::fs::create_dir_all(dir)?;
    for (index, record) in records.iter().enumerate() {
        let path = dir.join(file_name_for(record, index));
        std::fs::write(&path, serde_json::to_string_pretty(record)?)?;
        println!("  {} -> {}", record.name, path.display());
    }
    println!("Pulled {} pipeline(s)", records.len());
    Ok(())
}

async fn push_pipeline(api: &str, file: &Path) -> Result<()> {
    let (canvas, mut record) = load_canvas(file, CanvasConfig::default(), None)?;

    let report = canvas.validate();
    if !report.is_valid() {
        tracing::warn!("Saving pipeline with {} validation problem(s)", report.error_count());
    }

    record.set_graph(canvas.graph());
    let store = HttpPipelineStore::new(api);
    let saved = store.save(&record).await?;

    if let Some(id) = &saved.id {
        println!("Saved pipeline {} ({})", saved.name, id);
    } else {
        println!("Saved pipeline {}", saved.name);
    }
    Ok(())
}
