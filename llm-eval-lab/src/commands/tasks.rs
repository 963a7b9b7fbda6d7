//! Task commands

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::Cell;
use futures::StreamExt;
use llm_eval_core::{DatasetConfigId, EvaluationTask, ModelId, SchemeId, TaskId, TaskStatus};
use llm_eval_workflow::{ComparisonView, Orchestrator, TaskDetail, TaskRequest};
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::Context;
use crate::output::{
    format_diff, format_score, format_timestamp, format_uuid_short, new_table, print_field,
    print_optional_field, print_section, status_badge, OutputFormat, TableDisplay,
};

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// Create a task and run it in this process until it finishes
    Submit(SubmitArgs),

    /// List tasks, newest first
    List,

    /// Show a task with its datasets, results and summary
    Show {
        id: Uuid,
    },

    /// Print the engine log, following it while the task runs
    Logs {
        id: Uuid,
    },

    /// Delete a task, its results and its workspace
    Delete {
        id: Uuid,
    },

    /// Compare finished runs of one scheme; the first id is the baseline
    Compare {
        #[arg(required = true, num_args = 2..)]
        ids: Vec<Uuid>,
    },

    /// Pack the summary tables and result summary of a task into a zip
    Export {
        id: Uuid,

        /// Directory the archive is written to
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// Model to evaluate
    #[arg(short, long)]
    pub model: Uuid,

    /// Scheme whose dataset configurations are evaluated
    #[arg(short, long)]
    pub scheme: Option<Uuid>,

    /// Dataset configuration ids (comma-separated); ignored with --scheme
    #[arg(short, long, value_delimiter = ',')]
    pub datasets: Vec<Uuid>,

    /// Do not stream the engine log
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(ctx: &Context, cmd: TaskCommand) -> Result<()> {
    let orchestrator = ctx.orchestrator().await?;

    let outcome = match cmd {
        // Keeps the queue up while the task runs and shuts it down itself.
        TaskCommand::Submit(args) => return submit(ctx, &orchestrator, args).await,
        TaskCommand::List => list(ctx, &orchestrator).await,
        TaskCommand::Show { id } => show(ctx, &orchestrator, TaskId::from_uuid(id)).await,
        TaskCommand::Logs { id } => logs(ctx, &orchestrator, TaskId::from_uuid(id)).await,
        TaskCommand::Delete { id } => delete(ctx, &orchestrator, TaskId::from_uuid(id)).await,
        TaskCommand::Compare { ids } => compare(ctx, &orchestrator, ids).await,
        TaskCommand::Export { id, dest } => export(ctx, &orchestrator, TaskId::from_uuid(id), dest).await,
    };
    orchestrator.shutdown().await;
    outcome
}

impl TableDisplay for EvaluationTask {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(format_uuid_short(self.id.as_uuid())),
            Cell::new(status_badge(self.status)),
            Cell::new(format!("{}%", self.progress)),
            Cell::new(
                self.scheme_id
                    .map(|id| format_uuid_short(id.as_uuid()))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(self.config_ids.len().to_string()),
            Cell::new(format_timestamp(&self.created_at)),
        ]
    }

    fn display_single(&self) {
        print_section("Task");
        print_field("ID", &self.id.to_string());
        print_field("Status", &status_badge(self.status));
        print_field("Progress", &format!("{}%", self.progress));
        print_field("Model", &self.model_id.to_string());
        print_optional_field("Scheme", self.scheme_id.map(|id| id.to_string()).as_deref());
        print_field("Created", &format_timestamp(&self.created_at));
        print_optional_field("Started", self.started_at.as_ref().map(format_timestamp).as_deref());
        print_optional_field("Finished", self.finished_at.as_ref().map(format_timestamp).as_deref());
        print_optional_field("Error", self.error_msg.as_deref());
    }
}

impl TableDisplay for TaskDetail {
    fn to_row(&self) -> Vec<Cell> {
        self.task.to_row()
    }

    fn display_single(&self) {
        self.task.display_single();
        print_optional_field("Model Name", self.model_name.as_deref());

        print_section("Datasets");
        let mut datasets = new_table(&["Config", "Dataset", "Category", "Source"]);
        for snapshot in &self.datasets {
            datasets.add_row(vec![
                Cell::new(&snapshot.config.name),
                Cell::new(&snapshot.meta_name),
                Cell::new(&snapshot.category),
                Cell::new(snapshot.config.file_ref.to_string()),
            ]);
        }
        println!("{datasets}");

        if !self.results.is_empty() {
            print_section("Results");
            let mut results = new_table(&["Dataset", "Metric", "Score"]);
            for result in &self.results {
                results.add_row(vec![
                    Cell::new(&result.dataset_name),
                    Cell::new(&result.metric_name),
                    Cell::new(format_score(Some(result.score))),
                ]);
            }
            println!("{results}");
        }

        if let Some(summary) = &self.task.summary {
            print_section("Capabilities");
            let mut radar = new_table(&["Category", "Score"]);
            for entry in &summary.radar {
                radar.add_row(vec![Cell::new(&entry.name), Cell::new(format!("{:.1}", entry.score))]);
            }
            println!("{radar}");
            if let Some(timing) = &summary.timing {
                print_field("Duration", &format!("{}s", timing.duration_seconds));
            }
        }
    }
}

impl TableDisplay for ComparisonView {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.scheme_name),
            Cell::new(self.report.tasks.len().to_string()),
            Cell::new(self.report.rows.len().to_string()),
        ]
    }

    fn display_single(&self) {
        print_section("Comparison");
        print_field("Scheme", &self.scheme_name);
        for (i, column) in self.report.tasks.iter().enumerate() {
            let role = if i == 0 { " (baseline)" } else { "" };
            print_field(
                &format!("Run {}", i + 1),
                &format!(
                    "{} {} {}{}",
                    format_uuid_short(column.task_id.as_uuid()),
                    column.model_name,
                    format_timestamp(&column.created_at),
                    role
                ),
            );
        }

        let mut headers = vec!["Dataset".to_string(), "Metric".to_string()];
        for i in 0..self.report.tasks.len() {
            headers.push(format!("Run {}", i + 1));
            if i > 0 {
                headers.push(format!("Δ {}", i + 1));
            }
        }
        let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
        let mut table = new_table(&header_refs);
        for row in &self.report.rows {
            let mut cells = vec![Cell::new(&row.dataset), Cell::new(&row.metric)];
            for (i, score) in row.scores.iter().enumerate() {
                cells.push(Cell::new(format_score(*score)));
                if i > 0 {
                    cells.push(Cell::new(format_diff(row.diffs.get(i - 1).copied().flatten())));
                }
            }
            table.add_row(cells);
        }
        println!("{table}");

        print_section("Capabilities");
        let mut headers = vec!["Run".to_string()];
        headers.extend(self.report.indicators.iter().map(|i| i.name.clone()));
        let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
        let mut radar = new_table(&header_refs);
        for series in &self.report.series {
            let mut cells = vec![Cell::new(&series.name)];
            cells.extend(series.values.iter().map(|v| Cell::new(format!("{:.1}", v))));
            radar.add_row(cells);
        }
        println!("{radar}");
    }
}

async fn submit(ctx: &Context, orchestrator: &Orchestrator, args: SubmitArgs) -> Result<()> {
    let request = TaskRequest {
        model_id: Some(ModelId::from_uuid(args.model)),
        scheme_id: args.scheme.map(SchemeId::from_uuid),
        config_ids: args.datasets.into_iter().map(DatasetConfigId::from_uuid).collect(),
    };
    let task = match orchestrator.tasks().create(request).await {
        Ok(task) => task,
        Err(err) => {
            orchestrator.shutdown().await;
            return Err(err.into());
        }
    };
    info!(task_id = %task.id, "task submitted");
    ctx.output.info(&format!("Task {} queued", task.id));

    let finished = tokio::select! {
        finished = wait_for(ctx, orchestrator, task.id, args.quiet) => finished?,
        _ = tokio::signal::ctrl_c() => {
            // The child engine is killed when the runtime drops it; the
            // reconciler fails the task once its heartbeat goes stale.
            ctx.output.warning(&format!("Interrupted; task {} is left running", task.id));
            return Ok(());
        }
    };
    orchestrator.shutdown().await;

    let detail = orchestrator.tasks().detail(finished.id).await?;
    ctx.output.write(&detail)?;
    if finished.status == TaskStatus::Failed {
        anyhow::bail!(
            "task {} failed: {}",
            finished.id,
            finished.error_msg.as_deref().unwrap_or("unknown error")
        );
    }
    ctx.output.success(&format!("Task {} finished", finished.id));
    Ok(())
}

async fn wait_for(
    ctx: &Context,
    orchestrator: &Orchestrator,
    task_id: TaskId,
    quiet: bool,
) -> Result<EvaluationTask> {
    if !quiet {
        stream_log(ctx, orchestrator, task_id).await;
    }

    let poll = orchestrator.config().log_tail.poll_interval();
    loop {
        let task = orchestrator.tasks().get(task_id).await?;
        if task.is_terminal() {
            return Ok(task);
        }
        tokio::time::sleep(poll).await;
    }
}

async fn stream_log(ctx: &Context, orchestrator: &Orchestrator, task_id: TaskId) {
    let mut lines = Box::pin(
        orchestrator
            .logs()
            .tail(task_id, orchestrator.config().log_path(task_id)),
    );
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) if ctx.output.format() == OutputFormat::Table => println!("{}", line),
            Ok(line) => eprintln!("{}", line),
            Err(err) => {
                warn!(task_id = %task_id, error = %err, "log tail stopped");
                break;
            }
        }
    }
}

async fn list(ctx: &Context, orchestrator: &Orchestrator) -> Result<()> {
    let tasks = orchestrator.tasks().list().await?;
    ctx.output.write_list(
        &tasks,
        &["ID", "Status", "Progress", "Scheme", "Datasets", "Created"],
    )
}

async fn show(ctx: &Context, orchestrator: &Orchestrator, id: TaskId) -> Result<()> {
    let detail = orchestrator.tasks().detail(id).await?;
    ctx.output.write(&detail)
}

async fn logs(ctx: &Context, orchestrator: &Orchestrator, id: TaskId) -> Result<()> {
    orchestrator.tasks().get(id).await?;
    let mut lines = Box::pin(orchestrator.logs().tail(id, orchestrator.config().log_path(id)));
    while let Some(line) = lines.next().await {
        let line = line?;
        if ctx.output.format() == OutputFormat::Table {
            println!("{}", line);
        } else {
            println!("{}", serde_json::to_string(&line)?);
        }
    }
    Ok(())
}

async fn delete(ctx: &Context, orchestrator: &Orchestrator, id: TaskId) -> Result<()> {
    if !orchestrator.tasks().delete(id).await? {
        anyhow::bail!("task {} not found", id);
    }
    ctx.output.success(&format!("Deleted task {}", id));
    Ok(())
}

async fn compare(ctx: &Context, orchestrator: &Orchestrator, ids: Vec<Uuid>) -> Result<()> {
    let ids: Vec<TaskId> = ids.into_iter().map(TaskId::from_uuid).collect();
    let view = orchestrator.comparison().compare(&ids).await?;
    ctx.output.write(&view)
}

async fn export(ctx: &Context, orchestrator: &Orchestrator, id: TaskId, dest: PathBuf) -> Result<()> {
    let archive = orchestrator.exporter().export(id, &dest).await?;
    ctx.output.success(&format!("Wrote {}", archive.display()));
    Ok(())
}
