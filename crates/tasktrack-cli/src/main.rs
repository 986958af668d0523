use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tasktrack_core::config::{
    find_config_root, resolve_config, update_project_config, ResolvedConfig,
};
use tasktrack_core::{
    activate_task, complete_task, deactivate_all, deactivate_task, task_status, ActivateOptions,
    FileDocument, JsonSessionStore, SessionStatus, SessionStore, SystemClock, TaskId,
};

#[derive(Parser)]
#[command(
    name = "tasktrack",
    version,
    about = "Track work sessions against checklist tasks in plain-text notes"
)]
struct Cli {
    /// Project root holding .tasktrack.toml and the default data file
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args)]
struct CursorArgs {
    /// Document containing the task
    #[arg(long)]
    file: PathBuf,
    /// 1-based line the cursor is on
    #[arg(long, value_parser = parse_line_number)]
    line: usize,
    #[command(flatten)]
    data: DataArgs,
}

#[derive(Args)]
struct DataArgs {
    /// Session data file (defaults to the configured data file under the root)
    #[arg(long)]
    data: Option<PathBuf>,
    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start a session on the task under the cursor, assigning an id if it has none
    Activate {
        #[command(flatten)]
        cursor: CursorArgs,
        /// Deactivate every other active task (overrides config)
        #[arg(long, action = clap::ArgAction::Set)]
        only_one_active: Option<bool>,
    },
    /// End the active session of the task under the cursor
    Deactivate {
        #[command(flatten)]
        cursor: CursorArgs,
    },
    /// Mark the task under the cursor complete
    Complete {
        #[command(flatten)]
        cursor: CursorArgs,
    },
    /// Show id and current status of the task under the cursor
    Show {
        #[command(flatten)]
        cursor: CursorArgs,
    },
    /// End every active session
    StopAll {
        #[command(flatten)]
        data: DataArgs,
    },
    /// List tracked tasks with their current status
    Status {
        #[command(flatten)]
        data: DataArgs,
        /// Only list tasks whose current status matches (active, inactive, complete)
        #[arg(long, value_parser = parse_status)]
        only: Option<SessionStatus>,
    },
    /// Show or change project settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print effective settings and where each one comes from
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Write settings to the project config file
    Set {
        #[arg(long, action = clap::ArgAction::Set)]
        only_one_active: Option<bool>,
        #[arg(long)]
        data_file: Option<String>,
    },
}

fn parse_status(value: &str) -> Result<SessionStatus, String> {
    SessionStatus::parse(value)
        .ok_or_else(|| format!("unknown status '{value}' (expected active, inactive or complete)"))
}

fn parse_line_number(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("line numbers start at 1".to_string()),
        Ok(line) => Ok(line),
        Err(err) => Err(err.to_string()),
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("TASKTRACK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

struct Workspace {
    root: PathBuf,
}

impl Workspace {
    fn new(root: Option<PathBuf>) -> Result<Self> {
        let start = match root {
            Some(root) => root,
            None => std::env::current_dir().context("resolve current directory")?,
        };
        let root = find_config_root(&start).unwrap_or(start);
        debug!(root = %root.display(), "resolved project root");
        Ok(Self { root })
    }

    fn config(&self) -> Result<ResolvedConfig> {
        resolve_config(&self.root)
            .with_context(|| format!("load config for {}", self.root.display()))
    }

    fn store(&self, data: &DataArgs) -> Result<JsonSessionStore> {
        let path = match &data.data {
            Some(path) => path.clone(),
            None => self.config()?.data_file.value,
        };
        Ok(JsonSessionStore::new(path))
    }

    fn document(&self, cursor: &CursorArgs) -> FileDocument {
        FileDocument::new(&cursor.file, cursor.line - 1)
    }
}

fn print_task_result(action: &str, doc: &FileDocument, task_id: Option<TaskId>, as_json: bool) {
    if as_json {
        println!("{}", json!({"ok": true, "action": action, "task_id": task_id}));
        return;
    }
    match task_id {
        Some(id) => println!("{action}: task {id}"),
        None => println!(
            "{action}: no task with an id at the cursor in {}",
            doc.path().display()
        ),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let ctx = Workspace::new(cli.root)?;
    match cli.command {
        Some(Command::Activate {
            cursor,
            only_one_active,
        }) => {
            let only_one_active = match only_one_active {
                Some(value) => value,
                None => ctx.config()?.only_one_active.value,
            };
            let options = ActivateOptions { only_one_active };
            let mut doc = ctx.document(&cursor);
            let mut store = ctx.store(&cursor.data)?;
            let task_id = activate_task(&mut doc, &mut store, &options)
                .with_context(|| format!("activate task in {}", doc.path().display()))?;
            print_task_result("activated", &doc, task_id, cursor.data.json);
        }
        Some(Command::Deactivate { cursor }) => {
            let doc = ctx.document(&cursor);
            let mut store = ctx.store(&cursor.data)?;
            let task_id = deactivate_task(&doc, &mut store, &SystemClock)
                .with_context(|| format!("deactivate task in {}", doc.path().display()))?;
            print_task_result("deactivated", &doc, task_id, cursor.data.json);
        }
        Some(Command::Complete { cursor }) => {
            let doc = ctx.document(&cursor);
            let mut store = ctx.store(&cursor.data)?;
            let task_id = complete_task(&doc, &mut store, &SystemClock)
                .with_context(|| format!("complete task in {}", doc.path().display()))?;
            print_task_result("completed", &doc, task_id, cursor.data.json);
        }
        Some(Command::Show { cursor }) => {
            let doc = ctx.document(&cursor);
            let store = ctx.store(&cursor.data)?;
            let report = task_status(&doc, &store)
                .with_context(|| format!("read task in {}", doc.path().display()))?;
            if cursor.data.json {
                println!("{}", json!({"ok": true, "task": report}));
            } else {
                match report {
                    Some(report) => println!(
                        "{} | {} | {} sessions | {}",
                        report
                            .task_id
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "(no id)".to_string()),
                        report.status.map(|s| s.as_str()).unwrap_or("none"),
                        report.sessions,
                        report.description
                    ),
                    None => println!("(not a task)"),
                }
            }
        }
        Some(Command::StopAll { data }) => {
            let mut store = ctx.store(&data)?;
            let stopped = deactivate_all(&mut store, &SystemClock)
                .with_context(|| format!("deactivate tasks in {}", store.path().display()))?;
            if data.json {
                println!("{}", json!({"ok": true, "deactivated": stopped}));
            } else if stopped.is_empty() {
                println!("No active tasks");
            } else {
                for id in stopped {
                    println!("deactivated: task {id}");
                }
            }
        }
        Some(Command::Status { data, only }) => {
            let store = ctx.store(&data)?;
            let log = store
                .load()
                .with_context(|| format!("load {}", store.path().display()))?;
            let tracked: Vec<_> = log
                .iter()
                .filter(|(_, history)| {
                    only.map_or(true, |wanted| {
                        history.last().map(|s| s.status) == Some(wanted)
                    })
                })
                .collect();
            if data.json {
                let tasks: Vec<_> = tracked
                    .iter()
                    .map(|(id, history)| {
                        let last = history.last();
                        json!({
                            "task_id": id,
                            "status": last.map(|s| s.status),
                            "sessions": history.len(),
                            "updated_at": last.map(|s| s.time),
                        })
                    })
                    .collect();
                println!("{}", json!({"ok": true, "tasks": tasks}));
            } else if tracked.is_empty() {
                println!("No tracked tasks");
            } else {
                for (id, history) in &tracked {
                    let last = history.last();
                    println!(
                        "{} | {} | {} sessions | {}",
                        id,
                        last.map(|s| s.status.as_str()).unwrap_or("none"),
                        history.len(),
                        last.map(|s| s.time.to_rfc3339()).unwrap_or_default()
                    );
                }
            }
        }
        Some(Command::Config { command }) => match command {
            ConfigCommand::Show { json: as_json } => {
                let config = ctx.config()?;
                if as_json {
                    println!("{}", json!({"ok": true, "config": config}));
                } else {
                    println!("root: {}", config.root.display());
                    println!(
                        "only_one_active = {} ({})",
                        config.only_one_active.value,
                        config.only_one_active.source.as_str()
                    );
                    println!(
                        "data_file = {} ({})",
                        config.data_file.value.display(),
                        config.data_file.source.as_str()
                    );
                }
            }
            ConfigCommand::Set {
                only_one_active,
                data_file,
            } => {
                if only_one_active.is_none() && data_file.is_none() {
                    anyhow::bail!("nothing to set: pass --only-one-active or --data-file");
                }
                let path = update_project_config(&ctx.root, only_one_active, data_file)
                    .with_context(|| format!("update config in {}", ctx.root.display()))?;
                println!("Updated {}", path.display());
            }
        },
        Some(Command::Version) => {
            println!("tasktrack {}", tasktrack_core::version());
        }
        None => {
            Cli::command().print_help()?;
            println!();
        }
    }
    Ok(())
}
