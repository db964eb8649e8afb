//! Command-line driver for `taskdeck_core`.
//!
//! # Responsibility
//! - Map subcommands onto store operations and print the derived view.
//! - Keep output plain and line-oriented so it is easy to script against.

use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use log::warn;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use taskdeck_core::model::wire::{parse_due_date, parse_due_time};
use taskdeck_core::{
    init_logging, open_store, CoreConfig, FilterOption, GroupOption, Priority, SortDirection,
    SortOption, StorageBackend, Task, TaskForm, TaskId, TaskPatch, TaskStorage, TaskStore,
    ViewOptions,
};

const ID_PREFIX_LEN: usize = 8;

#[derive(Parser, Debug)]
#[command(name = "taskdeck", version, about = "Local task list manager")]
struct Cli {
    /// Directory holding the task document and logs.
    #[arg(long, env = "TASKDECK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Storage backend (json, sqlite).
    #[arg(long, env = "TASKDECK_BACKEND", default_value_t = StorageBackend::Json)]
    backend: StorageBackend,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "TASKDECK_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a task.
    Add {
        title: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Edit fields of a task.
    Edit {
        /// Task id or unique id prefix.
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: FieldArgs,
        /// Remove the due date (and time).
        #[arg(long, conflicts_with_all = ["due", "time"])]
        clear_due: bool,
    },
    /// Flip a task between open and done.
    Toggle { id: String },
    /// Delete a task.
    Rm { id: String },
    /// List tasks.
    Ls {
        #[arg(long, default_value_t = FilterOption::All)]
        filter: FilterOption,
        #[arg(long, default_value_t = SortOption::DueDate)]
        sort: SortOption,
        /// Sort descending.
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value_t = GroupOption::None)]
        group: GroupOption,
    },
    /// Print core health and version.
    Ping,
}

#[derive(Args, Debug, Default)]
struct FieldArgs {
    #[arg(short, long)]
    description: Option<String>,
    /// Due date, `YYYY-MM-DD`.
    #[arg(long, value_parser = parse_date_arg)]
    due: Option<NaiveDate>,
    /// Due time, `HH:MM`.
    #[arg(long, value_parser = parse_time_arg)]
    time: Option<NaiveTime>,
    /// low, medium or high.
    #[arg(short, long, value_parser = parse_priority_arg)]
    priority: Option<Priority>,
    /// Tag; repeat for several. On edit, replaces all tags.
    #[arg(short, long = "tag")]
    tags: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Command::Ping = cli.command {
        println!("taskdeck_core ping={}", taskdeck_core::ping());
        println!("taskdeck_core version={}", taskdeck_core::core_version());
        return Ok(());
    }

    let config = resolve_config(&cli)?;
    if let Err(err) = init_logging(&config.logging()) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let mut store = open_store(&config)?;
    execute(&mut store, cli.command)?;

    if store.is_dirty() {
        warn!("event=cli_exit module=cli status=dirty");
    }
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<CoreConfig, Box<dyn Error>> {
    let data_dir = match &cli.data_dir {
        Some(dir) => std::path::absolute(dir)?,
        None => dirs::data_dir()
            .ok_or("no platform data directory; pass --data-dir")?
            .join("taskdeck"),
    };

    let mut config = CoreConfig::new(data_dir).with_backend(cli.backend);
    if let Some(level) = &cli.log_level {
        config = config.with_log_level(level.clone());
    }
    Ok(config)
}

fn execute<S: TaskStorage>(store: &mut TaskStore<S>, command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Add { title, fields } => {
            let task = store.create(build_form(title, fields))?;
            println!("added {}", short_id(task.id));
        }
        Command::Edit {
            id,
            title,
            fields,
            clear_due,
        } => {
            let id = resolve_id(store.list(), &id)?;
            let patch = build_patch(title, fields, clear_due);
            if patch.is_empty() {
                return Err("nothing to change".into());
            }
            let task = store.update(id, patch)?;
            println!("updated {}", short_id(task.id));
        }
        Command::Toggle { id } => {
            let id = resolve_id(store.list(), &id)?;
            let task = store.toggle_complete(id)?;
            let state = if task.completed { "done" } else { "open" };
            println!("{} is {state}", short_id(task.id));
        }
        Command::Rm { id } => {
            let id = resolve_id(store.list(), &id)?;
            store.delete(id)?;
            println!("removed {}", short_id(id));
        }
        Command::Ls {
            filter,
            sort,
            desc,
            group,
        } => {
            let options = ViewOptions {
                filter,
                sort,
                direction: if desc {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                },
                group,
            };
            print_view(store, &options);
        }
        Command::Ping => {}
    }
    Ok(())
}

fn build_form(title: String, fields: FieldArgs) -> TaskForm {
    TaskForm {
        title,
        description: fields.description.unwrap_or_default(),
        due_date: fields.due,
        time: fields.time,
        priority: fields.priority.unwrap_or_default(),
        tags: fields.tags,
    }
}

fn build_patch(title: Option<String>, fields: FieldArgs, clear_due: bool) -> TaskPatch {
    TaskPatch {
        title,
        description: fields.description,
        due_date: if clear_due {
            Some(None)
        } else {
            fields.due.map(Some)
        },
        time: if clear_due {
            Some(None)
        } else {
            fields.time.map(Some)
        },
        priority: fields.priority,
        tags: (!fields.tags.is_empty()).then_some(fields.tags),
        completed: None,
    }
}

fn print_view<S: TaskStorage>(store: &TaskStore<S>, options: &ViewOptions) {
    let view = store.view(options);
    for group in &view.groups {
        if !group.label().is_empty() {
            println!("== {} ==", group.label());
        }
        for task in &group.tasks {
            println!("{}", render_line(task));
        }
    }
    let count = view.len();
    println!("{count} {}", if count == 1 { "task" } else { "tasks" });
}

fn render_line(task: &Task) -> String {
    let mut line = format!(
        "[{}] {} {}",
        if task.completed { "x" } else { " " },
        short_id(task.id),
        task.title
    );
    if let Some(due) = task.due_date {
        line.push_str(&format!(" (due {due}"));
        if let Some(time) = task.time {
            line.push_str(&format!(" {}", time.format("%H:%M")));
        }
        line.push(')');
    }
    if let Some(priority) = task.priority {
        line.push_str(&format!(" !{priority}"));
    }
    for tag in task.tags.iter() {
        line.push_str(&format!(" #{tag}"));
    }
    line
}

fn short_id(id: TaskId) -> String {
    id.to_string().chars().take(ID_PREFIX_LEN).collect()
}

/// Resolves a full id or a unique prefix of one.
fn resolve_id(tasks: &[Task], input: &str) -> Result<TaskId, String> {
    let needle = input.trim().to_ascii_lowercase();
    if let Ok(id) = needle.parse::<TaskId>() {
        return Ok(id);
    }
    if needle.is_empty() {
        return Err("task id must not be empty".to_string());
    }

    let mut matches = tasks
        .iter()
        .filter(|task| task.id.to_string().starts_with(&needle));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task.id),
        (None, _) => Err(format!("no task matches id `{input}`")),
        (Some(_), Some(_)) => Err(format!("id prefix `{input}` is ambiguous")),
    }
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_due_date(value).ok_or_else(|| format!("`{value}` is not a YYYY-MM-DD date"))
}

fn parse_time_arg(value: &str) -> Result<NaiveTime, String> {
    parse_due_time(value).ok_or_else(|| format!("`{value}` is not a HH:MM time"))
}

fn parse_priority_arg(value: &str) -> Result<Priority, String> {
    Priority::parse(value).ok_or_else(|| format!("`{value}` is not one of low|medium|high"))
}
