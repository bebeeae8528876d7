use std::fs::{self, File};

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, bail};
use log::info;

use crate::config::Configuration;
use crate::content_parser::{parse_date_input, parse_quick_line, parse_time_input};
use crate::store::TaskStore;
use crate::tasklet::{CategoryId, NewCategory, Priority, Task, TaskFilter, TaskId, normalize_title};
use crate::theme::Theme;

mod config;
mod content_parser;
mod database;
mod list_ui;
mod store;
mod tasklet;
mod theme;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cmd {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task: `[YYYY-MM-DD HH:MM] title #tag !priority`
    Add {
        #[arg(required = true, num_args = 1.., value_name = "LINE")]
        line: Vec<String>,
    },
    /// List tasks
    List {
        #[arg(short, long, value_enum, default_value_t = TaskFilter::All)]
        filter: TaskFilter,
        #[arg(short, long, value_name = "CATEGORY_ID")]
        category: Option<CategoryId>,
    },
    /// Mark a task completed
    Done { id: TaskId },
    /// Mark a task pending again
    Undo { id: TaskId },
    Delete { id: TaskId },
    Rename {
        id: TaskId,
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },
    /// Show total, completed and pending counts
    Summary {},
    /// Show completed tasks per day
    Stats {
        #[arg(long, value_enum, default_value_t = StatsBy::Created)]
        by: StatsBy,
    },
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
    Tag {
        #[command(subcommand)]
        command: TagCommand,
    },
    Deadline {
        #[command(subcommand)]
        command: DeadlineCommand,
    },
    /// Set a task's priority, or clear it when no level is given
    Priority {
        id: TaskId,
        #[arg(value_enum)]
        level: Option<Priority>,
    },
    Theme {
        #[command(subcommand)]
        command: ThemeCommand,
    },
    /// Poll for upcoming deadlines and print reminders
    Remind {
        #[arg(long)]
        once: bool,
    },
    /// Open the interactive task list
    Ui {},
}

#[derive(Clone, Copy, ValueEnum)]
enum StatsBy {
    Created,
    Completed,
}

impl std::fmt::Display for StatsBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsBy::Created => f.write_str("created"),
            StatsBy::Completed => f.write_str("completed"),
        }
    }
}

#[derive(Subcommand)]
enum CategoryCommand {
    List {},
    /// Task counts per category
    Stats {},
    Add {
        name: String,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long, value_name = "#RRGGBB")]
        color: Option<String>,
    },
    Edit {
        id: CategoryId,
        name: String,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long, value_name = "#RRGGBB")]
        color: Option<String>,
    },
    /// Delete a category; its tasks become uncategorized
    Delete { id: CategoryId },
    /// Put a task in a category, or take it out when no category is given
    Assign {
        task_id: TaskId,
        category_id: Option<CategoryId>,
    },
}

#[derive(Subcommand)]
enum TagCommand {
    /// Replace a task's tags with a comma-separated list
    Set { id: TaskId, tags: String },
    List {},
    Search { tag: String },
}

#[derive(Subcommand)]
enum DeadlineCommand {
    Set {
        id: TaskId,
        #[arg(value_name = "YYYY-MM-DD")]
        date: String,
        #[arg(value_name = "HH:MM")]
        time: Option<String>,
    },
    Clear { id: TaskId },
    List {},
    Overdue {},
    Upcoming {
        #[arg(short, long)]
        days: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ThemeCommand {
    Show {},
    Toggle {},
}

fn describe(task: &Task) -> String {
    let mut line = format!(
        "{:>4} [{}] {}",
        task.id,
        if task.done { "x" } else { " " },
        task.title
    );
    if let Some(category) = &task.category {
        line.push_str(&format!("  ({category})"));
    }
    if let Some(deadline) = task.deadline {
        line.push_str(&format!("  due {deadline}"));
    }
    if let Some(priority) = task.priority {
        line.push_str(&format!("  !{priority}"));
    }
    for tag in &task.tags {
        line.push_str(&format!(" #{tag}"));
    }
    line
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
    }
    for task in tasks {
        println!("{}", describe(task));
    }
}

fn ensure(ok: bool, failure: &str) -> Result<()> {
    if !ok {
        bail!("{failure}");
    }
    Ok(())
}

fn init_logging(log_file: Option<File>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(file) = log_file {
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
}

async fn add(store: &TaskStore, line: &[String]) -> Result<()> {
    let quick = parse_quick_line(&line.join(" "))?;
    normalize_title(&quick.title)?;

    let Some(id) = store.add_quick_task(&quick).await else {
        bail!("Error adding task");
    };
    println!("Added task {id}.");
    Ok(())
}

fn print_stats(stats: &std::collections::BTreeMap<NaiveDate, i64>) {
    if stats.is_empty() {
        println!("No completed tasks yet.");
        return;
    }
    for (day, count) in stats {
        println!("{day}  {:<20} {count}", "#".repeat((*count).clamp(0, 20) as usize));
    }
    println!("Total completed: {}", stats.values().sum::<i64>());
}

async fn category(store: &TaskStore, command: CategoryCommand) -> Result<()> {
    match command {
        CategoryCommand::List {} => {
            for c in store.get_categories().await {
                println!("{:>4} {} [{}] {}", c.id, c.name, c.icon, c.color);
            }
        }
        CategoryCommand::Stats {} => {
            for s in store.get_category_stats().await {
                println!("{:>4} {} [{}] {}/{} completed", s.id, s.name, s.icon, s.completed, s.total);
            }
        }
        CategoryCommand::Add { name, icon, color } => {
            let category = NewCategory::new(&name, icon.as_deref(), color.as_deref())?;
            ensure(store.add_category(&category).await, "Error adding category")?;
        }
        CategoryCommand::Edit {
            id,
            name,
            icon,
            color,
        } => {
            let category = NewCategory::new(&name, icon.as_deref(), color.as_deref())?;
            ensure(
                store.update_category(id, &category).await,
                "Error updating category",
            )?;
        }
        CategoryCommand::Delete { id } => {
            ensure(store.delete_category(id).await, "Error deleting category")?;
        }
        CategoryCommand::Assign {
            task_id,
            category_id,
        } => {
            ensure(
                store.set_task_category(task_id, category_id).await,
                "Error setting task category",
            )?;
        }
    }
    Ok(())
}

async fn tag(store: &TaskStore, command: TagCommand) -> Result<()> {
    match command {
        TagCommand::Set { id, tags } => {
            ensure(store.set_task_tags(id, &tags).await, "Error adding tags")?;
        }
        TagCommand::List {} => {
            for tag in store.get_all_tags().await {
                println!("#{tag}");
            }
        }
        TagCommand::Search { tag } => print_tasks(&store.search_tasks_by_tag(&tag).await),
    }
    Ok(())
}

async fn deadline(store: &TaskStore, cfg: &Configuration, command: DeadlineCommand) -> Result<()> {
    match command {
        DeadlineCommand::Set { id, date, time } => {
            let date = parse_date_input(&date)?;
            let time = time.as_deref().map(parse_time_input).transpose()?;
            ensure(
                store.set_task_deadline(id, date, time).await,
                "Error setting deadline",
            )?;
        }
        DeadlineCommand::Clear { id } => {
            ensure(store.clear_task_deadline(id).await, "Error clearing deadline")?;
        }
        DeadlineCommand::List {} => print_tasks(&store.get_tasks_with_deadlines().await),
        DeadlineCommand::Overdue {} => {
            print_tasks(&store.get_overdue_tasks(Local::now().naive_local()).await)
        }
        DeadlineCommand::Upcoming { days } => {
            let days = days.unwrap_or(cfg.tasklet.upcoming_days);
            print_tasks(&store.get_upcoming_tasks(Local::now().date_naive(), days).await)
        }
    }
    Ok(())
}

async fn check_reminders(store: &TaskStore, window: chrono::Duration) {
    let due = store
        .get_due_reminders(Local::now().naive_local(), window)
        .await;
    for task in due {
        if let Some(deadline) = task.deadline {
            println!("Deadline reminder: {} (due {deadline})", task.title);
        }
        store.mark_reminded(task.id).await;
    }
}

async fn remind(store: &TaskStore, cfg: &Configuration, once: bool) -> Result<()> {
    let window = cfg.reminder_window()?;
    if once {
        check_reminders(store, window).await;
        return Ok(());
    }

    let period = cfg.reminder_interval();
    let mut interval = tokio::time::interval(period);
    info!("Checking reminders every {}s", period.as_secs());
    loop {
        tokio::select! {
            _ = interval.tick() => check_reminders(store, window).await,
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn dispatch(store: &TaskStore, cfg: &Configuration, commands: Commands) -> Result<()> {
    match commands {
        Commands::Add { line } => add(store, &line).await?,
        Commands::List { filter, category } => {
            print_tasks(&store.get_filtered_tasks(filter, category).await)
        }
        Commands::Done { id } => ensure(store.mark_done(id, true).await, "Error marking task")?,
        Commands::Undo { id } => ensure(store.mark_done(id, false).await, "Error marking task")?,
        Commands::Delete { id } => ensure(store.delete_task(id).await, "Error deleting task")?,
        Commands::Rename { id, title } => {
            let title = title.join(" ");
            normalize_title(&title)?;
            ensure(store.rename_task(id, &title).await, "Error renaming task")?;
        }
        Commands::Summary {} => {
            let summary = store.get_task_summary().await;
            println!(
                "Total: {}  Completed: {}  Pending: {}",
                summary.total, summary.completed, summary.pending
            );
        }
        Commands::Stats { by } => match by {
            StatsBy::Created => print_stats(&store.get_stats().await),
            StatsBy::Completed => print_stats(&store.get_completion_stats().await),
        },
        Commands::Category { command } => category(store, command).await?,
        Commands::Tag { command } => tag(store, command).await?,
        Commands::Deadline { command } => deadline(store, cfg, command).await?,
        Commands::Priority { id, level } => ensure(
            store.set_task_priority(id, level).await,
            "Error setting priority",
        )?,
        Commands::Theme { command } => {
            let path = cfg.theme_path();
            let theme = Theme::load(&path);
            match command {
                ThemeCommand::Show {} => println!("{}", theme.name()),
                ThemeCommand::Toggle {} => {
                    let theme = theme.toggled();
                    theme.save(&path)?;
                    println!("{}", theme.name());
                }
            }
        }
        Commands::Remind { once } => remind(store, cfg, once).await?,
        Commands::Ui {} => list_ui::run(store, Theme::load(&cfg.theme_path()), cfg.theme_path()).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cmds = Cmd::parse();

    let cfg = Configuration::new().wrap_err("Couldn't load configuration")?;
    let data_dir = cfg.data_dir();
    fs::create_dir_all(&data_dir)
        .wrap_err_with(|| format!("Couldn't create data directory {}", data_dir.display()))?;

    let log_file = match cmds.commands {
        Commands::Ui {} => Some(
            File::options()
                .create(true)
                .append(true)
                .open(cfg.log_path())?,
        ),
        _ => None,
    };
    init_logging(log_file);

    let store = TaskStore::open(&cfg.database_path())
        .await
        .wrap_err("Couldn't complete database setup")?;
    let res = dispatch(&store, &cfg, cmds.commands).await;
    store.close().await;
    res
}
