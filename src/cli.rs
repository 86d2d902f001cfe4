use chrono::Datelike;
use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::hours::{self, HoursError};
use crate::models::{NewTask, PomodoroSettings, Project, ProjectStatus, Task};
use crate::session::{Session, SessionError};
use crate::validation::ValidationErrors;

#[derive(Parser)]
#[command(name = "tj")]
#[command(about = "Tiempo Justo - a daily task board, pomodoro timer and productivity log")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/data)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch interactive TUI (default if no subcommand)
    Tui,
    /// Add a task to today's board
    AddTask {
        /// Task title
        title: String,
        /// Priority A-D (defaults to C)
        #[arg(short, long)]
        priority: Option<String>,
        /// Longer description
        #[arg(short, long)]
        description: Option<String>,
        /// Project id to file the task under
        #[arg(long)]
        project: Option<String>,
    },
    /// Mark a task done, or not done again
    ToggleTask {
        /// Task id
        id: String,
    },
    /// Delete a task
    RemoveTask {
        /// Task id
        id: String,
    },
    /// Show today's board
    ListTasks,
    /// Start a new project
    AddProject {
        /// Project name
        name: String,
    },
    /// Mark a project completed
    CompleteProject {
        /// Project id
        id: String,
    },
    /// Delete a project; its tasks stay on the board
    RemoveProject {
        /// Project id
        id: String,
    },
    /// List projects with their task counts
    ListProjects,
    /// Productivity summary for a month
    Stats {
        /// Month to summarize (YYYY-MM), defaults to the current one
        #[arg(long)]
        month: Option<String>,
    },
    /// Show or change pomodoro durations (minutes)
    Pomodoro {
        #[arg(long)]
        focus: Option<u32>,
        #[arg(long)]
        short_break: Option<u32>,
        #[arg(long)]
        long_break: Option<u32>,
    },
    /// Time between two HH:MM times
    Hours {
        /// Start time (HH:MM)
        start: String,
        /// End time (HH:MM)
        end: String,
        /// Target workday length; prints what is left of it at `end`
        #[arg(long)]
        target: Option<f64>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("Invalid month '{0}', expected YYYY-MM")]
    MonthParseError(String),
    #[error("{0}")]
    Hours(#[from] HoursError),
}

fn format_task(task: &Task) -> String {
    let mark = if task.done { "x" } else { " " };
    let mut line = format!("[{}] ({}) {}  {}", mark, task.priority, task.title, task.id);
    if let Some(project_id) = &task.project_id {
        line.push_str(&format!("  project:{}", project_id));
    }
    line
}

/// Handle the add-task command
pub fn handle_add_task(
    title: String,
    priority: Option<String>,
    description: Option<String>,
    project: Option<String>,
    session: &mut Session,
) -> Result<(), CliError> {
    if let Some(project_id) = project.as_deref() {
        if session.projects.get(project_id).is_none() {
            return Err(ValidationErrors::single(format!("Project not found: {}", project_id)).into());
        }
    }

    let task = session.tasks.add(NewTask {
        title,
        description,
        priority,
        project_id: project,
    })?;
    println!("Task created successfully (ID: {})", task.id);
    Ok(())
}

/// Handle the toggle-task command
pub fn handle_toggle_task(id: String, session: &mut Session) -> Result<(), CliError> {
    let task = session.tasks.toggle(&id)?;
    let state = if task.done { "done" } else { "not done" };
    println!("Task '{}' marked {}", task.title, state);
    Ok(())
}

/// Handle the remove-task command
pub fn handle_remove_task(id: String, session: &mut Session) -> Result<(), CliError> {
    let task = session.tasks.remove(&id)?;
    println!("Task '{}' removed", task.title);
    Ok(())
}

/// Handle the list-tasks command
pub fn handle_list_tasks(session: &Session) -> Result<(), CliError> {
    let tasks = session.tasks.list();
    if tasks.is_empty() {
        println!("No tasks on the board");
        return Ok(());
    }
    for task in tasks {
        println!("{}", format_task(task));
    }
    let counts = session.tasks.counts();
    println!("{} done, {} pending", counts.completed, counts.pending);
    Ok(())
}

/// Handle the add-project command
pub fn handle_add_project(name: String, session: &mut Session) -> Result<(), CliError> {
    let project = session.projects.add(&name)?;
    println!("Project created successfully (ID: {})", project.id);
    Ok(())
}

/// Handle the complete-project command
pub fn handle_complete_project(id: String, session: &mut Session) -> Result<(), CliError> {
    let project = session.projects.set_status(&id, ProjectStatus::Completed)?;
    println!("Project '{}' completed", project.name);
    Ok(())
}

/// Handle the remove-project command
pub fn handle_remove_project(id: String, session: &mut Session) -> Result<(), CliError> {
    let project = session.projects.remove(&id, &mut session.tasks)?;
    println!("Project '{}' removed", project.name);
    Ok(())
}

fn format_project(project: &Project, session: &Session) -> String {
    let tasks = session.projects.tasks_for(&project.id, &session.tasks);
    let done = tasks.iter().filter(|t| t.done).count();
    format!(
        "{}  [{}] {}/{} tasks  {}",
        project.name,
        project.status,
        done,
        tasks.len(),
        project.id
    )
}

/// Handle the list-projects command
pub fn handle_list_projects(session: &Session) -> Result<(), CliError> {
    let projects = session.projects.list();
    if projects.is_empty() {
        println!("No projects");
        return Ok(());
    }
    for project in projects {
        println!("{}", format_project(project, session));
    }
    Ok(())
}

/// Parse `YYYY-MM`
pub fn parse_month(input: &str) -> Result<(i32, u32), CliError> {
    let err = || CliError::MonthParseError(input.to_string());
    let (year, month) = input.trim().split_once('-').ok_or_else(err)?;
    let year: i32 = year.parse().map_err(|_| err())?;
    let month: u32 = month.parse().map_err(|_| err())?;
    if !(1..=12).contains(&month) {
        return Err(err());
    }
    Ok((year, month))
}

/// Handle the stats command
pub fn handle_stats(month: Option<String>, session: &Session) -> Result<(), CliError> {
    let (year, month) = match month {
        Some(month) => parse_month(&month)?,
        None => {
            let today = session.today();
            (today.year(), today.month())
        }
    };

    let summary = session.logbook.monthly_summary(year, month);
    println!("{:04}-{:02}", summary.year, summary.month);
    println!("  Days logged:     {}", summary.days_logged);
    println!("  Tasks:           {}/{}", summary.completed_tasks, summary.total_tasks);
    println!("  Completion rate: {}%", summary.completion_rate);

    let state = session.gamification.state();
    if state.enabled {
        println!(
            "  Points: {}  Streak: {} day(s)",
            state.points,
            state.current_streak(session.today())
        );
        if !state.badges.is_empty() {
            let badges: Vec<&str> = state.badges.iter().map(|b| b.label()).collect();
            println!("  Badges: {}", badges.join(", "));
        }
    }
    Ok(())
}

/// Handle the pomodoro command
pub fn handle_pomodoro(
    focus: Option<u32>,
    short_break: Option<u32>,
    long_break: Option<u32>,
    session: &mut Session,
) -> Result<(), CliError> {
    let current = session.settings.get();
    let settings = if focus.is_none() && short_break.is_none() && long_break.is_none() {
        current
    } else {
        session.update_settings(PomodoroSettings {
            focus_minutes: focus.unwrap_or(current.focus_minutes),
            short_break_minutes: short_break.unwrap_or(current.short_break_minutes),
            long_break_minutes: long_break.unwrap_or(current.long_break_minutes),
        })?
    };

    println!(
        "Focus {}m, short break {}m, long break {}m",
        settings.focus_minutes, settings.short_break_minutes, settings.long_break_minutes
    );
    Ok(())
}

/// Handle the hours command
pub fn handle_hours(start: String, end: String, target: Option<f64>) -> Result<(), CliError> {
    let start = hours::parse_hhmm(&start)?;
    let end = hours::parse_hhmm(&end)?;
    println!("{}", hours::format_span(hours::span_between(start, end)));
    if let Some(target) = target {
        let left = hours::remaining_in_workday(start, target, end)?;
        println!("{} left of a {}h day", hours::format_span(left), target);
    }
    Ok(())
}
