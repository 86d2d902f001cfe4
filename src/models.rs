use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::generate_id;

/// Task priority, A being the most urgent.
///
/// Stored values go through [`Priority::normalize`], so a lowercase or
/// unknown letter loads as a valid priority instead of failing the whole
/// collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(from = "serde_json::Value")]
pub enum Priority {
    A,
    B,
    #[default]
    C,
    D,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::A, Priority::B, Priority::C, Priority::D];

    /// Parse a priority letter, case-insensitive
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Priority::A),
            "B" => Some(Priority::B),
            "C" => Some(Priority::C),
            "D" => Some(Priority::D),
            _ => None,
        }
    }

    /// Unknown letters fall back to the default priority instead of being rejected
    pub fn normalize(input: Option<&str>) -> Self {
        input.and_then(Self::parse).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::A => "A",
            Priority::B => "B",
            Priority::C => "C",
            Priority::D => "D",
        }
    }
}

impl From<serde_json::Value> for Priority {
    fn from(raw: serde_json::Value) -> Self {
        Self::normalize(raw.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub done: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(title: String) -> Self {
        Self {
            id: generate_id(),
            title,
            description: None,
            priority: Priority::default(),
            project_id: None,
            done: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Flip the done flag, stamping or clearing `completed_at` to match
    pub fn set_done(&mut self, done: bool) {
        if done && !self.done {
            self.completed_at = Some(Utc::now());
        } else if !done {
            self.completed_at = None;
        }
        self.done = done;
    }
}

/// Raw user input for a new task, before normalization
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub project_id: Option<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update for an existing task. `None` leaves a field untouched;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<String>,
    pub project_id: Option<Option<String>>,
    pub done: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    Paused,
}

impl ProjectStatus {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "active" => Some(ProjectStatus::Active),
            "completed" => Some(ProjectStatus::Completed),
            "paused" => Some(ProjectStatus::Paused),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Paused => "paused",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(name: String) -> Self {
        Self {
            id: generate_id(),
            name,
            status: ProjectStatus::default(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Pomodoro durations in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSettings {
    pub focus_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
        }
    }
}

/// One day's snapshot of the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLog {
    pub date: NaiveDate, // YYYY-MM-DD
    pub total_tasks: u32,
    pub completed_tasks: u32,
}

impl DailyLog {
    /// Completion percentage for the day, 0 when nothing was planned
    pub fn productivity(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.completed_tasks as f64 / self.total_tasks as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub completion_rate: u32,
    pub days_logged: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_normalize_falls_back_to_c() {
        assert_eq!(Priority::normalize(Some("a")), Priority::A);
        assert_eq!(Priority::normalize(Some(" d ")), Priority::D);
        assert_eq!(Priority::normalize(Some("Z")), Priority::C);
        assert_eq!(Priority::normalize(None), Priority::C);
    }

    #[test]
    fn test_set_done_stamps_and_clears_completed_at() {
        let mut task = Task::new("Buy milk".to_string());
        assert!(task.completed_at.is_none());

        task.set_done(true);
        assert!(task.done);
        assert!(task.completed_at.is_some());

        task.set_done(false);
        assert!(!task.done);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_task_json_uses_camel_case_fields() {
        let mut task = Task::new("Write report".to_string());
        task.project_id = Some("p-1".to_string());
        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["projectId"], "p-1");
        assert_eq!(json["priority"], "C");
        assert_eq!(json["done"], false);
        assert!(json.get("createdAt").is_some());
        assert!(json["completedAt"].is_null());

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_stored_priorities_are_normalized_on_load() {
        let json = r#"[
            {"id": "1", "title": "Lower", "priority": "a", "createdAt": "2024-01-01T09:00:00Z"},
            {"id": "2", "title": "Unknown", "priority": "Z", "createdAt": "2024-01-01T09:00:00Z"},
            {"id": "3", "title": "Null", "priority": null, "createdAt": "2024-01-01T09:00:00Z"},
            {"id": "4", "title": "Number", "priority": 2, "createdAt": "2024-01-01T09:00:00Z"},
            {"id": "5", "title": "Missing", "createdAt": "2024-01-01T09:00:00Z"}
        ]"#;
        let tasks: Vec<Task> = serde_json::from_str(json).unwrap();
        let priorities: Vec<Priority> = tasks.iter().map(|t| t.priority).collect();
        assert_eq!(
            priorities,
            [Priority::A, Priority::C, Priority::C, Priority::C, Priority::C]
        );
    }

    #[test]
    fn test_daily_log_productivity() {
        let log = DailyLog {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            total_tasks: 4,
            completed_tasks: 1,
        };
        assert_eq!(log.productivity(), 25.0);

        let empty = DailyLog { total_tasks: 0, completed_tasks: 0, ..log };
        assert_eq!(empty.productivity(), 0.0);
    }
}
