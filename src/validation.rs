//! Entity validators.
//!
//! Each validator is a pure function returning the list of problems found;
//! an empty list means the entity may be committed.

use std::fmt;

use crate::models::{PomodoroSettings, Project, Task};

pub const TASK_TITLE_MAX: usize = 200;
pub const TASK_DESCRIPTION_MAX: usize = 1000;
pub const PROJECT_NAME_MAX: usize = 100;
pub const POMODORO_MIN_MINUTES: u32 = 1;
pub const POMODORO_MAX_MINUTES: u32 = 120;

/// Rejected input, reported back to the caller instead of being persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<String>);

impl ValidationErrors {
    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![message.into()])
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// `Ok(())` for an empty list so validators compose with `?`
    pub fn into_result(errors: Vec<String>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self(errors))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub fn validate_task(task: &Task) -> Vec<String> {
    let mut errors = Vec::new();

    let title = task.title.trim();
    if title.is_empty() {
        errors.push("Task title must not be empty".to_string());
    } else if title.chars().count() > TASK_TITLE_MAX {
        errors.push(format!("Task title must be at most {} characters", TASK_TITLE_MAX));
    }

    if let Some(description) = &task.description {
        if description.chars().count() > TASK_DESCRIPTION_MAX {
            errors.push(format!(
                "Task description must be at most {} characters",
                TASK_DESCRIPTION_MAX
            ));
        }
    }

    errors
}

pub fn validate_project(project: &Project) -> Vec<String> {
    let mut errors = Vec::new();

    let name = project.name.trim();
    if name.is_empty() {
        errors.push("Project name must not be empty".to_string());
    } else if name.chars().count() > PROJECT_NAME_MAX {
        errors.push(format!("Project name must be at most {} characters", PROJECT_NAME_MAX));
    }

    errors
}

pub fn validate_pomodoro_settings(settings: &PomodoroSettings) -> Vec<String> {
    let range = POMODORO_MIN_MINUTES..=POMODORO_MAX_MINUTES;
    [
        ("Focus", settings.focus_minutes),
        ("Short break", settings.short_break_minutes),
        ("Long break", settings.long_break_minutes),
    ]
    .into_iter()
    .filter(|(_, minutes)| !range.contains(minutes))
    .map(|(label, minutes)| {
        format!(
            "{} duration must be between {} and {} minutes (got {})",
            label, POMODORO_MIN_MINUTES, POMODORO_MAX_MINUTES, minutes
        )
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn task_titled(title: &str) -> Task {
        Task::new(title.to_string())
    }

    #[test]
    fn test_valid_titles_and_priorities_pass() {
        for len in [1, 50, TASK_TITLE_MAX] {
            for priority in Priority::ALL {
                let mut task = task_titled(&"x".repeat(len));
                task.priority = priority;
                assert!(validate_task(&task).is_empty(), "len {} priority {}", len, priority);
            }
        }
    }

    #[test]
    fn test_blank_title_is_rejected() {
        for title in ["", "   ", "\t\n"] {
            assert!(!validate_task(&task_titled(title)).is_empty());
        }
    }

    #[test]
    fn test_long_title_and_description_are_rejected() {
        let mut task = task_titled(&"x".repeat(TASK_TITLE_MAX + 1));
        task.description = Some("y".repeat(TASK_DESCRIPTION_MAX + 1));
        assert_eq!(validate_task(&task).len(), 2);
    }

    #[test]
    fn test_project_name_rules() {
        assert!(validate_project(&Project::new("Garden".to_string())).is_empty());
        assert!(!validate_project(&Project::new("  ".to_string())).is_empty());
        assert!(!validate_project(&Project::new("p".repeat(PROJECT_NAME_MAX + 1))).is_empty());
    }

    #[test]
    fn test_pomodoro_bounds() {
        assert!(validate_pomodoro_settings(&PomodoroSettings::default()).is_empty());

        let settings = PomodoroSettings {
            focus_minutes: 0,
            short_break_minutes: 120,
            long_break_minutes: 121,
        };
        let errors = validate_pomodoro_settings(&settings);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("Focus"));
        assert!(errors[1].starts_with("Long break"));
    }
}
