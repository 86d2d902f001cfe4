use ratatui::widgets::ListState;
use std::time::Instant;

use crate::autosave::SaveStatus;
use crate::models::{NewTask, Priority, TaskPatch};
use crate::pomodoro::Phase;
use crate::session::{PollOutcome, Session};
use crate::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// Typing a new task title at the bottom of the board
    Input,
}

#[derive(Debug, Default)]
pub struct StatusMessage {
    pub message: Option<String>,
    pub message_time: Option<Instant>,
}

pub struct App {
    pub config: Config,
    pub session: Session,
    pub mode: Mode,
    pub input: String,
    pub list_state: ListState,
    pub status: StatusMessage,
}

impl App {
    pub fn new(config: Config, session: Session) -> Self {
        let mut app = Self {
            config,
            session,
            mode: Mode::Normal,
            input: String::new(),
            list_state: ListState::default(),
            status: StatusMessage::default(),
        };
        app.adjust_selected_index();
        app
    }

    pub fn set_status_message(&mut self, message: String) {
        self.status.message = Some(message);
        self.status.message_time = Some(Instant::now());
    }

    pub fn clear_status_message(&mut self) {
        self.status.message = None;
        self.status.message_time = None;
    }

    /// Check if status message should be auto-cleared (after 3 seconds)
    pub fn check_status_message_timeout(&mut self) {
        const STATUS_MESSAGE_TIMEOUT_SECS: u64 = 3;
        if let Some(time) = self.status.message_time {
            if time.elapsed().as_secs() >= STATUS_MESSAGE_TIMEOUT_SECS {
                self.clear_status_message();
            }
        }
    }

    /// Per-frame work: autosave, sync, the pomodoro countdown and the day boundary
    pub fn on_tick(&mut self) {
        let PollOutcome {
            synced,
            finished_phase,
            logged_day,
        } = self.session.poll();

        if synced {
            self.adjust_selected_index();
        }
        if let Some(phase) = finished_phase {
            let next = match phase {
                Phase::Focus => "time for a break",
                Phase::ShortBreak | Phase::LongBreak => "back to focus",
            };
            self.set_status_message(format!("{} finished, {}", phase.label(), next));
        }
        if let Some(log) = logged_day {
            self.adjust_selected_index();
            self.set_status_message(format!(
                "New day: logged {} ({}/{} done)",
                log.date, log.completed_tasks, log.total_tasks
            ));
        }
        for failure in self.session.take_failures() {
            self.set_status_message(format!(
                "Could not save {} after {} attempts: {}",
                failure.key, failure.attempts, failure.error
            ));
        }
    }

    pub fn save_indicator(&self) -> SaveStatus {
        self.session.save_status()
    }

    pub fn selected_task_id(&self) -> Option<String> {
        let index = self.list_state.selected()?;
        self.session.tasks.list().get(index).map(|t| t.id.clone())
    }

    pub fn select_next(&mut self) {
        let len = self.session.tasks.list().len();
        if len == 0 {
            return;
        }
        let next = match self.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.list_state.select(Some(next));
    }

    pub fn select_previous(&mut self) {
        let previous = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        if !self.session.tasks.list().is_empty() {
            self.list_state.select(Some(previous));
        }
    }

    /// Keep the selection inside the list after it shrinks or grows
    pub fn adjust_selected_index(&mut self) {
        let len = self.session.tasks.list().len();
        if len == 0 {
            self.list_state.select(None);
        } else {
            let index = self.list_state.selected().unwrap_or(0).min(len - 1);
            self.list_state.select(Some(index));
        }
    }

    pub fn enter_input_mode(&mut self) {
        self.mode = Mode::Input;
        self.input.clear();
    }

    pub fn cancel_input(&mut self) {
        self.mode = Mode::Normal;
        self.input.clear();
    }

    /// Add the typed title as a task. Invalid input keeps the line open.
    pub fn submit_input(&mut self) {
        match self.session.tasks.add(NewTask::titled(self.input.clone())) {
            Ok(task) => {
                self.mode = Mode::Normal;
                self.input.clear();
                let index = self.session.tasks.list().len() - 1;
                self.list_state.select(Some(index));
                self.set_status_message(format!("Added '{}'", task.title));
            }
            Err(errors) => self.set_status_message(errors.to_string()),
        }
    }

    pub fn toggle_selected(&mut self) {
        let Some(id) = self.selected_task_id() else {
            return;
        };
        match self.session.tasks.toggle(&id) {
            Ok(task) if task.done => self.set_status_message(format!("Done: {}", task.title)),
            Ok(_) => {}
            Err(errors) => self.set_status_message(errors.to_string()),
        }
    }

    pub fn delete_selected(&mut self) {
        let Some(id) = self.selected_task_id() else {
            return;
        };
        match self.session.tasks.remove(&id) {
            Ok(task) => {
                self.adjust_selected_index();
                self.set_status_message(format!("Deleted '{}'", task.title));
            }
            Err(errors) => self.set_status_message(errors.to_string()),
        }
    }

    /// A -> B -> C -> D -> A
    pub fn cycle_priority_selected(&mut self) {
        let Some(id) = self.selected_task_id() else {
            return;
        };
        let Some(current) = self.session.tasks.get(&id).map(|t| t.priority) else {
            return;
        };
        let position = Priority::ALL.iter().position(|p| *p == current).unwrap_or(0);
        let next = Priority::ALL[(position + 1) % Priority::ALL.len()];
        let patch = TaskPatch {
            priority: Some(next.as_str().to_string()),
            ..TaskPatch::default()
        };
        if let Err(errors) = self.session.tasks.update(&id, patch) {
            self.set_status_message(errors.to_string());
        }
    }

    pub fn clear_completed(&mut self) {
        let removed = self.session.tasks.clear_completed();
        self.adjust_selected_index();
        self.set_status_message(format!("Cleared {} completed task(s)", removed));
    }

    pub fn toggle_pomodoro(&mut self) {
        let timer = &mut self.session.pomodoro;
        if timer.is_running() {
            timer.pause();
        } else {
            timer.start();
        }
    }

    pub fn reset_pomodoro(&mut self) {
        self.session.pomodoro.reset();
    }

    pub fn toggle_adhd_mode(&mut self) {
        let enabled = !self.session.gamification.state().enabled;
        self.session.gamification.set_enabled(enabled);
        let state = if enabled { "on" } else { "off" };
        self.set_status_message(format!("ADHD mode {}", state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tasks::DEFAULT_MAX_ACTIVE_TASKS;
    use crate::providers::test_support::{TestContext, context};
    use std::time::Duration;

    fn app(t: &TestContext) -> App {
        let session = Session::with_context(t.ctx.clone(), DEFAULT_MAX_ACTIVE_TASKS, Duration::ZERO);
        App::new(Config::default(), session)
    }

    fn add(app: &mut App, title: &str) {
        app.enter_input_mode();
        app.input.push_str(title);
        app.submit_input();
    }

    #[test]
    fn test_inline_entry_adds_and_selects_task() {
        let t = context();
        let mut app = app(&t);
        add(&mut app, "Write report");
        add(&mut app, "Call bank");

        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.list_state.selected(), Some(1));
        assert_eq!(app.session.tasks.list().len(), 2);
        assert_eq!(app.save_indicator(), SaveStatus::Pending);
    }

    #[test]
    fn test_blank_entry_stays_in_input_mode() {
        let t = context();
        let mut app = app(&t);
        add(&mut app, "   ");
        assert_eq!(app.mode, Mode::Input);
        assert!(app.session.tasks.list().is_empty());
        assert!(app.status.message.is_some());
    }

    #[test]
    fn test_toggle_cycle_and_delete_selected() {
        let t = context();
        let mut app = app(&t);
        add(&mut app, "One");
        add(&mut app, "Two");
        app.select_previous();

        app.toggle_selected();
        assert!(app.session.tasks.list()[0].done);

        app.cycle_priority_selected();
        assert_eq!(app.session.tasks.list()[0].priority, Priority::D);

        app.select_next();
        app.delete_selected();
        assert_eq!(app.session.tasks.list().len(), 1);
        assert_eq!(app.list_state.selected(), Some(0));
    }

    #[test]
    fn test_tick_saves_after_debounce() {
        let t = context();
        let mut app = app(&t);
        add(&mut app, "Persist me");

        t.clock.advance_millis(1000);
        app.on_tick();
        assert_eq!(app.save_indicator(), SaveStatus::Saved);
    }
}
