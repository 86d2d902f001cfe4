use serde_json::json;
use std::rc::Rc;
use tracing::info;

use super::{ProviderContext, normalize_optional};
use crate::autosave::{AutosaveController, SaveStatus};
use crate::events::{self, EventBus};
use crate::models::{NewTask, Priority, Task, TaskCounts, TaskPatch};
use crate::storage::keys;
use crate::validation::{ValidationErrors, validate_task};

/// Tasks on the daily board that are not done yet
pub const DEFAULT_MAX_ACTIVE_TASKS: usize = 8;

pub struct TaskProvider {
    tasks: Vec<Task>,
    autosave: AutosaveController<Vec<Task>>,
    bus: Rc<EventBus>,
    max_active: usize,
}

impl TaskProvider {
    pub fn new(ctx: &ProviderContext, max_active: usize) -> Self {
        let (tasks, autosave) = ctx.load(keys::TASKS, Vec::new());
        Self {
            tasks,
            autosave,
            bus: ctx.bus.clone(),
            max_active,
        }
    }

    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn tasks_in_project(&self, project_id: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.project_id.as_deref() == Some(project_id))
            .collect()
    }

    pub fn counts(&self) -> TaskCounts {
        let completed = self.tasks.iter().filter(|t| t.done).count();
        TaskCounts {
            total: self.tasks.len(),
            completed,
            pending: self.tasks.len() - completed,
        }
    }

    pub fn save_status(&self) -> &SaveStatus {
        self.autosave.status()
    }

    pub fn autosave_mut(&mut self) -> &mut AutosaveController<Vec<Task>> {
        &mut self.autosave
    }

    pub fn add(&mut self, input: NewTask) -> Result<Task, ValidationErrors> {
        let mut task = Task::new(input.title.trim().to_string());
        task.description = normalize_optional(input.description);
        task.priority = Priority::normalize(input.priority.as_deref());
        task.project_id = normalize_optional(input.project_id);

        ValidationErrors::into_result(validate_task(&task))?;
        self.ensure_room()?;

        self.tasks.push(task.clone());
        self.persist();
        info!(task_id = %task.id, "Task added");
        self.bus.emit_with(events::TASK_ADDED, &json!({ "task": task }));
        Ok(task)
    }

    pub fn update(&mut self, id: &str, patch: TaskPatch) -> Result<Task, ValidationErrors> {
        let index = self.index_of(id)?;
        let original = &self.tasks[index];
        let mut task = original.clone();

        if let Some(title) = patch.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            task.description = normalize_optional(description);
        }
        if let Some(priority) = patch.priority {
            task.priority = Priority::normalize(Some(&priority));
        }
        if let Some(project_id) = patch.project_id {
            task.project_id = normalize_optional(project_id);
        }
        if let Some(done) = patch.done {
            task.set_done(done);
        }

        ValidationErrors::into_result(validate_task(&task))?;
        let reopened = original.done && !task.done;
        if reopened {
            self.ensure_room()?;
        }

        let toggled = original.done != task.done;
        self.tasks[index] = task.clone();
        self.persist();
        self.bus.emit_with(events::TASK_UPDATED, &json!({ "task": task }));
        if toggled {
            self.bus.emit_with(events::TASK_TOGGLED, &json!({ "task": task }));
        }
        Ok(task)
    }

    pub fn toggle(&mut self, id: &str) -> Result<Task, ValidationErrors> {
        let done = self.tasks[self.index_of(id)?].done;
        self.update(
            id,
            TaskPatch {
                done: Some(!done),
                ..TaskPatch::default()
            },
        )
    }

    pub fn remove(&mut self, id: &str) -> Result<Task, ValidationErrors> {
        let index = self.index_of(id)?;
        let task = self.tasks.remove(index);
        self.persist();
        info!(task_id = %task.id, "Task removed");
        self.bus.emit_with(events::TASK_REMOVED, &json!({ "taskId": task.id }));
        Ok(task)
    }

    /// Drop every completed task; returns how many were removed
    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.done);
        let removed = before - self.tasks.len();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    /// Clear `project_id` on every task pointing at `project_id`
    pub fn detach_project(&mut self, project_id: &str) -> usize {
        let mut detached = 0;
        for task in self
            .tasks
            .iter_mut()
            .filter(|t| t.project_id.as_deref() == Some(project_id))
        {
            task.project_id = None;
            detached += 1;
        }
        if detached > 0 {
            self.persist();
        }
        detached
    }

    /// Adopt a collection saved by another session, without saving it again
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Drive the autosave debounce and retry timers
    pub fn poll(&mut self) {
        self.autosave.poll();
    }

    /// Pick up a collection another session saved; true when it changed
    pub fn sync(&mut self) -> bool {
        match self.autosave.poll_external() {
            Some(tasks) => {
                self.replace_all(tasks);
                true
            }
            None => false,
        }
    }

    pub fn flush(&mut self) {
        self.autosave.flush();
    }

    fn persist(&mut self) {
        self.autosave.schedule(&self.tasks);
    }

    fn index_of(&self, id: &str) -> Result<usize, ValidationErrors> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ValidationErrors::single(format!("Task not found: {}", id)))
    }

    fn ensure_room(&self) -> Result<(), ValidationErrors> {
        let active = self.tasks.iter().filter(|t| !t.done).count();
        if active >= self.max_active {
            return Err(ValidationErrors::single(format!(
                "Daily board is full ({} active tasks)",
                self.max_active
            )));
        }
        Ok(())
    }
}
