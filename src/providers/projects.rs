use chrono::Utc;
use serde_json::json;
use std::rc::Rc;
use tracing::info;

use super::{ProviderContext, TaskProvider};
use crate::autosave::{AutosaveController, SaveStatus};
use crate::events::{self, EventBus};
use crate::models::{Project, ProjectStatus, Task};
use crate::storage::keys;
use crate::validation::{ValidationErrors, validate_project};

pub struct ProjectProvider {
    projects: Vec<Project>,
    autosave: AutosaveController<Vec<Project>>,
    bus: Rc<EventBus>,
}

impl ProjectProvider {
    pub fn new(ctx: &ProviderContext) -> Self {
        let (projects, autosave) = ctx.load(keys::PROJECTS, Vec::new());
        Self {
            projects,
            autosave,
            bus: ctx.bus.clone(),
        }
    }

    pub fn list(&self) -> &[Project] {
        &self.projects
    }

    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Tasks that belong to project `id`
    pub fn tasks_for<'a>(&self, id: &str, tasks: &'a TaskProvider) -> Vec<&'a Task> {
        tasks.tasks_in_project(id)
    }

    pub fn save_status(&self) -> &SaveStatus {
        self.autosave.status()
    }

    pub fn autosave_mut(&mut self) -> &mut AutosaveController<Vec<Project>> {
        &mut self.autosave
    }

    pub fn add(&mut self, name: &str) -> Result<Project, ValidationErrors> {
        let project = Project::new(name.trim().to_string());
        ValidationErrors::into_result(validate_project(&project))?;

        self.projects.push(project.clone());
        self.persist();
        info!(project_id = %project.id, "Project added");
        self.bus.emit_with(events::PROJECT_ADDED, &json!({ "project": project }));
        Ok(project)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<Project, ValidationErrors> {
        let index = self.index_of(id)?;
        let mut project = self.projects[index].clone();
        project.name = name.trim().to_string();
        ValidationErrors::into_result(validate_project(&project))?;

        self.projects[index] = project.clone();
        self.persist();
        self.bus.emit_with(events::PROJECT_UPDATED, &json!({ "project": project }));
        Ok(project)
    }

    /// Move a project between active, paused and completed.
    ///
    /// Entering `completed` stamps `completed_at` and emits
    /// `project:completed`; leaving it clears the stamp.
    pub fn set_status(&mut self, id: &str, status: ProjectStatus) -> Result<Project, ValidationErrors> {
        let index = self.index_of(id)?;
        let previous = self.projects[index].status;
        if previous == status {
            return Ok(self.projects[index].clone());
        }

        let project = &mut self.projects[index];
        project.status = status;
        project.completed_at = match status {
            ProjectStatus::Completed => Some(Utc::now()),
            _ => None,
        };
        let project = project.clone();

        self.persist();
        self.bus.emit_with(events::PROJECT_UPDATED, &json!({ "project": project }));
        if status == ProjectStatus::Completed {
            info!(project_id = %project.id, "Project completed");
            self.bus
                .emit_with(events::PROJECT_COMPLETED, &json!({ "projectId": project.id }));
        }
        Ok(project)
    }

    /// Delete a project. Tasks that referenced it lose their `project_id`.
    pub fn remove(&mut self, id: &str, tasks: &mut TaskProvider) -> Result<Project, ValidationErrors> {
        let index = self.index_of(id)?;
        let project = self.projects.remove(index);
        let detached = tasks.detach_project(&project.id);

        self.persist();
        info!(project_id = %project.id, detached, "Project removed");
        self.bus.emit_with(
            events::PROJECT_REMOVED,
            &json!({ "projectId": project.id, "detachedTasks": detached }),
        );
        Ok(project)
    }

    pub fn poll(&mut self) {
        self.autosave.poll();
    }

    pub fn sync(&mut self) -> bool {
        match self.autosave.poll_external() {
            Some(projects) => {
                self.projects = projects;
                true
            }
            None => false,
        }
    }

    pub fn flush(&mut self) {
        self.autosave.flush();
    }

    fn persist(&mut self) {
        self.autosave.schedule(&self.projects);
    }

    fn index_of(&self, id: &str) -> Result<usize, ValidationErrors> {
        self.projects
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| ValidationErrors::single(format!("Project not found: {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, handler};
    use crate::models::NewTask;
    use crate::providers::tasks::DEFAULT_MAX_ACTIVE_TASKS;
    use crate::providers::test_support::context;
    use std::cell::RefCell;

    #[test]
    fn test_add_and_rename_validate_name() {
        let t = context();
        let mut projects = ProjectProvider::new(&t.ctx);

        let project = projects.add(" Garden ").unwrap();
        assert_eq!(project.name, "Garden");
        assert_eq!(project.status, ProjectStatus::Active);
        assert!(projects.add("").is_err());
        assert!(projects.rename(&project.id, "   ").is_err());
        assert_eq!(projects.rename(&project.id, "Balcony").unwrap().name, "Balcony");
        assert_eq!(projects.list().len(), 1);
    }

    #[test]
    fn test_completing_emits_event_once_and_stamps_time() {
        let t = context();
        let completed = Rc::new(RefCell::new(Vec::new()));
        let sink = completed.clone();
        t.ctx.bus.on(
            events::PROJECT_COMPLETED,
            handler(move |event: &Event| {
                sink.borrow_mut().push(event.payload["projectId"].as_str().map(String::from));
                Ok(())
            }),
        );
        let mut projects = ProjectProvider::new(&t.ctx);
        let project = projects.add("Website").unwrap();

        let done = projects.set_status(&project.id, ProjectStatus::Completed).unwrap();
        assert!(done.completed_at.is_some());
        projects.set_status(&project.id, ProjectStatus::Completed).unwrap();

        let paused = projects.set_status(&project.id, ProjectStatus::Paused).unwrap();
        assert!(paused.completed_at.is_none());

        assert_eq!(*completed.borrow(), vec![Some(project.id.clone())]);
    }

    #[test]
    fn test_remove_cascade_nulls_task_references() {
        let t = context();
        let mut projects = ProjectProvider::new(&t.ctx);
        let mut tasks = TaskProvider::new(&t.ctx, DEFAULT_MAX_ACTIVE_TASKS);
        let project = projects.add("Move house").unwrap();
        let mut input = NewTask::titled("Book van");
        input.project_id = Some(project.id.clone());
        let task = tasks.add(input).unwrap();
        assert_eq!(projects.tasks_for(&project.id, &tasks).len(), 1);

        projects.remove(&project.id, &mut tasks).unwrap();

        assert!(projects.list().is_empty());
        assert!(tasks.get(&task.id).unwrap().project_id.is_none());
        assert!(projects.remove(&project.id, &mut tasks).is_err());
    }
}
