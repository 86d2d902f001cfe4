//! One running instance of the app: the store, the bus and every provider
//! built on top of them.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::autosave::{SaveFailure, SaveStatus};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, StorageBackend};
use crate::events::EventBus;
use crate::gamification::Gamification;
use crate::logbook::LogBook;
use crate::models::{DailyLog, PomodoroSettings};
use crate::pomodoro::{Phase, PomodoroTimer};
use crate::providers::{ProjectProvider, ProviderContext, SettingsProvider, TaskProvider};
use crate::storage::{FileMedium, KeyedStore, MediumError, SqliteMedium};
use crate::utils;
use crate::validation::ValidationErrors;

pub const DATABASE_FILE_NAME: &str = "tiempo-justo.db";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Medium(#[from] MediumError),
    #[error("Data path contains invalid UTF-8: {0}")]
    InvalidPath(String),
}

/// What happened during one [`Session::poll`]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PollOutcome {
    /// Another session's changes were adopted
    pub synced: bool,
    pub finished_phase: Option<Phase>,
    pub logged_day: Option<DailyLog>,
}

pub struct Session {
    ctx: ProviderContext,
    pub tasks: TaskProvider,
    pub projects: ProjectProvider,
    pub settings: SettingsProvider,
    pub pomodoro: PomodoroTimer,
    pub logbook: LogBook,
    pub gamification: Gamification,
    sync_interval: Duration,
    last_sync: Option<Instant>,
    failures: Rc<RefCell<Vec<SaveFailure>>>,
}

impl Session {
    /// Open the configured storage backend and load every provider
    pub fn open(config: &Config) -> Result<Self, SessionError> {
        let data_dir = config.get_data_path();
        let store = match config.storage_backend {
            StorageBackend::Sqlite => {
                let db_path = data_dir.join(DATABASE_FILE_NAME);
                let db_path = db_path
                    .to_str()
                    .ok_or_else(|| SessionError::InvalidPath(db_path.display().to_string()))?;
                KeyedStore::new(SqliteMedium::new(db_path)?)
            }
            StorageBackend::Files => KeyedStore::new(FileMedium::new(data_dir.join("store"))?),
        };
        let fallback = KeyedStore::new(FileMedium::new(data_dir.join("fallback"))?);

        let ctx = ProviderContext {
            store: Rc::new(store),
            fallback: Rc::new(fallback),
            bus: Rc::new(EventBus::new()),
            clock: Rc::new(SystemClock),
            autosave: config.autosave.to_autosave_config(),
            session_id: utils::generate_id(),
        };
        info!(backend = ?config.storage_backend, session = %ctx.session_id, "Session opened");
        Ok(Self::with_context(ctx, config.max_daily_tasks, config.sync_interval()))
    }

    pub fn with_context(ctx: ProviderContext, max_active: usize, sync_interval: Duration) -> Self {
        let mut tasks = TaskProvider::new(&ctx, max_active);
        let mut projects = ProjectProvider::new(&ctx);
        let mut settings = SettingsProvider::new(&ctx);
        let pomodoro = PomodoroTimer::new(&ctx, settings.get());
        let logbook = LogBook::load(&ctx);
        let gamification = Gamification::attach(&ctx);

        let failures = Rc::new(RefCell::new(Vec::new()));
        tasks.autosave_mut().on_error(record_failure(failures.clone()));
        projects.autosave_mut().on_error(record_failure(failures.clone()));
        settings.autosave_mut().on_error(record_failure(failures.clone()));

        let mut session = Self {
            ctx,
            tasks,
            projects,
            settings,
            pomodoro,
            logbook,
            gamification,
            sync_interval,
            last_sync: None,
            failures,
        };
        session.check_rollover();
        session
    }

    pub fn context(&self) -> &ProviderContext {
        &self.ctx
    }

    pub fn bus(&self) -> &EventBus {
        &self.ctx.bus
    }

    pub fn today(&self) -> chrono::NaiveDate {
        self.ctx.clock.today()
    }

    /// Drive every timer; called once per frame by the host loop.
    ///
    /// Foreign changes are only looked for once per sync interval.
    pub fn poll(&mut self) -> PollOutcome {
        self.tasks.poll();
        self.projects.poll();
        self.settings.poll();

        let mut outcome = PollOutcome {
            finished_phase: self.pomodoro.tick(),
            ..PollOutcome::default()
        };

        let now = self.ctx.clock.now();
        let due = match self.last_sync {
            Some(last) => now.saturating_duration_since(last) >= self.sync_interval,
            None => true,
        };
        if due {
            self.last_sync = Some(now);
            outcome.synced |= self.tasks.sync();
            outcome.synced |= self.projects.sync();
            if self.settings.sync() {
                self.pomodoro.apply_settings(self.settings.get());
                outcome.synced = true;
            }
        }

        outcome.logged_day = self.check_rollover();
        outcome
    }

    /// Log yesterday's board once the date changes, then clear its done tasks
    pub fn check_rollover(&mut self) -> Option<DailyLog> {
        let today = self.ctx.clock.today();
        let entry = self.logbook.roll_over(today, self.tasks.counts())?;
        let cleared = self.tasks.clear_completed();
        info!(date = %entry.date, cleared, "Started a new day");
        Some(entry)
    }

    pub fn update_settings(
        &mut self,
        settings: PomodoroSettings,
    ) -> Result<PomodoroSettings, ValidationErrors> {
        let settings = self.settings.update(settings)?;
        self.pomodoro.apply_settings(settings);
        Ok(settings)
    }

    /// The most urgent save status across all providers
    pub fn save_status(&self) -> SaveStatus {
        [
            self.tasks.save_status(),
            self.projects.save_status(),
            self.settings.save_status(),
        ]
        .into_iter()
        .max_by_key(|status| urgency(status))
        .cloned()
        .unwrap_or(SaveStatus::Idle)
    }

    /// Failures reported since the last call
    pub fn take_failures(&self) -> Vec<SaveFailure> {
        std::mem::take(&mut *self.failures.borrow_mut())
    }

    /// Write everything still pending
    pub fn flush(&mut self) {
        self.tasks.flush();
        self.projects.flush();
        self.settings.flush();
        for failure in self.take_failures() {
            warn!(key = %failure.key, error = %failure.error, "Changes parked in fallback store");
        }
    }
}

fn record_failure(sink: Rc<RefCell<Vec<SaveFailure>>>) -> impl FnMut(&SaveFailure) + 'static {
    move |failure| sink.borrow_mut().push(failure.clone())
}

fn urgency(status: &SaveStatus) -> u8 {
    match status {
        SaveStatus::Idle => 0,
        SaveStatus::Saved => 1,
        SaveStatus::Pending => 2,
        SaveStatus::Saving => 3,
        SaveStatus::Retrying { .. } => 4,
        SaveStatus::Failed { .. } => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;
    use crate::providers::tasks::DEFAULT_MAX_ACTIVE_TASKS;
    use crate::providers::test_support::context;
    use assert_matches::assert_matches;

    fn session(t: &crate::providers::test_support::TestContext) -> Session {
        Session::with_context(t.ctx.clone(), DEFAULT_MAX_ACTIVE_TASKS, Duration::from_millis(1000))
    }

    #[test]
    fn test_rollover_logs_yesterday_and_clears_done_tasks() {
        let t = context();
        let mut s = session(&t);
        let done = s.tasks.add(NewTask::titled("Done today")).unwrap();
        s.tasks.add(NewTask::titled("Still open")).unwrap();
        s.tasks.toggle(&done.id).unwrap();

        assert_eq!(s.poll().logged_day, None);

        t.clock.set_today(crate::utils::parse_date("2024-03-11").unwrap());
        let logged = s.poll().logged_day.unwrap();
        assert_eq!(logged.total_tasks, 2);
        assert_eq!(logged.completed_tasks, 1);
        assert_eq!(s.tasks.list().len(), 1);
        assert_eq!(s.logbook.entries().len(), 1);
    }

    #[test]
    fn test_save_status_reports_worst_provider() {
        let t = context();
        let mut s = session(&t);
        assert_matches!(s.save_status(), SaveStatus::Idle);

        s.tasks.add(NewTask::titled("Pending")).unwrap();
        assert_matches!(s.save_status(), SaveStatus::Pending);

        t.medium.set_fail_writes(true);
        t.clock.advance_millis(1000);
        s.poll();
        assert_matches!(s.save_status(), SaveStatus::Retrying { attempt: 1 });

        s.flush();
        assert_matches!(s.save_status(), SaveStatus::Idle);
        assert!(s.take_failures().is_empty());
    }

    #[test]
    fn test_settings_update_reaches_timer() {
        let t = context();
        let mut s = session(&t);
        let settings = PomodoroSettings {
            focus_minutes: 45,
            ..PomodoroSettings::default()
        };
        s.update_settings(settings).unwrap();
        assert_eq!(s.pomodoro.format_remaining(), "45:00");

        let invalid = PomodoroSettings {
            focus_minutes: 0,
            ..PomodoroSettings::default()
        };
        assert!(s.update_settings(invalid).is_err());
        assert_eq!(s.settings.get().focus_minutes, 45);
    }
}
