//! ADHD mode: points, streaks and badges.
//!
//! Nothing in the task board knows about this module. It listens on the
//! event bus for `task:toggled` and `project:completed` and keeps its own
//! persisted state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

use crate::clock::Clock;
use crate::events::{self, Event, EventBus, HandlerError, Subscription, handler};
use crate::models::Task;
use crate::providers::ProviderContext;
use crate::storage::{KeyedStore, keys};

pub const POINTS_PER_TASK: u32 = 10;
pub const POINTS_PER_PROJECT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Badge {
    #[serde(rename = "first-task")]
    FirstTask,
    #[serde(rename = "ten-tasks")]
    TenTasks,
    #[serde(rename = "streak-3")]
    Streak3,
    #[serde(rename = "streak-7")]
    Streak7,
    #[serde(rename = "project-finisher")]
    ProjectFinisher,
}

impl Badge {
    pub fn label(&self) -> &'static str {
        match self {
            Badge::FirstTask => "First task",
            Badge::TenTasks => "Ten tasks",
            Badge::Streak3 => "3-day streak",
            Badge::Streak7 => "7-day streak",
            Badge::ProjectFinisher => "Project finisher",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationState {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub completed_tasks: u32,
    #[serde(default)]
    pub completed_projects: u32,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub last_completion_day: Option<NaiveDate>,
    #[serde(default)]
    pub badges: Vec<Badge>,
}

fn default_enabled() -> bool {
    true
}

impl Default for GamificationState {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            points: 0,
            completed_tasks: 0,
            completed_projects: 0,
            streak: 0,
            last_completion_day: None,
            badges: Vec::new(),
        }
    }
}

impl GamificationState {
    pub fn record_task_completed(&mut self, today: NaiveDate) {
        self.points += POINTS_PER_TASK;
        self.completed_tasks += 1;
        self.streak = match self.last_completion_day {
            Some(day) if day == today => self.streak.max(1),
            Some(day) if day.succ_opt() == Some(today) => self.streak + 1,
            _ => 1,
        };
        self.last_completion_day = Some(today);
        self.award_badges();
    }

    /// Un-completing takes the points back but never the streak or badges
    pub fn record_task_reopened(&mut self) {
        self.points = self.points.saturating_sub(POINTS_PER_TASK);
        self.completed_tasks = self.completed_tasks.saturating_sub(1);
    }

    pub fn record_project_completed(&mut self) {
        self.points += POINTS_PER_PROJECT;
        self.completed_projects += 1;
        self.award_badges();
    }

    /// Streak as of `today`: it lapses once a whole day passes without a completion
    pub fn current_streak(&self, today: NaiveDate) -> u32 {
        match self.last_completion_day {
            Some(day) if day == today || day.succ_opt() == Some(today) => self.streak,
            _ => 0,
        }
    }

    fn award_badges(&mut self) {
        let earned = [
            (Badge::FirstTask, self.completed_tasks >= 1),
            (Badge::TenTasks, self.completed_tasks >= 10),
            (Badge::Streak3, self.streak >= 3),
            (Badge::Streak7, self.streak >= 7),
            (Badge::ProjectFinisher, self.completed_projects >= 1),
        ];
        for (badge, qualifies) in earned {
            if qualifies && !self.badges.contains(&badge) {
                info!(badge = badge.label(), "Badge earned");
                self.badges.push(badge);
            }
        }
    }
}

/// Live gamification state wired to the event bus
pub struct Gamification {
    state: Rc<RefCell<GamificationState>>,
    store: Rc<KeyedStore>,
    subscriptions: Vec<Subscription>,
}

impl Gamification {
    pub fn attach(ctx: &ProviderContext) -> Self {
        let state = Rc::new(RefCell::new(
            ctx.store.read(keys::GAMIFICATION, GamificationState::default()),
        ));

        let on_toggle = {
            let state = state.clone();
            let store = ctx.store.clone();
            let clock = ctx.clock.clone();
            handler(move |event: &Event| on_task_toggled(event, &state, &store, clock.as_ref()))
        };
        let on_project = {
            let state = state.clone();
            let store = ctx.store.clone();
            handler(move |_event: &Event| {
                let mut state = state.borrow_mut();
                if state.enabled {
                    state.record_project_completed();
                    store.write(keys::GAMIFICATION, &*state)?;
                }
                Ok(())
            })
        };

        let subscriptions = vec![
            ctx.bus.on(events::TASK_TOGGLED, on_toggle),
            ctx.bus.on(events::PROJECT_COMPLETED, on_project),
        ];
        Self {
            state,
            store: ctx.store.clone(),
            subscriptions,
        }
    }

    pub fn state(&self) -> GamificationState {
        self.state.borrow().clone()
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.state.borrow_mut();
        state.enabled = enabled;
        if let Err(e) = self.store.write(keys::GAMIFICATION, &*state) {
            tracing::warn!(error = %e, "Failed to persist gamification state");
        }
    }

    /// Stop listening to the bus
    pub fn detach(self, bus: &EventBus) {
        for subscription in self.subscriptions {
            subscription.unsubscribe(bus);
        }
    }
}

fn on_task_toggled(
    event: &Event,
    state: &RefCell<GamificationState>,
    store: &KeyedStore,
    clock: &dyn Clock,
) -> Result<(), HandlerError> {
    let task: Task = serde_json::from_value(event.payload["task"].clone())?;
    let mut state = state.borrow_mut();
    if !state.enabled {
        return Ok(());
    }
    if task.done {
        state.record_task_completed(clock.today());
    } else {
        state.record_task_reopened();
    }
    store.write(keys::GAMIFICATION, &*state)?;
    Ok(())
}
