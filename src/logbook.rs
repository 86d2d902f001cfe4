//! Daily productivity log.
//!
//! One entry per day, appended the first time the board is opened after the
//! day it describes has ended. Entries are written straight through to the
//! store (not debounced) since each one is history, not latest-state.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::rc::Rc;
use tracing::{info, warn};

use crate::events::{self, EventBus};
use crate::models::{DailyLog, MonthlySummary, TaskCounts};
use crate::providers::ProviderContext;
use crate::storage::{KeyedStore, keys};

/// Entries older than this many months are dropped on load
pub const RETENTION_MONTHS: u32 = 6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogState {
    #[serde(default)]
    active_day: Option<NaiveDate>,
    #[serde(default)]
    entries: Vec<DailyLog>,
}

pub struct LogBook {
    state: LogState,
    store: Rc<KeyedStore>,
    bus: Rc<EventBus>,
}

impl LogBook {
    /// Load the log, pruning entries that fell out of the retention window
    pub fn load(ctx: &ProviderContext) -> Self {
        let mut book = Self {
            state: ctx.store.read(keys::DAILY_LOGS, LogState::default()),
            store: ctx.store.clone(),
            bus: ctx.bus.clone(),
        };

        let today = ctx.clock.today();
        if let Some(cutoff) = today.checked_sub_months(Months::new(RETENTION_MONTHS)) {
            let before = book.state.entries.len();
            book.state.entries.retain(|entry| entry.date >= cutoff);
            let pruned = before - book.state.entries.len();
            if pruned > 0 {
                info!(pruned, "Pruned old daily log entries");
                book.persist();
            }
        }
        book
    }

    pub fn entries(&self) -> &[DailyLog] {
        &self.state.entries
    }

    pub fn active_day(&self) -> Option<NaiveDate> {
        self.state.active_day
    }

    /// Close out the previously active day if `today` is later.
    ///
    /// `counts` describes the board as it stood at the end of that day.
    /// Returns the appended entry, if one was written.
    pub fn roll_over(&mut self, today: NaiveDate, counts: TaskCounts) -> Option<DailyLog> {
        let previous = match self.state.active_day {
            Some(day) if day < today => day,
            Some(_) => return None,
            None => {
                self.state.active_day = Some(today);
                self.persist();
                return None;
            }
        };

        self.state.active_day = Some(today);
        let entry = if self.state.entries.iter().any(|e| e.date == previous) {
            None
        } else {
            let entry = DailyLog {
                date: previous,
                total_tasks: counts.total as u32,
                completed_tasks: counts.completed as u32,
            };
            self.state.entries.push(entry.clone());
            Some(entry)
        };
        self.persist();

        if let Some(entry) = &entry {
            info!(date = %entry.date, productivity = entry.productivity(), "Logged day");
            self.bus.emit_with(
                events::DAY_ROLLED_OVER,
                &json!({ "log": entry, "today": today }),
            );
        }
        entry
    }

    pub fn monthly_summary(&self, year: i32, month: u32) -> MonthlySummary {
        summarize_month(&self.state.entries, year, month)
    }

    fn persist(&self) {
        if let Err(e) = self.store.write(keys::DAILY_LOGS, &self.state) {
            warn!(error = %e, "Failed to persist daily log");
        }
    }
}

/// Aggregate the entries that fall in `year`-`month`
pub fn summarize_month(logs: &[DailyLog], year: i32, month: u32) -> MonthlySummary {
    let in_month = logs
        .iter()
        .filter(|log| log.date.year() == year && log.date.month() == month);

    let mut summary = MonthlySummary {
        year,
        month,
        total_tasks: 0,
        completed_tasks: 0,
        completion_rate: 0,
        days_logged: 0,
    };
    for log in in_month {
        summary.total_tasks += log.total_tasks;
        summary.completed_tasks += log.completed_tasks;
        summary.days_logged += 1;
    }
    if summary.total_tasks > 0 {
        summary.completion_rate =
            (summary.completed_tasks as f64 / summary.total_tasks as f64 * 100.0).round() as u32;
    }
    summary
}
