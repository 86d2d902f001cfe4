//! Pomodoro countdown.
//!
//! The timer is a value snapshot plus the instant of the last tick. The
//! snapshot is written through on every state change; a session that exits
//! mid-phase comes back paused with the remaining time it last recorded.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::events::{self, EventBus};
use crate::models::PomodoroSettings;
use crate::providers::ProviderContext;
use crate::storage::{KeyedStore, keys};

/// Every Nth completed focus phase is followed by a long break
pub const LONG_BREAK_EVERY: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Focus => "Focus",
            Phase::ShortBreak => "Short break",
            Phase::LongBreak => "Long break",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: Phase,
    pub remaining_secs: u64,
    pub running: bool,
    pub completed_focus: u32,
}

fn phase_secs(settings: &PomodoroSettings, phase: Phase) -> u64 {
    let minutes = match phase {
        Phase::Focus => settings.focus_minutes,
        Phase::ShortBreak => settings.short_break_minutes,
        Phase::LongBreak => settings.long_break_minutes,
    };
    u64::from(minutes) * 60
}

pub struct PomodoroTimer {
    snapshot: TimerSnapshot,
    settings: PomodoroSettings,
    store: Rc<KeyedStore>,
    bus: Rc<EventBus>,
    clock: Rc<dyn Clock>,
    last_tick: Option<Instant>,
}

impl PomodoroTimer {
    pub fn new(ctx: &ProviderContext, settings: PomodoroSettings) -> Self {
        let fresh = TimerSnapshot {
            phase: Phase::Focus,
            remaining_secs: phase_secs(&settings, Phase::Focus),
            running: false,
            completed_focus: 0,
        };
        let mut snapshot = ctx.store.read(keys::POMODORO_TIMER, fresh);
        snapshot.running = false;
        Self {
            snapshot,
            settings,
            store: ctx.store.clone(),
            bus: ctx.bus.clone(),
            clock: ctx.clock.clone(),
            last_tick: None,
        }
    }

    pub fn snapshot(&self) -> &TimerSnapshot {
        &self.snapshot
    }

    pub fn is_running(&self) -> bool {
        self.snapshot.running
    }

    pub fn start(&mut self) {
        if self.snapshot.running {
            return;
        }
        if self.snapshot.remaining_secs == 0 {
            self.snapshot.remaining_secs = phase_secs(&self.settings, self.snapshot.phase);
        }
        self.snapshot.running = true;
        self.last_tick = Some(self.clock.now());
        self.persist();
    }

    pub fn pause(&mut self) {
        if !self.snapshot.running {
            return;
        }
        // Account for time elapsed since the last tick before stopping
        if self.tick().is_some() {
            return;
        }
        self.snapshot.running = false;
        self.last_tick = None;
        self.persist();
    }

    pub fn resume(&mut self) {
        self.start();
    }

    /// Back to a full, stopped focus phase. The completed count is kept.
    pub fn reset(&mut self) {
        self.snapshot.phase = Phase::Focus;
        self.snapshot.remaining_secs = phase_secs(&self.settings, Phase::Focus);
        self.snapshot.running = false;
        self.last_tick = None;
        self.persist();
    }

    /// Swap in new durations; an untouched, stopped phase picks them up
    pub fn apply_settings(&mut self, settings: PomodoroSettings) {
        let untouched = !self.snapshot.running
            && self.snapshot.remaining_secs == phase_secs(&self.settings, self.snapshot.phase);
        self.settings = settings;
        if untouched {
            self.snapshot.remaining_secs = phase_secs(&self.settings, self.snapshot.phase);
            self.persist();
        }
    }

    /// Advance the countdown; returns the phase that just finished, if any
    pub fn tick(&mut self) -> Option<Phase> {
        if !self.snapshot.running {
            return None;
        }
        let last = self.last_tick?;
        let elapsed = self.clock.now().saturating_duration_since(last).as_secs();
        if elapsed == 0 {
            return None;
        }
        // Carry the sub-second remainder into the next tick
        self.last_tick = Some(last + Duration::from_secs(elapsed));

        if elapsed < self.snapshot.remaining_secs {
            self.snapshot.remaining_secs -= elapsed;
            return None;
        }

        let finished = self.snapshot.phase;
        let next = match finished {
            Phase::Focus => {
                self.snapshot.completed_focus += 1;
                if self.snapshot.completed_focus % LONG_BREAK_EVERY == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                }
            }
            Phase::ShortBreak | Phase::LongBreak => Phase::Focus,
        };
        self.snapshot.phase = next;
        self.snapshot.remaining_secs = phase_secs(&self.settings, next);
        self.snapshot.running = false;
        self.last_tick = None;
        self.persist();

        info!(phase = finished.label(), completed = self.snapshot.completed_focus, "Pomodoro phase finished");
        self.bus.emit_with(
            events::POMODORO_COMPLETED,
            &json!({ "phase": finished, "completedFocus": self.snapshot.completed_focus }),
        );
        Some(finished)
    }

    /// Remaining time as `MM:SS`
    pub fn format_remaining(&self) -> String {
        let secs = self.snapshot.remaining_secs;
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }

    fn persist(&self) {
        if let Err(e) = self.store.write(keys::POMODORO_TIMER, &self.snapshot) {
            warn!(error = %e, "Failed to persist pomodoro timer");
        }
    }
}
