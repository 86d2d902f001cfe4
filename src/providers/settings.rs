use std::rc::Rc;

use super::ProviderContext;
use crate::autosave::{AutosaveController, SaveStatus};
use crate::events::{self, EventBus};
use crate::models::PomodoroSettings;
use crate::storage::keys;
use crate::validation::{ValidationErrors, validate_pomodoro_settings};

pub struct SettingsProvider {
    settings: PomodoroSettings,
    autosave: AutosaveController<PomodoroSettings>,
    bus: Rc<EventBus>,
}

impl SettingsProvider {
    pub fn new(ctx: &ProviderContext) -> Self {
        let (mut settings, autosave) = ctx.load(keys::POMODORO_SETTINGS, PomodoroSettings::default());
        // A hand-edited store can hold out-of-range durations
        if !validate_pomodoro_settings(&settings).is_empty() {
            tracing::warn!("Stored pomodoro settings out of range, using defaults");
            settings = PomodoroSettings::default();
        }
        Self {
            settings,
            autosave,
            bus: ctx.bus.clone(),
        }
    }

    pub fn get(&self) -> PomodoroSettings {
        self.settings
    }

    pub fn save_status(&self) -> &SaveStatus {
        self.autosave.status()
    }

    pub fn autosave_mut(&mut self) -> &mut AutosaveController<PomodoroSettings> {
        &mut self.autosave
    }

    pub fn update(&mut self, settings: PomodoroSettings) -> Result<PomodoroSettings, ValidationErrors> {
        ValidationErrors::into_result(validate_pomodoro_settings(&settings))?;
        self.settings = settings;
        self.autosave.schedule(&self.settings);
        self.bus.emit_with(events::SETTINGS_UPDATED, &self.settings);
        Ok(settings)
    }

    pub fn poll(&mut self) {
        self.autosave.poll();
    }

    /// Adopt settings saved by another session, ignoring out-of-range values
    pub fn sync(&mut self) -> bool {
        match self.autosave.poll_external() {
            Some(settings) if validate_pomodoro_settings(&settings).is_empty() => {
                self.settings = settings;
                true
            }
            _ => false,
        }
    }

    pub fn flush(&mut self) {
        self.autosave.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::context;
    use crate::storage::StorageMedium;

    #[test]
    fn test_defaults_when_nothing_stored() {
        let t = context();
        let settings = SettingsProvider::new(&t.ctx);
        assert_eq!(settings.get(), PomodoroSettings::default());
    }

    #[test]
    fn test_out_of_range_update_is_rejected() {
        let t = context();
        let mut settings = SettingsProvider::new(&t.ctx);
        let bad = PomodoroSettings {
            focus_minutes: 121,
            ..PomodoroSettings::default()
        };

        assert!(settings.update(bad).is_err());
        assert_eq!(settings.get(), PomodoroSettings::default());
    }

    #[test]
    fn test_update_persists_after_flush() {
        let t = context();
        let mut settings = SettingsProvider::new(&t.ctx);
        let custom = PomodoroSettings {
            focus_minutes: 50,
            short_break_minutes: 10,
            long_break_minutes: 30,
        };
        settings.update(custom).unwrap();
        settings.flush();

        assert_eq!(SettingsProvider::new(&t.ctx).get(), custom);
    }

    #[test]
    fn test_stored_out_of_range_values_fall_back_to_defaults() {
        let t = context();
        t.medium
            .set(
                keys::POMODORO_SETTINGS,
                r#"{"focusMinutes":0,"shortBreakMinutes":5,"longBreakMinutes":15}"#,
            )
            .unwrap();
        assert_eq!(SettingsProvider::new(&t.ctx).get(), PomodoroSettings::default());
    }
}
