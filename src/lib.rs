pub mod autosave;
pub mod cli;
pub mod clock;
pub mod config;
pub mod events;
pub mod gamification;
pub mod hours;
pub mod logbook;
pub mod logging;
pub mod models;
pub mod pomodoro;
pub mod providers;
pub mod session;
pub mod storage;
pub mod sync;
pub mod tui;
pub mod utils;
pub mod validation;

pub use autosave::{AutosaveConfig, AutosaveController, SaveStatus};
pub use config::Config;
pub use events::EventBus;
pub use models::{DailyLog, PomodoroSettings, Priority, Project, ProjectStatus, Task};
pub use session::Session;
pub use storage::KeyedStore;
pub use utils::Profile;
pub use validation::ValidationErrors;
