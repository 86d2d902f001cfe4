use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    size as terminal_size,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use std::io;
use std::time::Duration;

use crate::tui::app::Mode;
use crate::tui::error::TuiError;
use crate::tui::{App, Layout};
use crate::utils::{ParsedKeyBinding, has_primary_modifier, parse_key_binding};

/// Restores the terminal even if the loop panics
struct TerminalGuard {
    raw_mode_enabled: bool,
    alternate_screen_enabled: bool,
}

impl TerminalGuard {
    fn new() -> Result<Self, TuiError> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self {
            raw_mode_enabled: true,
            alternate_screen_enabled: true,
        })
    }

    /// Restore on normal exit; the guard does nothing on drop afterwards
    fn restore(&mut self) -> Result<(), TuiError> {
        if self.raw_mode_enabled {
            disable_raw_mode()?;
            self.raw_mode_enabled = false;
        }
        if self.alternate_screen_enabled {
            execute!(io::stdout(), LeaveAlternateScreen)?;
            self.alternate_screen_enabled = false;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Already on a cleanup path, errors are ignored
        if self.raw_mode_enabled {
            let _ = disable_raw_mode();
        }
        if self.alternate_screen_enabled {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
    }
}

/// Key bindings resolved once from config
struct Bindings {
    quit: ParsedKeyBinding,
    new: ParsedKeyBinding,
    delete: ParsedKeyBinding,
    toggle_task: ParsedKeyBinding,
    cycle_priority: ParsedKeyBinding,
    list_up: ParsedKeyBinding,
    list_down: ParsedKeyBinding,
    pomodoro_toggle: ParsedKeyBinding,
    pomodoro_reset: ParsedKeyBinding,
    toggle_adhd_mode: ParsedKeyBinding,
    clear_completed: ParsedKeyBinding,
}

impl Bindings {
    fn from_config(app: &App) -> Result<Self, TuiError> {
        let keys = &app.config.key_bindings;
        let parse = |s: &str| parse_key_binding(s).map_err(TuiError::KeyBindingError);
        Ok(Self {
            quit: parse(&keys.quit)?,
            new: parse(&keys.new)?,
            delete: parse(&keys.delete)?,
            toggle_task: parse(&keys.toggle_task)?,
            cycle_priority: parse(&keys.cycle_priority)?,
            list_up: parse(&keys.list_up)?,
            list_down: parse(&keys.list_down)?,
            pomodoro_toggle: parse(&keys.pomodoro_toggle)?,
            pomodoro_reset: parse(&keys.pomodoro_reset)?,
            toggle_adhd_mode: parse(&keys.toggle_adhd_mode)?,
            clear_completed: parse(&keys.clear_completed)?,
        })
    }
}

fn matches(binding: &ParsedKeyBinding, key_event: &KeyEvent) -> bool {
    binding.key_code == key_event.code
        && binding.requires_ctrl == has_primary_modifier(key_event.modifiers)
}

pub fn run_event_loop(mut app: App) -> Result<(), TuiError> {
    let (width, height) = terminal_size()?;
    let min_width_with_border = Layout::MIN_WIDTH + 2;
    let min_height_with_border = Layout::MIN_HEIGHT + 2;
    if width < min_width_with_border || height < min_height_with_border {
        return Err(TuiError::RenderError(format!(
            "Terminal size too small. Current: {}x{}, Minimum required: {}x{}. Please resize your terminal window.",
            width, height, min_width_with_border, min_height_with_border
        )));
    }

    let bindings = Bindings::from_config(&app)?;
    let mut guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    loop {
        app.check_status_message_timeout();
        app.on_tick();

        let size = terminal.size()?;
        let terminal_rect = Rect::new(0, 0, size.width, size.height);
        terminal.draw(|f| {
            let layout = Layout::calculate(terminal_rect);
            crate::tui::render::render(f, &mut app, &layout);
        })?;

        // Only Press events, so Windows does not see every key twice
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press && handle_key_event(&mut app, &bindings, key_event) {
                    break;
                }
            }
        }
    }

    app.session.flush();
    guard.restore()?;
    Ok(())
}

/// Returns true when the user asked to quit
fn handle_key_event(app: &mut App, bindings: &Bindings, key_event: KeyEvent) -> bool {
    if app.mode == Mode::Input {
        match key_event.code {
            KeyCode::Enter => app.submit_input(),
            KeyCode::Esc => app.cancel_input(),
            KeyCode::Backspace => {
                app.input.pop();
            }
            KeyCode::Char(c) if !has_primary_modifier(key_event.modifiers) => app.input.push(c),
            _ => {}
        }
        return false;
    }

    if matches(&bindings.quit, &key_event) {
        return true;
    }
    if matches(&bindings.new, &key_event) {
        app.enter_input_mode();
    } else if matches(&bindings.toggle_task, &key_event) || key_event.code == KeyCode::Enter {
        app.toggle_selected();
    } else if matches(&bindings.delete, &key_event) {
        app.delete_selected();
    } else if matches(&bindings.cycle_priority, &key_event) {
        app.cycle_priority_selected();
    } else if matches(&bindings.list_up, &key_event) || key_event.code == KeyCode::Up {
        app.select_previous();
    } else if matches(&bindings.list_down, &key_event) || key_event.code == KeyCode::Down {
        app.select_next();
    } else if matches(&bindings.pomodoro_toggle, &key_event) {
        app.toggle_pomodoro();
    } else if matches(&bindings.pomodoro_reset, &key_event) {
        app.reset_pomodoro();
    } else if matches(&bindings.clear_completed, &key_event) {
        app.clear_completed();
    } else if matches(&bindings.toggle_adhd_mode, &key_event) {
        app.toggle_adhd_mode();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use crate::providers::tasks::DEFAULT_MAX_ACTIVE_TASKS;
    use crate::providers::test_support::context;
    use crate::session::Session;
    use crossterm::event::KeyModifiers;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typing_a_task_through_key_events() {
        let t = context();
        let session = Session::with_context(t.ctx.clone(), DEFAULT_MAX_ACTIVE_TASKS, Duration::ZERO);
        let mut app = App::new(Config::default(), session);
        let bindings = Bindings::from_config(&app).unwrap();

        assert!(!handle_key_event(&mut app, &bindings, press(KeyCode::Char('n'))));
        for c in "Tea".chars() {
            handle_key_event(&mut app, &bindings, press(KeyCode::Char(c)));
        }
        handle_key_event(&mut app, &bindings, press(KeyCode::Enter));
        assert_eq!(app.session.tasks.list()[0].title, "Tea");

        // `q` is text while typing, a quit in normal mode
        handle_key_event(&mut app, &bindings, press(KeyCode::Char('n')));
        assert!(!handle_key_event(&mut app, &bindings, press(KeyCode::Char('q'))));
        handle_key_event(&mut app, &bindings, press(KeyCode::Esc));
        handle_key_event(&mut app, &bindings, press(KeyCode::Char(' ')));
        assert!(app.session.tasks.list()[0].done);
        assert!(handle_key_event(&mut app, &bindings, press(KeyCode::Char('q'))));
    }
}
