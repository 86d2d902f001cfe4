use ratatui::Frame;
use ratatui::layout::Position;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::tui::widgets::{
    color::parse_color, side_panel::render_side_panel, status_bar::render_status_bar,
    task_list::render_task_list,
};
use crate::tui::{App, Layout, Mode};
use crate::utils::format_key_binding_for_display;

pub fn render(f: &mut Frame, app: &mut App, layout: &Layout) {
    let fg_color = parse_color(&app.config.theme.fg);
    let bg_color = parse_color(&app.config.theme.bg);
    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title("Tiempo Justo")
        .title_alignment(ratatui::layout::Alignment::Center)
        .style(Style::default().fg(fg_color).bg(bg_color));
    f.render_widget(outer_block, f.area());

    render_header(f, app, layout);

    render_task_list(
        f,
        layout.board_area,
        app.session.tasks.list(),
        app.config.max_daily_tasks,
        &mut app.list_state,
        &app.config,
    );
    render_side_panel(f, layout.side_area, &app.session, &app.config);

    render_input(f, app, layout);

    let key_hints = get_key_hints(app);
    let save_status = app.save_indicator();
    render_status_bar(
        f,
        layout.status_area,
        app.status.message.as_ref(),
        &key_hints,
        &save_status,
        &app.config,
    );
}

fn render_header(f: &mut Frame, app: &App, layout: &Layout) {
    let counts = app.session.tasks.counts();
    let accent = Style::default()
        .fg(parse_color(&app.config.theme.accent))
        .add_modifier(Modifier::BOLD);
    let header = Line::from(vec![
        Span::styled(app.session.today().format("%A %d %B").to_string(), accent),
        Span::raw(format!("  {} done, {} pending", counts.completed, counts.pending)),
    ]);
    f.render_widget(Paragraph::new(header), layout.header_area);
}

fn render_input(f: &mut Frame, app: &App, layout: &Layout) {
    let (text, title) = match app.mode {
        Mode::Input => (app.input.as_str(), "New task"),
        Mode::Normal => ("", "Press n to add a task"),
    };
    let input = Paragraph::new(text)
        .style(Style::default().fg(parse_color(&app.config.theme.fg)))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(input, layout.input_area);

    if app.mode == Mode::Input {
        // Cursor just after the typed text, inside the border
        let width = layout.input_area.width.saturating_sub(2);
        let offset = (app.input.chars().count() as u16).min(width.saturating_sub(1));
        f.set_cursor_position(Position::new(
            layout.input_area.x + 1 + offset,
            layout.input_area.y + 1,
        ));
    }
}

fn get_key_hints(app: &App) -> Vec<String> {
    let keys = &app.config.key_bindings;
    match app.mode {
        Mode::Input => vec!["Enter: Add".to_string(), "Esc: Cancel".to_string()],
        Mode::Normal => vec![
            format!("{}: Quit", format_key_binding_for_display(&keys.quit)),
            format!("{}: New", format_key_binding_for_display(&keys.new)),
            format!("{}: Done", format_key_binding_for_display(&keys.toggle_task)),
            format!("{}: Delete", format_key_binding_for_display(&keys.delete)),
            format!("{}: Priority", format_key_binding_for_display(&keys.cycle_priority)),
            format!("{}: Start/pause", format_key_binding_for_display(&keys.pomodoro_toggle)),
            format!("{}: Reset timer", format_key_binding_for_display(&keys.pomodoro_reset)),
            format!("{}: Clear done", format_key_binding_for_display(&keys.clear_completed)),
            format!("{}: ADHD mode", format_key_binding_for_display(&keys.toggle_adhd_mode)),
        ],
    }
}
