use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::Config;
use crate::session::Session;
use crate::tui::widgets::color::parse_color;

/// Pomodoro timer on top, ADHD-mode points and streak below
pub fn render_side_panel(f: &mut Frame, area: Rect, session: &Session, config: &Config) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(3)])
        .split(area);

    let fg = Style::default().fg(parse_color(&config.theme.fg));
    let accent = Style::default()
        .fg(parse_color(&config.theme.accent))
        .add_modifier(Modifier::BOLD);

    let timer = &session.pomodoro;
    let snapshot = timer.snapshot();
    let state = if timer.is_running() { "running" } else { "paused" };
    let pomodoro = Paragraph::new(vec![
        Line::styled(timer.format_remaining(), accent),
        Line::from(format!("{} ({})", snapshot.phase.label(), state)),
        Line::from(format!("Completed: {}", snapshot.completed_focus)),
    ])
    .style(fg)
    .block(Block::default().borders(Borders::ALL).title("Pomodoro"));
    f.render_widget(pomodoro, chunks[0]);

    let game = session.gamification.state();
    let lines = if game.enabled {
        let mut lines = vec![
            Line::styled(format!("{} pts", game.points), accent),
            Line::from(format!("Streak: {} day(s)", game.current_streak(session.today()))),
        ];
        lines.extend(game.badges.iter().map(|badge| Line::from(format!("★ {}", badge.label()))));
        lines
    } else {
        vec![Line::from("ADHD mode off")]
    };
    let progress = Paragraph::new(lines)
        .style(fg)
        .block(Block::default().borders(Borders::ALL).title("Progress"));
    f.render_widget(progress, chunks[1]);
}
