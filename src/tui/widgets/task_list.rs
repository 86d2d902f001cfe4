use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};

use crate::Config;
use crate::models::{Priority, Task};
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};

fn priority_style(priority: Priority, config: &Config) -> Style {
    match priority {
        Priority::A => Style::default()
            .fg(parse_color(&config.theme.accent))
            .add_modifier(Modifier::BOLD),
        Priority::B => Style::default().fg(parse_color(&config.theme.accent)),
        Priority::C | Priority::D => Style::default().fg(parse_color(&config.theme.fg)),
    }
}

fn truncate(text: &str, max_width: usize) -> String {
    if text.chars().count() > max_width {
        text.chars().take(max_width.saturating_sub(3)).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// The daily board. The title shows how many open slots are used.
pub fn render_task_list(
    f: &mut Frame,
    area: Rect,
    tasks: &[Task],
    max_active: usize,
    list_state: &mut ListState,
    config: &Config,
) {
    // 2 for borders, 2 for padding, 6 for the status and priority columns
    let max_width = area.width.saturating_sub(10) as usize;

    let highlight_bg = parse_color(&config.theme.highlight_bg);
    let highlight_fg = if config.theme.highlight_fg.is_empty() {
        get_contrast_text_color(highlight_bg)
    } else {
        parse_color(&config.theme.highlight_fg)
    };

    let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
            let status_indicator = if task.done { "✓" } else { "○" };
            let title_style = if task.done {
                Style::default().add_modifier(Modifier::CROSSED_OUT | Modifier::DIM)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{} ", status_indicator)),
                Span::styled(format!("{} ", task.priority), priority_style(task.priority, config)),
                Span::styled(truncate(&task.title, max_width), title_style),
            ]))
        })
        .collect();

    let active = tasks.iter().filter(|t| !t.done).count();
    let title = format!("Today ({}/{})", active, max_active);
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(parse_color(&config.theme.fg)))
        .highlight_style(Style::default().fg(highlight_fg).bg(highlight_bg));

    f.render_stateful_widget(list, area, list_state);
}
