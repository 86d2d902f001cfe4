use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::Paragraph;

use crate::Config;
use crate::autosave::SaveStatus;
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};

/// Fit as many hints as `max_width` allows, ending in `...` when some are cut
pub fn fit_hints(key_hints: &[String], max_width: usize) -> String {
    let separator = " • ";
    let ellipsis = "...";
    let mut hints_text = String::new();

    for (i, hint) in key_hints.iter().enumerate() {
        let current_len = hints_text.chars().count();
        let would_be_len = if i == 0 {
            hint.chars().count()
        } else {
            current_len + separator.chars().count() + hint.chars().count()
        };

        if would_be_len > max_width {
            if i == 0 {
                hints_text = hint.chars().take(max_width.saturating_sub(3)).collect();
            } else if current_len + ellipsis.len() > max_width {
                hints_text = hints_text.chars().take(max_width.saturating_sub(3)).collect();
            }
            hints_text.push_str(ellipsis);
            break;
        }

        if i > 0 {
            hints_text.push_str(separator);
        }
        hints_text.push_str(hint);
    }
    hints_text
}

fn save_indicator_style(status: &SaveStatus, config: &Config) -> Style {
    match status {
        SaveStatus::Failed { .. } | SaveStatus::Retrying { .. } => Style::default()
            .fg(parse_color("red"))
            .add_modifier(Modifier::BOLD),
        SaveStatus::Pending | SaveStatus::Saving => {
            Style::default().fg(parse_color(&config.theme.accent))
        }
        SaveStatus::Idle | SaveStatus::Saved => Style::default().fg(parse_color(&config.theme.fg)),
    }
}

/// One line: a transient message or the key hints, with the save indicator on the right
pub fn render_status_bar(
    f: &mut Frame,
    area: Rect,
    message: Option<&String>,
    key_hints: &[String],
    save_status: &SaveStatus,
    config: &Config,
) {
    let indicator = format!(" [{}]", save_status);
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(indicator.chars().count() as u16),
        ])
        .split(area);

    let fg_color = parse_color(&config.theme.fg);
    let bg_color = parse_color(&config.theme.bg);
    let highlight_bg = parse_color(&config.theme.highlight_bg);
    let max_width = chunks[0].width as usize;

    let (content, style) = match message {
        Some(msg) => {
            let mut content = msg.clone();
            if content.chars().count() > max_width {
                content = content.chars().take(max_width.saturating_sub(3)).collect::<String>() + "...";
            }
            let msg_fg = get_contrast_text_color(highlight_bg);
            (content, Style::default().fg(msg_fg).bg(highlight_bg).add_modifier(Modifier::BOLD))
        }
        None => (fit_hints(key_hints, max_width), Style::default().fg(fg_color).bg(bg_color)),
    };

    f.render_widget(Paragraph::new(content).style(style), chunks[0]);
    f.render_widget(
        Paragraph::new(indicator).style(save_indicator_style(save_status, config).bg(bg_color)),
        chunks[1],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints() -> Vec<String> {
        vec!["q: Quit".to_string(), "n: New".to_string(), "d: Delete".to_string()]
    }

    #[test]
    fn test_all_hints_fit() {
        assert_eq!(fit_hints(&hints(), 80), "q: Quit • n: New • d: Delete");
    }

    #[test]
    fn test_hints_cut_with_ellipsis() {
        assert_eq!(fit_hints(&hints(), 20), "q: Quit • n: New...");
        assert_eq!(fit_hints(&hints(), 5), "q:...");
    }
}
