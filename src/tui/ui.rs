use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::widgets::{error, study, summary};
use super::{App, View};
use crate::engine::Phase;
use crate::models::StudyMode;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_title(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_help_bar(f, app, chunks[2]);
}

fn draw_title(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(
        " Studydeck ",
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )];

    if let Some(machine) = app.machine() {
        spans.push(Span::styled(
            format!(" {} #{} ", machine.mode().label(), machine.session().id),
            Style::default().fg(Color::Cyan),
        ));
        if let Some(index) = machine.current_index() {
            spans.push(Span::styled(
                format!(" Card {}/{} ", index + 1, machine.card_count()),
                Style::default().fg(Color::White),
            ));
        }
    }

    let title = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(title, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view() {
        View::Study => study::draw(f, app, area),
        View::Summary => summary::draw(f, app, area),
        View::ResolutionError | View::UnsupportedMode => error::draw(f, app, area),
    }
}

fn key<'a>(label: impl Into<std::borrow::Cow<'a, str>>) -> Span<'a> {
    Span::styled(label, Style::default().fg(Color::Cyan))
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let help_text = match (app.view(), app.machine()) {
        (View::Study, Some(machine)) => {
            let mut spans = Vec::new();
            match (machine.mode(), machine.phase()) {
                (StudyMode::Recognition, Phase::Presenting { .. }) => {
                    spans.extend(vec![key("<Space>"), Span::raw(" Flip  ")]);
                }
                (StudyMode::Recognition, Phase::Revealed { .. }) => {
                    spans.extend(vec![
                        key("y"),
                        Span::raw(" Knew it  "),
                        key("n"),
                        Span::raw(" Didn't  "),
                    ]);
                }
                (_, Phase::Presenting { .. }) => {
                    let count = machine.choices().map(|c| c.len()).unwrap_or(0);
                    let keys = if count > 1 {
                        format!("1-{}", count)
                    } else {
                        "1".to_string()
                    };
                    spans.extend(vec![key(keys), Span::raw(" Choose  ")]);
                }
                _ => {}
            }
            spans.extend(vec![key("q/<Esc>"), Span::raw(" Abandon")]);
            spans
        }
        _ => vec![key("q/<Esc>"), Span::raw(" Back")],
    };

    let help = Paragraph::new(Line::from(help_text)).style(Style::default().bg(Color::DarkGray));

    f.render_widget(help, area);
}
