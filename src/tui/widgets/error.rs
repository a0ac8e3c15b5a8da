use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::tui::{App, View};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let title = match app.view() {
        View::UnsupportedMode => " Unsupported Mode ",
        _ => " No Session ",
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD));

    let message = app.host().message.as_deref().unwrap_or("Something went wrong");

    let text = vec![
        Line::from(Span::styled(message, Style::default().fg(Color::White))),
        Line::from(""),
        Line::from(vec![
            Span::styled("Press ", Style::default().fg(Color::Gray)),
            Span::styled("<Esc>", Style::default().fg(Color::Cyan)),
            Span::styled(" to go back", Style::default().fg(Color::Gray)),
        ]),
    ];

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}
