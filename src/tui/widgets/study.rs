use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::engine::Phase;
use crate::models::{Response, StudyMode};
use crate::tui::{App, StudyMachine};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(machine) = app.machine() else {
        let block = Block::default().borders(Borders::ALL).title(" Study ");
        let paragraph = Paragraph::new("No session loaded").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let countdown_height = if machine.remaining_ticks().is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),                // Card front
            Constraint::Length(countdown_height), // Countdown
            Constraint::Min(0),                   // Answer area
            Constraint::Length(1),                // Feedback
        ])
        .split(area);

    draw_front(f, machine, chunks[0]);
    if machine.remaining_ticks().is_some() {
        draw_countdown(f, machine, chunks[1]);
    }
    match machine.mode() {
        StudyMode::Recognition => draw_back(f, machine, chunks[2]),
        StudyMode::ForcedChoice | StudyMode::TimedForcedChoice => {
            draw_options(f, machine, chunks[2])
        }
    }
    draw_feedback(f, machine, chunks[3]);
}

fn draw_front(f: &mut Frame, machine: &StudyMachine<'_>, area: Rect) {
    let front = machine
        .current_card()
        .map(|c| c.front_content.as_str())
        .unwrap_or("");

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Question ")
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let paragraph = Paragraph::new(front)
        .style(Style::default().fg(Color::White))
        .block(block)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_countdown(f: &mut Frame, machine: &StudyMachine<'_>, area: Rect) {
    let total = machine.mode().countdown_ticks().unwrap_or(1).max(1);
    let remaining = machine.remaining_ticks().unwrap_or(0).min(total);

    let color = match remaining {
        0..=5 => Color::Red,
        6..=10 => Color::Yellow,
        _ => Color::Green,
    };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Time "))
        .gauge_style(Style::default().fg(color))
        .ratio(remaining as f64 / total as f64)
        .label(format!("{}s", remaining));
    f.render_widget(gauge, area);
}

fn draw_back(f: &mut Frame, machine: &StudyMachine<'_>, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Answer ");

    let text = match machine.phase() {
        Phase::Revealed { .. } | Phase::Answered { .. } => {
            let back = machine
                .current_card()
                .map(|c| c.back_content.as_str())
                .unwrap_or("");
            Line::from(Span::styled(back, Style::default().fg(Color::Cyan)))
        }
        _ => Line::from(Span::styled(
            "Press space to reveal",
            Style::default().fg(Color::DarkGray),
        )),
    };

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_options(f: &mut Frame, machine: &StudyMachine<'_>, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Options ");

    let Some(choices) = machine.choices() else {
        f.render_widget(Paragraph::new("").block(block), area);
        return;
    };

    let answered = matches!(machine.phase(), Phase::Answered { .. });
    let selected = if answered {
        machine.log().last().and_then(|r| r.response.selected_option())
    } else {
        None
    };

    let items: Vec<ListItem> = choices
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let style = if answered && choices.is_correct(i) {
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else if selected == Some(i) {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::White)
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!(" {}. ", i + 1), Style::default().fg(Color::Cyan)),
                Span::styled(option.as_str(), style),
            ]))
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

fn draw_feedback(f: &mut Frame, machine: &StudyMachine<'_>, area: Rect) {
    let line = match machine.phase() {
        Phase::Answered { correct: true, .. } => {
            Line::from(Span::styled(" Correct!", Style::default().fg(Color::Green)))
        }
        Phase::Answered { correct: false, .. } => {
            let timed_out = machine
                .log()
                .last()
                .is_some_and(|r| r.response == Response::TimedOut);
            let message = if timed_out { " Time's up" } else { " Incorrect" };
            Line::from(Span::styled(message, Style::default().fg(Color::Red)))
        }
        _ => Line::from(""),
    };

    f.render_widget(Paragraph::new(line), area);
}
