//! HelpOverlay component: centered popup with keyboard shortcut reference.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::Palette,
};

pub struct HelpOverlay {
    pub visible: bool,
}

impl HelpOverlay {
    pub fn new() -> Self {
        Self { visible: false }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }
}

impl Component for HelpOverlay {
    fn id(&self) -> ComponentId {
        ComponentId::HelpOverlay
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release || !self.visible {
            return vec![];
        }
        match key.code {
            KeyCode::Char('?') | KeyCode::Char('q') | KeyCode::Esc => vec![Action::ToggleHelp],
            // consume everything else while open
            _ => vec![],
        }
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        if let Action::ToggleHelp = action {
            self.toggle();
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        if !self.visible {
            return;
        }
        let p = state.palette();
        let section = |title: &'static str| {
            Line::from(Span::styled(
                title,
                Style::default().fg(p.muted).add_modifier(Modifier::BOLD),
            ))
        };

        let help_lines: Vec<Line> = vec![
            Line::from(Span::styled(
                " keyboard shortcuts",
                Style::default().fg(p.primary).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            section(" songs"),
            help_row(p, "enter", "play unlocked song / unlock locked song"),
            help_row(p, "tab", "switch All Songs ↔ My Songs"),
            help_row(p, "/", "search title or artist (Esc clears + closes)"),
            help_row(p, "↑ / ↓  or  j / k", "move selection"),
            help_row(p, "home / end  or  g / G", "jump first / last"),
            Line::from(""),
            section(" player"),
            help_row(p, "space", "toggle pause/play"),
            help_row(p, "n / p", "next / previous unlocked song"),
            help_row(p, ", / .", "seek ±10s (Shift = ±60s)"),
            help_row(p, "- / +", "volume down / up"),
            help_row(p, "esc", "close player (pauses)"),
            Line::from(""),
            section(" wallet & ui"),
            help_row(p, "c", "connect wallet"),
            help_row(p, "r", "reload catalog and unlocks"),
            help_row(p, "y", "copy account address"),
            help_row(p, "x", "dismiss error banner"),
            help_row(p, "t", "toggle light / dark theme"),
            help_row(p, "K", "toggle keys bar"),
            help_row(p, "?", "toggle this help overlay"),
            help_row(p, "q / Ctrl+C", "quit"),
            Line::from(""),
            Line::from(Span::styled(
                " press ? or esc to close",
                Style::default().fg(p.muted),
            )),
        ];

        let popup = centered_rect(64, help_lines.len() as u16 + 2, area);
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(help_lines)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(p.style_unfocused_border())
                        .style(Style::default().bg(p.popup_bg)),
                )
                .wrap(Wrap { trim: false }),
            popup,
        );
    }
}

fn help_row<'a>(p: &Palette, key: &'a str, desc: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::raw(" "),
        Span::styled(
            format!("{:<22}", key),
            Style::default().fg(p.primary).add_modifier(Modifier::BOLD),
        ),
        Span::styled(desc, Style::default().fg(p.secondary)),
    ])
}

pub fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vert[1])[1]
}
