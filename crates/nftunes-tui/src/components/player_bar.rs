//! PlayerBar: the now-playing strip shown while the player popup is open.
//!
//! Row 1: status glyph, title, artist, status label, volume.
//! Row 2: progress bar with time labels; clicking it seeks.

use nftunes_core::playback::PlayerStatus;
use ratatui::crossterm::event::{KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    widgets::{pane_chrome::pane_chrome, progress_bar::draw_progress},
};

pub struct PlayerBar {
    progress_area: Rect,
}

impl PlayerBar {
    /// Rows including the border.
    pub const HEIGHT: u16 = 4;

    pub fn new() -> Self {
        Self {
            progress_area: Rect::default(),
        }
    }

    pub fn is_visible(state: &AppState) -> bool {
        state.snapshot.player.visible
    }

    fn glyph(status: &PlayerStatus) -> &'static str {
        match status {
            PlayerStatus::Playing => "▶",
            PlayerStatus::Paused => "❚❚",
            PlayerStatus::Loading => "…",
            PlayerStatus::Error(_) => "✗",
            PlayerStatus::Idle => "■",
        }
    }

    /// Seek target in percent for a click at `column`.
    fn percent_at(area: Rect, column: u16) -> Option<f64> {
        if area.width == 0 || column < area.x || column >= area.x + area.width {
            return None;
        }
        let rel = (column - area.x) as f64;
        Some((rel / area.width as f64 * 100.0).clamp(0.0, 100.0))
    }
}

impl Component for PlayerBar {
    fn id(&self) -> ComponentId {
        ComponentId::PlayerBar
    }

    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, state: &AppState) -> Vec<Action> {
        let area = self.progress_area;
        if state.snapshot.player.current.is_none() || event.row != area.y {
            return vec![];
        }
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => Self::percent_at(area, event.column)
                .map(|pct| vec![Action::SeekPercent(pct)])
                .unwrap_or_default(),
            MouseEventKind::ScrollUp => vec![Action::VolumeDelta(5)],
            MouseEventKind::ScrollDown => vec![Action::VolumeDelta(-5)],
            _ => vec![],
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let p = state.palette();
        let player = &state.snapshot.player;
        let block = pane_chrome("Now Playing", None, focused, None, p);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height == 0 {
            self.progress_area = Rect::default();
            return;
        }

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(inner);

        let (title, artist) = match state.snapshot.current_track() {
            Some(t) => (t.title.clone(), t.artist.clone()),
            None => ("Nothing playing".to_string(), String::new()),
        };
        let status_color = match player.status {
            PlayerStatus::Playing => p.playing,
            PlayerStatus::Loading => p.pending,
            PlayerStatus::Error(_) => p.error,
            _ => p.secondary,
        };
        let line = Line::from(vec![
            Span::styled(
                format!(" {} ", Self::glyph(&player.status)),
                Style::default().fg(status_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(title, Style::default().fg(p.primary).add_modifier(Modifier::BOLD)),
            Span::styled(format!("  {}", artist), Style::default().fg(p.secondary)),
            Span::styled(
                format!("  [{}]", player.status.label()),
                Style::default().fg(status_color),
            ),
        ]);
        let volume = Line::from(Span::styled(
            format!("vol {}% ", player.volume),
            Style::default().fg(p.muted),
        ))
        .right_aligned();
        frame.render_widget(Paragraph::new(line), rows[0]);
        frame.render_widget(Paragraph::new(volume), rows[0]);

        self.progress_area = rows[1];
        draw_progress(
            frame,
            rows[1],
            player.progress(),
            player.time_pos_secs,
            player.duration_secs,
            p,
        );
    }
}
