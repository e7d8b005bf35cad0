//! Header component: 2-row top bar.
//!
//! Row 1: app name, wallet status, network status, theme.
//! Row 2: catalog source, counts, connect/reconcile activity.
//!
//! Not focusable.

use nftunes_core::catalog::CatalogSource;
use ratatui::crossterm::event::KeyEvent;
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
};

pub struct Header;

impl Header {
    pub fn new() -> Self {
        Self
    }

    fn activity(state: &AppState) -> Option<&'static str> {
        let snap = &state.snapshot;
        if snap.connecting {
            Some("connecting wallet…")
        } else if snap.reconciling {
            Some("checking unlocks…")
        } else {
            None
        }
    }
}

impl Component for Header {
    fn id(&self) -> ComponentId {
        ComponentId::Header
    }

    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        if area.height == 0 {
            return;
        }
        let p = state.palette();
        let snap = &state.snapshot;
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(area);

        let wallet_style = if snap.session.is_connected() {
            Style::default().fg(p.playing)
        } else {
            Style::default().fg(p.secondary)
        };
        let network_style = if snap.session.chain_id.is_some() && !snap.session.is_correct_network()
        {
            Style::default().fg(p.error).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(p.secondary)
        };

        let left = Line::from(vec![
            Span::styled(
                " ♫ nftunes ",
                Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
            ),
            Span::styled("│ ", Style::default().fg(p.border)),
            Span::styled(snap.session.wallet_label(), wallet_style),
            Span::styled("  │ ", Style::default().fg(p.border)),
            Span::styled(snap.session.network_label(), network_style),
        ]);
        let theme = Line::from(Span::styled(
            format!("{} ", snap.theme.label()),
            Style::default().fg(p.muted),
        ))
        .right_aligned();

        frame.render_widget(Paragraph::new(left), rows[0]);
        frame.render_widget(Paragraph::new(theme), rows[0]);

        if rows[1].height == 0 {
            return;
        }
        let source_color = match snap.source {
            CatalogSource::Chain => p.playing,
            CatalogSource::Bundled => p.pending,
        };
        let mut spans = vec![
            Span::raw(" "),
            Span::styled(
                snap.source.label().to_uppercase(),
                Style::default().fg(source_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(
                    "  {} songs · {} unlocked",
                    snap.tracks.len(),
                    snap.unlocked_ids().len()
                ),
                Style::default().fg(p.secondary),
            ),
        ];
        if let Some(busy) = Self::activity(state) {
            spans.push(Span::styled(
                format!("  {}", busy),
                Style::default().fg(p.pending),
            ));
        }
        if !snap.session.is_connected() && !snap.connecting {
            spans.push(Span::styled(
                "  press c to connect",
                Style::default().fg(p.muted),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), rows[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nftunes_core::state::StoreSnapshot;

    #[test]
    fn test_activity_prefers_connecting() {
        let mut s = AppState::new(StoreSnapshot::default());
        assert_eq!(Header::activity(&s), None);
        s.snapshot.reconciling = true;
        assert_eq!(Header::activity(&s), Some("checking unlocks…"));
        s.snapshot.connecting = true;
        assert_eq!(Header::activity(&s), Some("connecting wallet…"));
    }
}
