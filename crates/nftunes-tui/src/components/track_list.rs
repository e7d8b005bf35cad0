//! TrackList component: the All Songs / My Songs pane.
//!
//! Rows come straight from the render projection held in `AppState`; this
//! component only owns the selection, the scroll position and the search bar.

use std::time::Instant;

use nftunes_core::playback::PlayerStatus;
use nftunes_core::projection::{DisplayItem, TrackAction, TrackStatus};
use nftunes_core::track::TrackId;
use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
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
    theme::Palette,
    widgets::{
        filter_input::{FilterAction, FilterInput},
        pane_chrome::{pane_chrome, Badge},
        scrollable_list::ScrollableList,
        text::{fit, pad},
    },
};

const STATUS_W: usize = 10;
const ACTION_W: usize = 20;

pub struct TrackList {
    pub list: ScrollableList<DisplayItem>,
    pub filter_input: FilterInput,
    /// Where the rows were last drawn, for mouse hit-testing.
    rows_area: Rect,
    last_click: Option<(usize, Instant)>,
}

impl TrackList {
    pub fn new() -> Self {
        Self {
            list: ScrollableList::new(),
            filter_input: FilterInput::default(),
            rows_area: Rect::default(),
            last_click: None,
        }
    }

    /// Pull the active view's rows out of `state`, keeping the selection on
    /// the same track when it is still listed.
    pub fn sync(&mut self, state: &AppState) {
        self.list
            .set_items_keeping(state.items().to_vec(), |a, b| a.id == b.id);
    }

    pub fn select_track(&mut self, id: TrackId) -> bool {
        self.list.select_where(|item| item.id == id)
    }

    pub fn selected_id(&self) -> Option<TrackId> {
        self.list.selected_item().map(|item| item.id)
    }

    fn activate_selected(&self) -> Vec<Action> {
        match self.selected_id() {
            Some(id) => vec![Action::Activate(id)],
            None => vec![],
        }
    }

    fn row_line<'a>(
        item: &'a DisplayItem,
        width: usize,
        selected: bool,
        focused: bool,
        state: &AppState,
    ) -> Line<'a> {
        let p = state.palette();
        let player = &state.snapshot.player;
        let marker = if player.current == Some(item.id) {
            match player.status {
                PlayerStatus::Paused => "❚❚",
                _ => "▶ ",
            }
        } else {
            "  "
        };

        let rest = width.saturating_sub(2 + 1 + STATUS_W + ACTION_W);
        let title_w = rest * 55 / 100;
        let artist_w = rest - title_w;

        let (status_color, action_color) = match item.status {
            TrackStatus::Unlocked => (p.unlocked, p.playing),
            TrackStatus::Locked => (p.locked, p.price),
        };
        let base = if selected && focused {
            p.style_selected_focused()
        } else if selected {
            p.style_selected()
        } else {
            p.style_default()
        };

        Line::from(vec![
            Span::styled(marker, base.fg(p.playing)),
            Span::styled(pad(&item.title, title_w), base),
            Span::styled(pad(&item.artist, artist_w), base.fg(p.secondary)),
            Span::styled(pad(item.status.label(), STATUS_W), base.fg(status_color)),
            Span::styled(" ", base),
            Span::styled(
                pad(&item.action.label(), ACTION_W),
                base.fg(action_color).add_modifier(Modifier::BOLD),
            ),
        ])
    }

    fn detail_line(&self, width: usize, state: &AppState, p: &Palette) -> Line<'static> {
        let Some(item) = self.list.selected_item() else {
            return Line::default();
        };
        let price = match &item.action {
            TrackAction::Unlock { price } => price.format_ether(),
            TrackAction::Play => state
                .snapshot
                .track(item.id)
                .map(|t| t.price.format_ether())
                .unwrap_or_default(),
        };
        let text = format!(" {} · {} ETH · {}", item.artist, price, item.image);
        Line::from(Span::styled(fit(&text, width), Style::default().fg(p.muted)))
    }
}

impl Component for TrackList {
    fn id(&self) -> ComponentId {
        ComponentId::TrackList
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }

        if self.filter_input.is_active() {
            match key.code {
                KeyCode::Up => {
                    self.list.select_up(1);
                    return vec![];
                }
                KeyCode::Down => {
                    self.list.select_down(1);
                    return vec![];
                }
                _ => {}
            }
            return match self.filter_input.handle_key(key) {
                FilterAction::Changed(q) => vec![Action::FilterChanged(q)],
                FilterAction::Confirmed | FilterAction::Cancelled => vec![Action::CloseFilter],
                FilterAction::None => vec![],
            };
        }

        let step = if key.modifiers.contains(KeyModifiers::SHIFT) {
            5
        } else {
            1
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.list.select_up(step),
            KeyCode::Down | KeyCode::Char('j') => self.list.select_down(step),
            KeyCode::PageUp => self.list.select_up(10),
            KeyCode::PageDown => self.list.select_down(10),
            KeyCode::Home | KeyCode::Char('g') => self.list.select_first(),
            KeyCode::End | KeyCode::Char('G') => self.list.select_last(),
            KeyCode::Enter => return self.activate_selected(),
            KeyCode::Char('/') => return vec![Action::OpenFilter],
            _ => {}
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        let area = self.rows_area;
        match event.kind {
            MouseEventKind::ScrollUp => self.list.select_up(1),
            MouseEventKind::ScrollDown => self.list.select_down(1),
            MouseEventKind::Down(MouseButton::Left) => {
                if event.row < area.y || event.row >= area.y + area.height {
                    return vec![];
                }
                let rel_row = (event.row - area.y) as usize;
                let now = Instant::now();
                let is_double = self
                    .last_click
                    .map(|(row, t)| row == rel_row && t.elapsed().as_millis() < 400)
                    .unwrap_or(false);
                if self.list.handle_click(rel_row) && is_double {
                    self.last_click = None;
                    return self.activate_selected();
                }
                self.last_click = Some((rel_row, now));
            }
            _ => {}
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        match action {
            Action::OpenFilter => self.filter_input.activate(),
            Action::CloseFilter => self.filter_input.deactivate(),
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let p = state.palette();
        let count = self.list.len().to_string();
        let title = state.view.title();
        let block = pane_chrome(
            title,
            None,
            focused,
            Some(Badge {
                text: &count,
                color: p.secondary,
            }),
            p,
        );
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height == 0 || inner.width == 0 {
            self.rows_area = Rect::default();
            return;
        }

        let show_filter = self.filter_input.is_active() || !state.search.is_empty();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(if show_filter { 1 } else { 0 }),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(inner);
        let (filter_area, rows_area, detail_area) = (chunks[0], chunks[1], chunks[2]);

        if show_filter {
            self.filter_input.draw(frame, filter_area, p);
        }
        self.rows_area = rows_area;

        if let Some(msg) = state.placeholder() {
            let placeholder = Paragraph::new(Line::from(Span::styled(
                msg,
                Style::default().fg(p.muted),
            )))
            .centered();
            let mid = Rect {
                y: rows_area.y + rows_area.height / 2,
                height: rows_area.height.min(1),
                ..rows_area
            };
            frame.render_widget(placeholder, mid);
            return;
        }

        let height = rows_area.height as usize;
        self.list.ensure_visible(height);
        let width = rows_area.width as usize;
        let lines: Vec<Line> = self
            .list
            .visible_items(height)
            .into_iter()
            .map(|(i, item)| Self::row_line(item, width, i == self.list.selected, focused, state))
            .collect();
        frame.render_widget(Paragraph::new(lines), rows_area);
        frame.render_widget(Paragraph::new(self.detail_line(width, state, p)), detail_area);
    }
}
