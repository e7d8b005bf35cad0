//! Status bar: bottom line with the input mode and keybindings.

use nftunes_core::projection::ViewKind;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::Palette;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    Filter,
    /// The purchase modal has the keyboard.
    Modal,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            InputMode::Normal => "NORMAL",
            InputMode::Filter => "SEARCH",
            InputMode::Modal => "PURCHASE",
        }
    }
}

pub fn keys_for(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Normal => {
            " ↑↓/jk select  Enter play/unlock  Tab view  / search  Space pause  n/p next/prev  ,/. seek  +/- vol  c connect  x dismiss  t theme  ? help  q quit"
        }
        InputMode::Filter => " type to search  Up/Down move  Enter keep  Esc clear+close",
        InputMode::Modal => " Enter/y confirm  Esc/n cancel",
    }
}

pub fn draw_keys_bar(
    frame: &mut Frame,
    area: Rect,
    mode: InputMode,
    view: ViewKind,
    palette: &Palette,
) {
    let label_color = match mode {
        InputMode::Normal => palette.secondary,
        InputMode::Filter => palette.filter_fg,
        InputMode::Modal => palette.accent,
    };
    let label = match mode {
        InputMode::Normal => view.title().to_uppercase(),
        _ => mode.label().to_string(),
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", label),
            Style::default().fg(label_color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(keys_for(mode), Style::default().fg(palette.muted)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}
