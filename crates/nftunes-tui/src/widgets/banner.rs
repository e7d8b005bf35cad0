//! Single-line error banner, dismissed with `x`.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::text::fit;
use crate::theme::Palette;

const HINT: &str = "  [x] dismiss ";

pub fn draw_banner(frame: &mut Frame, area: Rect, message: &str, palette: &Palette) {
    if area.height == 0 || area.width < 8 {
        return;
    }
    let room = (area.width as usize).saturating_sub(HINT.width() + 3);
    let line = Line::from(vec![
        Span::styled(
            " ✗ ",
            Style::default().fg(palette.error).add_modifier(Modifier::BOLD),
        ),
        Span::styled(fit(message, room), Style::default().fg(palette.error)),
        Span::styled(HINT, Style::default().fg(palette.muted)),
    ]);
    frame.render_widget(
        Paragraph::new(line).style(Style::default().bg(palette.selection_bg)),
        area,
    );
}
