//! Color palettes and style helpers.  Both themes share one set of roles so
//! components never branch on the theme themselves.

use nftunes_core::prefs::Theme;
use ratatui::style::{Color, Modifier, Style};

pub struct Palette {
    pub bg: Color,
    pub accent: Color,
    pub playing: Color,
    pub pending: Color,
    pub error: Color,
    pub muted: Color,
    pub secondary: Color,
    pub primary: Color,
    pub selection_bg: Color,
    pub border: Color,
    pub border_focused: Color,
    pub number_hint: Color,
    pub filter_bg: Color,
    pub filter_fg: Color,
    pub locked: Color,
    pub unlocked: Color,
    pub price: Color,
    pub popup_bg: Color,
    pub toast_info: Color,
    pub toast_success: Color,
    pub toast_warning: Color,
    pub toast_error: Color,
}

pub const DARK: Palette = Palette {
    bg: Color::Rgb(18, 18, 18),
    accent: Color::Rgb(255, 95, 95),
    playing: Color::Rgb(80, 200, 120),
    pending: Color::Rgb(255, 184, 80),
    error: Color::Rgb(255, 80, 80),
    muted: Color::Rgb(72, 72, 88),
    secondary: Color::Rgb(115, 115, 138),
    primary: Color::Rgb(210, 210, 225),
    selection_bg: Color::Rgb(28, 28, 40),
    border: Color::Rgb(40, 40, 52),
    border_focused: Color::Rgb(120, 100, 200),
    number_hint: Color::Rgb(90, 90, 115),
    filter_bg: Color::Rgb(20, 20, 32),
    filter_fg: Color::Rgb(255, 200, 80),
    locked: Color::Rgb(180, 120, 220),
    unlocked: Color::Rgb(80, 200, 120),
    price: Color::Rgb(80, 140, 200),
    popup_bg: Color::Rgb(18, 18, 26),
    toast_info: Color::Rgb(80, 160, 220),
    toast_success: Color::Rgb(80, 200, 120),
    toast_warning: Color::Rgb(255, 184, 80),
    toast_error: Color::Rgb(255, 95, 95),
};

pub const LIGHT: Palette = Palette {
    bg: Color::Rgb(246, 246, 242),
    accent: Color::Rgb(200, 50, 60),
    playing: Color::Rgb(30, 140, 70),
    pending: Color::Rgb(190, 120, 20),
    error: Color::Rgb(200, 40, 40),
    muted: Color::Rgb(150, 150, 160),
    secondary: Color::Rgb(95, 95, 115),
    primary: Color::Rgb(30, 30, 40),
    selection_bg: Color::Rgb(222, 222, 235),
    border: Color::Rgb(200, 200, 210),
    border_focused: Color::Rgb(110, 80, 190),
    number_hint: Color::Rgb(140, 140, 160),
    filter_bg: Color::Rgb(235, 235, 225),
    filter_fg: Color::Rgb(150, 90, 0),
    locked: Color::Rgb(130, 70, 170),
    unlocked: Color::Rgb(30, 140, 70),
    price: Color::Rgb(30, 90, 160),
    popup_bg: Color::Rgb(252, 252, 250),
    toast_info: Color::Rgb(30, 110, 180),
    toast_success: Color::Rgb(30, 140, 70),
    toast_warning: Color::Rgb(190, 120, 20),
    toast_error: Color::Rgb(200, 40, 40),
};

pub fn palette(theme: Theme) -> &'static Palette {
    match theme {
        Theme::Dark => &DARK,
        Theme::Light => &LIGHT,
    }
}

// ── Predefined styles ─────────────────────────────────────────────────────────

impl Palette {
    pub fn style_default(&self) -> Style {
        Style::default().fg(self.primary)
    }

    pub fn style_secondary(&self) -> Style {
        Style::default().fg(self.secondary)
    }

    pub fn style_muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn style_accent(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn style_playing(&self) -> Style {
        Style::default().fg(self.playing)
    }

    pub fn style_selected(&self) -> Style {
        Style::default().bg(self.selection_bg).fg(self.primary)
    }

    pub fn style_selected_focused(&self) -> Style {
        Style::default()
            .bg(self.selection_bg)
            .fg(self.primary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn style_focused_border(&self) -> Style {
        Style::default().fg(self.border_focused)
    }

    pub fn style_unfocused_border(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn style_filter(&self) -> Style {
        Style::default().fg(self.filter_fg).bg(self.filter_bg)
    }
}
