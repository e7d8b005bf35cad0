//! PurchaseModal: centered popup that walks through one purchase.
//!
//! Visible whenever the store's purchase state is not `Idle`; it owns the
//! keyboard for as long as it is open.

use nftunes_core::purchase::PurchaseState;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    components::help_overlay::centered_rect,
};

pub struct PurchaseModal;

impl PurchaseModal {
    pub fn new() -> Self {
        Self
    }

    pub fn is_open(state: &AppState) -> bool {
        state.snapshot.purchase.is_modal_open()
    }

    fn hint(purchase: &PurchaseState) -> &'static str {
        match purchase {
            PurchaseState::Idle => "",
            PurchaseState::Confirming { .. } => "enter/y confirm   esc/n cancel",
            PurchaseState::Submitting { .. } => "confirm the transaction in your wallet",
            PurchaseState::Settled { .. } => "enter/esc close",
            PurchaseState::Failed { .. } => "enter/r retry   esc close",
        }
    }
}

impl Component for PurchaseModal {
    fn id(&self) -> ComponentId {
        ComponentId::PurchaseModal
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        let confirm = matches!(key.code, KeyCode::Enter | KeyCode::Char('y'));
        let cancel = matches!(key.code, KeyCode::Esc | KeyCode::Char('n'));
        match &state.snapshot.purchase {
            PurchaseState::Idle | PurchaseState::Submitting { .. } => vec![],
            PurchaseState::Confirming { .. } if confirm => vec![Action::ConfirmPurchase],
            PurchaseState::Failed { .. }
                if confirm || key.code == KeyCode::Char('r') =>
            {
                vec![Action::ConfirmPurchase]
            }
            PurchaseState::Settled { .. } if confirm || cancel => vec![Action::CancelPurchase],
            _ if cancel => vec![Action::CancelPurchase],
            _ => vec![],
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        let purchase = &state.snapshot.purchase;
        let Some(pending) = purchase.pending() else {
            return;
        };
        let p = state.palette();

        let status_color = match purchase {
            PurchaseState::Settled { .. } => p.playing,
            PurchaseState::Failed { .. } => p.error,
            PurchaseState::Submitting { .. } => p.pending,
            _ => p.secondary,
        };

        let mut lines = vec![
            Line::from(Span::styled(
                " Unlock Song",
                Style::default().fg(p.primary).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled(" track  ", Style::default().fg(p.muted)),
                Span::styled(pending.title.clone(), Style::default().fg(p.primary)),
            ]),
            Line::from(vec![
                Span::styled(" price  ", Style::default().fg(p.muted)),
                Span::styled(
                    format!("{} ETH", pending.price.format_ether()),
                    Style::default().fg(p.price).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                format!(" {}", purchase.status_line()),
                Style::default().fg(status_color).add_modifier(Modifier::BOLD),
            )),
        ];
        match purchase {
            PurchaseState::Submitting { tx: Some(tx), .. } => {
                lines.push(Line::from(Span::styled(
                    format!(" tx {}", tx),
                    Style::default().fg(p.muted),
                )));
            }
            PurchaseState::Failed { reason, .. } => {
                lines.push(Line::from(Span::styled(
                    format!(" {}", reason),
                    Style::default().fg(p.error),
                )));
            }
            _ => {}
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", Self::hint(purchase)),
            Style::default().fg(p.muted),
        )));

        let popup = centered_rect(50, lines.len() as u16 + 2, area);
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(p.style_focused_border())
                        .style(Style::default().bg(p.popup_bg)),
                )
                .wrap(Wrap { trim: false }),
            popup,
        );
    }
}
