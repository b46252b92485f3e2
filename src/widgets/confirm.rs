use std::cell::Cell;

use crossterm::event::{Event, KeyCode};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Margin, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Paragraph, Wrap},
};

use crate::{
    env::{WidgetCtx, WidgetId},
    help,
    util::{centered_rect, fill_bg, pad},
    widgets::{Popup, Widget, WidgetInner, theme::Theme},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Selection {
    Confirm,
    Cancel,
}

/// Yes/no question. `on_answer` runs exactly once with the user's choice,
/// including when the popup is dismissed with `esc`.
pub struct ConfirmPopup {
    inner: WidgetInner,
    title: String,
    message: String,
    confirm_label: String,
    on_answer: Box<dyn Fn(bool) + Send + 'static>,
    selection: Cell<Selection>,
}

impl ConfirmPopup {
    const HELP: &'static [help::Entry] = &[
        help::Entry::new("tab/←/→", "move", "Move between actions"),
        help::Entry::new("⏎", "select", "Select action"),
        help::Entry::new("y", "confirm", "Confirm"),
        help::Entry::new("n/esc", "cancel", "Cancel"),
    ];

    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        confirm_label: impl Into<String>,
        on_answer: impl Fn(bool) + Send + 'static,
        parent: WidgetId,
    ) -> Self {
        Self {
            inner: WidgetInner::new(parent),
            title: title.into(),
            message: message.into(),
            confirm_label: confirm_label.into(),
            on_answer: Box::new(on_answer),
            selection: Cell::new(Selection::Cancel),
        }
    }

    fn answer(&self, ctx: &WidgetCtx, confirmed: bool) {
        (self.on_answer)(confirmed);
        ctx.dismiss_popup();
        ctx.invalidate();
    }
}

impl Widget for ConfirmPopup {
    fn inner(&self) -> &WidgetInner {
        &self.inner
    }

    fn help(&self) -> Option<&[help::Entry]> {
        Some(Self::HELP)
    }

    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        fill_bg(frame.buffer_mut(), area, theme.panel_bg());
        let title = Line::styled(
            pad(self.title.as_str(), 1),
            Style::default()
                .fg(theme.error())
                .add_modifier(Modifier::BOLD),
        )
        .centered();
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(title)
            .border_style(Style::default().fg(theme.error()))
            .style(Style::default().bg(theme.panel_bg()).fg(theme.text()));

        frame.render_widget(block.clone(), area);
        let inner = block.inner(area).inner(Margin::new(1, 1));
        let layout = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]);
        let [body_area, footer_area] = inner.layout(&layout);

        // `key=value` lines get a muted, bold key
        let mut lines: Vec<Line> = self
            .message
            .lines()
            .map(|line| match line.split_once('=') {
                Some((key, value)) => Line::from(vec![
                    Span::styled(
                        format!("{key}="),
                        Style::default()
                            .fg(theme.text_muted())
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(value.to_string(), Style::default().fg(theme.text())),
                ]),
                None => Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(theme.text()),
                )),
            })
            .collect();
        if lines.is_empty() {
            lines.push(Line::from(""));
        }
        let body = Paragraph::new(Text::from(lines))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(body, body_area);

        let confirm_style = if self.selection.get() == Selection::Confirm {
            Style::default()
                .bg(theme.error())
                .fg(theme.selection_fg())
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(theme.error())
                .add_modifier(Modifier::BOLD)
        };
        let cancel_style = if self.selection.get() == Selection::Cancel {
            Style::default()
                .bg(theme.selection_bg())
                .fg(theme.selection_fg())
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text())
        };
        let buttons = Line::from(vec![
            Span::styled(format!("[ {} ]", self.confirm_label), confirm_style),
            Span::raw("  "),
            Span::styled("[ Cancel ]", cancel_style),
        ]);
        frame.render_widget(
            Paragraph::new(buttons).alignment(Alignment::Center),
            footer_area,
        );
    }

    fn handle_event(&self, ctx: WidgetCtx, event: &Event) -> bool {
        let Some(key) = event.as_key_press_event() else {
            return true;
        };
        match key.code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
                let next = match self.selection.get() {
                    Selection::Confirm => Selection::Cancel,
                    Selection::Cancel => Selection::Confirm,
                };
                self.selection.set(next);
                ctx.invalidate();
            }
            KeyCode::Enter => self.answer(&ctx, self.selection.get() == Selection::Confirm),
            KeyCode::Char('y') | KeyCode::Char('Y') => self.answer(&ctx, true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.answer(&ctx, false),
            _ => {}
        }
        true
    }
}

impl Popup for ConfirmPopup {
    fn rect(&self, area: Rect) -> Rect {
        let width = ((area.width as f32 * 0.4) as u16).max(40);
        let height = (self.message.lines().count() as u16 + 6).max(7);
        centered_rect(area, width, height)
    }
}
