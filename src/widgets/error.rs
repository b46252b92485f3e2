use crossterm::event::{Event, KeyCode};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Margin, Rect},
    style::{Modifier, Style},
    text::Line,
    widgets::{Block, BorderType, Paragraph, Wrap},
};

use crate::{
    env::{WidgetCtx, WidgetId},
    util::{centered_rect, fill_bg, pad},
    widgets::{Popup, Widget, WidgetInner, theme::Theme},
};

pub struct ErrorPopup {
    inner: WidgetInner,
    title: String,
    message: String,
}

impl ErrorPopup {
    pub fn new(title: impl Into<String>, message: impl Into<String>, parent: WidgetId) -> Self {
        Self {
            inner: WidgetInner::new(parent),
            title: title.into(),
            message: message.into(),
        }
    }
}

impl Widget for ErrorPopup {
    fn inner(&self) -> &WidgetInner {
        &self.inner
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
        let layout = Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]);
        let [message_area, button_area] = inner.layout(&layout);
        let message = Paragraph::new(self.message.as_str())
            .style(Style::default().fg(theme.text()))
            .wrap(Wrap { trim: true });
        frame.render_widget(message, message_area);
        let button = Paragraph::new(Line::styled(
            "[ OK ]",
            Style::default()
                .bg(theme.selection_bg())
                .fg(theme.selection_fg())
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center);
        frame.render_widget(button, button_area);
    }

    fn handle_event(&self, ctx: WidgetCtx, event: &Event) -> bool {
        if let Some(key) = event.as_key_press_event()
            && matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q'))
        {
            ctx.dismiss_popup();
            ctx.invalidate();
        }
        true
    }
}

impl Popup for ErrorPopup {
    fn rect(&self, area: Rect) -> Rect {
        let width = (area.width / 2).max(40);
        let text_width = width.saturating_sub(6).max(1) as usize;
        let lines: usize = self
            .message
            .lines()
            .map(|line| line.chars().count().div_ceil(text_width).max(1))
            .sum();
        let height = (lines as u16).saturating_add(6).max(7);
        centered_rect(area, width, height)
    }
}
