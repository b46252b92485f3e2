use std::borrow::Cow;

use crossterm::event::{Event, KeyCode};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Padding, Paragraph, Row, Table, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::{
    env::{WidgetCtx, WidgetId},
    util::{fill_bg, pad},
    widgets::{Popup, Widget, WidgetInner, theme::Theme},
};

#[derive(Clone, Debug)]
pub struct Entry {
    pub keys: Cow<'static, str>,
    pub short: Cow<'static, str>,
    pub long: Cow<'static, str>,
}

impl Entry {
    pub const fn new(keys: &'static str, short: &'static str, long: &'static str) -> Self {
        Self {
            keys: Cow::Borrowed(keys),
            short: Cow::Borrowed(short),
            long: Cow::Borrowed(long),
        }
    }
}

fn make_spans<'a>(entries: &'a [Entry], theme: &Theme) -> Vec<Span<'a>> {
    let mut spans: Vec<_> = entries
        .iter()
        .filter(|entry| !entry.keys.is_empty())
        .flat_map(|entry| {
            [
                Span::styled(
                    format!("[{}]", entry.keys),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
                Span::raw(entry.short.as_ref()),
                Span::styled(" • ", Style::default().fg(theme.border())),
            ]
        })
        .collect();
    // Drop the trailing separator
    spans.pop();
    spans
}

/// Rows the footer needs to show `entries` within `area`.
pub fn height(entries: &[Entry], area: Rect, theme: &Theme) -> u16 {
    let total_width: usize = make_spans(entries, theme)
        .iter()
        .map(|span| span.content.width())
        .sum();
    let available_width = (area.width as usize).max(1);
    total_width.div_ceil(available_width) as u16
}

pub fn render(entries: &[Entry], frame: &mut Frame, area: Rect, theme: &Theme) {
    let spans = make_spans(entries, theme);
    let footer = Paragraph::new(Line::from(spans))
        .style(Style::default().fg(theme.text_muted()))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, area);
}

/// Full key listing shown on `?`.
pub struct HelpPopup {
    inner: WidgetInner,
    entries: Vec<Entry>,
}

impl HelpPopup {
    pub fn new(entries: Vec<Entry>, parent: WidgetId) -> Self {
        Self {
            inner: WidgetInner::new(parent),
            entries,
        }
    }
}

impl Widget for HelpPopup {
    fn inner(&self) -> &WidgetInner {
        &self.inner
    }

    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        fill_bg(frame.buffer_mut(), area, theme.panel_bg());
        let title = Line::styled(
            pad("Help", 2),
            Style::default()
                .fg(theme.accent())
                .add_modifier(Modifier::BOLD),
        )
        .centered();
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(title)
            .border_style(Style::default().fg(theme.border()))
            .style(Style::default().bg(theme.panel_bg()).fg(theme.text()))
            .padding(Padding::new(2, 2, 1, 1));

        let key_style = Style::default()
            .fg(theme.accent_alt())
            .add_modifier(Modifier::BOLD);
        let rows: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| !entry.keys.is_empty())
            .map(|entry| {
                Row::new(vec![
                    Line::from(Span::styled(format!("[{}]", entry.keys), key_style)),
                    Line::from(Span::styled(
                        entry.long.as_ref(),
                        Style::default().fg(theme.text()),
                    )),
                ])
            })
            .collect();
        let table = Table::new(rows, [Constraint::Length(14), Constraint::Fill(1)])
            .block(block)
            .style(Style::default().fg(theme.text()));
        frame.render_widget(table, area);
    }

    fn handle_event(&self, ctx: WidgetCtx, event: &Event) -> bool {
        if let Some(key) = event.as_key_press_event()
            && matches!(
                key.code,
                KeyCode::Char('?') | KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')
            )
        {
            ctx.dismiss_popup();
            ctx.invalidate();
        }
        true
    }
}

impl Popup for HelpPopup {
    fn rect(&self, area: Rect) -> Rect {
        let height = (self.entries.len() as u16).saturating_add(4);
        crate::util::centered_rect(area, (area.width / 2).max(50), height)
    }
}
