use crossterm::event::{Event, KeyCode, KeyModifiers};
use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    widgets::{Block, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use crate::widgets::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Text or cursor changed.
    Edited,
    Submitted,
    Cancelled,
    Ignored,
}

/// Single-line text input. The cursor is a char index.
#[derive(Debug, Default)]
pub struct TextInput {
    value: String,
    cursor: usize,
    active: bool,
}

impl TextInput {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if active {
            self.cursor = self.value.chars().count();
        }
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    fn byte_index(&self, cursor: usize) -> usize {
        self.value
            .char_indices()
            .nth(cursor)
            .map_or(self.value.len(), |(index, _)| index)
    }

    pub fn handle_event(&mut self, event: &Event) -> InputOutcome {
        if !self.active {
            return InputOutcome::Ignored;
        }
        let Some(key) = event.as_key_press_event() else {
            return InputOutcome::Ignored;
        };
        let len = self.value.chars().count();
        match key.code {
            KeyCode::Esc => {
                self.active = false;
                return InputOutcome::Cancelled;
            }
            KeyCode::Enter => {
                self.active = false;
                return InputOutcome::Submitted;
            }
            KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.cursor = 0;
            }
            KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.cursor = len;
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.clear();
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    let index = self.byte_index(self.cursor - 1);
                    self.value.remove(index);
                    self.cursor -= 1;
                }
            }
            KeyCode::Delete => {
                if self.cursor < len {
                    let index = self.byte_index(self.cursor);
                    self.value.remove(index);
                }
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(len),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = len,
            KeyCode::Char(c) => {
                let index = self.byte_index(self.cursor);
                self.value.insert(index, c);
                self.cursor += 1;
            }
            _ => return InputOutcome::Ignored,
        }
        InputOutcome::Edited
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, title: &str, theme: &Theme) {
        let block = Block::bordered()
            .title(title)
            .style(Style::default().bg(theme.panel_bg_alt()).fg(theme.text()))
            .border_style(Style::default().fg(theme.accent()));
        frame.render_widget(Paragraph::new(self.value.as_str()).block(block), area);

        let before = &self.value[..self.byte_index(self.cursor)];
        let offset = (before.width() as u16).min(area.width.saturating_sub(3));
        frame.set_cursor_position((area.x + offset + 1, area.y + 1));
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyEvent, KeyEventKind, KeyEventState};

    use super::*;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn typed(input: &mut TextInput, text: &str) {
        for c in text.chars() {
            input.handle_event(&key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn inactive_input_ignores_keys() {
        let mut input = TextInput::default();
        assert_eq!(
            input.handle_event(&key(KeyCode::Char('x'))),
            InputOutcome::Ignored
        );
        assert_eq!(input.value(), "");
    }

    #[test]
    fn editing_handles_multibyte_text() {
        let mut input = TextInput::default();
        input.set_active(true);
        typed(&mut input, "año");
        input.handle_event(&key(KeyCode::Left));
        input.handle_event(&key(KeyCode::Backspace));
        assert_eq!(input.value(), "ao");
        typed(&mut input, "ñ");
        assert_eq!(input.value(), "año");
    }

    #[test]
    fn enter_submits_and_deactivates() {
        let mut input = TextInput::default();
        input.set_active(true);
        typed(&mut input, "a = 1");
        assert_eq!(
            input.handle_event(&key(KeyCode::Enter)),
            InputOutcome::Submitted
        );
        assert!(!input.is_active());
        assert_eq!(input.value(), "a = 1");
    }
}
