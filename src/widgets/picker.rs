use std::{cell::RefCell, sync::Arc};

use crossterm::event::{Event, KeyCode};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, HighlightSpacing, List, ListItem, ListState, Paragraph},
};

use mongomate::{
    browse::BrowseSettings,
    store::{DocumentStore, Namespace},
};

use crate::{
    env::{AppEvent, Toast, WidgetCtx},
    help,
    util::pad,
    widgets::{
        BrowserWidget, Widget, WidgetInner,
        error::ErrorPopup,
        input::{InputOutcome, TextInput},
        theme::Theme,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Level {
    Databases,
    Collections(String),
}

impl Level {
    fn title(&self) -> String {
        match self {
            Level::Databases => "Databases".to_string(),
            Level::Collections(database) => format!("{database} › Collections"),
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            Level::Databases => "databases",
            Level::Collections(_) => "collections",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum LoadingState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error(String),
}

#[derive(Debug, Default)]
struct PickerState {
    level: Option<Level>,
    loading_state: LoadingState,
    names: Vec<String>,
    filtered: Vec<usize>,
    list_state: ListState,
    filter: TextInput,
    // Selected again once the list it belongs to arrives.
    reselect: Option<String>,
    // Tags fetch results so a late list for a level we already left is dropped.
    request_seq: u64,
}

impl PickerState {
    fn apply_filter(&mut self) {
        let needle = self.filter.value().trim().to_lowercase();
        self.filtered = self
            .names
            .iter()
            .enumerate()
            .filter(|(_, name)| needle.is_empty() || name.to_lowercase().contains(&needle))
            .map(|(index, _)| index)
            .collect();
        let selected = match self.list_state.selected() {
            _ if self.filtered.is_empty() => None,
            Some(index) => Some(index.min(self.filtered.len() - 1)),
            None => Some(0),
        };
        self.list_state.select(selected);
    }

    fn selected_name(&self) -> Option<&str> {
        self.list_state
            .selected()
            .and_then(|index| self.filtered.get(index))
            .and_then(|index| self.names.get(*index))
            .map(String::as_str)
    }
}

struct NamesLoaded {
    request_id: u64,
    level: Level,
    result: Result<Vec<String>, String>,
}

/// Drills from databases into collections and opens a browser for the chosen one.
pub struct NamespacePicker {
    inner: WidgetInner,
    store: Arc<dyn DocumentStore>,
    settings: Arc<BrowseSettings>,
    state: RefCell<PickerState>,
}

impl NamespacePicker {
    const HELP: &'static [help::Entry] = &[
        help::Entry::new("⏎", "open", "Open selection"),
        help::Entry::new("j/k/↑/↓", "move", "Move selection"),
        help::Entry::new("/", "filter", "Filter names"),
        help::Entry::new("r", "refresh", "Reload names"),
        help::Entry::new("esc", "back", "Back / quit"),
        help::Entry::new("?", "help", "Show help"),
    ];
    const HELP_FILTER: &'static [help::Entry] = &[
        help::Entry::new("esc", "clear", "Clear filter"),
        help::Entry::new("⏎", "apply", "Apply filter"),
    ];

    pub fn new(store: Arc<dyn DocumentStore>, settings: Arc<BrowseSettings>) -> Self {
        Self {
            inner: WidgetInner::root(),
            store,
            settings,
            state: RefCell::new(PickerState::default()),
        }
    }

    fn load(&self, level: Level, ctx: &WidgetCtx) {
        let request_id = {
            let mut state = self.state.borrow_mut();
            state.request_seq += 1;
            if state.level.as_ref() != Some(&level) {
                state.names.clear();
                state.filtered.clear();
                state.filter.clear();
                state.list_state.select(None);
            }
            state.level = Some(level.clone());
            state.loading_state = LoadingState::Loading;
            state.request_seq
        };
        ctx.invalidate();

        let store = self.store.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let result = match &level {
                Level::Databases => store.list_databases().await,
                Level::Collections(database) => store.list_collections(database).await,
            };
            ctx.emit_self(NamesLoaded {
                request_id,
                level,
                result: result.map_err(|err| err.to_string()),
            });
        });
    }

    fn open_selected(&self, ctx: &WidgetCtx) {
        let (level, name) = {
            let state = self.state.borrow();
            match (state.level.clone(), state.selected_name()) {
                (Some(level), Some(name)) => (level, name.to_string()),
                _ => return,
            }
        };
        match level {
            Level::Databases => self.load(Level::Collections(name), ctx),
            Level::Collections(database) => {
                let namespace = Namespace::new(database, name);
                tracing::debug!(namespace = %namespace, "Opening collection");
                ctx.push_widget(Box::new(BrowserWidget::new(
                    self.store.clone(),
                    namespace,
                    self.settings.clone(),
                    self.inner.id(),
                )));
            }
        }
    }

    fn back(&self, ctx: &WidgetCtx) {
        let level = self.state.borrow().level.clone();
        match level {
            Some(Level::Collections(database)) => {
                self.state.borrow_mut().reselect = Some(database);
                self.load(Level::Databases, ctx);
            }
            _ => ctx.quit(),
        }
    }

    fn move_selection(&self, delta: isize) {
        let mut state = self.state.borrow_mut();
        let len = state.filtered.len();
        if len == 0 {
            return;
        }
        let current = state.list_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1) as usize;
        state.list_state.select(Some(next));
    }
}

impl Widget for NamespacePicker {
    fn inner(&self) -> &WidgetInner {
        &self.inner
    }

    fn start(&self, ctx: WidgetCtx) {
        self.load(Level::Databases, &ctx);
    }

    fn navigation_title(&self) -> Option<String> {
        self.state.borrow().level.as_ref().map(Level::title)
    }

    fn is_loading(&self) -> bool {
        self.state.borrow().loading_state == LoadingState::Loading
    }

    fn help(&self) -> Option<&[help::Entry]> {
        if self.state.borrow().filter.is_active() {
            Some(Self::HELP_FILTER)
        } else {
            Some(Self::HELP)
        }
    }

    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let list_area = if state.filter.is_active() {
            let layout = Layout::vertical([Constraint::Length(3), Constraint::Fill(1)]);
            let [filter_area, list_area] = area.layout(&layout);
            state.filter.render(frame, filter_area, "Filter", theme);
            list_area
        } else {
            area
        };

        let level = state.level.clone().unwrap_or(Level::Databases);
        let count = if state.filtered.len() == state.names.len() {
            format!("{} {}", state.names.len(), level.noun())
        } else {
            format!(
                "{} of {} {}",
                state.filtered.len(),
                state.names.len(),
                level.noun()
            )
        };
        let mut title = vec![Span::styled(
            level.title(),
            Style::default().fg(theme.text()),
        )];
        if !state.filter.value().is_empty() && !state.filter.is_active() {
            title.push(Span::styled(
                format!(" </{}>", state.filter.value()),
                Style::default().fg(theme.accent()),
            ));
        }
        let block = Block::bordered()
            .title_top(Line::from(title))
            .title_bottom(Line::styled(
                pad(count, 2),
                Style::default().fg(theme.text_muted()),
            ))
            .border_style(Style::default().fg(theme.border()))
            .style(Style::default().bg(theme.panel_bg_alt()).fg(theme.text()));

        match &state.loading_state {
            LoadingState::Loading if state.names.is_empty() => {
                let text = Paragraph::new(format!("Loading {}...", level.noun()))
                    .style(Style::default().fg(theme.warning()))
                    .block(block);
                frame.render_widget(text, list_area);
            }
            LoadingState::Error(message) if state.names.is_empty() => {
                let text = Paragraph::new(message.as_str())
                    .style(Style::default().fg(theme.error()))
                    .block(block);
                frame.render_widget(text, list_area);
            }
            _ => {
                let items: Vec<ListItem> = state
                    .filtered
                    .iter()
                    .filter_map(|index| state.names.get(*index))
                    .map(|name| ListItem::new(name.as_str()))
                    .collect();
                let list = List::new(items)
                    .block(block)
                    .highlight_spacing(HighlightSpacing::Always)
                    .highlight_symbol(">> ")
                    .highlight_style(
                        Style::default()
                            .bg(theme.selection_bg())
                            .fg(theme.selection_fg())
                            .add_modifier(Modifier::BOLD),
                    );
                frame.render_stateful_widget(list, list_area, &mut state.list_state);
            }
        }
    }

    fn on_self_event(&self, ctx: WidgetCtx, event: &AppEvent) {
        let Some(loaded) = event.payload::<NamesLoaded>() else {
            return;
        };
        let mut state = self.state.borrow_mut();
        if loaded.request_id != state.request_seq || state.level.as_ref() != Some(&loaded.level) {
            tracing::debug!(request_id = loaded.request_id, "Discarding stale name list");
            return;
        }
        match &loaded.result {
            Ok(names) => {
                state.names = names.clone();
                state.loading_state = LoadingState::Loaded;
                state.apply_filter();
                if let Some(name) = state.reselect.take()
                    && let Some(position) = state
                        .filtered
                        .iter()
                        .position(|index| state.names[*index] == name)
                {
                    state.list_state.select(Some(position));
                }
            }
            Err(message) => {
                state.loading_state = LoadingState::Error(message.clone());
                if state.names.is_empty() {
                    ctx.set_popup(Box::new(ErrorPopup::new(
                        "Connection error",
                        message.clone(),
                        self.inner.id(),
                    )));
                } else {
                    ctx.show_toast(Toast::error(message.clone()));
                }
            }
        }
        ctx.invalidate();
    }

    fn handle_event(&self, ctx: WidgetCtx, event: &Event) -> bool {
        {
            let mut state = self.state.borrow_mut();
            match state.filter.handle_event(event) {
                InputOutcome::Edited | InputOutcome::Submitted => {
                    state.apply_filter();
                    return true;
                }
                InputOutcome::Cancelled => {
                    state.filter.clear();
                    state.apply_filter();
                    return true;
                }
                InputOutcome::Ignored => {}
            }
        }

        let Some(key) = event.as_key_press_event() else {
            return false;
        };
        match key.code {
            KeyCode::Char('/') => {
                self.state.borrow_mut().filter.set_active(true);
            }
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => self.open_selected(&ctx),
            KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left => {
                let filtered = !self.state.borrow().filter.value().is_empty();
                if filtered && key.code == KeyCode::Esc {
                    let mut state = self.state.borrow_mut();
                    state.filter.clear();
                    state.apply_filter();
                } else {
                    self.back(&ctx);
                }
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::PageDown => self.move_selection(10),
            KeyCode::PageUp => self.move_selection(-10),
            KeyCode::Char('r') => {
                let level = self.state.borrow().level.clone();
                self.load(level.unwrap_or(Level::Databases), &ctx);
            }
            _ => return false,
        }
        ctx.invalidate();
        true
    }
}
