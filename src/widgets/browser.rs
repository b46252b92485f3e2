use std::{cell::RefCell, ops::Range, sync::Arc};

use crossterm::event::{Event, KeyCode};
use humansize::{BINARY, format_size};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Cell, HighlightSpacing, Paragraph, Row, Table, TableState, Wrap},
};
use unicode_width::UnicodeWidthStr;

use mongomate::{
    browse::{
        BrowseError, BrowseSettings, CollectionContext, Completion, Confirmation, DeleteOutcome,
        DocumentEditor, EditOutcome, FieldEditor, FetchTicket, Identity, LoadState, Operation,
        PageSize, PageState, Pager, TablePage, TableRow,
    },
    store::{DocumentStore, Namespace},
};

use crate::{
    env::{AppEvent, Toast, WidgetCtx, WidgetId},
    help,
    util::{edit_in_external_editor, pad},
    widgets::{
        Widget, WidgetInner,
        confirm::ConfirmPopup,
        error::ErrorPopup,
        input::{InputOutcome, TextInput},
        theme::Theme,
    },
};

const MIN_COLUMN_WIDTH: u16 = 3;
const MAX_COLUMN_WIDTH: u16 = 40;
const COLUMN_SPACING: u16 = 1;

struct PageFetched {
    request_id: u64,
    result: Result<TablePage, BrowseError>,
}

struct FieldEditorOpened(Result<FieldEditor, BrowseError>);

struct DocumentEditorOpened(Result<DocumentEditor, BrowseError>);

struct DeleteAnswered {
    identity: Identity,
    confirmed: bool,
}

struct FieldCopied {
    field: String,
    result: Result<String, BrowseError>,
}

enum WriteOutcome {
    Edited(EditOutcome),
    Deleted(DeleteOutcome),
}

struct WriteFinished {
    operation: Operation,
    result: Result<WriteOutcome, BrowseError>,
}

#[derive(Debug)]
struct BrowserState {
    pager: Pager,
    filter: TextInput,
    table_state: TableState,
    column: usize,
    column_offset: usize,
    // Edit, delete or copy in flight; blocks other writes until it settles.
    busy: Option<String>,
}

impl BrowserState {
    fn selected_row(&self) -> Option<&TableRow> {
        let index = self.table_state.selected()?;
        self.pager.page().rows.get(index)
    }

    fn selected_column(&self) -> Option<&str> {
        self.pager.page().columns.get(self.column).map(String::as_str)
    }

    fn clamp_selection(&mut self) {
        let rows = self.pager.page().len();
        let selected = match self.table_state.selected() {
            _ if rows == 0 => None,
            Some(index) => Some(index.min(rows - 1)),
            None => Some(0),
        };
        self.table_state.select(selected);
        let columns = self.pager.page().columns.len();
        self.column = self.column.min(columns.saturating_sub(1));
    }
}

/// Paged, sortable grid over one collection with in-place editing.
pub struct BrowserWidget {
    inner: WidgetInner,
    context: CollectionContext,
    state: RefCell<BrowserState>,
}

impl BrowserWidget {
    const HELP: &'static [help::Entry] = &[
        help::Entry::new("/", "filter", "Edit filter"),
        help::Entry::new("hjkl/←↓↑→", "move", "Move cell cursor"),
        help::Entry::new("n/p", "page", "Next / previous page"),
        help::Entry::new("s", "sort", "Sort by column (again to flip)"),
        help::Entry::new("z", "size", "Cycle page size"),
        help::Entry::new("e", "edit", "Edit field in $EDITOR"),
        help::Entry::new("E", "edit doc", "Edit document in $EDITOR"),
        help::Entry::new("d", "delete", "Delete document"),
        help::Entry::new("y", "copy", "Copy full field value"),
        help::Entry::new("r", "reload", "Reload page"),
        help::Entry::new("esc", "back", "Cancel loading / back"),
        help::Entry::new("?", "help", "Show help"),
    ];
    const HELP_FILTER: &'static [help::Entry] = &[
        help::Entry::new("⏎", "apply", "Apply filter"),
        help::Entry::new("esc", "cancel", "Keep current filter"),
        help::Entry::new("^u", "clear", "Clear input"),
    ];

    pub fn new(
        store: Arc<dyn DocumentStore>,
        namespace: Namespace,
        settings: Arc<BrowseSettings>,
        parent: WidgetId,
    ) -> Self {
        let page_size = PageSize::new(settings.page_size).unwrap_or_default();
        Self {
            inner: WidgetInner::new(parent),
            context: CollectionContext::new(store, namespace, settings),
            state: RefCell::new(BrowserState {
                pager: Pager::new(PageState::new(page_size)),
                filter: TextInput::default(),
                table_state: TableState::default(),
                column: 0,
                column_offset: 0,
                busy: None,
            }),
        }
    }

    fn dispatch(&self, ticket: FetchTicket, ctx: &WidgetCtx) {
        ctx.invalidate();
        let context = self.context.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let result = context.fetch_page(&ticket.request).await;
            ctx.emit_self(PageFetched {
                request_id: ticket.request_id,
                result,
            });
        });
    }

    fn reload(&self, ctx: &WidgetCtx) {
        let ticket = self.state.borrow_mut().pager.load();
        self.dispatch(ticket, ctx);
    }

    fn apply_filter(&self, ctx: &WidgetCtx) {
        let text = self.state.borrow().filter.value().trim().to_string();
        match self.context.filter_predicate(&text) {
            Ok(predicate) => {
                tracing::debug!(filter = %text, predicate = %predicate, "Applying filter");
                let ticket = self.state.borrow_mut().pager.set_filter(text, predicate);
                self.dispatch(ticket, ctx);
            }
            Err(err) => {
                self.state.borrow_mut().pager.reject(err.clone());
                self.show_error(ctx, &err);
            }
        }
    }

    fn show_error(&self, ctx: &WidgetCtx, err: &BrowseError) {
        tracing::warn!(
            namespace = %self.context.namespace(),
            kind = %err.kind(),
            error = %err,
            "Operation failed"
        );
        match err {
            BrowseError::AtFirstPage => ctx.show_toast(Toast::info(err.to_string())),
            err if err.is_fatal() => ctx.set_popup(Box::new(ErrorPopup::new(
                err.kind().to_string(),
                err.to_string(),
                self.inner.id(),
            ))),
            err => ctx.show_toast(Toast::error(err.to_string())),
        }
        ctx.invalidate();
    }

    /// Marks the widget busy unless another write is already running.
    fn begin_busy(&self, ctx: &WidgetCtx, message: impl Into<String>) -> bool {
        let mut state = self.state.borrow_mut();
        if let Some(current) = state.busy.as_ref() {
            ctx.show_toast(Toast::warning(format!("Busy: {current}")));
            return false;
        }
        state.busy = Some(message.into());
        ctx.invalidate();
        true
    }

    fn end_busy(&self) {
        self.state.borrow_mut().busy = None;
    }

    fn selection(&self) -> Option<(TableRow, String)> {
        let state = self.state.borrow();
        let row = state.selected_row()?.clone();
        let column = state.selected_column()?.to_string();
        Some((row, column))
    }

    fn open_field_editor(&self, ctx: &WidgetCtx) {
        let Some((row, field)) = self.selection() else {
            return;
        };
        let cell = self
            .state
            .borrow()
            .pager
            .page()
            .cell(&row.key, &field)
            .cloned()
            .unwrap_or_default();
        if !self.begin_busy(ctx, format!("loading {field}")) {
            return;
        }
        let context = self.context.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let result = context
                .open_field_editor(&row.identity, &field, &cell)
                .await;
            ctx.emit_self(FieldEditorOpened(result));
        });
    }

    fn open_document_editor(&self, ctx: &WidgetCtx) {
        let Some((row, _)) = self.selection() else {
            return;
        };
        if !self.begin_busy(ctx, "loading document") {
            return;
        }
        let context = self.context.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let result = context.open_document_editor(&row.identity).await;
            ctx.emit_self(DocumentEditorOpened(result));
        });
    }

    fn edit_field(&self, editor: FieldEditor, ctx: &WidgetCtx) {
        if let Some(warning) = editor.warning.as_ref() {
            ctx.show_toast(Toast::warning(warning.clone()));
        }
        let extension = if editor.structured { "json" } else { "txt" };
        let edited = edit_in_external_editor(&editor.text, extension);
        ctx.force_redraw();
        let text = match edited {
            Ok(text) => strip_final_newline(text),
            Err(message) => {
                self.end_busy();
                ctx.show_toast(Toast::error(message));
                return;
            }
        };
        if text == editor.text {
            self.end_busy();
            ctx.show_toast(Toast::info(format!("{} unchanged", editor.field)));
            return;
        }

        let context = self.context.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let result = context.submit_field_edit(&editor, &text).await;
            if let Err(err @ BrowseError::EditValidation { .. }) = &result {
                // Reopen with what was typed so nothing is lost.
                ctx.emit_self(FieldEditorOpened(Ok(FieldEditor {
                    text,
                    warning: Some(err.to_string()),
                    ..editor
                })));
                return;
            }
            ctx.emit_self(WriteFinished {
                operation: Operation::Update,
                result: result.map(WriteOutcome::Edited),
            });
        });
    }

    fn edit_document(&self, editor: DocumentEditor, ctx: &WidgetCtx) {
        let edited = edit_in_external_editor(&editor.text, "json");
        ctx.force_redraw();
        let text = match edited {
            Ok(text) => text,
            Err(message) => {
                self.end_busy();
                ctx.show_toast(Toast::error(message));
                return;
            }
        };
        if text.trim() == editor.text.trim() {
            self.end_busy();
            ctx.show_toast(Toast::info("Document unchanged"));
            return;
        }

        let context = self.context.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let result = context.submit_document_replace(&editor, &text).await;
            if let Err(err) = &result
                && matches!(err, BrowseError::EditValidation { .. })
            {
                ctx.show_toast(Toast::error(err.to_string()));
                ctx.emit_self(DocumentEditorOpened(Ok(DocumentEditor { text, ..editor })));
                return;
            }
            ctx.emit_self(WriteFinished {
                operation: Operation::Replace,
                result: result.map(WriteOutcome::Edited),
            });
        });
    }

    fn confirm_delete(&self, ctx: &WidgetCtx) {
        let Some((row, _)) = self.selection() else {
            return;
        };
        let message = format!(
            "Collection={}\nId={}",
            self.context.namespace(),
            row.identity.display_id
        );
        let answer_ctx = ctx.clone();
        let target = self.inner.id();
        let identity = row.identity;
        ctx.set_popup(Box::new(ConfirmPopup::new(
            "Delete document",
            message,
            "Delete",
            move |confirmed| {
                answer_ctx.emit_to(
                    target,
                    DeleteAnswered {
                        identity: identity.clone(),
                        confirmed,
                    },
                );
            },
            self.inner.id(),
        )));
    }

    fn delete(&self, identity: Identity, confirmed: bool, ctx: &WidgetCtx) {
        let confirmation = if confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Declined
        };
        if !self.begin_busy(ctx, "deleting") {
            return;
        }
        let context = self.context.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let result = context.delete_document(&identity, confirmation).await;
            ctx.emit_self(WriteFinished {
                operation: Operation::Delete,
                result: result.map(WriteOutcome::Deleted),
            });
        });
    }

    fn copy_field(&self, ctx: &WidgetCtx) {
        let Some((row, field)) = self.selection() else {
            return;
        };
        if !self.begin_busy(ctx, format!("copying {field}")) {
            return;
        }
        let context = self.context.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let result = context.field_text(&row.identity, &field).await;
            ctx.emit_self(FieldCopied { field, result });
        });
    }

    fn write_finished(&self, finished: &WriteFinished, ctx: &WidgetCtx) {
        self.end_busy();
        let reload = match &finished.result {
            Ok(WriteOutcome::Edited(EditOutcome::Updated)) => {
                ctx.show_toast(Toast::info("Document updated"));
                true
            }
            Ok(WriteOutcome::Edited(EditOutcome::Unchanged)) => {
                ctx.show_toast(Toast::info("Document already had that value"));
                true
            }
            Ok(WriteOutcome::Deleted(DeleteOutcome::Deleted)) => {
                ctx.show_toast(Toast::info("Document deleted"));
                true
            }
            Ok(WriteOutcome::Deleted(DeleteOutcome::Cancelled)) => false,
            Err(err) => {
                self.show_error(ctx, err);
                matches!(err, BrowseError::NotFound { .. })
            }
        };
        tracing::debug!(operation = %finished.operation, reload, "Write settled");
        if reload {
            self.reload(ctx);
        }
    }

    fn page_fetched(&self, fetched: &PageFetched, ctx: &WidgetCtx) {
        let completion = {
            let mut state = self.state.borrow_mut();
            let completion = state
                .pager
                .complete(fetched.request_id, fetched.result.clone());
            if completion == Completion::Applied {
                state.clamp_selection();
            }
            completion
        };
        if let Completion::Failed(err) = completion {
            self.show_error(ctx, &err);
        }
        ctx.invalidate();
    }

    fn move_row(&self, delta: isize) {
        let mut state = self.state.borrow_mut();
        let len = state.pager.page().len();
        if len == 0 {
            return;
        }
        let current = state.table_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1) as usize;
        state.table_state.select(Some(next));
    }

    fn move_column(&self, delta: isize) {
        let mut state = self.state.borrow_mut();
        let len = state.pager.page().columns.len();
        if len == 0 {
            return;
        }
        let next = (state.column as isize + delta).clamp(0, len as isize - 1);
        state.column = next as usize;
    }

    fn handle_key(&self, ctx: &WidgetCtx, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('/') => {
                let mut state = self.state.borrow_mut();
                let current = state.pager.state().filter_text.clone();
                state.filter.set_value(current);
                state.filter.set_active(true);
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_row(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_row(-1),
            KeyCode::Char('h') | KeyCode::Left => self.move_column(-1),
            KeyCode::Char('l') | KeyCode::Right => self.move_column(1),
            KeyCode::Home => self.state.borrow_mut().column = 0,
            KeyCode::End => self.move_column(isize::MAX / 2),
            KeyCode::Char('n') | KeyCode::PageDown => {
                let ticket = self.state.borrow_mut().pager.next_page();
                self.dispatch(ticket, ctx);
            }
            KeyCode::Char('p') | KeyCode::PageUp => {
                let ticket = self.state.borrow_mut().pager.prev_page();
                match ticket {
                    Ok(ticket) => self.dispatch(ticket, ctx),
                    Err(err) => self.show_error(ctx, &err),
                }
            }
            KeyCode::Char('s') => {
                let column = self.state.borrow().selected_column().map(str::to_string);
                if let Some(column) = column {
                    let ticket = self.state.borrow_mut().pager.toggle_sort(&column);
                    self.dispatch(ticket, ctx);
                }
            }
            KeyCode::Char('z') => {
                let ticket = self.state.borrow_mut().pager.cycle_page_size();
                self.dispatch(ticket, ctx);
            }
            KeyCode::Char('r') => self.reload(ctx),
            KeyCode::Char('e') => self.open_field_editor(ctx),
            KeyCode::Char('E') => self.open_document_editor(ctx),
            KeyCode::Char('d') => self.confirm_delete(ctx),
            KeyCode::Char('y') => self.copy_field(ctx),
            KeyCode::Esc => {
                let loading = self.state.borrow().pager.is_loading();
                if loading {
                    self.state.borrow_mut().pager.cancel();
                    ctx.show_toast(Toast::info("Fetch cancelled"));
                } else {
                    ctx.pop_widget();
                }
            }
            _ => return false,
        }
        ctx.invalidate();
        true
    }

    fn render_table(&self, state: &mut BrowserState, frame: &mut Frame, area: Rect, theme: &Theme) {
        let page_state = state.pager.state().clone();
        let page = state.pager.page();
        let mut title = vec![Span::styled(
            self.context.namespace().to_string(),
            Style::default()
                .fg(theme.text())
                .add_modifier(Modifier::BOLD),
        )];
        if !page_state.filter_text.is_empty() {
            title.push(Span::styled(
                format!(" </{}>", page_state.filter_text),
                Style::default().fg(theme.accent()),
            ));
        }
        let mut status = vec![Span::styled(
            pad(page_summary(&page_state, page), 1),
            Style::default().fg(theme.text_muted()),
        )];
        match state.pager.load_state() {
            LoadState::Loading => status.push(Span::styled(
                pad("loading", 1),
                Style::default().fg(theme.warning()),
            )),
            LoadState::Error(err) => status.push(Span::styled(
                pad(err.kind().as_str(), 1),
                Style::default().fg(theme.error()),
            )),
            LoadState::Idle | LoadState::Loaded => {}
        }
        if let Some(busy) = state.busy.as_ref() {
            status.push(Span::styled(
                pad(busy, 1),
                Style::default().fg(theme.warning()),
            ));
        }
        let block = Block::bordered()
            .title_top(Line::from(title))
            .title_bottom(Line::from(status))
            .border_style(Style::default().fg(theme.border()))
            .style(Style::default().bg(theme.panel_bg_alt()).fg(theme.text()));

        if page.is_empty() {
            let (message, color) = match state.pager.load_state() {
                LoadState::Error(err) => (err.to_string(), theme.error()),
                LoadState::Loading | LoadState::Idle => {
                    ("Loading documents...".to_string(), theme.warning())
                }
                LoadState::Loaded if page_state.page_index > 0 => {
                    ("No documents on this page".to_string(), theme.text_muted())
                }
                LoadState::Loaded => ("No documents".to_string(), theme.text_muted()),
            };
            let text = Paragraph::new(message)
                .style(Style::default().fg(color))
                .wrap(Wrap { trim: true })
                .block(block);
            frame.render_widget(text, area);
            return;
        }

        let inner = block.inner(area);
        let widths = column_widths(page);
        // Leave room for the highlight symbol.
        let available = inner.width.saturating_sub(3);
        let (offset, visible) = visible_columns(&widths, state.column_offset, state.column, available);
        state.column_offset = offset;

        let cursor_style = Style::default().bg(theme.column_bg());
        let header = Row::new(visible.clone().map(|index| {
            let name = &page.columns[index];
            let label = match state.pager.sort_indicator(name) {
                Some(arrow) => format!("{name} {arrow}"),
                None => name.clone(),
            };
            let style = if index == state.column {
                Style::default()
                    .fg(theme.accent())
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
                    .fg(theme.text_muted())
                    .add_modifier(Modifier::BOLD)
            };
            Cell::from(label).style(style)
        }));
        let rows = page.rows.iter().map(|row| {
            Row::new(visible.clone().map(|index| {
                let cell = &row.cells[index];
                let mut style = Style::default();
                if cell.truncated {
                    style = style.fg(theme.text_muted());
                }
                if index == state.column {
                    style = style.patch(cursor_style);
                }
                Cell::from(cell.text.as_str()).style(style)
            }))
        });
        let constraints: Vec<Constraint> = visible
            .clone()
            .map(|index| Constraint::Length(widths[index]))
            .collect();
        let table = Table::new(rows, constraints)
            .header(header)
            .block(block)
            .column_spacing(COLUMN_SPACING)
            .highlight_spacing(HighlightSpacing::Always)
            .highlight_symbol(">> ")
            .row_highlight_style(
                Style::default()
                    .bg(theme.selection_bg())
                    .fg(theme.selection_fg()),
            );
        frame.render_stateful_widget(table, area, &mut state.table_state);
    }
}

impl Widget for BrowserWidget {
    fn inner(&self) -> &WidgetInner {
        &self.inner
    }

    fn start(&self, ctx: WidgetCtx) {
        self.reload(&ctx);
    }

    fn navigation_title(&self) -> Option<String> {
        Some(self.context.namespace().to_string())
    }

    fn is_loading(&self) -> bool {
        let state = self.state.borrow();
        state.pager.is_loading() || state.busy.is_some()
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
        let table_area = if state.filter.is_active() {
            let layout = Layout::vertical([Constraint::Length(3), Constraint::Fill(1)]);
            let [filter_area, table_area] = area.layout(&layout);
            state.filter.render(frame, filter_area, "Filter", theme);
            table_area
        } else {
            area
        };
        self.render_table(state, frame, table_area, theme);
    }

    fn on_self_event(&self, ctx: WidgetCtx, event: &AppEvent) {
        if let Some(fetched) = event.payload::<PageFetched>() {
            self.page_fetched(fetched, &ctx);
            return;
        }
        if let Some(FieldEditorOpened(result)) = event.payload::<FieldEditorOpened>() {
            match result {
                Ok(editor) => self.edit_field(editor.clone(), &ctx),
                Err(err) => {
                    self.end_busy();
                    self.show_error(&ctx, err);
                }
            }
            return;
        }
        if let Some(DocumentEditorOpened(result)) = event.payload::<DocumentEditorOpened>() {
            match result {
                Ok(editor) => self.edit_document(editor.clone(), &ctx),
                Err(err) => {
                    self.end_busy();
                    self.show_error(&ctx, err);
                }
            }
            return;
        }
        if let Some(answer) = event.payload::<DeleteAnswered>() {
            self.delete(answer.identity.clone(), answer.confirmed, &ctx);
            return;
        }
        if let Some(finished) = event.payload::<WriteFinished>() {
            self.write_finished(finished, &ctx);
            return;
        }
        if let Some(copied) = event.payload::<FieldCopied>() {
            self.end_busy();
            match &copied.result {
                Ok(text) => match copy_to_clipboard(text) {
                    Ok(()) => ctx.show_toast(Toast::info(format!(
                        "Copied {} ({} chars)",
                        copied.field,
                        text.chars().count()
                    ))),
                    Err(err) => ctx.show_toast(Toast::error(format!("Clipboard: {err}"))),
                },
                Err(err) => self.show_error(&ctx, err),
            }
            ctx.invalidate();
        }
    }

    fn handle_event(&self, ctx: WidgetCtx, event: &Event) -> bool {
        let outcome = self.state.borrow_mut().filter.handle_event(event);
        match outcome {
            InputOutcome::Edited => {
                ctx.invalidate();
                return true;
            }
            InputOutcome::Submitted => {
                self.apply_filter(&ctx);
                return true;
            }
            InputOutcome::Cancelled => {
                let mut state = self.state.borrow_mut();
                let current = state.pager.state().filter_text.clone();
                state.filter.set_value(current);
                ctx.invalidate();
                return true;
            }
            InputOutcome::Ignored => {}
        }
        match event.as_key_press_event() {
            Some(key) => self.handle_key(&ctx, key.code),
            None => false,
        }
    }
}

fn copy_to_clipboard(text: &str) -> Result<(), arboard::Error> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(text.to_string())
}

fn strip_final_newline(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

fn page_summary(state: &PageState, page: &TablePage) -> String {
    let size = state.page_size.get();
    let first = state.page_index * size;
    let rows = if page.is_empty() {
        "no rows".to_string()
    } else {
        format!("rows {}-{}", first + 1, first + page.len() as u64)
    };
    format!(
        "page {} · {rows} · {size}/page · {}",
        state.page_index + 1,
        format_size(page.size_bytes(), BINARY)
    )
}

/// Display width per column: the widest of header and cells, within bounds.
fn column_widths(page: &TablePage) -> Vec<u16> {
    page.columns
        .iter()
        .enumerate()
        .map(|(index, name)| {
            // Room for a sort arrow.
            let header = name.width() + 2;
            let widest = page
                .rows
                .iter()
                .map(|row| row.cells[index].text.width())
                .max()
                .unwrap_or(0);
            (header.max(widest) as u16).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// Scroll the column window so `cursor` is visible. Returns the new offset and
/// the visible column range.
fn visible_columns(
    widths: &[u16],
    offset: usize,
    cursor: usize,
    available: u16,
) -> (usize, Range<usize>) {
    if widths.is_empty() {
        return (0, 0..0);
    }
    let cursor = cursor.min(widths.len() - 1);
    let fits = |start: usize| -> usize {
        let mut used = 0u16;
        let mut end = start;
        while end < widths.len() {
            let needed = widths[end] + if end > start { COLUMN_SPACING } else { 0 };
            if end > start && used.saturating_add(needed) > available {
                break;
            }
            used = used.saturating_add(needed);
            end += 1;
        }
        end
    };
    let mut start = offset.min(cursor);
    while fits(start) <= cursor {
        start += 1;
    }
    (start, start..fits(start))
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use mongomate::browse::IdentityResolver;

    use super::*;

    #[test]
    fn widths_cover_header_and_cells_within_bounds() {
        let documents = vec![
            doc! { "_id": 1, "n": "x".repeat(100) },
            doc! { "_id": 2, "longer_name": 1 },
        ];
        let page = TablePage::build(documents, &IdentityResolver::default(), 150);
        assert_eq!(page.columns, vec!["_id", "longer_name", "n"]);
        assert_eq!(column_widths(&page), vec![5, 13, MAX_COLUMN_WIDTH]);
    }

    #[test]
    fn column_window_follows_cursor() {
        let widths = [10, 10, 10, 10];
        assert_eq!(visible_columns(&widths, 0, 0, 21), (0, 0..2));
        assert_eq!(visible_columns(&widths, 0, 2, 21), (1, 1..3));
        assert_eq!(visible_columns(&widths, 3, 1, 21), (1, 1..3));
        assert_eq!(visible_columns(&widths, 0, 3, 100), (0, 0..4));
    }

    #[test]
    fn oversized_column_is_still_shown() {
        assert_eq!(visible_columns(&[50, 5], 0, 0, 20), (0, 0..1));
        assert_eq!(visible_columns(&[], 3, 3, 20), (0, 0..0));
    }

    #[test]
    fn summary_reports_rows_on_the_page() {
        let documents = vec![doc! { "_id": 1 }, doc! { "_id": 2 }];
        let page = TablePage::build(documents, &IdentityResolver::default(), 150);
        let mut state = PageState::default();
        state.page_index = 2;
        let summary = page_summary(&state, &page);
        assert!(summary.starts_with("page 3 · rows 41-42 · 20/page · "));
    }

    #[test]
    fn editor_newline_is_stripped_once() {
        assert_eq!(strip_final_newline("42\n".to_string()), "42");
        assert_eq!(strip_final_newline("42\r\n".to_string()), "42");
        assert_eq!(strip_final_newline("a\n\n".to_string()), "a\n");
    }
}
