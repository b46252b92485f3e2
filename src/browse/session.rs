use std::sync::Arc;

use super::collection::CollectionContext;
use super::edit::{Confirmation, DeleteOutcome, DocumentEditor, EditOutcome, FieldEditor};
use super::error::{BrowseError, Operation, Result};
use super::identity::RowKey;
use super::pager::{Completion, FetchTicket, PageSize, PageState, Pager};
use super::settings::BrowseSettings;
use super::table::{Cell, TablePage, TableRow};
use crate::store::{DocumentStore, Namespace};

/// One collection view driven as a sequence of awaited round trips.
///
/// Interactive front ends that keep several fetches in flight work with
/// [`CollectionContext`] and [`Pager`] directly; this type runs each transition
/// to completion before returning.
#[derive(Debug)]
pub struct BrowseSession {
    context: CollectionContext,
    pager: Pager,
}

impl BrowseSession {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        namespace: Namespace,
        settings: Arc<BrowseSettings>,
    ) -> Self {
        let page_size = PageSize::new(settings.page_size).unwrap_or_default();
        Self {
            context: CollectionContext::new(store, namespace, settings),
            pager: Pager::new(PageState::new(page_size)),
        }
    }

    pub fn context(&self) -> &CollectionContext {
        &self.context
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn state(&self) -> &PageState {
        self.pager.state()
    }

    pub fn page(&self) -> &TablePage {
        self.pager.page()
    }

    /// Switch to another collection, discarding page state, columns and quarantine.
    pub async fn set_collection(&mut self, namespace: Namespace) -> Result<&TablePage> {
        let store = self.context.store().clone();
        let settings = Arc::new(self.context.settings().clone());
        *self = Self::new(store, namespace, settings);
        self.load().await
    }

    pub async fn load(&mut self) -> Result<&TablePage> {
        let ticket = self.pager.load();
        self.run(ticket).await
    }

    pub async fn reload(&mut self) -> Result<&TablePage> {
        self.load().await
    }

    pub async fn next_page(&mut self) -> Result<&TablePage> {
        let ticket = self.pager.next_page();
        self.run(ticket).await
    }

    pub async fn prev_page(&mut self) -> Result<&TablePage> {
        let ticket = self.pager.prev_page()?;
        self.run(ticket).await
    }

    pub async fn set_page_size(&mut self, size: u64) -> Result<&TablePage> {
        let ticket = self.pager.set_page_size(size)?;
        self.run(ticket).await
    }

    pub async fn set_filter(&mut self, text: &str) -> Result<&TablePage> {
        let predicate = match self.context.filter_predicate(text) {
            Ok(predicate) => predicate,
            Err(err) => {
                self.pager.reject(err.clone());
                return Err(err);
            }
        };
        let ticket = self.pager.set_filter(text, predicate);
        self.run(ticket).await
    }

    pub async fn toggle_sort(&mut self, column: &str) -> Result<&TablePage> {
        let ticket = self.pager.toggle_sort(column);
        self.run(ticket).await
    }

    async fn run(&mut self, ticket: FetchTicket) -> Result<&TablePage> {
        let result = self.context.fetch_page(&ticket.request).await;
        match self.pager.complete(ticket.request_id, result) {
            Completion::Applied => Ok(self.pager.page()),
            Completion::Failed(err) => Err(err),
            Completion::Stale => Err(BrowseError::Store {
                operation: Operation::Fetch,
                message: "fetch was superseded".to_string(),
            }),
        }
    }

    fn row(&self, key: &RowKey) -> TableRow {
        match self.pager.page().row(key) {
            Some(row) => row.clone(),
            // Not on screen any more: rebuild the identity from the key alone.
            None => TableRow {
                key: key.clone(),
                identity: self.context.resolver().resolve_row_key(key),
                cells: Vec::new(),
            },
        }
    }

    fn displayed_cell(&self, key: &RowKey, column: &str) -> Cell {
        self.pager
            .page()
            .cell(key, column)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn open_field_editor(&self, key: &RowKey, field: &str) -> Result<FieldEditor> {
        let row = self.row(key);
        let displayed = self.displayed_cell(key, field);
        self.context
            .open_field_editor(&row.identity, field, &displayed)
            .await
    }

    pub async fn submit_field_edit(
        &mut self,
        editor: &FieldEditor,
        new_text: &str,
    ) -> Result<EditOutcome> {
        let result = self.context.submit_field_edit(editor, new_text).await;
        self.reload_after_write(result).await
    }

    pub async fn open_document_editor(&self, key: &RowKey) -> Result<DocumentEditor> {
        let row = self.row(key);
        self.context.open_document_editor(&row.identity).await
    }

    pub async fn submit_document_replace(
        &mut self,
        editor: &DocumentEditor,
        new_text: &str,
    ) -> Result<EditOutcome> {
        let result = self.context.submit_document_replace(editor, new_text).await;
        self.reload_after_write(result).await
    }

    pub async fn delete_document(
        &mut self,
        key: &RowKey,
        confirmation: Confirmation,
    ) -> Result<DeleteOutcome> {
        let row = self.row(key);
        let result = self
            .context
            .delete_document(&row.identity, confirmation)
            .await;
        if matches!(result, Ok(DeleteOutcome::Cancelled)) {
            return result;
        }
        self.reload_after_write(result).await
    }

    pub async fn field_text(&self, key: &RowKey, field: &str) -> Result<String> {
        let row = self.row(key);
        self.context.field_text(&row.identity, field).await
    }

    /// Writes and not-found writes both refresh the page. The write's own result wins
    /// over a failed reload.
    async fn reload_after_write<T>(&mut self, result: Result<T>) -> Result<T> {
        let should_reload = match &result {
            Ok(_) => true,
            Err(err) => matches!(err, BrowseError::NotFound { .. }),
        };
        if should_reload && let Err(err) = self.reload().await {
            tracing::warn!(error = %err, "Reload after write failed");
        }
        result
    }
}
