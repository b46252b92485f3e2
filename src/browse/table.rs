//! Flat grid over a page of heterogeneous documents.

use std::collections::BTreeSet;

use bson::{Bson, Document};
use unicode_width::UnicodeWidthChar;

use super::identity::{Identity, IdentityResolver, RowKey};
use crate::document::{display_value, is_plain_scalar, to_compact_text};

pub const ELLIPSIS: &str = "...";

/// Column set for a page: the identifier first, every other field name sorted.
///
/// The result depends only on which fields occur, not on document or field order.
pub fn compute_columns(documents: &[Document], id_field: &str) -> Vec<String> {
    if documents.is_empty() {
        return Vec::new();
    }
    let others: BTreeSet<&str> = documents
        .iter()
        .flat_map(|document| document.keys())
        .map(String::as_str)
        .filter(|key| *key != id_field)
        .collect();
    std::iter::once(id_field)
        .chain(others)
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cell {
    pub text: String,
    /// The text is a cut-down rendering; fetch the document for the real value.
    pub truncated: bool,
    /// A date, object id or other store-native scalar. Its text does not parse
    /// back to the same type.
    pub native: bool,
}

pub fn render_value(value: &Bson, max_width: usize) -> Cell {
    let (text, native) = match value {
        Bson::Document(_) | Bson::Array(_) => (to_compact_text(value), false),
        scalar => (display_value(scalar), !is_plain_scalar(scalar)),
    };
    let (text, truncated) = truncate_display(&text, max_width);
    Cell {
        text,
        truncated,
        native,
    }
}

/// Absent fields render as an empty cell.
pub fn render_cell(document: &Document, column: &str, max_width: usize) -> Cell {
    document
        .get(column)
        .map(|value| render_value(value, max_width))
        .unwrap_or_default()
}

/// Cut `text` to at most `max_width` display columns, appending [`ELLIPSIS`] when cut.
pub fn truncate_display(text: &str, max_width: usize) -> (String, bool) {
    let mut width = 0;
    for (index, ch) in text.char_indices() {
        width += ch.width().unwrap_or(0);
        if width > max_width {
            let mut cut = text[..index].to_string();
            cut.push_str(ELLIPSIS);
            return (cut, true);
        }
    }
    (text.to_string(), false)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub key: RowKey,
    pub identity: Identity,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TablePage {
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
    documents: Vec<Document>,
    size_bytes: u64,
}

impl TablePage {
    pub fn build(documents: Vec<Document>, resolver: &IdentityResolver, max_width: usize) -> Self {
        let columns = compute_columns(&documents, resolver.id_field());
        let rows = documents
            .iter()
            .map(|document| TableRow {
                key: resolver.row_key(document),
                identity: resolver.derive_identity(document),
                cells: columns
                    .iter()
                    .map(|column| render_cell(document, column, max_width))
                    .collect(),
            })
            .collect();
        let size_bytes = documents
            .iter()
            .filter_map(|document| bson::to_vec(document).ok())
            .map(|bytes| bytes.len() as u64)
            .sum();
        Self {
            columns,
            rows,
            documents,
            size_bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Total encoded size of the page's documents.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn row_index(&self, key: &RowKey) -> Option<usize> {
        self.rows.iter().position(|row| row.key == *key)
    }

    pub fn row(&self, key: &RowKey) -> Option<&TableRow> {
        self.row_index(key).map(|index| &self.rows[index])
    }

    pub fn document(&self, key: &RowKey) -> Option<&Document> {
        self.row_index(key).map(|index| &self.documents[index])
    }

    pub fn cell(&self, key: &RowKey, column: &str) -> Option<&Cell> {
        let column = self.column_index(column)?;
        self.row(key).map(|row| &row.cells[column])
    }
}
