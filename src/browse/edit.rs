//! Field edit, document edit and delete against a resolved identity.

use bson::{Bson, Document, doc};

use super::collection::CollectionContext;
use super::error::{BrowseError, Operation, Result};
use super::identity::{Identity, Resolution};
use super::table::Cell;
use crate::document::{
    display_value, document_from_text, from_text, is_plain_scalar, looks_structured, parse_scalar,
    to_pretty_text,
};
use crate::store::{FindRequest, PRIMARY_KEY};

/// Text prepared for editing one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEditor {
    pub identity: Identity,
    pub field: String,
    /// Submitted text must parse as structured data.
    pub structured: bool,
    pub text: String,
    /// False when `text` is the displayed, possibly truncated, value.
    pub complete: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentEditor {
    pub identity: Identity,
    /// Identifier value as fetched. The edited text can never change it.
    pub pinned_id: Bson,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Updated,
    /// The document matched but already held the submitted value.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

impl CollectionContext {
    pub async fn open_field_editor(
        &self,
        identity: &Identity,
        field: &str,
        displayed: &Cell,
    ) -> Result<FieldEditor> {
        self.refuse_identifier_edit(field)?;

        let mut editor = FieldEditor {
            identity: identity.clone(),
            field: field.to_string(),
            structured: self.settings().is_structured_field(field)
                || looks_structured(&displayed.text),
            text: displayed.text.clone(),
            complete: true,
            warning: None,
        };
        if !editor.structured && !displayed.truncated && !displayed.native {
            return Ok(editor);
        }

        let fetched = self
            .store()
            .find_one(self.namespace(), &identity.predicate)
            .await
            .map_err(|err| BrowseError::from_store(Operation::Fetch, err));
        match fetched {
            Ok(Some(document)) => match document.get(field) {
                Some(value) if editor.structured || !is_plain_scalar(value) => {
                    editor.structured = true;
                    editor.text = to_pretty_text(value);
                }
                Some(value) => editor.text = display_value(value),
                None => editor.text.clear(),
            },
            Ok(None) => {
                tracing::warn!(
                    namespace = %self.namespace(),
                    predicate = %identity.predicate,
                    field,
                    "Document vanished before edit, using displayed value"
                );
                editor.complete = false;
                editor.warning = Some(format!(
                    "Document {} was not found; the value shown may be incomplete",
                    identity.display_id
                ));
            }
            Err(err @ BrowseError::Connection(_)) => return Err(err),
            Err(err) => {
                tracing::warn!(error = %err, field, "Refetch for edit failed");
                editor.complete = false;
                editor.warning = Some(format!(
                    "Could not load the full value ({err}); the value shown may be incomplete"
                ));
            }
        }
        Ok(editor)
    }

    pub async fn submit_field_edit(
        &self,
        editor: &FieldEditor,
        new_text: &str,
    ) -> Result<EditOutcome> {
        self.refuse_identifier_edit(&editor.field)?;
        let value = if editor.structured {
            from_text(new_text).map_err(|err| BrowseError::edit_validation(&editor.field, err))?
        } else if looks_structured(new_text) {
            from_text(new_text).unwrap_or_else(|_| parse_scalar(new_text))
        } else {
            parse_scalar(new_text)
        };

        let identity = &editor.identity;
        self.ensure_writable(identity, Operation::Update).await?;

        let update = doc! { "$set": { editor.field.as_str(): value } };
        let outcome = self
            .store()
            .update_one(self.namespace(), &identity.predicate, &update)
            .await
            .map_err(|err| BrowseError::from_store(Operation::Update, err))?;
        tracing::info!(
            namespace = %self.namespace(),
            id = %identity.display_id,
            field = %editor.field,
            matched = outcome.matched,
            modified = outcome.modified,
            "Field update"
        );

        if outcome.matched == 0 {
            return Err(BrowseError::NotFound {
                operation: Operation::Update,
                predicate: identity.predicate.clone(),
            });
        }
        Ok(if outcome.modified == 0 {
            EditOutcome::Unchanged
        } else {
            EditOutcome::Updated
        })
    }

    pub async fn open_document_editor(&self, identity: &Identity) -> Result<DocumentEditor> {
        let document = self
            .store()
            .find_one(self.namespace(), &identity.predicate)
            .await
            .map_err(|err| BrowseError::from_store(Operation::Fetch, err))?
            .ok_or_else(|| BrowseError::NotFound {
                operation: Operation::Fetch,
                predicate: identity.predicate.clone(),
            })?;
        let pinned_id = document
            .get(self.resolver().id_field())
            .cloned()
            .unwrap_or(Bson::Null);
        Ok(DocumentEditor {
            identity: identity.clone(),
            pinned_id,
            text: to_pretty_text(&Bson::Document(document)),
        })
    }

    /// Replace the whole document. The identifier always comes from the editor's
    /// pinned value; any identifier in `new_text` is ignored.
    pub async fn submit_document_replace(
        &self,
        editor: &DocumentEditor,
        new_text: &str,
    ) -> Result<EditOutcome> {
        let id_field = self.resolver().id_field();
        let mut edited = document_from_text(new_text)
            .map_err(|err| BrowseError::edit_validation("document", err))?;
        if let Some(discarded) = edited.remove(id_field)
            && discarded != editor.pinned_id
        {
            tracing::warn!(
                pinned = %editor.pinned_id,
                discarded = %discarded,
                "Ignoring edited identifier"
            );
        }

        let mut replacement = doc! { id_field: editor.pinned_id.clone() };
        for (key, value) in edited {
            replacement.insert(key, value);
        }
        let predicate = doc! { id_field: editor.pinned_id.clone() };

        let outcome = self
            .store()
            .replace_one(self.namespace(), &predicate, &replacement)
            .await
            .map_err(|err| BrowseError::from_store(Operation::Replace, err))?;
        tracing::info!(
            namespace = %self.namespace(),
            id = %editor.identity.display_id,
            matched = outcome.matched,
            modified = outcome.modified,
            "Document replace"
        );

        if outcome.matched == 0 {
            return Err(BrowseError::NotFound {
                operation: Operation::Replace,
                predicate,
            });
        }
        Ok(if outcome.modified == 0 {
            EditOutcome::Unchanged
        } else {
            EditOutcome::Updated
        })
    }

    pub async fn delete_document(
        &self,
        identity: &Identity,
        confirmation: Confirmation,
    ) -> Result<DeleteOutcome> {
        if confirmation == Confirmation::Declined {
            return Ok(DeleteOutcome::Cancelled);
        }
        self.ensure_writable(identity, Operation::Delete).await?;

        let deleted = self
            .store()
            .delete_one(self.namespace(), &identity.predicate)
            .await
            .map_err(|err| BrowseError::from_store(Operation::Delete, err))?;
        tracing::info!(
            namespace = %self.namespace(),
            id = %identity.display_id,
            deleted,
            "Document delete"
        );
        match deleted {
            0 => Err(BrowseError::NotFound {
                operation: Operation::Delete,
                predicate: identity.predicate.clone(),
            }),
            1 => Ok(DeleteOutcome::Deleted),
            _ => {
                self.quarantine(&identity.predicate);
                Err(BrowseError::ConsistencyViolation {
                    predicate: identity.predicate.clone(),
                })
            }
        }
    }

    /// Full value of a field as editable text, for copying.
    pub async fn field_text(&self, identity: &Identity, field: &str) -> Result<String> {
        let document = self
            .store()
            .find_one(self.namespace(), &identity.predicate)
            .await
            .map_err(|err| BrowseError::from_store(Operation::Fetch, err))?
            .ok_or_else(|| BrowseError::NotFound {
                operation: Operation::Fetch,
                predicate: identity.predicate.clone(),
            })?;
        Ok(match document.get(field) {
            Some(value) if is_plain_scalar(value) => display_value(value),
            Some(value) => to_pretty_text(value),
            None => String::new(),
        })
    }

    fn refuse_identifier_edit(&self, field: &str) -> Result<()> {
        if field == self.resolver().id_field() {
            return Err(BrowseError::IdentifierEditRefused {
                field: field.to_string(),
            });
        }
        Ok(())
    }

    /// Refuse writes through predicates that are not known to be unique.
    ///
    /// Exact equality on the store's primary key is unique by construction.
    /// Anything else, a composite `id` component or a configured identifier
    /// field without a unique index, is probed first. A predicate seen matching
    /// more than one document stays blocked for the rest of the session.
    async fn ensure_writable(&self, identity: &Identity, operation: Operation) -> Result<()> {
        let predicate = &identity.predicate;
        if self.is_quarantined(predicate) {
            return Err(BrowseError::ConsistencyViolation {
                predicate: predicate.clone(),
            });
        }
        let id_field = self.resolver().id_field();
        if id_field == PRIMARY_KEY
            && matches!(
                identity.resolution,
                Resolution::NativeId | Resolution::Verbatim
            )
            && predicate.contains_key(id_field)
        {
            return Ok(());
        }

        let matches = self
            .store()
            .find(self.namespace(), &FindRequest::probe(predicate.clone()))
            .await
            .map_err(|err| BrowseError::from_store(operation, err))?;
        match matches.len() {
            0 => Err(BrowseError::NotFound {
                operation,
                predicate: predicate.clone(),
            }),
            1 => Ok(()),
            _ => {
                self.quarantine(predicate);
                Err(BrowseError::ConsistencyViolation {
                    predicate: predicate.clone(),
                })
            }
        }
    }
}
