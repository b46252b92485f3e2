//! Document identity: from an identifier value of any shape to a display string and
//! a predicate that finds the same document again.

use std::fmt;

use bson::{Bson, Document, doc, oid::ObjectId};
use lazy_static::lazy_static;
use regex::Regex;

use super::error::ErrorKind;
use crate::document::{display_value, from_text, to_canonical_text, to_compact_text};

lazy_static! {
    static ref QUOTED_ID: Regex = Regex::new(r#""id"\s*:\s*"([^"]*)""#)
        .unwrap_or_else(|err| panic!("invalid identifier pattern: {err}"));
}

/// How an identity was obtained, from most to least reliable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A store-generated object id.
    NativeId,
    /// A nested identifier located by its `id` component.
    CompositeId,
    /// Display id recovered by matching `"id": "..."` in the identifier's text.
    TextualRescue,
    /// Anything else, matched by exact equality.
    Verbatim,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub raw: Bson,
    pub display_id: String,
    pub predicate: Document,
    pub resolution: Resolution,
}

/// Stable row key: canonical Extended JSON of the raw identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(String);

impl RowKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RowKey {
    fn from(token: String) -> Self {
        RowKey(token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResolver {
    id_field: String,
}

impl IdentityResolver {
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// A document without the identifier field is treated as having a null one.
    pub fn derive_identity(&self, document: &Document) -> Identity {
        let raw = document.get(&self.id_field).cloned().unwrap_or(Bson::Null);
        self.identify(raw)
    }

    pub fn row_key(&self, document: &Document) -> RowKey {
        let raw = document.get(&self.id_field).cloned().unwrap_or(Bson::Null);
        RowKey(to_canonical_text(&raw))
    }

    pub fn resolve_row_key(&self, key: &RowKey) -> Identity {
        self.resolve_token(key.as_str())
    }

    /// Best-effort identity for a serialized identifier. Never fails.
    pub fn resolve_token(&self, token: &str) -> Identity {
        if let Ok(raw) = from_text(token) {
            return self.identify(raw);
        }
        // Tolerate single-quoted structures copied from other tools.
        if token.contains('\'')
            && let Ok(raw) = from_text(&token.replace('\'', "\""))
        {
            return self.identify(raw);
        }
        let trimmed = token.trim();
        if let Ok(oid) = ObjectId::parse_str(trimmed) {
            return self.identify(Bson::ObjectId(oid));
        }
        if let Some(id) = rescue_id(trimmed) {
            log_rescue(trimmed, &id);
            let predicate = doc! { self.composite_path(): id.as_str() };
            return Identity {
                raw: Bson::String(trimmed.to_string()),
                display_id: id,
                predicate,
                resolution: Resolution::TextualRescue,
            };
        }
        self.identify(Bson::String(trimmed.to_string()))
    }

    /// Predicate for a lone identifier typed into the filter box.
    ///
    /// A plain string may be either a whole scalar id or the `id` part of a
    /// composite one, so both are tried.
    pub fn lookup_predicate(&self, token: &str) -> Document {
        let identity = self.resolve_token(token);
        match (&identity.resolution, &identity.raw) {
            (Resolution::Verbatim, Bson::String(id)) => doc! {
                "$or": [
                    { self.id_field.as_str(): id.as_str() },
                    { self.composite_path(): id.as_str() },
                ]
            },
            _ => identity.predicate,
        }
    }

    fn composite_path(&self) -> String {
        format!("{}.id", self.id_field)
    }

    fn identify(&self, raw: Bson) -> Identity {
        match &raw {
            Bson::ObjectId(oid) => Identity {
                display_id: oid.to_hex(),
                predicate: doc! { self.id_field.as_str(): raw.clone() },
                resolution: Resolution::NativeId,
                raw,
            },
            Bson::Document(composite) if composite.contains_key("id") => {
                let id = composite.get("id").cloned().unwrap_or(Bson::Null);
                Identity {
                    display_id: display_value(&id),
                    predicate: doc! { self.composite_path(): id },
                    resolution: Resolution::CompositeId,
                    raw,
                }
            }
            _ => {
                let text = match &raw {
                    Bson::String(text) => text.clone(),
                    other => to_compact_text(other),
                };
                // The raw value is known here, so exact equality still addresses the
                // document; the rescued id only improves the display.
                let (display_id, resolution) = match rescue_id(&text) {
                    Some(id) => {
                        log_rescue(&text, &id);
                        (id, Resolution::TextualRescue)
                    }
                    None => (display_value(&raw), Resolution::Verbatim),
                };
                Identity {
                    display_id,
                    predicate: doc! { self.id_field.as_str(): raw.clone() },
                    resolution,
                    raw,
                }
            }
        }
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(super::settings::DEFAULT_ID_FIELD)
    }
}

fn rescue_id(text: &str) -> Option<String> {
    QUOTED_ID
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
}

fn log_rescue(text: &str, id: &str) {
    tracing::warn!(
        failure = %ErrorKind::IdentifierResolutionFailure,
        identifier = %text,
        rescued_id = %id,
        "Identifier resolved by textual pattern"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> IdentityResolver {
        IdentityResolver::default()
    }

    #[test]
    fn native_ids_display_as_hex() {
        let oid = ObjectId::parse_str("65a1f0c2e4b0a1b2c3d4e5f6").unwrap();
        let identity = resolver().derive_identity(&doc! { "_id": oid, "v": 1 });
        assert_eq!(identity.resolution, Resolution::NativeId);
        assert_eq!(identity.display_id, "65a1f0c2e4b0a1b2c3d4e5f6");
        assert_eq!(identity.predicate, doc! { "_id": oid });
    }

    #[test]
    fn composite_ids_are_located_by_id_component() {
        let identity =
            resolver().derive_identity(&doc! { "_id": { "id": "d1", "type": "Sensor" } });
        assert_eq!(identity.resolution, Resolution::CompositeId);
        assert_eq!(identity.display_id, "d1");
        assert_eq!(identity.predicate, doc! { "_id.id": "d1" });
    }

    #[test]
    fn scalar_ids_fall_back_to_exact_equality() {
        let identity = resolver().derive_identity(&doc! { "_id": "abc123" });
        assert_eq!(identity.resolution, Resolution::Verbatim);
        assert_eq!(identity.display_id, "abc123");
        assert_eq!(identity.predicate, doc! { "_id": "abc123" });

        let identity = resolver().derive_identity(&doc! { "_id": 7_i64 });
        assert_eq!(identity.predicate, doc! { "_id": 7_i64 });
    }

    #[test]
    fn stringified_composite_ids_keep_exact_predicate() {
        let legacy = r#"{"id": "d9", "type": "Sensor"}"#;
        let identity = resolver().derive_identity(&doc! { "_id": legacy });
        assert_eq!(identity.resolution, Resolution::TextualRescue);
        assert_eq!(identity.display_id, "d9");
        assert_eq!(identity.predicate, doc! { "_id": legacy });
    }

    #[test]
    fn missing_id_is_null() {
        let identity = resolver().derive_identity(&doc! { "v": 1 });
        assert_eq!(identity.raw, Bson::Null);
        assert_eq!(identity.predicate, doc! { "_id": Bson::Null });
    }

    #[test]
    fn row_keys_resolve_to_the_derived_predicate() {
        let oid = ObjectId::new();
        let documents = [
            doc! { "_id": { "id": "d1", "type": "Sensor" } },
            doc! { "_id": oid },
            doc! { "_id": 42 },
            doc! { "_id": 42_i64 },
            doc! { "_id": "plain" },
            doc! { "_id": [1, 2] },
        ];
        let resolver = resolver();
        for document in documents {
            let key = resolver.row_key(&document);
            assert_eq!(
                resolver.resolve_row_key(&key).predicate,
                resolver.derive_identity(&document).predicate,
                "row key {key}"
            );
        }
    }

    #[test]
    fn unparseable_tokens_are_rescued_by_pattern() {
        let identity = resolver().resolve_token(r#"{"id": "d3", type: Sensor}"#);
        assert_eq!(identity.resolution, Resolution::TextualRescue);
        assert_eq!(identity.display_id, "d3");
        assert_eq!(identity.predicate, doc! { "_id.id": "d3" });
    }

    #[test]
    fn single_quoted_tokens_are_normalized() {
        let identity = resolver().resolve_token("{'id': 'd4', 'type': 'Sensor'}");
        assert_eq!(identity.resolution, Resolution::CompositeId);
        assert_eq!(identity.predicate, doc! { "_id.id": "d4" });
    }

    #[test]
    fn hex_tokens_become_object_ids() {
        let identity = resolver().resolve_token("65a1f0c2e4b0a1b2c3d4e5f6");
        assert_eq!(identity.resolution, Resolution::NativeId);
    }

    #[test]
    fn garbage_tokens_still_produce_a_predicate() {
        let identity = resolver().resolve_token("not an id {");
        assert_eq!(identity.resolution, Resolution::Verbatim);
        assert_eq!(identity.predicate, doc! { "_id": "not an id {" });
    }

    #[test]
    fn lookup_predicate_tries_scalar_and_composite_forms() {
        assert_eq!(
            resolver().lookup_predicate("d1"),
            doc! { "$or": [{ "_id": "d1" }, { "_id.id": "d1" }] }
        );
        assert_eq!(resolver().lookup_predicate("42"), doc! { "_id": 42 });
    }

    #[test]
    fn custom_id_field() {
        let resolver = IdentityResolver::new("key");
        let identity = resolver.derive_identity(&doc! { "key": { "id": "k1" } });
        assert_eq!(identity.predicate, doc! { "key.id": "k1" });
    }
}
