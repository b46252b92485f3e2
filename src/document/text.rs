use bson::{Bson, Document};
use serde_json::Value;

use super::order::type_name;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    #[error("invalid JSON: {0}")]
    Syntax(String),
    #[error("invalid extended JSON: {0}")]
    ExtendedJson(String),
    #[error("expected a JSON object at the top level, found {found}")]
    NotADocument { found: &'static str },
}

pub type Result<T> = std::result::Result<T, TextError>;

/// Single-line relaxed Extended JSON, used for grid cells.
pub fn to_compact_text(value: &Bson) -> String {
    value.clone().into_relaxed_extjson().to_string()
}

/// Indented relaxed Extended JSON, used for editors.
pub fn to_pretty_text(value: &Bson) -> String {
    let json = value.clone().into_relaxed_extjson();
    // Serializing a pre-built Value cannot fail, fall back to the compact form anyway.
    serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
}

/// Canonical Extended JSON keeps numeric types exact (`$numberInt`, `$numberLong`),
/// which makes it suitable for tokens that must parse back to the same value.
pub fn to_canonical_text(value: &Bson) -> String {
    value.clone().into_canonical_extjson().to_string()
}

pub fn from_text(input: &str) -> Result<Bson> {
    let json: Value =
        serde_json::from_str(input.trim()).map_err(|err| TextError::Syntax(err.to_string()))?;
    Bson::try_from(json).map_err(|err| TextError::ExtendedJson(err.to_string()))
}

pub fn document_from_text(input: &str) -> Result<Document> {
    match from_text(input)? {
        Bson::Document(document) => Ok(document),
        other => Err(TextError::NotADocument {
            found: type_name(&other),
        }),
    }
}

/// True when the text opens with a structural delimiter.
pub fn looks_structured(text: &str) -> bool {
    text.trim_start().starts_with(['{', '['])
}

/// Parse free-form editor text as a scalar.
///
/// Literals that look like booleans, null or numbers become typed values. A JSON
/// string literal is unquoted. Everything else is kept verbatim as a string.
pub fn parse_scalar(text: &str) -> Bson {
    let trimmed = text.trim();
    match trimmed {
        "true" => return Bson::Boolean(true),
        "false" => return Bson::Boolean(false),
        "null" => return Bson::Null,
        _ => {}
    }

    if let Ok(int_val) = trimmed.parse::<i64>() {
        return i32::try_from(int_val)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(int_val));
    }

    if is_decimal_literal(trimmed)
        && let Ok(float_val) = trimmed.parse::<f64>()
        && float_val.is_finite()
    {
        return Bson::Double(float_val);
    }

    if trimmed.starts_with('"')
        && let Ok(unquoted) = serde_json::from_str::<String>(trimmed)
    {
        return Bson::String(unquoted);
    }

    Bson::String(trimmed.to_string())
}

// Rust's float parser also accepts "inf" and "NaN", which should stay strings.
fn is_decimal_literal(token: &str) -> bool {
    token.chars().any(|ch| ch.is_ascii_digit())
        && token
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'))
}

/// Scalars whose [`display_value`] text parses back to the same value through
/// [`parse_scalar`].
pub fn is_plain_scalar(value: &Bson) -> bool {
    matches!(
        value,
        Bson::String(_)
            | Bson::Int32(_)
            | Bson::Int64(_)
            | Bson::Double(_)
            | Bson::Boolean(_)
            | Bson::Null
    )
}

/// Human-readable form of a value, without JSON quoting for plain strings.
pub fn display_value(value: &Bson) -> String {
    match value {
        Bson::String(text) => text.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::Int32(number) => number.to_string(),
        Bson::Int64(number) => number.to_string(),
        Bson::Double(number) => number.to_string(),
        Bson::Boolean(flag) => flag.to_string(),
        Bson::Null => "null".to_string(),
        Bson::DateTime(datetime) => datetime
            .try_to_rfc3339_string()
            .unwrap_or_else(|_| datetime.to_string()),
        Bson::Decimal128(decimal) => decimal.to_string(),
        other => to_compact_text(other),
    }
}
