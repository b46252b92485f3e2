//! Filter text to store predicate.
//!
//! Three input shapes are accepted: an Extended-JSON object (`{"value": {"$gt": 3}}`),
//! an infix expression (`value > 3 AND begins_with(name, "kit")`), or a single token
//! (`d1`) that names a document identifier.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod predicate;
mod tests;

use bson::Document;

pub use ast::*;
pub use error::*;
pub use parser::{parse_filter_expression, parse_single_value_token};
pub use predicate::{operand_value, to_predicate};

use crate::document::document_from_text;

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedFilter {
    Predicate(Document),
    /// A lone value; the caller resolves it against the identifier field.
    IdentifierToken(String),
}

pub fn parse_filter(text: &str) -> Result<ParsedFilter, FilterParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(ParsedFilter::Predicate(Document::new()));
    }
    if trimmed.starts_with('{') {
        return Ok(ParsedFilter::Predicate(document_from_text(trimmed)?));
    }
    match parse_filter_expression(trimmed) {
        Ok(expr) => Ok(ParsedFilter::Predicate(to_predicate(&expr))),
        Err(parse_error) => match parse_single_value_token(trimmed) {
            Ok(_) => Ok(ParsedFilter::IdentifierToken(trimmed.to_string())),
            Err(_) => Err(parse_error),
        },
    }
}
