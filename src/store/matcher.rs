//! In-process evaluation of the predicate subset the browser produces.

use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::RegexBuilder;

use super::{Result, StoreError};
use crate::document::{compare_values, type_name, values_equal};

/// Collect the values reachable through a dotted path, descending into arrays.
pub(crate) fn lookup_path<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut current: Vec<&Bson> = Vec::new();
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return current;
    };
    if let Some(value) = document.get(first) {
        current.push(value);
    }
    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            match value {
                Bson::Document(inner) => next.extend(inner.get(segment)),
                Bson::Array(items) => {
                    if let Ok(index) = segment.parse::<usize>() {
                        next.extend(items.get(index));
                    } else {
                        for item in items {
                            if let Bson::Document(inner) = item {
                                next.extend(inner.get(segment));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

pub(crate) fn matches(document: &Document, predicate: &Document) -> Result<bool> {
    for (key, condition) in predicate {
        let matched = match key.as_str() {
            "$and" => all_clauses(document, condition, key)?,
            "$or" => any_clause(document, condition, key)?,
            "$nor" => !any_clause(document, condition, key)?,
            "$expr" => eval_expr(document, condition)?,
            op if op.starts_with('$') => {
                return Err(StoreError::InvalidQuery(format!(
                    "unknown top level operator: {op}"
                )));
            }
            path => field_matches(document, path, condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(condition: &'a Bson, op: &str) -> Result<Vec<&'a Document>> {
    let Bson::Array(items) = condition else {
        return Err(StoreError::InvalidQuery(format!("{op} must be an array")));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(clause) => Ok(clause),
            _ => Err(StoreError::InvalidQuery(format!(
                "{op} entries must be objects"
            ))),
        })
        .collect()
}

fn all_clauses(document: &Document, condition: &Bson, op: &str) -> Result<bool> {
    for clause in clauses(condition, op)? {
        if !matches(document, clause)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_clause(document: &Document, condition: &Bson, op: &str) -> Result<bool> {
    for clause in clauses(condition, op)? {
        if matches(document, clause)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_operator_document(condition: &Bson) -> bool {
    matches!(condition, Bson::Document(inner)
        if inner.keys().next().is_some_and(|key| key.starts_with('$')))
}

fn field_matches(document: &Document, path: &str, condition: &Bson) -> Result<bool> {
    let values = lookup_path(document, path);
    if !is_operator_document(condition) {
        return Ok(equals_any(&values, condition));
    }
    let Bson::Document(operators) = condition else {
        return Ok(false);
    };

    for (op, operand) in operators {
        let matched = match op.as_str() {
            "$eq" => equals_any(&values, operand),
            "$ne" => !equals_any(&values, operand),
            "$gt" => compares_any(&values, operand, |o| o == Ordering::Greater),
            "$gte" => compares_any(&values, operand, |o| o != Ordering::Less),
            "$lt" => compares_any(&values, operand, |o| o == Ordering::Less),
            "$lte" => compares_any(&values, operand, |o| o != Ordering::Greater),
            "$in" => in_list(&values, operand, op)?,
            "$nin" => !in_list(&values, operand, op)?,
            "$exists" => {
                let wanted = !matches!(operand, Bson::Boolean(false) | Bson::Null);
                values.is_empty() != wanted
            }
            "$type" => {
                let Bson::String(name) = operand else {
                    return Err(StoreError::InvalidQuery("$type needs a type name".into()));
                };
                values.iter().any(|value| type_matches(value, name))
            }
            "$regex" => {
                let options = operators.get_str("$options").unwrap_or_default();
                regex_matches(&values, operand, options)?
            }
            "$options" => true,
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "unknown operator: {other}"
                )));
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn expand<'a>(values: &[&'a Bson]) -> Vec<&'a Bson> {
    let mut expanded = Vec::new();
    for value in values {
        expanded.push(*value);
        if let Bson::Array(items) = value {
            expanded.extend(items.iter());
        }
    }
    expanded
}

fn equals_any(values: &[&Bson], expected: &Bson) -> bool {
    if values.is_empty() {
        return matches!(expected, Bson::Null);
    }
    expand(values)
        .into_iter()
        .any(|value| values_equal(value, expected))
}

fn compares_any(values: &[&Bson], operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    expand(values).into_iter().any(|value| {
        same_class(value, operand) && accept(compare_values(value, operand))
    })
}

// Range operators only match values of the same type bracket.
fn same_class(left: &Bson, right: &Bson) -> bool {
    crate::document::type_rank(left) == crate::document::type_rank(right)
}

fn in_list(values: &[&Bson], operand: &Bson, op: &str) -> Result<bool> {
    let Bson::Array(candidates) = operand else {
        return Err(StoreError::InvalidQuery(format!("{op} needs an array")));
    };
    Ok(candidates
        .iter()
        .any(|candidate| equals_any(values, candidate)))
}

fn type_matches(value: &Bson, name: &str) -> bool {
    name == type_name(value)
        || (name == "number"
            && matches!(
                value,
                Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)
            ))
}

fn regex_matches(values: &[&Bson], pattern: &Bson, options: &str) -> Result<bool> {
    let (source, options) = match pattern {
        Bson::String(source) => (source.as_str(), options.to_string()),
        Bson::RegularExpression(regex) => (regex.pattern.as_str(), regex.options.clone()),
        _ => return Err(StoreError::InvalidQuery("$regex needs a string".into())),
    };
    let regex = RegexBuilder::new(source)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .build()
        .map_err(|err| StoreError::InvalidQuery(err.to_string()))?;
    Ok(expand(values).into_iter().any(|value| match value {
        Bson::String(text) => regex.is_match(text),
        _ => false,
    }))
}

fn eval_expr(document: &Document, condition: &Bson) -> Result<bool> {
    let Bson::Document(expr) = condition else {
        return Err(StoreError::InvalidQuery("$expr needs an object".into()));
    };
    let Some((op, operands)) = expr.iter().next() else {
        return Ok(true);
    };
    let Bson::Array(operands) = operands else {
        return Err(StoreError::InvalidQuery(format!("{op} needs two operands")));
    };
    let [left, right] = operands.as_slice() else {
        return Err(StoreError::InvalidQuery(format!("{op} needs two operands")));
    };
    let left = resolve_operand(document, left);
    let right = resolve_operand(document, right);
    let ordering = compare_values(&left, &right);
    Ok(match op.as_str() {
        "$eq" => values_equal(&left, &right),
        "$ne" => !values_equal(&left, &right),
        "$gt" => ordering == Ordering::Greater,
        "$gte" => ordering != Ordering::Less,
        "$lt" => ordering == Ordering::Less,
        "$lte" => ordering != Ordering::Greater,
        other => {
            return Err(StoreError::InvalidQuery(format!(
                "unsupported $expr operator: {other}"
            )));
        }
    })
}

fn resolve_operand(document: &Document, operand: &Bson) -> Bson {
    match operand {
        Bson::String(reference) if reference.starts_with('$') => {
            lookup_path(document, &reference[1..])
                .first()
                .map(|value| (*value).clone())
                .unwrap_or(Bson::Null)
        }
        other => other.clone(),
    }
}

fn sort_value(document: &Document, path: &str) -> Bson {
    lookup_path(document, path)
        .first()
        .map(|value| (*value).clone())
        .unwrap_or(Bson::Null)
}

/// Stable sort by a `{field: 1 | -1, ...}` document.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &Document) -> Result<()> {
    let mut keys = Vec::new();
    for (path, direction) in sort {
        let descending = match direction {
            Bson::Int32(1) | Bson::Int64(1) => false,
            Bson::Int32(-1) | Bson::Int64(-1) => true,
            Bson::Double(d) if *d == 1.0 => false,
            Bson::Double(d) if *d == -1.0 => true,
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "bad sort direction for {path}: {other}"
                )));
            }
        };
        keys.push((path.clone(), descending));
    }
    documents.sort_by(|a, b| {
        for (path, descending) in &keys {
            let ordering = compare_values(&sort_value(a, path), &sort_value(b, path));
            let ordering = if *descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

/// Apply `$set` / `$unset`. Returns whether the document changed.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> Result<bool> {
    if update.is_empty() {
        return Err(StoreError::Rejected("update document is empty".into()));
    }
    let before = document.clone();
    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(StoreError::Rejected(format!("{op} needs an object")));
        };
        for (path, value) in fields {
            match op.as_str() {
                "$set" => set_path(document, path, value.clone())?,
                "$unset" => unset_path(document, path),
                other => {
                    return Err(StoreError::Rejected(format!(
                        "unsupported update operator: {other}"
                    )));
                }
            }
        }
    }
    if before.get("_id") != document.get("_id") {
        *document = before;
        return Err(StoreError::Rejected(
            "the _id field is immutable".to_string(),
        ));
    }
    Ok(before != *document)
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> Result<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let entry = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));
            match entry {
                Bson::Document(inner) => set_path(inner, rest, value),
                _ => Err(StoreError::Rejected(format!(
                    "cannot create field {rest} inside non-object {head}"
                ))),
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn sensor(id: &str, value: i32) -> Document {
        doc! { "_id": { "id": id, "type": "Sensor" }, "value": value, "tags": ["a", "b"] }
    }

    #[test]
    fn dotted_equality_reaches_composite_ids() {
        let document = sensor("d1", 10);
        assert!(matches(&document, &doc! { "_id.id": "d1" }).unwrap());
        assert!(!matches(&document, &doc! { "_id.id": "d2" }).unwrap());
    }

    #[test]
    fn equality_matches_array_members() {
        let document = sensor("d1", 10);
        assert!(matches(&document, &doc! { "tags": "b" }).unwrap());
    }

    #[test]
    fn missing_field_equals_null() {
        let document = sensor("d1", 10);
        assert!(matches(&document, &doc! { "absent": Bson::Null }).unwrap());
        assert!(matches(&document, &doc! { "absent": { "$exists": false } }).unwrap());
    }

    #[test]
    fn range_operators_compare_numbers_only() {
        let document = sensor("d1", 10);
        assert!(matches(&document, &doc! { "value": { "$gte": 10, "$lt": 11.5 } }).unwrap());
        assert!(!matches(&document, &doc! { "value": { "$gt": "a" } }).unwrap());
    }

    #[test]
    fn logical_operators_combine() {
        let document = sensor("d1", 10);
        let predicate = doc! {
            "$or": [{ "value": 99 }, { "$nor": [{ "value": 11 }] }]
        };
        assert!(matches(&document, &predicate).unwrap());
    }

    #[test]
    fn regex_honors_options() {
        let document = doc! { "name": "Kitchen" };
        assert!(matches(&document, &doc! { "name": { "$regex": "^kit", "$options": "i" } }).unwrap());
    }

    #[test]
    fn expr_compares_two_fields() {
        let document = doc! { "a": 3, "b": 2 };
        assert!(matches(&document, &doc! { "$expr": { "$gt": ["$a", "$b"] } }).unwrap());
    }

    #[test]
    fn unknown_operator_is_invalid_query() {
        let err = matches(&doc! {}, &doc! { "a": { "$near": 1 } }).unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }

    #[test]
    fn sort_is_stable_and_puts_missing_first() {
        let mut documents = vec![
            doc! { "n": 1, "v": 2 },
            doc! { "n": 2 },
            doc! { "n": 3, "v": 1 },
            doc! { "n": 4, "v": 2 },
        ];
        sort_documents(&mut documents, &doc! { "v": 1 }).unwrap();
        let order: Vec<i32> = documents.iter().map(|d| d.get_i32("n").unwrap()).collect();
        assert_eq!(order, vec![2, 3, 1, 4]);
    }

    #[test]
    fn set_creates_nested_paths_and_reports_change() {
        let mut document = doc! { "_id": 1, "a": 1 };
        assert!(apply_update(&mut document, &doc! { "$set": { "b.c": 2 } }).unwrap());
        assert_eq!(document, doc! { "_id": 1, "a": 1, "b": { "c": 2 } });
        assert!(!apply_update(&mut document, &doc! { "$set": { "a": 1 } }).unwrap());
    }

    #[test]
    fn update_cannot_touch_id() {
        let mut document = doc! { "_id": 1 };
        let err = apply_update(&mut document, &doc! { "$set": { "_id": 2 } }).unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert_eq!(document, doc! { "_id": 1 });
    }
}
