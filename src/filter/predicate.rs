//! Translation of parsed filter expressions into store predicates.

use bson::{Bson, Document, doc};

use super::ast::{Comparator, FilterExpression, FunctionName, Operand};

pub fn operand_value(operand: &Operand) -> Bson {
    match operand {
        Operand::Path(path) | Operand::Value(path) => Bson::String(path.clone()),
        Operand::Integer(n) => i32::try_from(*n)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(*n)),
        Operand::Double(n) => Bson::Double(*n),
        Operand::Boolean(b) => Bson::Boolean(*b),
        Operand::Null => Bson::Null,
    }
}

// Field reference inside an aggregation expression.
fn expr_operand(operand: &Operand) -> Bson {
    match operand {
        Operand::Path(path) => Bson::String(format!("${path}")),
        Operand::Value(text) => Bson::Document(doc! { "$literal": text.as_str() }),
        other => operand_value(other),
    }
}

pub fn to_predicate(expr: &FilterExpression) -> Document {
    match expr {
        FilterExpression::Comparison {
            left,
            operator,
            right,
        } => comparison(left, *operator, right),
        FilterExpression::Between { path, lower, upper } => doc! {
            path.as_str(): { "$gte": operand_value(lower), "$lte": operand_value(upper) }
        },
        FilterExpression::In { path, values } => {
            let values: Vec<Bson> = values.iter().map(operand_value).collect();
            doc! { path.as_str(): { "$in": values } }
        }
        FilterExpression::Function {
            name,
            path,
            argument,
        } => function(*name, path, argument.as_ref()),
        FilterExpression::And(..) => {
            let mut clauses = Vec::new();
            collect_and(expr, &mut clauses);
            doc! { "$and": clauses }
        }
        FilterExpression::Or(..) => {
            let mut clauses = Vec::new();
            collect_or(expr, &mut clauses);
            doc! { "$or": clauses }
        }
        FilterExpression::Not(inner) => doc! { "$nor": [to_predicate(inner)] },
        FilterExpression::Parentheses(inner) => to_predicate(inner),
    }
}

fn collect_and(expr: &FilterExpression, clauses: &mut Vec<Document>) {
    match expr {
        FilterExpression::And(left, right) => {
            collect_and(left, clauses);
            collect_and(right, clauses);
        }
        FilterExpression::Parentheses(inner) if matches!(**inner, FilterExpression::And(..)) => {
            collect_and(inner, clauses);
        }
        other => clauses.push(to_predicate(other)),
    }
}

fn collect_or(expr: &FilterExpression, clauses: &mut Vec<Document>) {
    match expr {
        FilterExpression::Or(left, right) => {
            collect_or(left, clauses);
            collect_or(right, clauses);
        }
        FilterExpression::Parentheses(inner) if matches!(**inner, FilterExpression::Or(..)) => {
            collect_or(inner, clauses);
        }
        other => clauses.push(to_predicate(other)),
    }
}

fn comparison(left: &Operand, operator: Comparator, right: &Operand) -> Document {
    match (left, right) {
        (Operand::Path(path), value) if !value.is_path() => {
            field_comparison(path, operator, value)
        }
        (value, Operand::Path(path)) if !value.is_path() => {
            field_comparison(path, operator.flipped(), value)
        }
        // Two paths, or two values when built by hand, compare as an aggregation expression.
        (left, right) => doc! {
            "$expr": { operator.operator(): [expr_operand(left), expr_operand(right)] }
        },
    }
}

fn field_comparison(path: &str, operator: Comparator, value: &Operand) -> Document {
    let value = operand_value(value);
    match operator {
        Comparator::Equal => doc! { path: value },
        other => doc! { path: { other.operator(): value } },
    }
}

fn function(name: FunctionName, path: &str, argument: Option<&Operand>) -> Document {
    let argument = argument.map(operand_value).unwrap_or(Bson::Null);
    match name {
        FunctionName::Exists => doc! { path: { "$exists": true } },
        FunctionName::NotExists => doc! { path: { "$exists": false } },
        FunctionName::Type => doc! { path: { "$type": argument } },
        FunctionName::BeginsWith => {
            let prefix = argument.as_str().unwrap_or_default();
            doc! { path: { "$regex": format!("^{}", regex::escape(prefix)) } }
        }
        FunctionName::Contains => {
            let needle = argument.as_str().unwrap_or_default();
            doc! { path: { "$regex": regex::escape(needle) } }
        }
    }
}
