#[cfg(test)]
mod filter_tests {
    use bson::{Bson, doc, oid::ObjectId};

    use super::super::*;

    fn predicate(input: &str) -> bson::Document {
        match parse_filter(input).unwrap() {
            ParsedFilter::Predicate(predicate) => predicate,
            other => panic!("expected a predicate for {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_simple_comparison() {
        let result = parse_filter_expression("age = 25").unwrap();
        assert_eq!(
            result,
            FilterExpression::Comparison {
                left: Operand::Path("age".to_string()),
                operator: Comparator::Equal,
                right: Operand::Integer(25),
            }
        );
        assert_eq!(to_predicate(&result), doc! { "age": 25 });
    }

    #[test]
    fn test_unquoted_string_defaults_to_value() {
        let result = parse_filter_expression("city = Sidney").unwrap();
        assert_eq!(
            result,
            FilterExpression::Comparison {
                left: Operand::Path("city".to_string()),
                operator: Comparator::Equal,
                right: Operand::Value("Sidney".to_string()),
            }
        );
    }

    #[test]
    fn test_backtick_path_on_rhs_compares_fields() {
        assert_eq!(
            predicate("city = `other field`"),
            doc! { "$expr": { "$eq": ["$city", "$other field"] } }
        );
    }

    #[test]
    fn test_all_comparators() {
        let tests = vec![
            ("age != 25", doc! { "age": { "$ne": 25 } }),
            ("age <> 25", doc! { "age": { "$ne": 25 } }),
            ("age < 25", doc! { "age": { "$lt": 25 } }),
            ("age <= 25", doc! { "age": { "$lte": 25 } }),
            ("age > 25", doc! { "age": { "$gt": 25 } }),
            ("age >= 25", doc! { "age": { "$gte": 25 } }),
            ("age == 25", doc! { "age": 25 }),
        ];

        for (input, expected) in tests {
            assert_eq!(predicate(input), expected, "input {input}");
        }
    }

    #[test]
    fn test_value_on_left_flips_comparator() {
        assert_eq!(predicate("25 < `age`"), doc! { "age": { "$gt": 25 } });
    }

    #[test]
    fn test_scalar_types() {
        assert_eq!(predicate("active = true"), doc! { "active": true });
        assert_eq!(predicate("gone = null"), doc! { "gone": Bson::Null });
        assert_eq!(predicate("ratio = 0.5"), doc! { "ratio": 0.5 });
        assert_eq!(
            predicate("big = 4294967296"),
            doc! { "big": 4_294_967_296_i64 }
        );
        assert_eq!(predicate("label = 'true'"), doc! { "label": "true" });
    }

    #[test]
    fn test_dotted_paths() {
        assert_eq!(predicate("_id.id = d1"), doc! { "_id.id": "d1" });
    }

    #[test]
    fn test_between_expression() {
        assert_eq!(
            predicate("value BETWEEN 10 AND 20"),
            doc! { "value": { "$gte": 10, "$lte": 20 } }
        );
    }

    #[test]
    fn test_in_expression() {
        assert_eq!(
            predicate(r#"status IN ("on", off, 3)"#),
            doc! { "status": { "$in": ["on", "off", 3] } }
        );
    }

    #[test]
    fn test_function_calls() {
        assert_eq!(
            predicate("exists(attrs)"),
            doc! { "attrs": { "$exists": true } }
        );
        assert_eq!(
            predicate("not_exists(attrs)"),
            doc! { "attrs": { "$exists": false } }
        );
        assert_eq!(
            predicate(r#"type(value, "int")"#),
            doc! { "value": { "$type": "int" } }
        );
        assert_eq!(
            predicate(r#"begins_with(name, "a.b")"#),
            doc! { "name": { "$regex": "^a\\.b" } }
        );
        assert_eq!(
            predicate(r#"contains(name, "x+")"#),
            doc! { "name": { "$regex": "x\\+" } }
        );
    }

    #[test]
    fn test_function_name_as_field() {
        assert_eq!(predicate(r#"type = "Sensor""#), doc! { "type": "Sensor" });
    }

    #[test]
    fn test_and_chain_is_flattened() {
        assert_eq!(
            predicate("a = 1 AND b = 2 and c = 3"),
            doc! { "$and": [{ "a": 1 }, { "b": 2 }, { "c": 3 }] }
        );
    }

    #[test]
    fn test_or_with_parentheses() {
        assert_eq!(
            predicate("a = 1 OR (b = 2 OR c = 3)"),
            doc! { "$or": [{ "a": 1 }, { "b": 2 }, { "c": 3 }] }
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            predicate("a = 1 OR b = 2 AND c = 3"),
            doc! { "$or": [{ "a": 1 }, { "$and": [{ "b": 2 }, { "c": 3 }] }] }
        );
    }

    #[test]
    fn test_not_expression() {
        assert_eq!(predicate("NOT a = 1"), doc! { "$nor": [{ "a": 1 }] });
        assert_eq!(
            predicate("NOT (a = 1 OR b = 2)"),
            doc! { "$nor": [{ "$or": [{ "a": 1 }, { "b": 2 }] }] }
        );
    }

    #[test]
    fn test_parse_errors_carry_positions() {
        let err = parse_filter_expression("a =").unwrap_err();
        assert_eq!(err, FilterParseError::UnexpectedEndOfInput { position: 3 });

        let err = parse_filter_expression(r#"a = "x"#).unwrap_err();
        assert_eq!(
            err,
            FilterParseError::UnterminatedQuote {
                position: 4,
                quote_char: '"'
            }
        );

        let err = parse_filter_expression("a ! 1").unwrap_err();
        assert_eq!(
            err,
            FilterParseError::UnexpectedToken {
                token: "!".to_string(),
                position: 2
            }
        );

        let err = parse_filter_expression("a = 1 b").unwrap_err();
        assert_eq!(err.position(), Some(6));
    }

    #[test]
    fn test_comparison_needs_a_path() {
        let err = parse_filter_expression("1 = 2").unwrap_err();
        assert!(matches!(err, FilterParseError::InvalidSyntax { position: 0, .. }));
    }

    #[test]
    fn test_function_argument_validation() {
        let err = parse_filter_expression("exists(a, b)").unwrap_err();
        assert!(matches!(
            err,
            FilterParseError::InvalidFunctionArguments { position: 0, .. }
        ));

        let err = parse_filter_expression("begins_with(name, 3)").unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert_eq!(predicate(""), doc! {});
        assert_eq!(predicate("   "), doc! {});
    }

    #[test]
    fn test_json_filter_understands_native_tokens() {
        let oid = ObjectId::parse_str("65a1f0c2e4b0a1b2c3d4e5f6").unwrap();
        assert_eq!(
            predicate(r#"{"_id": {"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"}}"#),
            doc! { "_id": oid }
        );
        assert_eq!(
            predicate(r#"{"value": {"$gt": 3}}"#),
            doc! { "value": { "$gt": 3 } }
        );
    }

    #[test]
    fn test_malformed_json_filter() {
        let err = parse_filter(r#"{"value": "#).unwrap_err();
        assert!(matches!(err, FilterParseError::InvalidJson(_)));
        assert_eq!(err.position(), None);
    }

    #[test]
    fn test_single_token_is_identifier_shortcut() {
        assert_eq!(
            parse_filter("d1").unwrap(),
            ParsedFilter::IdentifierToken("d1".to_string())
        );
        assert_eq!(
            parse_filter(r#" "foo bar" "#).unwrap(),
            ParsedFilter::IdentifierToken(r#""foo bar""#.to_string())
        );
    }

    #[test]
    fn test_single_token_shortcut_rejects_backticks() {
        let err = parse_filter("`other field`").unwrap_err();
        assert!(err.to_string().contains("Expected comparison operator"));
    }

    #[test]
    fn test_parse_single_value_token() {
        assert_eq!(parse_single_value_token("42").unwrap(), Operand::Integer(42));
        assert_eq!(
            parse_single_value_token("'abc'").unwrap(),
            Operand::Value("abc".to_string())
        );
        assert!(parse_single_value_token("a b").is_err());
    }
}
