//! Filtering integration tests.

#[cfg(test)]
mod tests {
    use dynq_core::{
        Compiler, DynqError, EvaluationError, ParseError, PredicateOptions, Query, RecordType, Type,
        Value, query,
    };

    use crate::{content_type, date, names, site};

    #[test]
    fn test_should_filter_on_dynamic_member() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let hits = q.filter(&site(), "Views > 30", &[]).unwrap();
        assert_eq!(names(&hits), ["Home", "Post 1", "Post 3"]);
    }

    #[test]
    fn test_should_treat_missing_member_as_false() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        assert!(q.filter(&site(), r#"Nope == "x""#, &[]).unwrap().is_empty());
        assert_eq!(q.filter(&site(), "!Nope", &[]).unwrap().len(), 7);

        let strict = compiler
            .compile_predicate_with_options(
                &content_type(),
                "!Nope",
                &[],
                PredicateOptions { absent_as_false: false },
            )
            .unwrap();
        assert!(site().iter().all(|e| !strict.matches(e).unwrap()));
    }

    #[test]
    fn test_should_combine_static_fields_and_arguments() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let hits = q
            .filter(
                &site(),
                r#"Template == "post" and CreateDate >= @0"#,
                &[Value::DateTime(date(2024, 5, 1))],
            )
            .unwrap();
        assert_eq!(names(&hits), ["Post 2", "Post 3"]);

        let hits = q
            .filter(&site(), "CreateDate < DateTime(2024, 2, 15) || Id == 7", &[])
            .unwrap();
        assert_eq!(names(&hits), ["Home", "About", "Contact"]);
    }

    #[test]
    fn test_should_accept_keywords_in_any_case() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let hits = q
            .filter(&site(), r#"template = "text" AND NOT (Views > 100)"#, &[])
            .unwrap();
        assert_eq!(names(&hits), ["About", "Contact"]);
    }

    #[test]
    fn test_should_apply_aggregates_to_children() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let hits = q.filter(&site(), "Children.Any(Views > 100)", &[]).unwrap();
        assert_eq!(names(&hits), ["Blog"]);
        let hits = q.filter(&site(), "Children.Count() >= 3", &[]).unwrap();
        assert_eq!(names(&hits), ["Home", "Blog"]);
    }

    #[test]
    fn test_should_call_methods_on_static_and_deferred_values() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let hits = q.filter(&site(), r#"Name.StartsWith("Post")"#, &[]).unwrap();
        assert_eq!(hits.len(), 3);
        let hits = q.filter(&site(), r#"Author.ToLower() == "ann""#, &[]).unwrap();
        assert_eq!(names(&hits), ["About", "Post 1"]);
    }

    #[test]
    fn test_should_use_named_externals() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let externals = Value::map([("minViews", Value::Int32(100))]);
        let hits = q.filter(&site(), "Views >= minViews", &[externals]).unwrap();
        assert_eq!(names(&hits), ["Home", "Post 3"]);
    }

    #[test]
    fn test_should_reject_unknown_member_on_closed_type() {
        let compiler = Compiler::default();
        let closed =
            Type::Record(RecordType::new("Closed").with_field("Name", Type::STRING).into());
        let q = Query::new(&compiler, closed);
        let err = q.filter(&site(), "Views > 1", &[]).unwrap_err();
        assert!(matches!(
            err,
            DynqError::Parse(
                ParseError::UnknownIdentifier { .. } | ParseError::UnknownMember { .. }
            )
        ));
    }

    #[test]
    fn test_should_fail_on_malformed_predicate() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let err = q.filter(&site(), r#"Name == "Home"#, &[]).unwrap_err();
        assert!(matches!(
            err,
            DynqError::Parse(ParseError::UnterminatedStringLiteral { pos: 13 })
        ));
    }

    fn rows(json: serde_json::Value) -> Vec<Value> {
        match json {
            serde_json::Value::Array(items) => items.into_iter().map(Value::from).collect(),
            other => vec![Value::from(other)],
        }
    }

    #[test]
    fn test_should_report_overflow_from_element_data() {
        let source = rows(serde_json::json!([{"Offset": 2}, {"Offset": -1e300}]));
        let predicate = "DateTime(2024, 1, 1).AddDays(Offset) > DateTime(2000, 1, 1)";
        assert_eq!(query::filter(&source[..1], predicate, &[]).unwrap().len(), 1);
        let err = query::filter(&source, predicate, &[]).unwrap_err();
        assert!(matches!(err, DynqError::Evaluation(EvaluationError::Overflow { .. })));

        let source = rows(serde_json::json!([{"Days": 6e10}]));
        let err = query::filter(
            &source,
            "TimeSpan.FromDays(Days).Add(TimeSpan.FromDays(Days)) > TimeSpan.FromDays(1)",
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, DynqError::Evaluation(EvaluationError::Overflow { .. })));
    }

    #[test]
    fn test_should_reject_deeply_nested_predicate() {
        let nested = |depth: usize| format!("{}Views{} > 30", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(query::filter(&site(), &nested(20), &[]).unwrap().len(), 3);
        let err = query::filter(&site(), &nested(150), &[]).unwrap_err();
        assert!(matches!(err, DynqError::Parse(ParseError::NestingTooDeep { .. })));
    }

    #[test]
    fn test_should_compare_two_deferred_members() {
        let source = rows(serde_json::json!([
            {"A": 2, "B": 1},
            {"A": 1, "B": 2},
            {"A": 2.5, "B": 2},
            {"A": "x", "B": 1},
            {"A": 3},
        ]));
        let hits = query::filter(&source, "A > B", &[]).unwrap();
        assert_eq!(hits, vec![source[0].clone(), source[2].clone()]);
        assert_eq!(query::filter(&source, "A <= B", &[]).unwrap(), vec![source[1].clone()]);
        assert_eq!(query::filter(&source, "A != B", &[]).unwrap().len(), 3);
    }

    #[test]
    fn test_should_not_match_mismatched_types_with_not_equal() {
        let source = rows(serde_json::json!([{"S": "x"}, {"S": 5}, {"T": 1}]));
        let hits = query::filter(&source, r#"S != "a""#, &[]).unwrap();
        assert_eq!(hits, vec![source[0].clone()]);
        assert_eq!(query::filter(&source, r#"S == "x""#, &[]).unwrap().len(), 1);
    }
}
