//! Ordering integration tests.

#[cfg(test)]
mod tests {
    use dynq_core::{Compiler, DynqError, Query, Type, Value, dominant_type, query};

    use crate::{content_type, names, site};

    #[test]
    fn test_should_order_by_dominant_type() {
        let views = query::project(&site(), "Views", &[]).unwrap();
        assert_eq!(dominant_type(&views), Some(Type::INT64));

        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let sorted = q.order_by(&site(), "Views", &[]).unwrap();
        assert_eq!(
            names(&sorted),
            ["Blog", "Contact", "Post 2", "About", "Post 1", "Home", "Post 3"]
        );
    }

    #[test]
    fn test_should_compose_static_and_descending_keys() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let sorted = q.order_by(&site(), "Template, Name desc", &[]).unwrap();
        assert_eq!(
            names(&sorted),
            ["Home", "Blog", "Post 3", "Post 2", "Post 1", "Contact", "About"]
        );
        let sorted = q.order_by(&site(), "CreateDate descending", &[]).unwrap();
        assert_eq!(names(&sorted)[..2], ["Contact", "Post 3"]);
    }

    #[test]
    fn test_should_order_text_ignoring_case() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let sorted = q.order_by(&site(), "Author", &[]).unwrap();
        assert_eq!(
            names(&sorted),
            ["Home", "Post 3", "Contact", "About", "Post 1", "Blog", "Post 2"]
        );
    }

    #[test]
    fn test_should_page_after_ordering() {
        let sorted = query::order_by(&site(), "Id desc", &[]).unwrap();
        let page = query::take(&query::skip(&sorted, 1), 2);
        assert_eq!(names(&page), ["Post 3", "Post 2"]);
        assert_eq!(query::count(&page), 2);
    }

    #[test]
    fn test_should_reject_malformed_ordering() {
        let err = query::order_by(&site(), "Name asc desc", &[]).unwrap_err();
        assert!(matches!(err, DynqError::Parse(_)));
    }

    #[test]
    fn test_should_order_json_integers_of_any_magnitude() {
        let rows: Vec<Value> = [3_i64, 5_000_000_000, 1, 2]
            .into_iter()
            .map(|n| Value::from(serde_json::json!({ "n": n })))
            .collect();
        let keys = query::project(&rows, "n", &[]).unwrap();
        assert_eq!(dominant_type(&keys), Some(Type::INT64));

        let sorted = query::order_by(&rows, "n", &[]).unwrap();
        let sorted = query::project(&sorted, "n.ToString()", &[]).unwrap();
        assert_eq!(sorted, ["1", "2", "3", "5000000000"].map(Value::from).to_vec());
        let sorted = query::order_by(&rows, "n desc", &[]).unwrap();
        assert_eq!(query::project(&sorted[..1], "n", &[]).unwrap(), [Value::Int64(5_000_000_000)]);
    }
}
