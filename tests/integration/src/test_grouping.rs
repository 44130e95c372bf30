//! Grouping integration tests.

#[cfg(test)]
mod tests {
    use dynq_core::{Compiler, Query, Record, Value, query};

    use crate::{content_type, site};

    #[test]
    fn test_should_group_by_static_key_in_first_seen_order() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let groups = q.group_by(&site(), "Template", "Name", &[]).unwrap();
        let keys: Vec<Value> = groups.iter().map(|g| g.key.clone()).collect();
        assert_eq!(
            keys,
            vec![Value::from("home"), Value::from("text"), Value::from("list"), Value::from("post")]
        );
        assert_eq!(groups[1].elements, vec![Value::from("About"), Value::from("Contact")]);
        assert_eq!(groups[3].try_get_named_value("Count"), Some(Value::Int32(3)));
    }

    #[test]
    fn test_should_collect_missing_keys_into_one_group() {
        let groups = query::group_by(&site(), "Author", "Id", &[]).unwrap();
        assert_eq!(groups.len(), 4);
        assert!(groups[0].key.is_absent());
        assert_eq!(groups[0].elements, vec![Value::Int32(1), Value::Int32(6), Value::Int32(7)]);
        assert_eq!(groups[2].key, Value::from("bob"));
        assert_eq!(groups[2].elements, vec![Value::Int32(3), Value::Int32(5)]);
    }

    #[test]
    fn test_should_query_groupings_as_records() {
        let groups: Vec<Value> = query::group_by(&site(), "Template", "it", &[])
            .unwrap()
            .into_iter()
            .map(Value::from)
            .collect();
        let busy = query::filter(&groups, "Count > 1", &[]).unwrap();
        let keys = query::project(&busy, "Key", &[]).unwrap();
        assert_eq!(keys, vec![Value::from("text"), Value::from("post")]);

        let totals = query::project(&busy, "Elements.Sum(Id)", &[]).unwrap();
        assert_eq!(totals, vec![Value::Int32(9), Value::Int32(15)]);
        assert!(query::any(&busy));
    }
}
