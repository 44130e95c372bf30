//! Projection integration tests.

#[cfg(test)]
mod tests {
    use dynq_core::{Compiler, Parameter, Query, Type, Value, query};

    use crate::{content_type, site};

    #[test]
    fn test_should_keep_absent_results() {
        let projected = query::project(&site(), "Views", &[]).unwrap();
        assert_eq!(
            projected,
            vec![
                Value::Int64(120),
                Value::Int64(15),
                Value::Absent,
                Value::Int64(40),
                Value::from("7"),
                Value::Int64(300),
                Value::Absent,
            ]
        );
    }

    #[test]
    fn test_should_build_anonymous_records() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let projected = q.project(&site()[..3], "new(Name, Views * 2 as Twice)", &[]).unwrap();
        assert_eq!(
            projected[0],
            Value::map([("Name", Value::from("Home")), ("Twice", Value::Int64(240))])
        );
        assert_eq!(projected[2].named_value("Twice", false), Some(Value::Absent));
    }

    #[test]
    fn test_should_concatenate_and_branch() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let projected = q
            .project(&site()[..2], r#"Name & " (" & Template & ")""#, &[])
            .unwrap();
        assert_eq!(projected, vec![Value::from("Home (home)"), Value::from("About (text)")]);

        let projected = q
            .project(&site(), r#"iif(Template == "post", Name, "-")"#, &[])
            .unwrap();
        assert_eq!(projected[0], Value::from("-"));
        assert_eq!(projected[3], Value::from("Post 1"));
    }

    #[test]
    fn test_should_invoke_lambda_argument() {
        let compiler = Compiler::default();
        let times_ten = compiler
            .compile_lambda(&[Parameter::new("x", Type::INT32)], None, "x * 10", &[])
            .unwrap();
        let q = Query::new(&compiler, content_type());
        let projected = q.project(&site()[..3], "@0(Id)", &[Value::Lambda(times_ten)]).unwrap();
        assert_eq!(projected, vec![Value::Int32(10), Value::Int32(20), Value::Int32(30)]);
    }

    #[test]
    fn test_should_index_deferred_lists() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let projected = q.project(&site(), "Tags[0]", &[]).unwrap();
        assert_eq!(projected[3], Value::from("rust"));
        assert!(projected[0].is_absent());
    }

    #[test]
    fn test_should_call_date_builtins() {
        let compiler = Compiler::default();
        let q = Query::new(&compiler, content_type());
        let projected = q.project(&site()[..1], "CreateDate.AddDays(1).Day", &[]).unwrap();
        assert_eq!(projected, vec![Value::Int32(11)]);
        let projected = q.project(&site()[..1], "CreateDate.Year + Children.Count()", &[]).unwrap();
        assert_eq!(projected, vec![Value::Int32(2027)]);
    }
}
