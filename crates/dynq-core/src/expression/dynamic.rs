//! Deferred member access.
//!
//! When a name is not statically declared on a receiver that answers names
//! per element (dynamic records, maps, and values whose type is only known
//! at evaluation time), the parser builds deferred nodes instead of
//! failing. The functions at the bottom of this module resolve those nodes
//! against the runtime value.

use tracing::trace;

use crate::error::EvaluationError;
use crate::types::Type;
use crate::value::Value;

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::builtins::{self, MemberKind, Receiver, TypeName};
use super::resolver::{Resolution, find_best_for_values};

// ---------------------------------------------------------------------------
// Deferred node construction
// ---------------------------------------------------------------------------

/// Whether names missing from `ty` are looked up on the element instead.
#[must_use]
pub fn answers_names(ty: &Type) -> bool {
    match ty {
        Type::Dynamic | Type::Map => true,
        Type::Record(record) => record.has_dynamic_members(),
        _ => false,
    }
}

/// `target.name` resolved per element.
#[must_use]
pub fn member(target: Expr, name: &str) -> Expr {
    Expr::DynamicMember {
        target: Box::new(target),
        name: name.to_owned(),
    }
}

/// `target.name(args)` or `Owner.name(args)` resolved per element.
#[must_use]
pub fn call(
    target: Option<Expr>,
    owner: Option<TypeName>,
    kind: MemberKind,
    name: &str,
    args: Vec<Expr>,
) -> Expr {
    Expr::DynamicCall {
        target: target.map(Box::new),
        owner,
        kind,
        name: name.to_owned(),
        args,
    }
}

/// Merge two operands, at least one deferred, into one computation that
/// evaluates both against the same element. Comparisons always produce a
/// boolean; everything else stays deferred.
#[must_use]
pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let ty = match op {
        _ if op.is_comparison() => Type::BOOLEAN,
        BinaryOp::Concat => Type::STRING,
        _ => Type::Dynamic,
    };
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        ty,
    }
}

/// Unary operator over a deferred operand.
#[must_use]
pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: Box::new(operand),
        ty: Type::Dynamic,
    }
}

// ---------------------------------------------------------------------------
// Evaluation-time resolution
// ---------------------------------------------------------------------------

fn record_lookup(target: &Value, name: &str, ignore_case: bool) -> Option<Value> {
    match target {
        Value::Record(record) => record.try_get_named_value(name).or_else(|| {
            ignore_case
                .then(|| {
                    record
                        .named_values()
                        .into_iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(name))
                        .map(|(_, v)| v)
                })
                .flatten()
        }),
        Value::Map(_) => target.named_value(name, ignore_case),
        _ => None,
    }
}

fn receiver_of(value: &Value) -> Option<Receiver> {
    value.type_of().as_ref().and_then(Receiver::of)
}

/// Value of `name` on `target`: a record or map entry, the length of a
/// list, or a built-in property. Anything unresolved is absent.
pub fn get_member(target: &Value, name: &str, ignore_case: bool) -> Result<Value, EvaluationError> {
    if target.is_null_or_absent() {
        return Ok(Value::Absent);
    }
    if let Some(found) = record_lookup(target, name, ignore_case) {
        return Ok(found);
    }
    if let Value::List(items) = target
        && (name.eq_ignore_ascii_case("Count") || name.eq_ignore_ascii_case("Length"))
    {
        return Ok(i32::try_from(items.len()).map_or(Value::Int64(i64::MAX), Value::Int32));
    }
    let Some(receiver) = receiver_of(target) else {
        trace!(name, "dynamic member not found");
        return Ok(Value::Absent);
    };
    match builtins::lookup(receiver, MemberKind::Property, name, 0).next() {
        Some(builtin) => builtin.invoke(Some(target), &[]),
        None => Ok(Value::Absent),
    }
}

/// Call `name` on `target` (or on `owner` for static calls) with evaluated
/// arguments. Records and maps holding a lambda under `name` invoke it;
/// otherwise the best built-in overload for the runtime argument types is
/// used. Anything unresolved is absent.
pub fn invoke_member(
    target: Option<&Value>,
    owner: Option<TypeName>,
    kind: MemberKind,
    name: &str,
    args: &[Value],
    ignore_case: bool,
) -> Result<Value, EvaluationError> {
    let receiver = match (target, owner) {
        (Some(value), _) if value.is_null_or_absent() => return Ok(Value::Absent),
        (Some(value), _) => {
            if let Some(found) = record_lookup(value, name, ignore_case) {
                return match found {
                    Value::Lambda(plan) => plan.invoke(args),
                    _ => Ok(Value::Absent),
                };
            }
            receiver_of(value)
        }
        (None, Some(owner)) => Some(Receiver::Static(owner)),
        (None, None) => None,
    };
    let Some(receiver) = receiver else {
        return Ok(Value::Absent);
    };
    let candidates: Vec<_> = builtins::lookup(receiver, kind, name, args.len()).collect();
    match find_best_for_values(candidates.iter().map(|b| b.params.as_slice()), args) {
        Resolution::Unique(index) => {
            let builtin = candidates[index];
            let converted = args
                .iter()
                .zip(&builtin.params)
                .map(|(arg, param)| arg.convert(param, false))
                .collect::<Result<Vec<_>, _>>()?;
            builtin.invoke(target, &converted)
        }
        Resolution::NotFound | Resolution::Ambiguous => {
            trace!(name, arity = args.len(), "no runtime overload");
            Ok(Value::Absent)
        }
    }
}

/// `target[index]`. With `strict`, a list or string index outside the
/// bounds is an error; otherwise it is absent, as is any missing key.
pub fn get_index(target: &Value, index: &Value, strict: bool) -> Result<Value, EvaluationError> {
    let position = |len: usize| -> Result<Option<usize>, EvaluationError> {
        let Some(i) = index.as_i128() else {
            return Ok(None);
        };
        match usize::try_from(i).ok().filter(|i| *i < len) {
            Some(i) => Ok(Some(i)),
            None if strict => Err(EvaluationError::IndexOutOfRange {
                index: i64::try_from(i).unwrap_or(i64::MAX),
                len,
            }),
            None => Ok(None),
        }
    };
    let found = match target {
        Value::List(items) => position(items.len())?.and_then(|i| items.get(i).cloned()),
        Value::String(s) => {
            let len = s.chars().count();
            position(len)?.and_then(|i| s.chars().nth(i)).map(Value::Char)
        }
        Value::Map(_) | Value::Record(_) => match index {
            Value::String(key) => record_lookup(target, key, false),
            Value::Null | Value::Absent => None,
            other => record_lookup(target, &other.to_string(), false),
        },
        _ => None,
    };
    Ok(found.unwrap_or(Value::Absent))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::{Primitive, RecordType};
    use crate::value::Record;

    #[derive(Debug)]
    struct Page;

    impl Record for Page {
        fn try_get_named_value(&self, name: &str) -> Option<Value> {
            (name == "Title").then(|| Value::from("Home"))
        }

        fn named_values(&self) -> Vec<(String, Value)> {
            vec![("Title".to_owned(), Value::from("Home"))]
        }
    }

    #[test]
    fn test_should_answer_names_for_dynamic_receivers() {
        assert!(answers_names(&Type::Dynamic));
        assert!(answers_names(&Type::Map));
        assert!(answers_names(&Type::dynamic_record("Page")));
        assert!(!answers_names(&Type::Record(Arc::new(RecordType::new("Point")))));
        assert!(!answers_names(&Type::STRING));
    }

    #[test]
    fn test_should_type_merged_comparison_as_boolean() {
        let it = Expr::Parameter {
            slot: 0,
            ty: Type::Dynamic,
        };
        let left = member(it.clone(), "A");
        let right = member(it, "B");
        assert_eq!(binary(BinaryOp::Less, left.clone(), right.clone()).ty(), Type::BOOLEAN);
        assert_eq!(binary(BinaryOp::Add, left, right).ty(), Type::Dynamic);
    }

    #[test]
    fn test_should_look_up_record_members_ignoring_case() {
        let page = Value::record(Page);
        assert_eq!(get_member(&page, "Title", false).unwrap(), Value::from("Home"));
        assert_eq!(get_member(&page, "title", true).unwrap(), Value::from("Home"));
        assert_eq!(get_member(&page, "title", false).unwrap(), Value::Absent);
        assert_eq!(get_member(&page, "Missing", true).unwrap(), Value::Absent);
    }

    #[test]
    fn test_should_fall_back_to_builtin_properties() {
        assert_eq!(
            get_member(&Value::from("abc"), "Length", true).unwrap(),
            Value::Int32(3)
        );
        let list = Value::list([Value::Int32(1), Value::Int32(2)]);
        assert_eq!(get_member(&list, "Count", true).unwrap(), Value::Int32(2));
        assert_eq!(get_member(&Value::Null, "Length", true).unwrap(), Value::Absent);
    }

    #[test]
    fn test_should_dispatch_methods_on_runtime_type() {
        let result = invoke_member(
            Some(&Value::from("Hello")),
            None,
            MemberKind::Method,
            "StartsWith",
            &[Value::from("He")],
            true,
        )
        .unwrap();
        assert_eq!(result, Value::Bool(true));

        let missing = invoke_member(
            Some(&Value::Int32(4)),
            None,
            MemberKind::Method,
            "StartsWith",
            &[Value::from("He")],
            true,
        )
        .unwrap();
        assert_eq!(missing, Value::Absent);
    }

    #[test]
    fn test_should_dispatch_static_calls_on_argument_types() {
        let result = invoke_member(
            None,
            Some(TypeName::Math),
            MemberKind::Method,
            "Abs",
            &[Value::Double(-2.5)],
            true,
        )
        .unwrap();
        assert_eq!(result, Value::Double(2.5));
        let result = invoke_member(
            None,
            Some(TypeName::Primitive(Primitive::String)),
            MemberKind::Method,
            "IsNullOrEmpty",
            &[Value::Null],
            true,
        )
        .unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn test_should_index_lists_strings_and_maps() {
        let list = Value::list([Value::from("a"), Value::from("b")]);
        assert_eq!(get_index(&list, &Value::Int32(1), true).unwrap(), Value::from("b"));
        assert_eq!(get_index(&list, &Value::Int32(5), false).unwrap(), Value::Absent);
        assert!(matches!(
            get_index(&list, &Value::Int32(5), true),
            Err(EvaluationError::IndexOutOfRange { index: 5, len: 2 })
        ));
        assert_eq!(
            get_index(&Value::from("xyz"), &Value::Int32(2), true).unwrap(),
            Value::Char('z')
        );
        let map = Value::map([("k", Value::Int32(7))]);
        assert_eq!(get_index(&map, &Value::from("k"), false).unwrap(), Value::Int32(7));
        assert_eq!(get_index(&map, &Value::from("x"), false).unwrap(), Value::Absent);
    }
}
