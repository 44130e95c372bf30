//! Overload resolution and operand promotion.
//!
//! An overload is applicable when every argument promotes to its parameter
//! type. Among applicable overloads the resolver keeps the one that is at
//! least as good a conversion target for every argument and strictly
//! better for at least one; anything else is ambiguous.

use std::cmp::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::types::Type;
use crate::value::{EnumValue, Value, parse_literal};

use super::ast::Expr;
use super::builtins::{self, Builtin, MemberKind, Receiver};

/// Outcome of an overload search.
#[derive(Debug)]
pub enum Resolution<T> {
    /// No overload accepts the arguments.
    NotFound,
    /// Exactly one best overload.
    Unique(T),
    /// Several overloads accept the arguments and none is best.
    Ambiguous,
}

/// Promote `expr` to `target`, or `None` when no implicit conversion exists.
///
/// Literal constants are re-read from their source text as the target type,
/// so `5` can become a `Byte` and `"Live"` an enum member. With `exact`, a
/// compatible reference-typed expression is still wrapped so its static
/// type becomes `target`.
#[must_use]
pub fn promote(expr: &Expr, target: &Type, exact: bool) -> Option<Expr> {
    let source = expr.ty();
    if source == *target {
        return Some(expr.clone());
    }
    if let Expr::Constant {
        value,
        literal: Some(text),
        ..
    } = expr
    {
        let reparsed = if value.is_null_or_absent() {
            (!target.is_value_type() || target.is_nullable()).then_some(Value::Null)
        } else {
            reparse_literal(value, text, target)
        };
        if let Some(value) = reparsed {
            return Some(Expr::Constant {
                value,
                ty: target.clone(),
                literal: Some(text.clone()),
            });
        }
    }
    if source.is_compatible_with(target) {
        if target.is_value_type() || exact {
            return Some(Expr::Convert {
                operand: Box::new(expr.clone()),
                ty: target.clone(),
                checked: false,
            });
        }
        return Some(expr.clone());
    }
    None
}

fn reparse_literal(value: &Value, text: &str, target: &Type) -> Option<Value> {
    let base = target.non_nullable();
    match (value, base) {
        (Value::String(_), Type::Enum(ty)) => EnumValue::named(ty, text).map(Value::Enum),
        (v, Type::Enum(ty)) if v.as_i128().is_some() => text
            .parse::<i64>()
            .ok()
            .map(|n| Value::Enum(EnumValue::new(Arc::clone(ty), n))),
        // Only integer literals are re-read; real literals keep their type.
        (v, Type::Primitive(p)) if base.is_numeric() && v.as_i128().is_some() => {
            parse_literal(text, *p)
        }
        _ => None,
    }
}

/// Rank `t1` against `t2` as conversion targets for `source`; `Greater`
/// means `t1` is the better target.
#[must_use]
pub fn compare_conversions(source: &Type, t1: &Type, t2: &Type) -> Ordering {
    if t1 == t2 {
        return Ordering::Equal;
    }
    if source == t1 {
        return Ordering::Greater;
    }
    if source == t2 {
        return Ordering::Less;
    }
    let t1_to_t2 = t1.is_compatible_with(t2);
    let t2_to_t1 = t2.is_compatible_with(t1);
    if t1_to_t2 && !t2_to_t1 {
        return Ordering::Greater;
    }
    if t2_to_t1 && !t1_to_t2 {
        return Ordering::Less;
    }
    if t1.is_signed_integral() && t2.is_unsigned_integral() {
        return Ordering::Greater;
    }
    if t2.is_signed_integral() && t1.is_unsigned_integral() {
        return Ordering::Less;
    }
    Ordering::Equal
}

fn is_better_than(args: &[Type], m1: &[Type], m2: &[Type]) -> bool {
    let mut better = false;
    for ((arg, p1), p2) in args.iter().zip(m1).zip(m2) {
        match compare_conversions(arg, p1, p2) {
            Ordering::Less => return false,
            Ordering::Greater => better = true,
            Ordering::Equal => {}
        }
    }
    better
}

fn pick_best<T>(mut applicable: Vec<(&[Type], T)>, args: &[Type]) -> Resolution<T> {
    match applicable.len() {
        0 => return Resolution::NotFound,
        1 => return applicable.pop().map_or(Resolution::NotFound, |(_, t)| Resolution::Unique(t)),
        _ => {}
    }
    let winners: Vec<usize> = (0..applicable.len())
        .filter(|&i| {
            (0..applicable.len())
                .all(|j| i == j || is_better_than(args, applicable[i].0, applicable[j].0))
        })
        .collect();
    match winners[..] {
        [winner] => Resolution::Unique(applicable.swap_remove(winner).1),
        _ => Resolution::Ambiguous,
    }
}

/// Best of `signatures` for `args`; yields the signature index and the
/// arguments promoted to its parameter types.
pub fn find_best<'s>(
    signatures: impl IntoIterator<Item = &'s [Type]>,
    args: &[Expr],
) -> Resolution<(usize, Vec<Expr>)> {
    let arg_types: Vec<Type> = args.iter().map(Expr::ty).collect();
    let applicable = signatures
        .into_iter()
        .enumerate()
        .filter(|(_, params)| params.len() == args.len())
        .filter_map(|(index, params)| {
            let promoted = args
                .iter()
                .zip(params)
                .map(|(arg, param)| promote(arg, param, false))
                .collect::<Option<Vec<_>>>()?;
            Some((params, (index, promoted)))
        })
        .collect();
    pick_best(applicable, &arg_types)
}

/// Best of `signatures` for already evaluated arguments.
pub fn find_best_for_values<'s>(
    signatures: impl IntoIterator<Item = &'s [Type]>,
    args: &[Value],
) -> Resolution<usize> {
    let arg_types: Vec<Option<Type>> = args.iter().map(Value::type_of).collect();
    let applicable = signatures
        .into_iter()
        .enumerate()
        .filter(|(_, params)| params.len() == args.len())
        .filter(|(_, params)| {
            arg_types.iter().zip(params.iter()).all(|(arg, param)| match arg {
                Some(ty) => ty.is_compatible_with(param),
                None => !param.is_value_type() || param.is_nullable(),
            })
        })
        .map(|(index, params)| (params, index))
        .collect();
    let known: Vec<Type> = arg_types
        .into_iter()
        .map(|t| t.unwrap_or(Type::OBJECT))
        .collect();
    pick_best(applicable, &known)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemberKey {
    receiver: Receiver,
    kind: MemberKind,
    name: String,
    arity: usize,
}

/// Built-in member lookup with a memoized candidate list per receiver,
/// member name and arity.
#[derive(Debug, Default)]
pub struct Resolver {
    members: DashMap<MemberKey, Arc<[&'static Builtin]>>,
}

impl Resolver {
    /// Create a resolver with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue entries matching the receiver, kind, name and arity.
    #[must_use]
    pub fn candidates(
        &self,
        receiver: Receiver,
        kind: MemberKind,
        name: &str,
        arity: usize,
    ) -> Arc<[&'static Builtin]> {
        let key = MemberKey {
            receiver,
            kind,
            name: name.to_ascii_lowercase(),
            arity,
        };
        if let Some(hit) = self.members.get(&key) {
            trace!(?receiver, name, arity, "member candidates cache hit");
            return Arc::clone(&hit);
        }
        let found: Arc<[&'static Builtin]> =
            builtins::lookup(receiver, kind, name, arity).collect();
        Arc::clone(&self.members.entry(key).or_insert(found))
    }

    /// Resolve a built-in member call, promoting the arguments.
    pub fn resolve(
        &self,
        receiver: Receiver,
        kind: MemberKind,
        name: &str,
        args: &[Expr],
    ) -> Resolution<(&'static Builtin, Vec<Expr>)> {
        let candidates = self.candidates(receiver, kind, name, args.len());
        match find_best(candidates.iter().map(|b| b.params.as_slice()), args) {
            Resolution::Unique((index, promoted)) => {
                Resolution::Unique((candidates[index], promoted))
            }
            Resolution::NotFound => Resolution::NotFound,
            Resolution::Ambiguous => Resolution::Ambiguous,
        }
    }

    /// Number of memoized candidate lists.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.members.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnumType, Primitive};

    fn literal(value: Value, text: &str) -> Expr {
        Expr::Constant {
            ty: value.type_of().unwrap_or(Type::OBJECT),
            value,
            literal: Some(text.to_owned()),
        }
    }

    fn typed(ty: Type) -> Expr {
        Expr::Parameter { slot: 0, ty }
    }

    #[test]
    fn test_should_reparse_integer_literal_as_byte() {
        let promoted = promote(&literal(Value::Int32(5), "5"), &Type::BYTE, true).unwrap();
        assert!(matches!(promoted, Expr::Constant { value: Value::Byte(5), .. }));
        assert!(promote(&literal(Value::Int32(300), "300"), &Type::BYTE, true).is_none());
    }

    #[test]
    fn test_should_not_reparse_real_literals() {
        assert!(promote(&literal(Value::Double(1.5), "1.5"), &Type::INT32, true).is_none());
        assert!(promote(&literal(Value::Double(1.5), "1.5"), &Type::SINGLE, true).is_none());
        let single = promote(&literal(Value::Int32(2), "2"), &Type::SINGLE, true).unwrap();
        assert!(matches!(single, Expr::Constant { value: Value::Single(_), .. }));
    }

    #[test]
    fn test_should_reparse_string_literal_as_enum_member() {
        let status = Arc::new(EnumType::new("Status", [("Draft", 0), ("Live", 1)]));
        let target = Type::Enum(Arc::clone(&status));
        let promoted = promote(&literal(Value::from("live"), "live"), &target, true).unwrap();
        let Expr::Constant { value: Value::Enum(member), .. } = promoted else {
            panic!("expected enum constant");
        };
        assert_eq!(member.value(), 1);
        assert!(promote(&literal(Value::from("Gone"), "Gone"), &target, true).is_none());
    }

    #[test]
    fn test_should_promote_null_literal_to_reference_and_nullable() {
        let null = literal(Value::Null, "null");
        assert!(promote(&null, &Type::STRING, true).is_some());
        assert!(promote(&null, &Type::nullable(Type::INT32), true).is_some());
        assert!(promote(&null, &Type::INT32, true).is_none());
    }

    #[test]
    fn test_should_wrap_widening_in_conversion() {
        let promoted = promote(&typed(Type::INT32), &Type::INT64, false).unwrap();
        assert!(matches!(promoted, Expr::Convert { .. }));
        assert_eq!(promoted.ty(), Type::INT64);
        assert!(promote(&typed(Type::INT64), &Type::INT32, false).is_none());
    }

    #[test]
    fn test_should_prefer_signed_over_unsigned() {
        assert_eq!(
            compare_conversions(&Type::BYTE, &Type::INT32, &Type::UINT32),
            Ordering::Greater
        );
        assert_eq!(
            compare_conversions(&Type::INT32, &Type::INT64, &Type::DOUBLE),
            Ordering::Greater
        );
    }

    #[test]
    fn test_should_pick_narrowest_applicable_overload() {
        let signatures = [vec![Type::INT64], vec![Type::DOUBLE], vec![Type::INT32]];
        let args = [typed(Primitive::Int16.into())];
        let Resolution::Unique((index, promoted)) =
            find_best(signatures.iter().map(Vec::as_slice), &args)
        else {
            panic!("expected unique overload");
        };
        assert_eq!(index, 2);
        assert_eq!(promoted[0].ty(), Type::INT32);
    }

    #[test]
    fn test_should_report_ambiguous_overloads() {
        let signatures = [
            vec![Type::INT64, Type::DOUBLE],
            vec![Type::DOUBLE, Type::INT64],
        ];
        let args = [typed(Type::INT32), typed(Type::INT32)];
        assert!(matches!(
            find_best(signatures.iter().map(Vec::as_slice), &args),
            Resolution::Ambiguous
        ));
    }

    #[test]
    fn test_should_report_no_applicable_overload() {
        let signatures = [vec![Type::INT32]];
        let args = [typed(Type::STRING)];
        assert!(matches!(
            find_best(signatures.iter().map(Vec::as_slice), &args),
            Resolution::NotFound
        ));
    }

    #[test]
    fn test_should_select_overload_for_runtime_values() {
        let signatures = [vec![Type::INT32], vec![Type::INT64], vec![Type::DOUBLE]];
        let pick = |v: Value| match find_best_for_values(
            signatures.iter().map(Vec::as_slice),
            &[v],
        ) {
            Resolution::Unique(i) => Some(i),
            _ => None,
        };
        assert_eq!(pick(Value::Int32(1)), Some(0));
        assert_eq!(pick(Value::Int64(1)), Some(1));
        assert_eq!(pick(Value::Double(1.0)), Some(2));
        assert_eq!(pick(Value::from("x")), None);
    }

    #[test]
    fn test_should_memoize_member_candidates() {
        let resolver = Resolver::new();
        let string = Receiver::Instance(Primitive::String);
        let first = resolver.candidates(string, MemberKind::Method, "IndexOf", 1);
        let second = resolver.candidates(string, MemberKind::Method, "indexof", 1);
        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.cached_len(), 1);
    }
}
