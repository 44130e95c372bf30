//! Operator and aggregate signature tables.
//!
//! Each family lists the parameter-type tuples an operator accepts. The
//! resolver picks the best applicable tuple for the operand types and
//! promotes the operands to it.

use std::sync::LazyLock;

use crate::types::Type;

/// Operator families checked against the tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFamily {
    /// `and`, `or`.
    Logical,
    /// `*`, `/`, `%`.
    Arithmetic,
    /// `<`, `<=`, `>`, `>=`.
    Relational,
    /// `==`, `!=`.
    Equality,
    /// `+` on non-strings.
    Add,
    /// `-`.
    Subtract,
    /// Unary `-`.
    Negation,
    /// `!`, `not`.
    Not,
}

#[derive(Debug)]
struct Catalogue {
    logical: Vec<Vec<Type>>,
    arithmetic: Vec<Vec<Type>>,
    relational: Vec<Vec<Type>>,
    equality: Vec<Vec<Type>>,
    add: Vec<Vec<Type>>,
    subtract: Vec<Vec<Type>>,
    negation: Vec<Vec<Type>>,
    not: Vec<Vec<Type>>,
    summable: Vec<Vec<Type>>,
}

/// `(t, t)` and `(t?, t?)` for every value type in `types`; reference types
/// appear once.
fn pairs(types: &[Type]) -> Vec<Vec<Type>> {
    let mut out = Vec::new();
    for ty in types {
        out.push(vec![ty.clone(), ty.clone()]);
        if ty.is_value_type() {
            let nullable = Type::nullable(ty.clone());
            out.push(vec![nullable.clone(), nullable]);
        }
    }
    out
}

fn singles(types: &[Type]) -> Vec<Vec<Type>> {
    types
        .iter()
        .flat_map(|ty| [vec![ty.clone()], vec![Type::nullable(ty.clone())]])
        .collect()
}

fn mixed(pairs: &[(Type, Type)]) -> Vec<Vec<Type>> {
    pairs
        .iter()
        .flat_map(|(a, b)| {
            [
                vec![a.clone(), b.clone()],
                vec![Type::nullable(a.clone()), Type::nullable(b.clone())],
            ]
        })
        .collect()
}

static CATALOGUE: LazyLock<Catalogue> = LazyLock::new(|| {
    let numeric = [
        Type::INT32,
        Type::UINT32,
        Type::INT64,
        Type::UINT64,
        Type::SINGLE,
        Type::DOUBLE,
    ];
    let arithmetic = pairs(&numeric);

    let mut relational = arithmetic.clone();
    relational.extend(pairs(&[
        Type::STRING,
        Type::CHAR,
        Type::DATE_TIME,
        Type::TIME_SPAN,
    ]));

    let mut equality = relational.clone();
    equality.extend(pairs(&[Type::BOOLEAN, Type::GUID]));

    let mut add = arithmetic.clone();
    add.extend(mixed(&[
        (Type::DATE_TIME, Type::TIME_SPAN),
        (Type::TIME_SPAN, Type::TIME_SPAN),
    ]));

    let mut subtract = add.clone();
    subtract.extend(mixed(&[(Type::DATE_TIME, Type::DATE_TIME)]));

    Catalogue {
        logical: pairs(&[Type::BOOLEAN]),
        arithmetic,
        relational,
        equality,
        add,
        subtract,
        negation: singles(&[Type::INT32, Type::INT64, Type::SINGLE, Type::DOUBLE]),
        not: singles(&[Type::BOOLEAN]),
        summable: singles(&[Type::INT32, Type::INT64, Type::SINGLE, Type::DOUBLE]),
    }
});

/// Parameter tuples accepted by an operator family.
#[must_use]
pub fn operator_signatures(family: OperatorFamily) -> &'static [Vec<Type>] {
    let catalogue = &*CATALOGUE;
    match family {
        OperatorFamily::Logical => &catalogue.logical,
        OperatorFamily::Arithmetic => &catalogue.arithmetic,
        OperatorFamily::Relational => &catalogue.relational,
        OperatorFamily::Equality => &catalogue.equality,
        OperatorFamily::Add => &catalogue.add,
        OperatorFamily::Subtract => &catalogue.subtract,
        OperatorFamily::Negation => &catalogue.negation,
        OperatorFamily::Not => &catalogue.not,
    }
}

/// Selector types accepted by `Sum` and `Average`.
#[must_use]
pub fn summable_signatures() -> &'static [Vec<Type>] {
    &CATALOGUE.summable
}

/// Result type of `Average` over a selector of type `selector`.
#[must_use]
pub fn average_result(selector: &Type) -> Type {
    let inner = match selector.non_nullable() {
        ty @ Type::Primitive(crate::types::Primitive::Single) => ty.clone(),
        _ => Type::DOUBLE,
    };
    if selector.is_nullable() {
        Type::nullable(inner)
    } else {
        inner
    }
}

/// Result type of a binary operator once its operands were promoted to
/// `left` and `right`.
#[must_use]
pub fn binary_result(left: &Type, right: &Type) -> Type {
    let nullable = left.is_nullable() || right.is_nullable();
    let ty = match (left.non_nullable(), right.non_nullable()) {
        (l, r) if *l == Type::DATE_TIME && *r == Type::DATE_TIME => Type::TIME_SPAN,
        (l, _) => l.clone(),
    };
    if nullable { Type::nullable(ty) } else { ty }
}
