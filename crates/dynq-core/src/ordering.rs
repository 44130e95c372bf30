//! Multi-key ordering with dominant-type inference.
//!
//! A key whose static type is known sorts by that type. A key that resolved
//! to a deferred access is evaluated for every element first; the most
//! frequent runtime type among the results wins the ballot and every key is
//! coerced to it before comparison.

use std::cmp::Ordering;

use tracing::debug;

use crate::error::EvaluationError;
use crate::plan::Plan;
use crate::types::Type;
use crate::value::Value;

/// One `key [asc|desc]` clause.
#[derive(Debug, Clone)]
pub struct OrderingKey {
    /// Key selector over the element.
    pub plan: Plan,
    /// Sort direction.
    pub ascending: bool,
}

/// A compiled `key [asc|desc], ...` ordering.
#[derive(Debug, Clone)]
pub struct OrderingPlan {
    keys: Vec<OrderingKey>,
}

// ------ sort keys ------

/// A key coerced for comparison.
#[derive(Debug, Clone)]
enum SortKey {
    /// Null, absent or not convertible without a default.
    Missing,
    /// Lowercased text, compared ordinally. This approximates a
    /// case-insensitive culture-aware order for ASCII and most Latin text;
    /// accents and locale-specific letters sort by code point.
    Text(String),
    Value(Value),
}

impl SortKey {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Missing, Self::Missing) => Ordering::Equal,
            (Self::Missing, _) => Ordering::Less,
            (_, Self::Missing) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Value(a), Self::Value(b)) => a.compare(b).unwrap_or(Ordering::Equal),
            (Self::Text(a), Self::Value(b)) => a.cmp(&b.to_string().to_lowercase()),
            (Self::Value(a), Self::Text(b)) => a.to_string().to_lowercase().cmp(b),
        }
    }
}

impl OrderingPlan {
    pub(crate) fn new(keys: Vec<OrderingKey>) -> Self {
        Self { keys }
    }

    /// The key clauses, primary first.
    #[must_use]
    pub fn keys(&self) -> &[OrderingKey] {
        &self.keys
    }

    /// Sort `elements` stably by every key in turn; later keys only break
    /// ties left by earlier ones.
    ///
    /// # Errors
    ///
    /// Returns the first `EvaluationError` raised by a key selector.
    pub fn sort(&self, elements: &[Value]) -> Result<Vec<Value>, EvaluationError> {
        if elements.is_empty() {
            return Ok(Vec::new());
        }

        let columns = self
            .keys
            .iter()
            .map(|key| sort_keys(&key.plan, elements))
            .collect::<Result<Vec<_>, _>>()?;

        let mut indices: Vec<usize> = (0..elements.len()).collect();
        indices.sort_by(|&a, &b| {
            self.keys
                .iter()
                .zip(&columns)
                .map(|(key, column)| {
                    let ord = column[a].compare(&column[b]);
                    if key.ascending { ord } else { ord.reverse() }
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        Ok(indices.into_iter().map(|i| elements[i].clone()).collect())
    }
}

fn sort_keys(plan: &Plan, elements: &[Value]) -> Result<Vec<SortKey>, EvaluationError> {
    let raw = elements
        .iter()
        .map(|element| plan.evaluate(element))
        .collect::<Result<Vec<_>, _>>()?;

    let static_type = plan.result_type();
    let target = if static_type.is_dynamic() || static_type == Type::OBJECT {
        dominant_type(&raw)
    } else {
        Some(static_type.non_nullable().clone())
    };

    let Some(target) = target else {
        return Ok(raw.iter().map(|_| SortKey::Missing).collect());
    };
    Ok(raw.iter().map(|v| coerce_key(v, &target)).collect())
}

/// Coerce one raw key to `target`. Text keys fold to lowercase; there is no
/// locale-aware collation.
fn coerce_key(value: &Value, target: &Type) -> SortKey {
    if value.is_null_or_absent() {
        return SortKey::Missing;
    }
    if *target == Type::STRING {
        return SortKey::Text(value.to_string().to_lowercase());
    }
    match value.coerce_to(target) {
        Some(v) => SortKey::Value(v),
        None => match target.default_value() {
            Value::Null => SortKey::Missing,
            v => SortKey::Value(v),
        },
    }
}

/// The most frequent runtime type among `values`, ignoring null and absent
/// results. Ties go to the type seen first. `None` when nothing votes.
#[must_use]
pub fn dominant_type(values: &[Value]) -> Option<Type> {
    let mut ballot: Vec<(Type, usize)> = Vec::new();
    for ty in values.iter().filter_map(Value::type_of) {
        match ballot.iter_mut().find(|(t, _)| *t == ty) {
            Some((_, count)) => *count += 1,
            None => ballot.push((ty, 1)),
        }
    }

    let mut winner: Option<&(Type, usize)> = None;
    for entry in &ballot {
        if winner.is_none_or(|w| entry.1 > w.1) {
            winner = Some(entry);
        }
    }
    let (ty, votes) = winner?;
    debug!(ty = %ty, votes, candidates = ballot.len(), "chose dominant key type");
    Some(ty.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;

    fn element(key: Value) -> Value {
        Value::map([("Key", key)])
    }

    fn keys_of(values: &[Value]) -> Vec<Value> {
        values
            .iter()
            .map(|v| v.named_value("Key", false).unwrap_or(Value::Absent))
            .collect()
    }

    #[test]
    fn test_should_pick_majority_type() {
        let values = [
            Value::Int32(5),
            Value::from("b"),
            Value::Int32(3),
            Value::Absent,
            Value::Absent,
            Value::Absent,
        ];
        assert_eq!(dominant_type(&values), Some(Type::INT32));
        assert_eq!(dominant_type(&[Value::Absent, Value::Null]), None);
    }

    #[test]
    fn test_should_break_ties_by_first_seen() {
        let values = [Value::from("a"), Value::Int32(1), Value::Int32(2), Value::from("b")];
        assert_eq!(dominant_type(&values), Some(Type::STRING));
    }

    #[test]
    fn test_should_coerce_minority_keys_to_default() {
        let compiler = Compiler::default();
        let ordering = compiler
            .compile_ordering(&Type::dynamic_record("Record"), "Key", &[])
            .unwrap();
        let elements: Vec<Value> = [
            Value::Int32(5),
            Value::from("b"),
            Value::Int32(3),
            Value::from("a"),
            Value::Int32(2),
        ]
        .into_iter()
        .map(element)
        .collect();
        let sorted = ordering.sort(&elements).unwrap();
        assert_eq!(
            keys_of(&sorted),
            vec![
                Value::from("b"),
                Value::from("a"),
                Value::Int32(2),
                Value::Int32(3),
                Value::Int32(5),
            ]
        );
    }

    #[test]
    fn test_should_sort_text_case_insensitively() {
        let compiler = Compiler::default();
        let ordering = compiler
            .compile_ordering(&Type::dynamic_record("Record"), "Key", &[])
            .unwrap();
        let elements: Vec<Value> = ["banana", "\u{c9}clair", "Apple", "cherry"]
            .into_iter()
            .map(|s| element(Value::from(s)))
            .collect();
        let sorted = ordering.sort(&elements).unwrap();
        // Folded text compares by code point, so accented letters follow `z`.
        assert_eq!(
            keys_of(&sorted),
            vec![
                Value::from("Apple"),
                Value::from("banana"),
                Value::from("cherry"),
                Value::from("\u{c9}clair"),
            ]
        );
    }

    #[test]
    fn test_should_compose_keys_stably() {
        let compiler = Compiler::default();
        let ordering = compiler
            .compile_ordering(&Type::dynamic_record("Record"), "a, b desc", &[])
            .unwrap();
        assert_eq!(ordering.keys().len(), 2);
        assert!(!ordering.keys()[1].ascending);
        let row = |a: i32, b: i32| Value::map([("a", Value::Int32(a)), ("b", Value::Int32(b))]);
        let sorted = ordering.sort(&[row(1, 2), row(1, 1), row(0, 5)]).unwrap();
        assert_eq!(sorted, vec![row(0, 5), row(1, 2), row(1, 1)]);
    }

    #[test]
    fn test_should_sort_missing_keys_first() {
        let compiler = Compiler::default();
        let ordering = compiler
            .compile_ordering(&Type::dynamic_record("Record"), "Key desc", &[])
            .unwrap();
        let elements = vec![
            element(Value::Int32(1)),
            Value::map([("Other", Value::Int32(9))]),
            element(Value::Int32(2)),
        ];
        let sorted = ordering.sort(&elements).unwrap();
        assert_eq!(sorted[0], element(Value::Int32(2)));
        assert_eq!(sorted[2], Value::map([("Other", Value::Int32(9))]));
        assert!(ordering.sort(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_should_order_json_integers_numerically() {
        let compiler = Compiler::default();
        let ordering = compiler
            .compile_ordering(&Type::dynamic_record("Record"), "n", &[])
            .unwrap();
        let rows: Vec<Value> = [3_i64, 5_000_000_000, 1, 2]
            .into_iter()
            .map(|n| Value::from(serde_json::json!({ "n": n })))
            .collect();
        let sorted: Vec<Value> = ordering
            .sort(&rows)
            .unwrap()
            .iter()
            .map(|row| row.named_value("n", false).unwrap())
            .collect();
        assert_eq!(
            sorted,
            vec![Value::Int64(1), Value::Int64(2), Value::Int64(3), Value::Int64(5_000_000_000)]
        );
    }
}
