//! Query operations over sequences of values.
//!
//! [`Query`] binds a [`Compiler`] to an element type. The free functions use
//! a process-wide compiler configured from the environment and treat every
//! element as a record answering names dynamically.

use std::sync::{Arc, LazyLock};

use tracing::debug;

use crate::compiler::Compiler;
use crate::config::DynqConfig;
use crate::error::DynqResult;
use crate::types::Type;
use crate::value::{Record, Value};

static DEFAULT_COMPILER: LazyLock<Compiler> =
    LazyLock::new(|| Compiler::new(DynqConfig::from_env()));

/// Element type used by the free functions.
const DEFAULT_ELEMENT: &str = "Record";

/// Query operations bound to a compiler and an element type.
#[derive(Debug)]
pub struct Query<'c> {
    compiler: &'c Compiler,
    element: Type,
}

impl<'c> Query<'c> {
    /// Create a query over elements of type `element`.
    #[must_use]
    pub fn new(compiler: &'c Compiler, element: Type) -> Self {
        Self { compiler, element }
    }

    /// Elements for which `predicate` is true. An absent member in the
    /// predicate counts as `false`, as configured on the compiler.
    ///
    /// # Errors
    ///
    /// Returns `DynqError::Parse` when the predicate does not compile and
    /// `DynqError::Evaluation` when it fails on an element.
    pub fn filter(
        &self,
        source: &[Value],
        predicate: &str,
        args: &[Value],
    ) -> DynqResult<Vec<Value>> {
        let plan = self.compiler.compile_predicate(&self.element, predicate, args)?;
        let mut matched = Vec::new();
        for element in source {
            if plan.matches(element)? {
                matched.push(element.clone());
            }
        }
        debug!(predicate, input = source.len(), output = matched.len(), "filtered sequence");
        Ok(matched)
    }

    /// `selector` applied to every element. Absent results are kept.
    ///
    /// # Errors
    ///
    /// See [`filter`](Self::filter).
    pub fn project(
        &self,
        source: &[Value],
        selector: &str,
        args: &[Value],
    ) -> DynqResult<Vec<Value>> {
        let plan = self.compiler.compile_selector(&self.element, selector, args)?;
        let projected = source
            .iter()
            .map(|element| plan.evaluate(element))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(selector, count = projected.len(), "projected sequence");
        Ok(projected)
    }

    /// Elements sorted by `ordering` (`key [asc|desc], ...`).
    ///
    /// # Errors
    ///
    /// See [`filter`](Self::filter).
    pub fn order_by(
        &self,
        source: &[Value],
        ordering: &str,
        args: &[Value],
    ) -> DynqResult<Vec<Value>> {
        let plan = self.compiler.compile_ordering(&self.element, ordering, args)?;
        let sorted = plan.sort(source)?;
        debug!(ordering, count = sorted.len(), "ordered sequence");
        Ok(sorted)
    }

    /// Elements grouped by `key`, each group holding `element` applied to
    /// its members. Groups appear in the order their key is first seen.
    ///
    /// # Errors
    ///
    /// See [`filter`](Self::filter).
    pub fn group_by(
        &self,
        source: &[Value],
        key: &str,
        element: &str,
        args: &[Value],
    ) -> DynqResult<Vec<Grouping>> {
        let key_plan = self.compiler.compile_selector(&self.element, key, args)?;
        let element_plan = self.compiler.compile_selector(&self.element, element, args)?;

        let mut groups: Vec<Grouping> = Vec::new();
        for item in source {
            let k = key_plan.evaluate(item)?;
            let v = element_plan.evaluate(item)?;
            match groups.iter_mut().find(|g| same_key(&g.key, &k)) {
                Some(group) => group.elements.push(v),
                None => groups.push(Grouping {
                    key: k,
                    elements: vec![v],
                }),
            }
        }
        debug!(key, input = source.len(), groups = groups.len(), "grouped sequence");
        Ok(groups)
    }
}

fn same_key(a: &Value, b: &Value) -> bool {
    a == b || a.loose_eq(b) == Some(true)
}

// ------ grouping ------

/// A group of elements sharing a key.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    /// The shared key; absent when the key member was missing.
    pub key: Value,
    /// Projected members, in source order.
    pub elements: Vec<Value>,
}

impl Record for Grouping {
    fn type_name(&self) -> &str {
        "Grouping"
    }

    fn try_get_named_value(&self, name: &str) -> Option<Value> {
        match name {
            "Key" => Some(self.key.clone()),
            "Elements" => Some(Value::List(Arc::new(self.elements.clone()))),
            "Count" => i32::try_from(self.elements.len()).ok().map(Value::Int32),
            _ => None,
        }
    }

    fn named_values(&self) -> Vec<(String, Value)> {
        ["Key", "Elements", "Count"]
            .into_iter()
            .filter_map(|name| self.try_get_named_value(name).map(|v| (name.to_owned(), v)))
            .collect()
    }
}

impl From<Grouping> for Value {
    fn from(grouping: Grouping) -> Self {
        Value::record(grouping)
    }
}

// ------ free functions ------

fn default_query() -> Query<'static> {
    Query::new(&DEFAULT_COMPILER, Type::dynamic_record(DEFAULT_ELEMENT))
}

/// Elements of `source` matching `predicate`.
///
/// # Errors
///
/// See [`Query::filter`].
pub fn filter(source: &[Value], predicate: &str, args: &[Value]) -> DynqResult<Vec<Value>> {
    default_query().filter(source, predicate, args)
}

/// `selector` applied to every element of `source`.
///
/// # Errors
///
/// See [`Query::project`].
pub fn project(source: &[Value], selector: &str, args: &[Value]) -> DynqResult<Vec<Value>> {
    default_query().project(source, selector, args)
}

/// `source` sorted by `ordering`.
///
/// # Errors
///
/// See [`Query::order_by`].
pub fn order_by(source: &[Value], ordering: &str, args: &[Value]) -> DynqResult<Vec<Value>> {
    default_query().order_by(source, ordering, args)
}

/// `source` grouped by `key`.
///
/// # Errors
///
/// See [`Query::group_by`].
pub fn group_by(
    source: &[Value],
    key: &str,
    element: &str,
    args: &[Value],
) -> DynqResult<Vec<Grouping>> {
    default_query().group_by(source, key, element, args)
}

/// The first `n` elements.
#[must_use]
pub fn take(source: &[Value], n: usize) -> Vec<Value> {
    source.iter().take(n).cloned().collect()
}

/// Everything after the first `n` elements.
#[must_use]
pub fn skip(source: &[Value], n: usize) -> Vec<Value> {
    source.iter().skip(n).cloned().collect()
}

/// Whether `source` has any element.
#[must_use]
pub fn any(source: &[Value]) -> bool {
    !source.is_empty()
}

/// Number of elements.
#[must_use]
pub fn count(source: &[Value]) -> usize {
    source.len()
}
