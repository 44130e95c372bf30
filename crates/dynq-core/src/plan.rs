//! Compiled plans: a parsed expression bound to its parameters.

use std::fmt;
use std::sync::Arc;

use crate::error::EvaluationError;
use crate::expression::{EvalContext, Expr};
use crate::types::Type;
use crate::value::Value;

/// A lambda parameter. Unnamed parameters are only meaningful alone, as the
/// implicit `it`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Name used in the expression text.
    pub name: Option<String>,
    /// Declared type.
    pub ty: Type,
}

impl Parameter {
    /// A named parameter.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: Some(name.into()),
            ty,
        }
    }

    /// The implicit `it` parameter.
    #[must_use]
    pub fn unnamed(ty: Type) -> Self {
        Self { name: None, ty }
    }
}

/// Options of predicate compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredicateOptions {
    /// Read an absent dynamic member as `false` in logical contexts.
    pub absent_as_false: bool,
}

impl Default for PredicateOptions {
    fn default() -> Self {
        Self {
            absent_as_false: true,
        }
    }
}

#[derive(Debug)]
struct PlanInner {
    source: String,
    params: Vec<Parameter>,
    body: Expr,
    absent_as_false: bool,
    ignore_case: bool,
}

/// An immutable compiled expression. Cheap to clone and safe to share
/// across threads; every invocation evaluates in its own frame.
#[derive(Clone)]
pub struct Plan {
    inner: Arc<PlanInner>,
}

impl Plan {
    pub(crate) fn new(
        source: &str,
        params: Vec<Parameter>,
        body: Expr,
        absent_as_false: bool,
        ignore_case: bool,
    ) -> Self {
        Self {
            inner: Arc::new(PlanInner {
                source: source.to_owned(),
                params,
                body,
                absent_as_false,
                ignore_case,
            }),
        }
    }

    /// The expression text the plan was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Declared parameters.
    #[must_use]
    pub fn params(&self) -> &[Parameter] {
        &self.inner.params
    }

    /// The compiled expression graph.
    #[must_use]
    pub fn body(&self) -> &Expr {
        &self.inner.body
    }

    /// Static result type; [`Type::Dynamic`] when only known per element.
    #[must_use]
    pub fn result_type(&self) -> Type {
        self.inner.body.ty()
    }

    /// `Func<params..., result>`.
    #[must_use]
    pub fn function_type(&self) -> Type {
        Type::Function {
            params: self.inner.params.iter().map(|p| p.ty.clone()).collect(),
            result: Box::new(self.result_type()),
        }
    }

    /// Whether absent members read as `false` in logical contexts.
    #[must_use]
    pub fn absent_as_false(&self) -> bool {
        self.inner.absent_as_false
    }

    /// Evaluate with one value per parameter.
    ///
    /// # Errors
    ///
    /// Returns `EvaluationError::InvalidArgument` when the argument count
    /// differs from the parameter count, or any error raised while
    /// evaluating the body.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, EvaluationError> {
        if args.len() != self.inner.params.len() {
            return Err(EvaluationError::InvalidArgument {
                function: "invoke",
                message: format!(
                    "expected {} argument(s), got {}",
                    self.inner.params.len(),
                    args.len()
                ),
            });
        }
        EvalContext::new(args.to_vec(), self.inner.absent_as_false, self.inner.ignore_case)
            .eval(&self.inner.body)
    }

    /// Evaluate a single-parameter plan against `element`.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub fn evaluate(&self, element: &Value) -> Result<Value, EvaluationError> {
        self.invoke(std::slice::from_ref(element))
    }

    /// Evaluate as a predicate: anything but `true` is a mismatch.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub fn matches(&self, element: &Value) -> Result<bool, EvaluationError> {
        Ok(self.evaluate(element)?.as_bool().unwrap_or(false))
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("source", &self.inner.source)
            .field("type", &self.function_type().to_string())
            .finish_non_exhaustive()
    }
}
