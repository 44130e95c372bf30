//! Tree-walking evaluator for compiled expression graphs.
//!
//! Parameters and the implicit `it` of aggregate scopes live in numbered
//! frame slots. Deferred nodes are resolved against the runtime value as
//! they are reached; a lookup that finds nothing yields [`Value::Absent`],
//! which comparisons treat as a mismatch and arithmetic propagates.

use std::cmp::Ordering;

use crate::error::EvaluationError;
use crate::types::{Primitive, Type};
use crate::value::{Value, from_f64, from_i128};

use super::ast::{AggregateKind, BinaryOp, Expr, UnaryOp};
use super::dynamic;

// ---------------------------------------------------------------------------
// Evaluation context
// ---------------------------------------------------------------------------

/// Frame of one plan invocation.
#[derive(Debug)]
pub struct EvalContext {
    slots: Vec<Value>,
    absent_as_false: bool,
    ignore_case: bool,
}

impl EvalContext {
    /// Bind the plan parameters to the first slots.
    #[must_use]
    pub fn new(args: Vec<Value>, absent_as_false: bool, ignore_case: bool) -> Self {
        Self {
            slots: args,
            absent_as_false,
            ignore_case,
        }
    }

    /// Boolean reading of a value in a logical context. Absent reads as
    /// `false` when coercion is on; anything else that is not a boolean is
    /// unknown.
    fn truth(&self, value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Absent => self.absent_as_false.then_some(false),
            Value::Null => Some(false),
            _ => None,
        }
    }

    fn bind(&mut self, slot: usize, value: Value) -> Value {
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, Value::Absent);
        }
        std::mem::replace(&mut self.slots[slot], value)
    }

    /// Evaluate `expr` in this frame.
    ///
    /// # Errors
    ///
    /// Returns `EvaluationError` for integer division by zero, checked
    /// conversion overflow, out-of-range static indexing, and invalid
    /// arguments to built-ins.
    pub fn eval(&mut self, expr: &Expr) -> Result<Value, EvaluationError> {
        match expr {
            Expr::Constant { value, .. } => Ok(value.clone()),
            Expr::Parameter { slot, .. } => {
                Ok(self.slots.get(*slot).cloned().unwrap_or(Value::Absent))
            }
            Expr::Member { target, name, .. } | Expr::DynamicMember { target, name } => {
                let target = self.eval(target)?;
                dynamic::get_member(&target, name, self.ignore_case)
            }
            Expr::Call { target, builtin, args } => {
                let target = target.as_deref().map(|t| self.eval(t)).transpose()?;
                let args = self.eval_all(args)?;
                builtin.invoke(target.as_ref(), &args)
            }
            Expr::DynamicCall {
                target,
                owner,
                kind,
                name,
                args,
            } => {
                let target = target.as_deref().map(|t| self.eval(t)).transpose()?;
                let args = self.eval_all(args)?;
                let ignore_case = self.ignore_case;
                dynamic::invoke_member(target.as_ref(), *owner, *kind, name, &args, ignore_case)
            }
            Expr::Aggregate {
                source,
                kind,
                body,
                slot,
                ty,
            } => {
                let source = self.eval(source)?;
                self.eval_aggregate(&source, *kind, body.as_deref(), *slot, ty)
            }
            Expr::Binary { op, left, right, .. } => self.eval_binary(*op, left, right),
            Expr::Unary { op, operand, .. } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => {
                        Ok(self.truth(&value).map_or(Value::Absent, |b| Value::Bool(!b)))
                    }
                    UnaryOp::Negate => negate(&value),
                }
            }
            Expr::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => {
                let test = self.eval(test)?;
                if self.truth(&test) == Some(true) {
                    self.eval(if_true)
                } else {
                    self.eval(if_false)
                }
            }
            Expr::Convert { operand, ty, checked } => self.eval(operand)?.convert(ty, *checked),
            Expr::Index { target, index, ty } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                dynamic::get_index(&target, &index, !ty.is_dynamic())
            }
            Expr::New { fields, .. } => {
                let values = fields
                    .iter()
                    .map(|(name, expr)| Ok((name.clone(), self.eval(expr)?)))
                    .collect::<Result<Vec<_>, EvaluationError>>()?;
                Ok(Value::map(values))
            }
            Expr::Invoke { lambda, args, .. } => {
                let lambda = self.eval(lambda)?;
                let args = self.eval_all(args)?;
                match lambda {
                    Value::Lambda(plan) => plan.invoke(&args),
                    _ => Ok(Value::Absent),
                }
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, EvaluationError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    // ------ operators ------

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<Value, EvaluationError> {
        if op.is_logical() {
            return self.eval_logical(op, left, right);
        }
        let l = self.eval(left)?;
        let r = self.eval(right)?;
        if op.is_comparison() {
            return Ok(Value::Bool(compare(op, &l, &r)));
        }
        arithmetic(op, &l, &r)
    }

    /// Short-circuit `and` / `or` with an unknown third state.
    fn eval_logical(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<Value, EvaluationError> {
        let decisive = op == BinaryOp::Or;
        let l = self.eval(left)?;
        let l = self.truth(&l);
        if l == Some(decisive) {
            return Ok(Value::Bool(decisive));
        }
        let r = self.eval(right)?;
        let r = self.truth(&r);
        Ok(match (l, r) {
            (_, Some(b)) if b == decisive => Value::Bool(decisive),
            (Some(_), Some(_)) => Value::Bool(!decisive),
            _ => Value::Absent,
        })
    }

    // ------ aggregates ------

    fn eval_aggregate(
        &mut self,
        source: &Value,
        kind: AggregateKind,
        body: Option<&Expr>,
        slot: usize,
        ty: &Type,
    ) -> Result<Value, EvaluationError> {
        let Value::List(items) = source else {
            return Ok(Value::Absent);
        };
        let saved = self.bind(slot, Value::Absent);
        let result = self.aggregate_items(items, kind, body, slot, ty);
        self.bind(slot, saved);
        result
    }

    fn aggregate_items(
        &mut self,
        items: &[Value],
        kind: AggregateKind,
        body: Option<&Expr>,
        slot: usize,
        ty: &Type,
    ) -> Result<Value, EvaluationError> {
        // Body value per element; the element itself when there is no body.
        let mut selected = Vec::with_capacity(items.len());
        for item in items {
            let value = match body {
                Some(body) => {
                    self.bind(slot, item.clone());
                    self.eval(body)?
                }
                None => item.clone(),
            };
            selected.push(value);
        }
        let holds = |v: &Value| self.truth(v) == Some(true);

        Ok(match kind {
            AggregateKind::Where => Value::list(
                items
                    .iter()
                    .zip(&selected)
                    .filter(|(_, v)| holds(v))
                    .map(|(item, _)| item.clone()),
            ),
            AggregateKind::Any if body.is_none() => Value::Bool(!items.is_empty()),
            AggregateKind::Any => Value::Bool(selected.iter().any(holds)),
            AggregateKind::All => Value::Bool(selected.iter().all(holds)),
            AggregateKind::Count => {
                let n = if body.is_some() {
                    selected.iter().filter(|v| holds(v)).count()
                } else {
                    items.len()
                };
                i32::try_from(n).map_or(Value::Int64(i64::MAX), Value::Int32)
            }
            AggregateKind::Min | AggregateKind::Max => {
                let wanted = if kind == AggregateKind::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                selected
                    .into_iter()
                    .filter(|v| !v.is_null_or_absent())
                    .reduce(|best, v| if v.compare(&best) == Some(wanted) { v } else { best })
                    .unwrap_or(Value::Null)
            }
            AggregateKind::Sum => {
                let mut total: Option<Value> = None;
                for v in selected.into_iter().filter(|v| !v.is_null_or_absent()) {
                    total = Some(match total {
                        Some(t) => arithmetic(BinaryOp::Add, &t, &v)?,
                        None => v,
                    });
                }
                match (total, ty) {
                    (Some(t), Type::Dynamic) => t,
                    (Some(t), ty) => t.convert(ty, false)?,
                    (None, Type::Dynamic) => Value::Int32(0),
                    (None, ty) => ty.non_nullable().default_value(),
                }
            }
            AggregateKind::Average => {
                let numbers: Vec<f64> = selected.iter().filter_map(Value::as_f64).collect();
                if numbers.is_empty() {
                    Value::Null
                } else {
                    #[allow(clippy::cast_precision_loss)]
                    let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
                    match ty.primitive() {
                        Some(Primitive::Single) => from_f64(mean, Primitive::Single, false)?,
                        _ => Value::Double(mean),
                    }
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Value operations
// ---------------------------------------------------------------------------

/// Apply a comparison operator. Absent operands never match, and neither do
/// values of incomparable types, under any operator including `!=`.
#[must_use]
pub fn compare(op: BinaryOp, l: &Value, r: &Value) -> bool {
    if l.is_absent() || r.is_absent() {
        return false;
    }
    match op {
        BinaryOp::Equal => l.loose_eq(r) == Some(true),
        BinaryOp::NotEqual => l.loose_eq(r) == Some(false),
        BinaryOp::Less => l.compare(r) == Some(Ordering::Less),
        BinaryOp::LessEqual => matches!(l.compare(r), Some(Ordering::Less | Ordering::Equal)),
        BinaryOp::Greater => l.compare(r) == Some(Ordering::Greater),
        BinaryOp::GreaterEqual => matches!(l.compare(r), Some(Ordering::Greater | Ordering::Equal)),
        _ => false,
    }
}

/// Numeric type both operands unify to: the wider of the two, `Double`
/// when neither widens to the other, and at least `Int32`.
fn unify(l: &Value, r: &Value) -> Option<Primitive> {
    let (lt, rt) = (l.type_of()?, r.type_of()?);
    if !lt.is_numeric() || !rt.is_numeric() || lt == Type::CHAR || rt == Type::CHAR {
        return None;
    }
    let wider = if lt.is_compatible_with(&rt) {
        rt.primitive()?
    } else if rt.is_compatible_with(&lt) {
        lt.primitive()?
    } else {
        Primitive::Double
    };
    Some(match wider {
        Primitive::SByte | Primitive::Byte | Primitive::Int16 | Primitive::UInt16 => {
            Primitive::Int32
        }
        other => other,
    })
}

/// Apply an arithmetic or concatenation operator after runtime type
/// unification. Absent propagates, null yields null, and operand types
/// the operator does not apply to yield absent.
pub fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvaluationError> {
    if op == BinaryOp::Concat {
        return Ok(Value::String(format!("{l}{r}")));
    }
    if l.is_absent() || r.is_absent() {
        return Ok(Value::Absent);
    }
    if l.is_null_or_absent() || r.is_null_or_absent() {
        return Ok(Value::Null);
    }
    if let Some(v) = temporal(op, l, r)? {
        return Ok(v);
    }
    if op == BinaryOp::Add && (matches!(l, Value::String(_)) || matches!(r, Value::String(_))) {
        return Ok(Value::String(format!("{l}{r}")));
    }
    let Some(target) = unify(l, r) else {
        return Ok(Value::Absent);
    };
    if matches!(target, Primitive::Single | Primitive::Double) {
        let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
            return Ok(Value::Absent);
        };
        let v = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide => a / b,
            BinaryOp::Modulo => a % b,
            _ => return Ok(Value::Absent),
        };
        return from_f64(v, target, false);
    }
    let (Some(a), Some(b)) = (l.as_i128(), r.as_i128()) else {
        return Ok(Value::Absent);
    };
    let v = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Subtract => a.wrapping_sub(b),
        BinaryOp::Multiply => a.wrapping_mul(b),
        BinaryOp::Divide if b == 0 => return Err(EvaluationError::DivideByZero),
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo if b == 0 => return Err(EvaluationError::DivideByZero),
        BinaryOp::Modulo => a % b,
        _ => return Ok(Value::Absent),
    };
    from_i128(v, target, false)
}

fn temporal(op: BinaryOp, l: &Value, r: &Value) -> Result<Option<Value>, EvaluationError> {
    let overflow = || EvaluationError::Overflow {
        value: format!("{l} {op} {r}"),
        type_name: "DateTime".to_owned(),
    };
    let v = match (op, l, r) {
        (BinaryOp::Add, Value::DateTime(d), Value::TimeSpan(s)) => {
            Value::DateTime(d.checked_add_signed(*s).ok_or_else(overflow)?)
        }
        (BinaryOp::Subtract, Value::DateTime(d), Value::TimeSpan(s)) => {
            Value::DateTime(d.checked_sub_signed(*s).ok_or_else(overflow)?)
        }
        (BinaryOp::Subtract, Value::DateTime(a), Value::DateTime(b)) => {
            Value::TimeSpan(a.signed_duration_since(*b))
        }
        (BinaryOp::Add, Value::TimeSpan(a), Value::TimeSpan(b)) => {
            Value::TimeSpan(a.checked_add(b).ok_or_else(overflow)?)
        }
        (BinaryOp::Subtract, Value::TimeSpan(a), Value::TimeSpan(b)) => {
            Value::TimeSpan(a.checked_sub(b).ok_or_else(overflow)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(v))
}

fn negate(value: &Value) -> Result<Value, EvaluationError> {
    match value {
        Value::Absent | Value::Null => Ok(value.clone()),
        Value::Single(v) => Ok(Value::Single(-v)),
        Value::Double(v) => Ok(Value::Double(-v)),
        Value::TimeSpan(v) => Ok(Value::TimeSpan(-*v)),
        Value::Int64(v) => Ok(Value::Int64(v.wrapping_neg())),
        Value::Enum(_) | Value::UInt64(_) => Ok(Value::Absent),
        Value::UInt32(v) => Ok(Value::Int64(-i64::from(*v))),
        other => match other.as_i128() {
            Some(v) => from_i128(-v, Primitive::Int32, false),
            None => Ok(Value::Absent),
        },
    }
}
