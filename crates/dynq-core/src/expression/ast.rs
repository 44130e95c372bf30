//! Expression graph produced by the parser and walked by the evaluator.
//!
//! Every node knows its static type. Nodes typed [`Type::Dynamic`] are
//! deferred: their value, and the meaning of anything applied to it, is
//! only known once an element is supplied.

use std::fmt;

use crate::types::Type;
use crate::value::Value;

use super::builtins::{Builtin, MemberKind, TypeName};

/// Expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal or captured argument.
    Constant {
        /// The value.
        value: Value,
        /// Declared type.
        ty: Type,
        /// Source text when the constant came from a literal token; used to
        /// re-read the literal as a different numeric or enum type.
        literal: Option<String>,
    },
    /// A lambda parameter or the implicit `it` of an aggregate scope.
    Parameter {
        /// Frame slot holding the value during evaluation.
        slot: usize,
        /// Declared type.
        ty: Type,
    },
    /// Statically declared field of a record type.
    Member {
        /// Record expression.
        target: Box<Expr>,
        /// Field name as declared.
        name: String,
        /// Field type.
        ty: Type,
    },
    /// Member looked up on the element at evaluation time.
    DynamicMember {
        /// Receiver expression.
        target: Box<Expr>,
        /// Requested name.
        name: String,
    },
    /// Built-in property, method, static member or constructor.
    Call {
        /// Receiver, `None` for static members and constructors.
        target: Option<Box<Expr>>,
        /// Resolved catalogue entry.
        builtin: &'static Builtin,
        /// Arguments promoted to the parameter types.
        args: Vec<Expr>,
    },
    /// Call resolved against the runtime receiver and argument values.
    DynamicCall {
        /// Receiver expression, `None` for static members and constructors.
        target: Option<Box<Expr>>,
        /// Type owning the static member or constructor.
        owner: Option<TypeName>,
        /// Method or constructor.
        kind: MemberKind,
        /// Member name.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// Sequence aggregate with an optional per-element body.
    Aggregate {
        /// Sequence expression.
        source: Box<Expr>,
        /// Which aggregate.
        kind: AggregateKind,
        /// Predicate or selector evaluated with the inner element in `slot`.
        body: Option<Box<Expr>>,
        /// Frame slot of the inner `it`.
        slot: usize,
        /// Result type; [`Type::Dynamic`] when the source is deferred.
        ty: Type,
    },
    /// Binary operator.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
        /// Result type.
        ty: Type,
    },
    /// Unary operator.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
        /// Result type.
        ty: Type,
    },
    /// `test ? if_true : if_false` and `iif(test, if_true, if_false)`.
    Conditional {
        /// Boolean test.
        test: Box<Expr>,
        /// Value when the test holds.
        if_true: Box<Expr>,
        /// Value otherwise.
        if_false: Box<Expr>,
        /// Common branch type.
        ty: Type,
    },
    /// Type conversion.
    Convert {
        /// Converted expression.
        operand: Box<Expr>,
        /// Target type.
        ty: Type,
        /// Fail on overflow instead of wrapping.
        checked: bool,
    },
    /// Element access `target[index]`.
    Index {
        /// Indexed expression.
        target: Box<Expr>,
        /// Index or key.
        index: Box<Expr>,
        /// Element type; [`Type::Dynamic`] when resolved at evaluation time.
        ty: Type,
    },
    /// Anonymous record `new(a, b as c)`.
    New {
        /// Field names and values, in declaration order.
        fields: Vec<(String, Expr)>,
        /// Record type with one field per entry.
        ty: Type,
    },
    /// Invocation of a lambda supplied as an argument.
    Invoke {
        /// Function-typed expression.
        lambda: Box<Expr>,
        /// Arguments promoted to the lambda's parameter types.
        args: Vec<Expr>,
        /// Lambda result type.
        ty: Type,
    },
}

impl Expr {
    /// A constant that did not come from a literal token.
    #[must_use]
    pub fn constant(value: Value) -> Self {
        let ty = value.type_of().unwrap_or(Type::OBJECT);
        Self::Constant {
            value,
            ty,
            literal: None,
        }
    }

    /// Static type of the node.
    #[must_use]
    pub fn ty(&self) -> Type {
        match self {
            Self::Constant { ty, .. }
            | Self::Parameter { ty, .. }
            | Self::Member { ty, .. }
            | Self::Aggregate { ty, .. }
            | Self::Binary { ty, .. }
            | Self::Unary { ty, .. }
            | Self::Conditional { ty, .. }
            | Self::Convert { ty, .. }
            | Self::Index { ty, .. }
            | Self::New { ty, .. }
            | Self::Invoke { ty, .. } => ty.clone(),
            Self::Call { builtin, .. } => builtin.result.clone(),
            Self::DynamicMember { .. } | Self::DynamicCall { .. } => Type::Dynamic,
        }
    }

    /// Whether the node's value is only known per element.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.ty().is_dynamic()
    }

    /// Whether this is the `null` literal.
    #[must_use]
    pub fn is_null_literal(&self) -> bool {
        matches!(self, Self::Constant { value: Value::Null, literal: Some(_), .. })
    }

    /// Name a `new(...)` entry takes when written without `as`.
    #[must_use]
    pub fn member_name(&self) -> Option<&str> {
        match self {
            Self::Member { name, .. } | Self::DynamicMember { name, .. } => Some(name),
            Self::Call { builtin, args, .. } if args.is_empty() => Some(builtin.name),
            _ => None,
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `||`, `or`
    Or,
    /// `&&`, `and`
    And,
    /// `==`, `=`
    Equal,
    /// `!=`, `<>`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`, `mod`
    Modulo,
    /// `&` and `+` on strings
    Concat,
}

impl BinaryOp {
    /// Equality and relational operators.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
        )
    }

    /// `and` / `or`.
    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Concat => "&",
        };
        f.write_str(s)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Negate,
    /// `!`, `not`
    Not,
}

/// Aggregates callable on sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    /// Elements matching a predicate.
    Where,
    /// Whether any element (matching a predicate) exists.
    Any,
    /// Whether every element matches a predicate.
    All,
    /// Number of elements (matching a predicate).
    Count,
    /// Smallest selected value.
    Min,
    /// Largest selected value.
    Max,
    /// Sum of selected values.
    Sum,
    /// Mean of selected values.
    Average,
}

impl AggregateKind {
    /// Case-insensitive lookup by method name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::Where,
            Self::Any,
            Self::All,
            Self::Count,
            Self::Min,
            Self::Max,
            Self::Sum,
            Self::Average,
        ]
        .into_iter()
        .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Method name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Where => "Where",
            Self::Any => "Any",
            Self::All => "All",
            Self::Count => "Count",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Sum => "Sum",
            Self::Average => "Average",
        }
    }
}
