//! Expression compilation and evaluation.
//!
//! The pipeline is:
//!
//! 1. **Lexing**: [`lexer`] streams tokens from the expression text.
//! 2. **Parsing**: [`parser`] builds a typed [`ast::Expr`] graph, asking
//!    [`resolver`] to type operators and built-in calls against the
//!    [`signatures`] and [`builtins`] catalogues, and falling back to
//!    [`dynamic`] nodes for names only an element can answer.
//! 3. **Evaluation**: [`evaluator`] walks the graph once per element.

pub mod ast;
pub mod builtins;
pub mod dynamic;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod signatures;

pub use ast::{AggregateKind, BinaryOp, Expr, UnaryOp};
pub use evaluator::EvalContext;
pub use parser::{MAX_NESTING_DEPTH, Parser};
pub use resolver::Resolver;
