//! Dynamic expression compiler and query engine.
//!
//! Expression text such as `Name == "Home" and CreateDate > @0` compiles
//! into a [`Plan`] that can be applied to any number of elements. Members
//! that are not declared on the element's [`RecordType`] are looked up per
//! element through the [`Record`] capability; a missing member yields
//! [`Value::Absent`] rather than an error, and predicates read it as
//! `false`.
//!
//! ```
//! use dynq_core::{Compiler, Type, Value};
//!
//! let compiler = Compiler::default();
//! let plan = compiler
//!     .compile_predicate(&Type::dynamic_record("Page"), "Views > 5", &[])
//!     .unwrap();
//! assert!(plan.matches(&Value::map([("Views", Value::Int32(8))])).unwrap());
//! assert!(!plan.matches(&Value::map([("Title", Value::from("x"))])).unwrap());
//! ```

mod compiler;
pub mod config;
pub mod error;
pub mod expression;
mod ordering;
mod plan;
pub mod query;
mod types;
mod value;

pub use compiler::Compiler;
pub use config::DynqConfig;
pub use error::{DynqError, DynqResult, ErrorCategory, EvaluationError, ParseError};
pub use ordering::{OrderingKey, OrderingPlan, dominant_type};
pub use plan::{Parameter, Plan, PredicateOptions};
pub use query::{Grouping, Query};
pub use types::{EnumType, Primitive, RecordType, Type};
pub use value::{EnumValue, Record, Value};
