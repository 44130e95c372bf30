//! Compilation entry points.

use tracing::debug;

use crate::config::DynqConfig;
use crate::error::ParseError;
use crate::expression::{Parser, Resolver};
use crate::ordering::{OrderingKey, OrderingPlan};
use crate::plan::{Parameter, Plan, PredicateOptions};
use crate::types::Type;
use crate::value::Value;

/// Compiles expression text into [`Plan`]s.
///
/// A compiler owns the configuration and the built-in member cache shared
/// by every plan it produces. It is `Send + Sync`; compile from as many
/// threads as needed.
#[derive(Debug, Default)]
pub struct Compiler {
    config: DynqConfig,
    resolver: Resolver,
}

impl Compiler {
    /// Create a compiler with the given configuration.
    #[must_use]
    pub fn new(config: DynqConfig) -> Self {
        Self {
            config,
            resolver: Resolver::new(),
        }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &DynqConfig {
        &self.config
    }

    /// Compile a lambda over `params` whose body must promote to `result`
    /// (any type when `None`). `args` are addressable as `@0`, `@1`, ...
    ///
    /// # Errors
    ///
    /// Returns `ParseError` when the text does not lex, parse or type.
    pub fn compile_lambda(
        &self,
        params: &[Parameter],
        result: Option<&Type>,
        text: &str,
        args: &[Value],
    ) -> Result<Plan, ParseError> {
        self.compile(params, result, text, args, false)
    }

    fn compile(
        &self,
        params: &[Parameter],
        result: Option<&Type>,
        text: &str,
        args: &[Value],
        absent_as_false: bool,
    ) -> Result<Plan, ParseError> {
        let body = Parser::new(text, params, args, &self.resolver, self.config.ignore_member_case)?
            .parse(result)?;
        let plan = Plan::new(
            text,
            params.to_vec(),
            body,
            absent_as_false,
            self.config.ignore_member_case,
        );
        debug!(source = text, ty = %plan.result_type(), "compiled plan");
        Ok(plan)
    }

    /// Compile a boolean predicate over `element`, reading absent members
    /// as configured by [`DynqConfig::absent_as_false`].
    ///
    /// # Errors
    ///
    /// Returns `ParseError` when the text does not compile or its type is
    /// neither boolean nor deferred.
    pub fn compile_predicate(
        &self,
        element: &Type,
        text: &str,
        args: &[Value],
    ) -> Result<Plan, ParseError> {
        let options = PredicateOptions {
            absent_as_false: self.config.absent_as_false,
        };
        self.compile_predicate_with_options(element, text, args, options)
    }

    /// Compile a boolean predicate with explicit options.
    ///
    /// # Errors
    ///
    /// See [`compile_predicate`](Self::compile_predicate).
    pub fn compile_predicate_with_options(
        &self,
        element: &Type,
        text: &str,
        args: &[Value],
        options: PredicateOptions,
    ) -> Result<Plan, ParseError> {
        self.compile(
            &[Parameter::unnamed(element.clone())],
            Some(&Type::BOOLEAN),
            text,
            args,
            options.absent_as_false,
        )
    }

    /// Compile a selector over `element`. Absent members are propagated.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` when the text does not compile.
    pub fn compile_selector(
        &self,
        element: &Type,
        text: &str,
        args: &[Value],
    ) -> Result<Plan, ParseError> {
        self.compile(&[Parameter::unnamed(element.clone())], None, text, args, false)
    }

    /// Compile `key [asc|desc], ...` into an ordering.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` when any key does not compile.
    pub fn compile_ordering(
        &self,
        element: &Type,
        text: &str,
        args: &[Value],
    ) -> Result<OrderingPlan, ParseError> {
        let params = vec![Parameter::unnamed(element.clone())];
        let keys = Parser::new(text, &params, args, &self.resolver, self.config.ignore_member_case)?
            .parse_ordering()?
            .into_iter()
            .map(|(body, ascending)| OrderingKey {
                plan: Plan::new(text, params.clone(), body, false, self.config.ignore_member_case),
                ascending,
            })
            .collect::<Vec<_>>();
        debug!(source = text, keys = keys.len(), "compiled ordering");
        Ok(OrderingPlan::new(keys))
    }
}
