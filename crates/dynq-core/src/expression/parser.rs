//! Recursive-descent parser producing typed expression graphs.
//!
//! Precedence, lowest first: `?:`, `or`, `and`, comparison, additive
//! (`+ - &`), multiplicative (`* / % mod`), unary (`- ! not`), then primary
//! expressions with member access, calls and indexing. Operands are typed
//! and promoted as each node is built; names unknown on an element that
//! answers names at evaluation time become deferred nodes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::ParseError;
use crate::plan::Parameter;
use crate::types::{RecordType, Type};
use crate::value::Value;

use super::ast::{AggregateKind, BinaryOp, Expr, UnaryOp};
use super::builtins::{self, MemberKind, Receiver, TypeName};
use super::dynamic;
use super::lexer::{Lexer, Token, TokenKind};
use super::resolver::{Resolution, Resolver, find_best, promote};
use super::signatures::{
    OperatorFamily, average_result, binary_result, operator_signatures, summable_signatures,
};

/// Type given to records built with `new(...)`.
const ANONYMOUS_RECORD: &str = "DynamicClass";

/// Deepest nesting of sub-expressions and unary operators a parser accepts.
pub const MAX_NESTING_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Parser state
// ---------------------------------------------------------------------------

/// Parser over one expression text.
#[derive(Debug)]
pub struct Parser<'r> {
    lexer: Lexer,
    token: Token,
    symbols: HashMap<String, Expr>,
    externals: Option<Arc<BTreeMap<String, Value>>>,
    it: Option<Expr>,
    next_slot: usize,
    resolver: &'r Resolver,
    ignore_case: bool,
    depth: usize,
}

impl<'r> Parser<'r> {
    /// Prepare to parse `text` with the given lambda parameters and
    /// positional argument values.
    ///
    /// A single unnamed parameter becomes the implicit `it`. Arguments are
    /// addressable as `@0`, `@1`, ...; a trailing map argument instead
    /// supplies named externals.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the first token cannot be lexed or a name is
    /// declared twice.
    pub fn new(
        text: &str,
        params: &[Parameter],
        args: &[Value],
        resolver: &'r Resolver,
        ignore_case: bool,
    ) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(text);
        let token = lexer.next_token()?;
        let mut parser = Self {
            lexer,
            token,
            symbols: HashMap::new(),
            externals: None,
            it: None,
            next_slot: params.len(),
            resolver,
            ignore_case,
            depth: 0,
        };

        for (slot, param) in params.iter().enumerate() {
            let expr = Expr::Parameter {
                slot,
                ty: param.ty.clone(),
            };
            match &param.name {
                Some(name) => parser.add_symbol(name, expr)?,
                None if params.len() == 1 => parser.it = Some(expr),
                None => {}
            }
        }
        for (i, arg) in args.iter().enumerate() {
            match arg {
                Value::Map(map) if i + 1 == args.len() => parser.externals = Some(Arc::clone(map)),
                _ => parser.add_symbol(&format!("@{i}"), Expr::constant(arg.clone()))?,
            }
        }
        Ok(parser)
    }

    fn add_symbol(&mut self, name: &str, expr: Expr) -> Result<(), ParseError> {
        let key = name.to_lowercase();
        if self.symbols.contains_key(&key) {
            return Err(ParseError::DuplicateIdentifier {
                name: name.to_owned(),
                pos: 0,
            });
        }
        self.symbols.insert(key, expr);
        Ok(())
    }

    /// Parse the whole text as one expression, promoted to `result` when
    /// given. Deferred expressions are accepted for any result type.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` on lexical, syntax or resolution failures.
    pub fn parse(mut self, result: Option<&Type>) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        let mut expr = self.parse_expression()?;
        if let Some(result) = result
            && !result.is_dynamic()
            && !expr.is_deferred()
        {
            expr = promote(&expr, result, true).ok_or_else(|| ParseError::TypeMismatch {
                expected: result.to_string(),
                pos,
            })?;
        }
        self.expect_end()?;
        Ok(expr)
    }

    /// Parse a comma-separated list of keys, each optionally followed by
    /// `asc`, `ascending`, `desc` or `descending`. Yields `(key, ascending)`.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` on lexical, syntax or resolution failures.
    pub fn parse_ordering(mut self) -> Result<Vec<(Expr, bool)>, ParseError> {
        let mut keys = Vec::new();
        loop {
            let expr = self.parse_expression()?;
            let mut ascending = true;
            if self.token.is_identifier("asc") || self.token.is_identifier("ascending") {
                self.next()?;
            } else if self.token.is_identifier("desc") || self.token.is_identifier("descending") {
                ascending = false;
                self.next()?;
            }
            keys.push((expr, ascending));
            if self.token.kind != TokenKind::Comma {
                break;
            }
            self.next()?;
        }
        self.expect_end()?;
        Ok(keys)
    }

    // ------ token helpers ------

    fn next(&mut self) -> Result<(), ParseError> {
        self.token = self.lexer.next_token()?;
        Ok(())
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
                pos: self.token.pos,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<(), ParseError> {
        if self.token.kind != kind {
            return Err(ParseError::Expected {
                expected,
                pos: self.token.pos,
            });
        }
        self.next()
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.token.kind == TokenKind::End {
            Ok(())
        } else {
            Err(ParseError::Syntax { pos: self.token.pos })
        }
    }

    fn identifier(&self) -> Result<String, ParseError> {
        if self.token.kind == TokenKind::Identifier {
            Ok(self.token.text.clone())
        } else {
            Err(ParseError::Expected {
                expected: "identifier",
                pos: self.token.pos,
            })
        }
    }

    // ------ operators ------

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.descend()?;
        let expr = self.parse_conditional();
        self.depth -= 1;
        expr
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        let expr = self.parse_logical_or()?;
        if self.token.kind != TokenKind::Question {
            return Ok(expr);
        }
        self.next()?;
        let if_true = self.parse_expression()?;
        self.expect(TokenKind::Colon, "':'")?;
        let if_false = self.parse_expression()?;
        conditional(expr, if_true, if_false, pos)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_logical_and()?;
        while self.token.kind == TokenKind::DoubleBar || self.token.is_identifier("or") {
            let pos = self.token.pos;
            self.next()?;
            let right = self.parse_logical_and()?;
            left = logical(BinaryOp::Or, left, right, pos)?;
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.token.kind == TokenKind::DoubleAmpersand || self.token.is_identifier("and") {
            let pos = self.token.pos;
            self.next()?;
            let right = self.parse_comparison()?;
            left = logical(BinaryOp::And, left, right, pos)?;
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.token.kind {
                TokenKind::Equal | TokenKind::DoubleEqual => BinaryOp::Equal,
                TokenKind::ExclamationEqual | TokenKind::LessGreater => BinaryOp::NotEqual,
                TokenKind::LessThan => BinaryOp::Less,
                TokenKind::LessThanEqual => BinaryOp::LessEqual,
                TokenKind::GreaterThan => BinaryOp::Greater,
                TokenKind::GreaterThanEqual => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            let pos = self.token.pos;
            self.next()?;
            let right = self.parse_additive()?;
            left = comparison(op, left, right, pos)?;
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.token.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                TokenKind::Ampersand => BinaryOp::Concat,
                _ => return Ok(left),
            };
            let pos = self.token.pos;
            self.next()?;
            let right = self.parse_multiplicative()?;
            left = match op {
                BinaryOp::Concat => concat(left, right),
                _ if left.is_deferred() || right.is_deferred() => dynamic::binary(op, left, right),
                BinaryOp::Add if left.ty() == Type::STRING || right.ty() == Type::STRING => {
                    concat(left, right)
                }
                BinaryOp::Add => arithmetic(OperatorFamily::Add, op, left, right, pos)?,
                _ => arithmetic(OperatorFamily::Subtract, op, left, right, pos)?,
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.token.kind {
                TokenKind::Asterisk => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ if self.token.is_identifier("mod") => BinaryOp::Modulo,
                _ => return Ok(left),
            };
            let pos = self.token.pos;
            self.next()?;
            let right = self.parse_unary()?;
            left = if left.is_deferred() || right.is_deferred() {
                dynamic::binary(op, left, right)
            } else {
                arithmetic(OperatorFamily::Arithmetic, op, left, right, pos)?
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let (op, family, symbol) = match self.token.kind {
            TokenKind::Minus => (UnaryOp::Negate, OperatorFamily::Negation, "-"),
            TokenKind::Exclamation => (UnaryOp::Not, OperatorFamily::Not, "!"),
            _ if self.token.is_identifier("not") => (UnaryOp::Not, OperatorFamily::Not, "not"),
            _ => return self.parse_primary(),
        };
        let pos = self.token.pos;
        self.next()?;
        if op == UnaryOp::Negate
            && matches!(self.token.kind, TokenKind::IntegerLiteral | TokenKind::RealLiteral)
        {
            self.token.text.insert(0, '-');
            self.token.pos = pos;
            return self.parse_primary();
        }
        self.descend()?;
        let operand = self.parse_unary();
        self.depth -= 1;
        let operand = operand?;
        if operand.is_deferred() {
            return Ok(dynamic::unary(op, operand));
        }
        match find_best(operator_signatures(family).iter().map(Vec::as_slice), &[operand.clone()]) {
            Resolution::Unique((_, mut promoted)) if promoted.len() == 1 => {
                let operand = promoted.remove(0);
                Ok(Expr::Unary {
                    op,
                    ty: operand.ty(),
                    operand: Box::new(operand),
                })
            }
            _ => Err(ParseError::IncompatibleOperand {
                op: symbol.to_owned(),
                operand: operand.ty().to_string(),
                pos,
            }),
        }
    }

    // ------ primary expressions ------

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_start()?;
        loop {
            match self.token.kind {
                TokenKind::Dot => {
                    self.next()?;
                    expr = self.parse_member_access(expr)?;
                }
                TokenKind::OpenBracket => expr = self.parse_element_access(expr)?,
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary_start(&mut self) -> Result<Expr, ParseError> {
        match self.token.kind {
            TokenKind::Identifier => self.parse_identifier(),
            TokenKind::StringLiteral => self.parse_string_literal(),
            TokenKind::IntegerLiteral => self.parse_integer_literal(),
            TokenKind::RealLiteral => self.parse_real_literal(),
            TokenKind::OpenParen => {
                self.next()?;
                let expr = self.parse_expression()?;
                self.expect(TokenKind::CloseParen, "')' or operator")?;
                Ok(expr)
            }
            _ => Err(ParseError::Expected {
                expected: "expression",
                pos: self.token.pos,
            }),
        }
    }

    fn parse_string_literal(&mut self) -> Result<Expr, ParseError> {
        let text = &self.token.text;
        let quote = text.chars().next().unwrap_or('"');
        let inner = text[quote.len_utf8()..text.len() - quote.len_utf8()]
            .replace(&format!("{quote}{quote}"), &quote.to_string());
        let expr = if quote == '\'' {
            let mut chars = inner.chars();
            let (Some(ch), None) = (chars.next(), chars.next()) else {
                return Err(ParseError::InvalidCharacterLiteral { pos: self.token.pos });
            };
            Expr::Constant {
                value: Value::Char(ch),
                ty: Type::CHAR,
                literal: Some(inner),
            }
        } else {
            Expr::Constant {
                value: Value::String(inner.clone()),
                ty: Type::STRING,
                literal: Some(inner),
            }
        };
        self.next()?;
        Ok(expr)
    }

    fn parse_integer_literal(&mut self) -> Result<Expr, ParseError> {
        let text = self.token.text.clone();
        let invalid = || ParseError::InvalidIntegerLiteral {
            text: text.clone(),
            pos: self.token.pos,
        };
        let value = if text.starts_with('-') {
            let v: i64 = text.parse().map_err(|_| invalid())?;
            i32::try_from(v).map_or(Value::Int64(v), Value::Int32)
        } else {
            let v: u64 = text.parse().map_err(|_| invalid())?;
            if let Ok(v) = i32::try_from(v) {
                Value::Int32(v)
            } else if let Ok(v) = u32::try_from(v) {
                Value::UInt32(v)
            } else if let Ok(v) = i64::try_from(v) {
                Value::Int64(v)
            } else {
                Value::UInt64(v)
            }
        };
        self.next()?;
        Ok(literal(value, text))
    }

    fn parse_real_literal(&mut self) -> Result<Expr, ParseError> {
        let text = self.token.text.clone();
        let invalid = || ParseError::InvalidRealLiteral {
            text: text.clone(),
            pos: self.token.pos,
        };
        let value = match text.strip_suffix(['f', 'F']) {
            Some(digits) => Value::Single(digits.parse().map_err(|_| invalid())?),
            None => Value::Double(text.parse().map_err(|_| invalid())?),
        };
        self.next()?;
        Ok(literal(value, text))
    }

    fn parse_identifier(&mut self) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        let name = self.token.text.clone();
        let keyword = name.to_lowercase();
        match keyword.as_str() {
            "true" | "false" => {
                self.next()?;
                return Ok(Expr::constant(Value::Bool(keyword == "true")));
            }
            "null" => {
                self.next()?;
                return Ok(Expr::Constant {
                    value: Value::Null,
                    ty: Type::OBJECT,
                    literal: Some(name),
                });
            }
            "it" => {
                let it = self.it.clone().ok_or(ParseError::NoItInScope { pos })?;
                self.next()?;
                return Ok(it);
            }
            "iif" => return self.parse_iif(),
            "new" => return self.parse_new(),
            _ => {}
        }
        if let Some(type_name) = TypeName::from_name(&name) {
            return self.parse_type_access(type_name);
        }

        let found = self.symbols.get(&keyword).cloned().or_else(|| {
            self.externals.as_ref().and_then(|externals| {
                Value::Map(Arc::clone(externals))
                    .named_value(&name, true)
                    .map(Expr::constant)
            })
        });
        if let Some(expr) = found {
            self.next()?;
            if matches!(expr.ty(), Type::Function { .. })
                && self.token.kind == TokenKind::OpenParen
            {
                return self.parse_lambda_invocation(expr, pos);
            }
            return Ok(expr);
        }
        if let Some(it) = self.it.clone() {
            return self.parse_member_access(it);
        }
        Err(ParseError::UnknownIdentifier { name, pos })
    }

    fn parse_lambda_invocation(&mut self, lambda: Expr, pos: usize) -> Result<Expr, ParseError> {
        let args = self.parse_argument_list()?;
        let Type::Function { params, result } = lambda.ty() else {
            return Err(ParseError::ArgsIncompatibleWithLambda { pos });
        };
        if params.len() != args.len() {
            return Err(ParseError::ArgsIncompatibleWithLambda { pos });
        }
        let args = args
            .iter()
            .zip(&params)
            .map(|(arg, param)| {
                if arg.is_deferred() {
                    Some(arg.clone())
                } else {
                    promote(arg, param, false)
                }
            })
            .collect::<Option<Vec<_>>>()
            .ok_or(ParseError::ArgsIncompatibleWithLambda { pos })?;
        Ok(Expr::Invoke {
            lambda: Box::new(lambda),
            args,
            ty: *result,
        })
    }

    fn parse_iif(&mut self) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        self.next()?;
        let args = self.parse_argument_list()?;
        let Ok([test, if_true, if_false]) = <[Expr; 3]>::try_from(args) else {
            return Err(ParseError::IifRequiresThreeArgs { pos });
        };
        conditional(test, if_true, if_false, pos)
    }

    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        self.next()?;
        self.expect(TokenKind::OpenParen, "'('")?;
        let mut fields = Vec::new();
        loop {
            let expr_pos = self.token.pos;
            let expr = self.parse_expression()?;
            let name = if self.token.is_identifier("as") {
                self.next()?;
                let name = self.identifier()?;
                self.next()?;
                name
            } else {
                expr.member_name()
                    .map(str::to_owned)
                    .ok_or(ParseError::MissingAsClause { pos: expr_pos })?
            };
            fields.push((name, expr));
            if self.token.kind != TokenKind::Comma {
                break;
            }
            self.next()?;
        }
        self.expect(TokenKind::CloseParen, "')' or ','")?;
        let record = fields
            .iter()
            .fold(RecordType::new(ANONYMOUS_RECORD), |record, (name, expr)| {
                record.with_field(name.clone(), expr.ty())
            });
        Ok(Expr::New {
            fields,
            ty: Type::Record(Arc::new(record)),
        })
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::OpenParen, "'('")?;
        let args = if self.token.kind == TokenKind::CloseParen {
            Vec::new()
        } else {
            self.parse_arguments()?
        };
        self.expect(TokenKind::CloseParen, "')' or ','")?;
        Ok(args)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = vec![self.parse_expression()?];
        while self.token.kind == TokenKind::Comma {
            self.next()?;
            args.push(self.parse_expression()?);
        }
        Ok(args)
    }

    // ------ types and members ------

    /// `Type.Member`, `Type(args)` and `Type?(args)`.
    fn parse_type_access(&mut self, type_name: TypeName) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        self.next()?;
        let mut target = type_name.as_type();
        if self.token.kind == TokenKind::Question {
            target = match target {
                Some(ty) if ty.is_value_type() => Some(Type::nullable(ty)),
                _ => {
                    return Err(ParseError::NoNullableForm {
                        type_name: type_name.to_string(),
                        pos,
                    });
                }
            };
            self.next()?;
        }
        match self.token.kind {
            TokenKind::OpenParen => {
                let args = self.parse_argument_list()?;
                self.construct(type_name, target, args, pos)
            }
            TokenKind::Dot => {
                self.next()?;
                self.parse_static_member(type_name)
            }
            _ => Err(ParseError::Expected {
                expected: "'.' or '('",
                pos: self.token.pos,
            }),
        }
    }

    fn construct(
        &self,
        type_name: TypeName,
        target: Option<Type>,
        args: Vec<Expr>,
        pos: usize,
    ) -> Result<Expr, ParseError> {
        let owner = Receiver::Static(type_name);
        let name = type_name.to_string();
        let wrap = |expr: Expr| match &target {
            Some(ty) if ty.is_nullable() => Expr::Convert {
                operand: Box::new(expr),
                ty: ty.clone(),
                checked: false,
            },
            _ => expr,
        };
        if args.iter().any(Expr::is_deferred) {
            if !self
                .resolver
                .candidates(owner, MemberKind::Constructor, &name, args.len())
                .is_empty()
            {
                return Ok(wrap(dynamic::call(
                    None,
                    Some(type_name),
                    MemberKind::Constructor,
                    &name,
                    args,
                )));
            }
        } else {
            match self.resolver.resolve(owner, MemberKind::Constructor, &name, &args) {
                Resolution::Unique((builtin, args)) => {
                    return Ok(wrap(Expr::Call {
                        target: None,
                        builtin,
                        args,
                    }));
                }
                Resolution::Ambiguous => {
                    return Err(ParseError::AmbiguousConstructor { type_name: name, pos });
                }
                Resolution::NotFound => {}
            }
        }
        match (target, <[Expr; 1]>::try_from(args)) {
            (Some(target), Ok([arg])) => conversion(arg, &target, pos),
            _ => Err(ParseError::NoMatchingConstructor { type_name: name, pos }),
        }
    }

    fn parse_static_member(&mut self, type_name: TypeName) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        let name = self.identifier()?;
        self.next()?;
        let owner = Receiver::Static(type_name);
        if self.token.kind == TokenKind::OpenParen {
            let args = self.parse_argument_list()?;
            let shown = type_name.to_string();
            return self.method_call(None, owner, Some(type_name), &name, args, &shown, pos);
        }
        match self.resolver.resolve(owner, MemberKind::Property, &name, &[]) {
            Resolution::Unique((builtin, _)) => Ok(Expr::Call {
                target: None,
                builtin,
                args: Vec::new(),
            }),
            _ => Err(ParseError::UnknownMember {
                name,
                type_name: type_name.to_string(),
                pos,
            }),
        }
    }

    /// Built-in method call on `receiver`; deferred arguments defer the
    /// overload choice to evaluation time.
    #[allow(clippy::too_many_arguments)]
    fn method_call(
        &self,
        target: Option<Expr>,
        receiver: Receiver,
        owner: Option<TypeName>,
        name: &str,
        args: Vec<Expr>,
        type_name: &str,
        pos: usize,
    ) -> Result<Expr, ParseError> {
        let no_method = || ParseError::NoApplicableMethod {
            name: name.to_owned(),
            type_name: type_name.to_owned(),
            pos,
        };
        if args.iter().any(Expr::is_deferred) {
            if !builtins::has_member(receiver, MemberKind::Method, name) {
                return Err(no_method());
            }
            return Ok(dynamic::call(target, owner, MemberKind::Method, name, args));
        }
        match self.resolver.resolve(receiver, MemberKind::Method, name, &args) {
            Resolution::Unique((builtin, args)) => Ok(Expr::Call {
                target: target.map(Box::new),
                builtin,
                args,
            }),
            Resolution::NotFound => Err(no_method()),
            Resolution::Ambiguous => Err(ParseError::AmbiguousMethod {
                name: name.to_owned(),
                type_name: type_name.to_owned(),
                pos,
            }),
        }
    }

    fn parse_member_access(&mut self, instance: Expr) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        let name = self.identifier()?;
        self.next()?;
        let ty = instance.ty();

        if self.token.kind == TokenKind::OpenParen {
            if (ty.element_type().is_some() || ty.is_dynamic())
                && let Some(kind) = AggregateKind::from_name(&name)
            {
                return self.parse_aggregate(instance, kind, pos);
            }
            let args = self.parse_argument_list()?;
            if dynamic::answers_names(&ty) {
                return Ok(dynamic::call(Some(instance), None, MemberKind::Method, &name, args));
            }
            let receiver = Receiver::of(&ty).unwrap_or(Receiver::AnyInstance);
            let shown = ty.to_string();
            return self.method_call(Some(instance), receiver, None, &name, args, &shown, pos);
        }

        if let Type::Record(record) = &ty
            && let Some((field, field_ty)) = record.field(&name, self.ignore_case)
        {
            return Ok(Expr::Member {
                name: field.to_owned(),
                ty: field_ty.clone(),
                target: Box::new(instance),
            });
        }
        if dynamic::answers_names(&ty) {
            return Ok(dynamic::member(instance, &name));
        }
        if let Type::Nullable(inner) = &ty {
            if name.eq_ignore_ascii_case("HasValue") {
                return Ok(Expr::Binary {
                    op: BinaryOp::NotEqual,
                    right: Box::new(Expr::Constant {
                        value: Value::Null,
                        ty: ty.clone(),
                        literal: None,
                    }),
                    left: Box::new(instance),
                    ty: Type::BOOLEAN,
                });
            }
            if name.eq_ignore_ascii_case("Value") {
                return Ok(Expr::Convert {
                    operand: Box::new(instance),
                    ty: (**inner).clone(),
                    checked: false,
                });
            }
        }
        if ty.element_type().is_some()
            && (name.eq_ignore_ascii_case("Count") || name.eq_ignore_ascii_case("Length"))
        {
            return Ok(Expr::Aggregate {
                source: Box::new(instance),
                kind: AggregateKind::Count,
                body: None,
                slot: self.next_slot,
                ty: Type::INT32,
            });
        }
        if let Some(receiver) = Receiver::of(&ty)
            && let Resolution::Unique((builtin, _)) =
                self.resolver.resolve(receiver, MemberKind::Property, &name, &[])
        {
            return Ok(Expr::Call {
                target: Some(Box::new(instance)),
                builtin,
                args: Vec::new(),
            });
        }
        Err(ParseError::UnknownMember {
            name,
            type_name: ty.to_string(),
            pos,
        })
    }

    /// Aggregate call; its argument is parsed in a scope whose `it` is the
    /// sequence element.
    fn parse_aggregate(
        &mut self,
        source: Expr,
        kind: AggregateKind,
        pos: usize,
    ) -> Result<Expr, ParseError> {
        let element = source.ty().element_type().cloned().unwrap_or(Type::Dynamic);
        let slot = self.next_slot;
        self.next_slot += 1;
        let outer = self.it.replace(Expr::Parameter {
            slot,
            ty: element.clone(),
        });
        let args = self.parse_argument_list();
        self.it = outer;
        let mut args = args?;

        let not_applicable = || ParseError::NoApplicableAggregate {
            name: kind.name().to_owned(),
            pos,
        };
        let body = match args.len() {
            0 => None,
            1 => args.pop(),
            _ => return Err(not_applicable()),
        };
        let aggregate = |body: Option<Expr>, ty: Type| Expr::Aggregate {
            source: Box::new(source.clone()),
            kind,
            body: body.map(Box::new),
            slot,
            ty,
        };
        if source.is_deferred() {
            return Ok(aggregate(body, Type::Dynamic));
        }

        let is_predicate = |e: &Expr| e.is_deferred() || e.ty() == Type::BOOLEAN;
        match kind {
            AggregateKind::Where | AggregateKind::All => match body {
                Some(body) if is_predicate(&body) => {
                    let ty = if kind == AggregateKind::Where {
                        source.ty()
                    } else {
                        Type::BOOLEAN
                    };
                    Ok(aggregate(Some(body), ty))
                }
                _ => Err(not_applicable()),
            },
            AggregateKind::Any | AggregateKind::Count => {
                if body.as_ref().is_some_and(|b| !is_predicate(b)) {
                    return Err(not_applicable());
                }
                let ty = if kind == AggregateKind::Any {
                    Type::BOOLEAN
                } else {
                    Type::INT32
                };
                Ok(aggregate(body, ty))
            }
            AggregateKind::Min | AggregateKind::Max => {
                let ty = body.as_ref().map_or(element, Expr::ty);
                Ok(aggregate(body, ty))
            }
            AggregateKind::Sum | AggregateKind::Average => {
                let selector = body.unwrap_or(Expr::Parameter { slot, ty: element });
                if selector.is_deferred() {
                    return Ok(aggregate(Some(selector), Type::Dynamic));
                }
                let promoted = match find_best(
                    summable_signatures().iter().map(Vec::as_slice),
                    std::slice::from_ref(&selector),
                ) {
                    Resolution::Unique((_, mut promoted)) if promoted.len() == 1 => {
                        promoted.remove(0)
                    }
                    _ => return Err(not_applicable()),
                };
                let ty = if kind == AggregateKind::Sum {
                    promoted.ty()
                } else {
                    average_result(&promoted.ty())
                };
                Ok(aggregate(Some(promoted), ty))
            }
        }
    }

    fn parse_element_access(&mut self, target: Expr) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        self.next()?;
        let args = self.parse_arguments()?;
        self.expect(TokenKind::CloseBracket, "']' or ','")?;
        let ty = target.ty();
        let no_indexer = || ParseError::NoApplicableIndexer {
            type_name: ty.to_string(),
            pos,
        };
        let Ok([index]) = <[Expr; 1]>::try_from(args) else {
            return Err(no_indexer());
        };
        let index_expr = |element: Type| -> Result<Expr, ParseError> {
            let index = if index.is_deferred() {
                index.clone()
            } else {
                promote(&index, &Type::INT32, true).ok_or_else(no_indexer)?
            };
            Ok(Expr::Index {
                target: Box::new(target.clone()),
                index: Box::new(index),
                ty: element,
            })
        };
        if dynamic::answers_names(&ty) {
            return Ok(Expr::Index {
                target: Box::new(target.clone()),
                index: Box::new(index.clone()),
                ty: Type::Dynamic,
            });
        }
        match &ty {
            Type::Sequence(element) => index_expr((**element).clone()),
            _ if ty == Type::STRING => index_expr(Type::CHAR),
            _ => Err(no_indexer()),
        }
    }
}

// ---------------------------------------------------------------------------
// Node construction
// ---------------------------------------------------------------------------

fn literal(value: Value, text: String) -> Expr {
    Expr::Constant {
        ty: value.type_of().unwrap_or(Type::OBJECT),
        value,
        literal: Some(text),
    }
}

fn concat(left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op: BinaryOp::Concat,
        left: Box::new(left),
        right: Box::new(right),
        ty: Type::STRING,
    }
}

fn incompatible(op: BinaryOp, left: &Expr, right: &Expr, pos: usize) -> ParseError {
    ParseError::IncompatibleOperands {
        op: op.to_string(),
        left: left.ty().to_string(),
        right: right.ty().to_string(),
        pos,
    }
}

/// Promote both operands to the best signature of `family`.
fn check_binary(
    family: OperatorFamily,
    op: BinaryOp,
    left: Expr,
    right: Expr,
    pos: usize,
) -> Result<(Expr, Expr), ParseError> {
    let operands = [left, right];
    match find_best(operator_signatures(family).iter().map(Vec::as_slice), &operands) {
        Resolution::Unique((_, promoted)) => match <[Expr; 2]>::try_from(promoted) {
            Ok([l, r]) => Ok((l, r)),
            Err(_) => Err(incompatible(op, &operands[0], &operands[1], pos)),
        },
        Resolution::NotFound | Resolution::Ambiguous => {
            Err(incompatible(op, &operands[0], &operands[1], pos))
        }
    }
}

fn arithmetic(
    family: OperatorFamily,
    op: BinaryOp,
    left: Expr,
    right: Expr,
    pos: usize,
) -> Result<Expr, ParseError> {
    let (left, right) = check_binary(family, op, left, right, pos)?;
    Ok(Expr::Binary {
        op,
        ty: binary_result(&left.ty(), &right.ty()),
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn logical(op: BinaryOp, left: Expr, right: Expr, pos: usize) -> Result<Expr, ParseError> {
    if left.is_deferred() || right.is_deferred() {
        return Ok(dynamic::binary(op, left, right));
    }
    arithmetic(OperatorFamily::Logical, op, left, right, pos)
}

fn comparison(op: BinaryOp, left: Expr, right: Expr, pos: usize) -> Result<Expr, ParseError> {
    if left.is_deferred() || right.is_deferred() {
        return Ok(dynamic::binary(op, left, right));
    }
    let equality = matches!(op, BinaryOp::Equal | BinaryOp::NotEqual);
    let (lt, rt) = (left.ty(), right.ty());
    let (left, right) = if equality && !lt.is_value_type() && !rt.is_value_type() {
        if lt == rt {
            (left, right)
        } else if lt.is_assignable_from(&rt) {
            let right =
                promote(&right, &lt, true).ok_or_else(|| incompatible(op, &left, &right, pos))?;
            (left, right)
        } else if rt.is_assignable_from(&lt) {
            let left =
                promote(&left, &rt, true).ok_or_else(|| incompatible(op, &left, &right, pos))?;
            (left, right)
        } else {
            return Err(incompatible(op, &left, &right, pos));
        }
    } else if lt.is_enum() || rt.is_enum() {
        if let Some(promoted) = promote(&right, &lt, true) {
            (left, promoted)
        } else if let Some(promoted) = promote(&left, &rt, true) {
            (promoted, right)
        } else {
            return Err(incompatible(op, &left, &right, pos));
        }
    } else {
        let family = if equality {
            OperatorFamily::Equality
        } else {
            OperatorFamily::Relational
        };
        check_binary(family, op, left, right, pos)?
    };
    Ok(Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        ty: Type::BOOLEAN,
    })
}

/// `test ? if_true : if_false`; when the branch types differ, exactly one
/// branch must promote to the other's type.
fn conditional(test: Expr, if_true: Expr, if_false: Expr, pos: usize) -> Result<Expr, ParseError> {
    if !test.is_deferred() && test.ty() != Type::BOOLEAN {
        return Err(ParseError::ConditionNotBoolean { pos });
    }
    let (tt, ft) = (if_true.ty(), if_false.ty());
    let (if_true, if_false, ty) = if tt == ft {
        (if_true, if_false, tt)
    } else if if_true.is_deferred() || if_false.is_deferred() {
        (if_true, if_false, Type::Dynamic)
    } else {
        let true_as_false = (!if_false.is_null_literal())
            .then(|| promote(&if_true, &ft, true))
            .flatten();
        let false_as_true = (!if_true.is_null_literal())
            .then(|| promote(&if_false, &tt, true))
            .flatten();
        match (true_as_false, false_as_true) {
            (Some(t), None) => (t, if_false, ft),
            (None, Some(f)) => (if_true, f, tt),
            (Some(_), Some(_)) => {
                return Err(ParseError::BothTypesConvert {
                    first: tt.to_string(),
                    second: ft.to_string(),
                    pos,
                });
            }
            (None, None) => {
                return Err(ParseError::NeitherTypeConverts {
                    first: tt.to_string(),
                    second: ft.to_string(),
                    pos,
                });
            }
        }
    };
    Ok(Expr::Conditional {
        test: Box::new(test),
        if_true: Box::new(if_true),
        if_false: Box::new(if_false),
        ty,
    })
}

/// Explicit conversion `Type(expr)`: numeric and enum types convert to
/// each other with overflow checking, other types only along implicit
/// conversions.
fn conversion(expr: Expr, target: &Type, pos: usize) -> Result<Expr, ParseError> {
    let source = expr.ty();
    if source == *target {
        return Ok(expr);
    }
    let numeric_or_enum = |t: &Type| t.is_numeric() || t.is_enum();
    let convertible = expr.is_deferred()
        || (numeric_or_enum(&source) && numeric_or_enum(target))
        || source.is_compatible_with(target)
        || source.is_assignable_from(target);
    if !convertible {
        return Err(ParseError::CannotConvert {
            from: source.to_string(),
            to: target.to_string(),
            pos,
        });
    }
    Ok(Expr::Convert {
        operand: Box::new(expr),
        ty: target.clone(),
        checked: true,
    })
}
