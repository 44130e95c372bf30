//! Error types for expression compilation and evaluation.

/// Broad classification of a [`ParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input text (unterminated literal, invalid character).
    Lexical,
    /// Unexpected or missing token.
    Syntax,
    /// Unknown names, incompatible types, and overload failures.
    Resolution,
}

/// Compile-time failure. Every variant carries the character position in
/// the expression text where the problem was detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A quoted literal was not closed before the end of the text.
    #[error("unterminated string literal (at index {pos})")]
    UnterminatedStringLiteral {
        /// Position of the end of input.
        pos: usize,
    },

    /// A character that starts no token.
    #[error("syntax error '{ch}' (at index {pos})")]
    InvalidCharacter {
        /// The offending character.
        ch: char,
        /// Position of the character.
        pos: usize,
    },

    /// A numeric literal ended where a digit was required.
    #[error("digit expected (at index {pos})")]
    DigitExpected {
        /// Position of the missing digit.
        pos: usize,
    },

    /// A single-quoted literal that does not hold exactly one character.
    #[error("character literal must contain exactly one character (at index {pos})")]
    InvalidCharacterLiteral {
        /// Position of the literal.
        pos: usize,
    },

    /// An integer literal that does not fit any integer type.
    #[error("invalid integer literal '{text}' (at index {pos})")]
    InvalidIntegerLiteral {
        /// Literal text.
        text: String,
        /// Position of the literal.
        pos: usize,
    },

    /// A real literal that cannot be parsed.
    #[error("invalid real literal '{text}' (at index {pos})")]
    InvalidRealLiteral {
        /// Literal text.
        text: String,
        /// Position of the literal.
        pos: usize,
    },

    /// A specific token was required.
    #[error("{expected} expected (at index {pos})")]
    Expected {
        /// Human readable description of what was expected.
        expected: &'static str,
        /// Position of the token found instead.
        pos: usize,
    },

    /// Tokens left over after a complete expression, or a token that
    /// cannot appear at this point.
    #[error("syntax error (at index {pos})")]
    Syntax {
        /// Position of the unexpected token.
        pos: usize,
    },

    /// Parentheses, conditionals or unary operators nested past the limit.
    #[error("expression nested deeper than {limit} levels (at index {pos})")]
    NestingTooDeep {
        /// Maximum nesting depth.
        limit: usize,
        /// Position of the token that went past the limit.
        pos: usize,
    },

    /// An identifier that resolves to no keyword, symbol or member.
    #[error("unknown identifier '{name}' (at index {pos})")]
    UnknownIdentifier {
        /// The identifier.
        name: String,
        /// Position of the identifier.
        pos: usize,
    },

    /// The same symbol was registered twice.
    #[error("the identifier '{name}' was defined more than once (at index {pos})")]
    DuplicateIdentifier {
        /// The symbol name.
        name: String,
        /// Always zero: symbols are registered before parsing starts.
        pos: usize,
    },

    /// `it` used without an implicit parameter in scope.
    #[error("no 'it' is in scope (at index {pos})")]
    NoItInScope {
        /// Position of the keyword.
        pos: usize,
    },

    /// A member name not declared by a type without dynamic members.
    #[error("no property or field '{name}' exists in type '{type_name}' (at index {pos})")]
    UnknownMember {
        /// Member name.
        name: String,
        /// Name of the type that was searched.
        type_name: String,
        /// Position of the member name.
        pos: usize,
    },

    /// No method of that name accepts the supplied arguments.
    #[error("no applicable method '{name}' exists in type '{type_name}' (at index {pos})")]
    NoApplicableMethod {
        /// Method name.
        name: String,
        /// Receiver type name.
        type_name: String,
        /// Position of the method name.
        pos: usize,
    },

    /// More than one method overload is equally applicable.
    #[error("ambiguous invocation of method '{name}' in type '{type_name}' (at index {pos})")]
    AmbiguousMethod {
        /// Method name.
        name: String,
        /// Receiver type name.
        type_name: String,
        /// Position of the method name.
        pos: usize,
    },

    /// No aggregate of that name accepts the supplied arguments.
    #[error("no applicable aggregate method '{name}' exists (at index {pos})")]
    NoApplicableAggregate {
        /// Aggregate name.
        name: String,
        /// Position of the method name.
        pos: usize,
    },

    /// A constructor call that matched no overload and could not be
    /// treated as a conversion.
    #[error("no matching constructor in type '{type_name}' (at index {pos})")]
    NoMatchingConstructor {
        /// Constructed type.
        type_name: String,
        /// Position of the type name.
        pos: usize,
    },

    /// More than one constructor overload is equally applicable.
    #[error("ambiguous invocation of '{type_name}' constructor (at index {pos})")]
    AmbiguousConstructor {
        /// Constructed type.
        type_name: String,
        /// Position of the type name.
        pos: usize,
    },

    /// Explicit conversion between unrelated types.
    #[error("a value of type '{from}' cannot be converted to type '{to}' (at index {pos})")]
    CannotConvert {
        /// Source type name.
        from: String,
        /// Target type name.
        to: String,
        /// Position of the conversion.
        pos: usize,
    },

    /// `Type?` on a type that has no nullable form.
    #[error("type '{type_name}' has no nullable form (at index {pos})")]
    NoNullableForm {
        /// The type name.
        type_name: String,
        /// Position of the type name.
        pos: usize,
    },

    /// A unary operator applied to an unsupported operand type.
    #[error("operator '{op}' incompatible with operand type '{operand}' (at index {pos})")]
    IncompatibleOperand {
        /// Operator text.
        op: String,
        /// Operand type name.
        operand: String,
        /// Position of the operator.
        pos: usize,
    },

    /// A binary operator applied to unsupported operand types.
    #[error(
        "operator '{op}' incompatible with operand types '{left}' and '{right}' (at index {pos})"
    )]
    IncompatibleOperands {
        /// Operator text.
        op: String,
        /// Left operand type name.
        left: String,
        /// Right operand type name.
        right: String,
        /// Position of the operator.
        pos: usize,
    },

    /// Conditional test that is not boolean.
    #[error("the first expression must be of type 'Boolean' (at index {pos})")]
    ConditionNotBoolean {
        /// Position of the conditional.
        pos: usize,
    },

    /// Conditional branches where both convert to each other.
    #[error("both of the types '{first}' and '{second}' convert to the other (at index {pos})")]
    BothTypesConvert {
        /// First branch type name.
        first: String,
        /// Second branch type name.
        second: String,
        /// Position of the conditional.
        pos: usize,
    },

    /// Conditional branches where neither converts to the other.
    #[error("neither of the types '{first}' and '{second}' converts to the other (at index {pos})")]
    NeitherTypeConverts {
        /// First branch type name.
        first: String,
        /// Second branch type name.
        second: String,
        /// Position of the conditional.
        pos: usize,
    },

    /// `iif` called with the wrong number of arguments.
    #[error("the 'iif' function requires three arguments (at index {pos})")]
    IifRequiresThreeArgs {
        /// Position of the keyword.
        pos: usize,
    },

    /// A `new(...)` entry that is not a member access and has no `as`.
    #[error("expression is missing an 'as' clause (at index {pos})")]
    MissingAsClause {
        /// Position of the entry.
        pos: usize,
    },

    /// Indexing a type without an indexer.
    #[error("no applicable indexer exists in type '{type_name}' (at index {pos})")]
    NoApplicableIndexer {
        /// Indexed type name.
        type_name: String,
        /// Position of the opening bracket.
        pos: usize,
    },

    /// Lambda invoked with incompatible arguments.
    #[error("argument list incompatible with lambda expression (at index {pos})")]
    ArgsIncompatibleWithLambda {
        /// Position of the invocation.
        pos: usize,
    },

    /// The expression does not produce the type the caller requires.
    #[error("expression of type '{expected}' expected (at index {pos})")]
    TypeMismatch {
        /// Expected type name.
        expected: String,
        /// Position of the expression start.
        pos: usize,
    },
}

impl ParseError {
    /// Character position where the error was detected.
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::UnterminatedStringLiteral { pos }
            | Self::InvalidCharacter { pos, .. }
            | Self::DigitExpected { pos }
            | Self::InvalidCharacterLiteral { pos }
            | Self::InvalidIntegerLiteral { pos, .. }
            | Self::InvalidRealLiteral { pos, .. }
            | Self::Expected { pos, .. }
            | Self::Syntax { pos }
            | Self::NestingTooDeep { pos, .. }
            | Self::UnknownIdentifier { pos, .. }
            | Self::DuplicateIdentifier { pos, .. }
            | Self::NoItInScope { pos }
            | Self::UnknownMember { pos, .. }
            | Self::NoApplicableMethod { pos, .. }
            | Self::AmbiguousMethod { pos, .. }
            | Self::NoApplicableAggregate { pos, .. }
            | Self::NoMatchingConstructor { pos, .. }
            | Self::AmbiguousConstructor { pos, .. }
            | Self::CannotConvert { pos, .. }
            | Self::NoNullableForm { pos, .. }
            | Self::IncompatibleOperand { pos, .. }
            | Self::IncompatibleOperands { pos, .. }
            | Self::ConditionNotBoolean { pos }
            | Self::BothTypesConvert { pos, .. }
            | Self::NeitherTypeConverts { pos, .. }
            | Self::IifRequiresThreeArgs { pos }
            | Self::MissingAsClause { pos }
            | Self::NoApplicableIndexer { pos, .. }
            | Self::ArgsIncompatibleWithLambda { pos }
            | Self::TypeMismatch { pos, .. } => *pos,
        }
    }

    /// Which stage of compilation rejected the expression.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnterminatedStringLiteral { .. }
            | Self::InvalidCharacter { .. }
            | Self::DigitExpected { .. }
            | Self::InvalidCharacterLiteral { .. }
            | Self::InvalidIntegerLiteral { .. }
            | Self::InvalidRealLiteral { .. } => ErrorCategory::Lexical,
            Self::Expected { .. }
            | Self::Syntax { .. }
            | Self::NestingTooDeep { .. }
            | Self::IifRequiresThreeArgs { .. }
            | Self::MissingAsClause { .. } => ErrorCategory::Syntax,
            _ => ErrorCategory::Resolution,
        }
    }
}

/// Failure while applying a compiled plan to an element.
///
/// A dynamic lookup that finds nothing is not an error; it produces
/// [`Value::Absent`](crate::Value::Absent).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    /// Integer division or remainder by zero.
    #[error("attempted to divide by zero")]
    DivideByZero,

    /// A checked conversion did not fit the target type.
    #[error("value '{value}' is out of range for type '{type_name}'")]
    Overflow {
        /// Display form of the value.
        value: String,
        /// Target type name.
        type_name: String,
    },

    /// A statically typed index outside the bounds of its target.
    #[error("index {index} is out of range for a length of {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: i64,
        /// Length of the indexed value.
        len: usize,
    },

    /// A built-in received an argument it cannot work with.
    #[error("invalid argument for '{function}': {message}")]
    InvalidArgument {
        /// Built-in name.
        function: &'static str,
        /// Description of the problem.
        message: String,
    },
}

/// Error type of the query surface.
#[derive(Debug, thiserror::Error)]
pub enum DynqError {
    /// The expression text failed to compile.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A compiled plan failed while being applied.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Convenience result type for query operations.
pub type DynqResult<T> = Result<T, DynqError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_report_position_and_category() {
        let err = ParseError::UnknownIdentifier {
            name: "Foo".to_owned(),
            pos: 7,
        };
        assert_eq!(err.position(), 7);
        assert_eq!(err.category(), ErrorCategory::Resolution);
        assert_eq!(err.to_string(), "unknown identifier 'Foo' (at index 7)");

        let err = ParseError::UnterminatedStringLiteral { pos: 3 };
        assert_eq!(err.category(), ErrorCategory::Lexical);

        let err = ParseError::Expected {
            expected: "')' or operator",
            pos: 4,
        };
        assert_eq!(err.category(), ErrorCategory::Syntax);
        assert_eq!(err.to_string(), "')' or operator expected (at index 4)");
    }

    #[test]
    fn test_should_wrap_into_dynq_error() {
        let err: DynqError = EvaluationError::DivideByZero.into();
        assert!(matches!(err, DynqError::Evaluation(EvaluationError::DivideByZero)));
        assert_eq!(err.to_string(), "attempted to divide by zero");
    }
}
