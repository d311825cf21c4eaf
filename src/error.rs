// ABOUTME: Error types for macro expansion and expression evaluation failures

use thiserror::Error;

// ===== Arity constant strings (shared by the built-in guards) =====
pub const ARITY_EXACTLY_ONE: &str = "exactly 1 argument";
pub const ARITY_EXACTLY_TWO: &str = "exactly 2 arguments";
pub const ARITY_EXACTLY_THREE: &str = "exactly 3 arguments";
pub const ARITY_AT_LEAST_ONE: &str = "at least 1 argument";
pub const ARITY_AT_LEAST_TWO: &str = "at least 2 arguments";
pub const ARITY_TWO_OR_THREE: &str = "2 or 3 arguments";
pub const ARITY_ZERO_OR_ONE: &str = "0 or 1 arguments";
pub const ARITY_NONE: &str = "no arguments";

/// Every diagnostic the engine can produce. The `Display` strings are the
/// external contract: hosts report them verbatim and tests match on them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    // ===== Macro name validation =====
    #[error("empty macro name")]
    EmptyMacroName,

    #[error("macro name cannot start with digit")]
    NameStartsWithDigit,

    #[error("macro name cannot contain white space")]
    NameContainsWhitespace,

    #[error("macro name cannot contain right delimiter for invocation")]
    NameContainsDelimiter,

    // ===== Expansion =====
    #[error("null character in input to macro processor")]
    NulByteInInput,

    #[error("buffer overflow while evaluating macro")]
    WorkspaceOverflow,

    #[error("result buffer overflow while evaluating macro")]
    ResultOverflow,

    #[error("macro nesting level too deep")]
    NestingTooDeep,

    #[error("ridiculous macro argument number")]
    ArgumentNumberTooLarge,

    #[error("unexpected garbage in macro argument reference")]
    GarbageInArgumentReference,

    #[error("unexpected garbage in macro invocation")]
    GarbageInInvocation,

    #[error("input ended in middle of macro expansion")]
    UnterminatedExpansion,

    // ===== Expression evaluation =====
    #[error("bad syntax in numeric expression")]
    ExprSyntax,

    #[error("buffer overflow during numeric expression evaluation")]
    ExprPairOverflow,

    #[error("missing right parenthesis in numeric expression")]
    MissingRightParen,

    #[error("extra right parenthesis in numeric expression")]
    ExtraRightParen,

    #[error("junk follows numeric expression")]
    JunkAfterExpression,

    #[error("division by zero in numeric expression")]
    DivisionByZero,

    // ===== Built-in contracts =====
    /// Arity error with the built-in's name and the expected count or range
    #[error("{name} macro requires {expected}")]
    Arity { name: String, expected: &'static str },

    #[error("2nd argument is not =, >, <, <>, <= or >=")]
    BadRelation,

    #[error("illegal substring")]
    IllegalSubstring,

    /// Diagnostic raised by the `error` built-in; carries the macro's text
    #[error("{0}")]
    User(String),

    // ===== Host I/O =====
    #[error("too many nested include files")]
    IncludeTooDeep,

    #[error("{0}")]
    Host(String),
}

impl EngineError {
    /// Create an arity error for a built-in macro
    pub fn arity(name: &str, expected: &'static str) -> Self {
        EngineError::Arity {
            name: name.to_string(),
            expected,
        }
    }

    /// Wrap a host-side failure (file open, write, sandbox denial)
    pub fn host(message: impl Into<String>) -> Self {
        EngineError::Host(message.into())
    }
}
