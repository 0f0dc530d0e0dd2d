//! Typed errors for the lyre compiler.
//!
//! Every error here is detected while lowering (or reading) and is fatal to
//! the compilation in progress: the caller receives the first failure and no
//! partial output. Execution-time faults (division by zero) are a distinct
//! class — they surface as native traps when the compiled code actually runs
//! and are not represented in this enum.

use std::error::Error as StdError;
use std::fmt;

/// Compile-time error for the lyre compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LyreError {
    /// A symbol in value position resolved to nothing.
    UnboundSymbol { name: String },
    /// The head of an invocation resolved to nothing.
    UnboundCallee { name: String },
    /// The head of an invocation resolved to a mutable variable.
    NotCallable { name: String },
    /// The head of an invocation was not a symbol at all.
    InvalidCallee { found: String },
    /// `set!` on a constant, a builtin, or an unknown name.
    InvalidSetTarget { name: String },
    /// A builtin operator used as a value rather than invoked.
    BuiltinAsValue { name: String },
    /// A variable of an enclosing function referenced from a nested one.
    UnsupportedCapture { name: String },
    /// A literal the runtime has no representation for (strings).
    UnsupportedLiteral { what: String },

    // Structural shape violations of the special forms.
    MalformedDefn { message: String },
    MalformedCond { message: String },
    MalformedLet { message: String },
    MalformedWhile { message: String },
    MalformedSet { message: String },
    /// A function or form body with no expressions.
    EmptyBody { name: String },
    /// The empty list `()` invoked.
    EmptyInvocation,

    /// Builtin invoked with fewer arguments than it requires.
    NotEnoughArgs { op: String, min: usize, got: usize },
    /// User function invoked with the wrong number of arguments.
    CallArity {
        name: String,
        expected: usize,
        got: usize,
    },

    /// Reader failure, with the source position that produced it.
    Syntax {
        message: String,
        line: usize,
        col: usize,
    },
    /// Cranelift reported a failure while building or finalizing code.
    Codegen { message: String },
}

impl LyreError {
    pub fn unbound_symbol(name: impl Into<String>) -> Self {
        LyreError::UnboundSymbol { name: name.into() }
    }

    pub fn unbound_callee(name: impl Into<String>) -> Self {
        LyreError::UnboundCallee { name: name.into() }
    }

    pub fn not_callable(name: impl Into<String>) -> Self {
        LyreError::NotCallable { name: name.into() }
    }

    pub fn invalid_callee(found: impl Into<String>) -> Self {
        LyreError::InvalidCallee {
            found: found.into(),
        }
    }

    pub fn invalid_set_target(name: impl Into<String>) -> Self {
        LyreError::InvalidSetTarget { name: name.into() }
    }

    pub fn builtin_as_value(name: impl Into<String>) -> Self {
        LyreError::BuiltinAsValue { name: name.into() }
    }

    pub fn unsupported_capture(name: impl Into<String>) -> Self {
        LyreError::UnsupportedCapture { name: name.into() }
    }

    pub fn unsupported_literal(what: impl Into<String>) -> Self {
        LyreError::UnsupportedLiteral { what: what.into() }
    }

    pub fn malformed_defn(message: impl Into<String>) -> Self {
        LyreError::MalformedDefn {
            message: message.into(),
        }
    }

    pub fn malformed_cond(message: impl Into<String>) -> Self {
        LyreError::MalformedCond {
            message: message.into(),
        }
    }

    pub fn malformed_let(message: impl Into<String>) -> Self {
        LyreError::MalformedLet {
            message: message.into(),
        }
    }

    pub fn malformed_while(message: impl Into<String>) -> Self {
        LyreError::MalformedWhile {
            message: message.into(),
        }
    }

    pub fn malformed_set(message: impl Into<String>) -> Self {
        LyreError::MalformedSet {
            message: message.into(),
        }
    }

    pub fn empty_body(name: impl Into<String>) -> Self {
        LyreError::EmptyBody { name: name.into() }
    }

    pub fn not_enough_args(op: impl Into<String>, min: usize, got: usize) -> Self {
        LyreError::NotEnoughArgs {
            op: op.into(),
            min,
            got,
        }
    }

    pub fn call_arity(name: impl Into<String>, expected: usize, got: usize) -> Self {
        LyreError::CallArity {
            name: name.into(),
            expected,
            got,
        }
    }

    pub fn syntax(message: impl Into<String>, line: usize, col: usize) -> Self {
        LyreError::Syntax {
            message: message.into(),
            line,
            col,
        }
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        LyreError::Codegen {
            message: message.into(),
        }
    }
}

impl fmt::Display for LyreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LyreError::UnboundSymbol { name } => {
                write!(f, "undefined symbol '{}'", name)
            }
            LyreError::UnboundCallee { name } => {
                write!(f, "call to undefined function '{}'", name)
            }
            LyreError::NotCallable { name } => {
                write!(f, "'{}' is a variable, not a function", name)
            }
            LyreError::InvalidCallee { found } => {
                write!(f, "call head must be a symbol, got {}", found)
            }
            LyreError::InvalidSetTarget { name } => {
                write!(f, "set!: '{}' is not a mutable variable", name)
            }
            LyreError::BuiltinAsValue { name } => {
                write!(f, "operator '{}' cannot be used as a value", name)
            }
            LyreError::UnsupportedCapture { name } => {
                write!(f, "'{}' belongs to an enclosing function (no closures)", name)
            }
            LyreError::UnsupportedLiteral { what } => {
                write!(f, "{} literals are not supported at runtime", what)
            }
            LyreError::MalformedDefn { message } => write!(f, "malformed defn: {}", message),
            LyreError::MalformedCond { message } => write!(f, "malformed cond: {}", message),
            LyreError::MalformedLet { message } => write!(f, "malformed let: {}", message),
            LyreError::MalformedWhile { message } => write!(f, "malformed while: {}", message),
            LyreError::MalformedSet { message } => write!(f, "malformed set!: {}", message),
            LyreError::EmptyBody { name } => write!(f, "empty body in '{}'", name),
            LyreError::EmptyInvocation => write!(f, "cannot invoke the empty list"),
            LyreError::NotEnoughArgs { op, min, got } => {
                write!(
                    f,
                    "'{}' needs at least {} argument{}, got {}",
                    op,
                    min,
                    if *min == 1 { "" } else { "s" },
                    got
                )
            }
            LyreError::CallArity {
                name,
                expected,
                got,
            } => {
                write!(
                    f,
                    "'{}' takes {} argument{}, got {}",
                    name,
                    expected,
                    if *expected == 1 { "" } else { "s" },
                    got
                )
            }
            LyreError::Syntax { message, line, col } => {
                write!(f, "syntax error at {}:{}: {}", line, col, message)
            }
            LyreError::Codegen { message } => write!(f, "code generation failed: {}", message),
        }
    }
}

impl StdError for LyreError {}
