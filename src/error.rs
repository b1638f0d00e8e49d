//! Error types for the evaluation engine.
//!
//! Every error kind named in the specification's error-handling design gets
//! its own variant here, carrying whatever structured context is needed to
//! render the exact diagnostic text a caller expects (operation name,
//! expected/actual type, argument position, and so on). All of the core's
//! fallible routines return [`SchemeResult<T>`] and propagate with `?`; there
//! is no recovery machinery in the source language, so the top-level REPL or
//! script runner is the only place an `InterpError` is ever caught, and there
//! it is printed and turned into a non-zero process exit.

use thiserror::Error;

/// All ways a Scheme program (or the runtime itself) can fail fatally.
#[derive(Debug, Error)]
pub enum InterpError {
    /// Malformed source text: unmatched parens, premature EOF, buffer
    /// overflow while reading an atom or string.
    #[error("parse error: {0}")]
    Parse(String),

    /// A value was used somewhere that required a different variant.
    #[error("{op}: expected {expected}, got {got} (argument {position})")]
    Type {
        op: String,
        expected: String,
        got: String,
        position: usize,
    },

    /// Wrong number of arguments to a procedure or special form.
    #[error("Expected {expected} arguments for {name}, got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    /// Lookup of a name that is not bound anywhere in the scope chain.
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    /// `define` attempted to rebind a name already present in the same scope.
    #[error("{0} is already bound in this scope")]
    Rebind(String),

    /// `set!` on a name that no scope in the chain binds.
    #[error("set!: unbound variable {0}")]
    UnboundAssign(String),

    /// A special form's body doesn't have the shape that form requires.
    #[error("malformed `{form}`: {message}")]
    Syntax { form: String, message: String },

    /// No `syntax-rules` clause matched the operand list at a macro call site.
    #[error("no matching syntax-rules clause for `{0}`")]
    MacroNoMatch(String),

    /// File open/read/write failures, e.g. a missing bootstrap file or a
    /// `load`/`open-input-file` target that doesn't exist.
    #[error("resource error: {0}")]
    Resource(String),

    /// Memory-manager or evaluator invariant violations: double-release,
    /// registering a disposed object, marking a null referent, or any other
    /// condition that indicates a bug in the runtime rather than the program
    /// it is running.
    #[error("internal interpreter error: {0}")]
    Internal(String),
}

impl InterpError {
    pub fn type_error(op: &str, expected: &str, got: &str, position: usize) -> Self {
        InterpError::Type {
            op: op.to_string(),
            expected: expected.to_string(),
            got: got.to_string(),
            position,
        }
    }

    pub fn arity(name: &str, expected: impl Into<String>, got: usize) -> Self {
        InterpError::Arity {
            name: name.to_string(),
            expected: expected.into(),
            got,
        }
    }

    pub fn syntax(form: &str, message: impl Into<String>) -> Self {
        InterpError::Syntax {
            form: form.to_string(),
            message: message.into(),
        }
    }
}

/// The result type used throughout the evaluation engine.
pub type SchemeResult<T> = Result<T, InterpError>;
