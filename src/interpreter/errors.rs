use std::io;

use thiserror::Error;

use crate::expr::ExprError;

/// Non-fatal runtime errors. Every statement executes inside an
/// isolating boundary: the engine reports these with the originating
/// line number and statement text, then continues with the next
/// statement. The only fatal condition is a missing script at load
/// time, which is handled in `main`.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A typed read failed to coerce; the raw text is kept.
    #[error("invalid {expected} input '{raw}', keeping raw text")]
    InputCoercion { expected: &'static str, raw: String },
    /// Expression evaluation failed; the engine yields `false`.
    #[error("cannot evaluate '{expr}': {cause}")]
    Expression { expr: String, cause: ExprError },
    /// File or list operation failure.
    #[error("{0}")]
    Resource(String),
    #[error("unrecognized command '{0}'")]
    UnknownCommand(String),
    #[error("'{target}' is not an object or method '{method}' not found")]
    MethodNotFound { target: String, method: String },
    #[error("malformed statement: {0}")]
    Malformed(String),
    #[error("input stream error: {0}")]
    Input(#[from] io::Error),
}
