use thiserror::Error;

use crate::machine::cost_model::ExBudget;
use crate::term::Constant;

/// A builtin failure. The info string is preserved verbatim so callers
/// (and tests) can assert on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{info}")]
pub struct RuntimeError {
    pub info: String,
}

impl RuntimeError {
    pub fn info(info: impl Into<String>) -> Self {
        RuntimeError { info: info.into() }
    }

    pub fn type_mismatch(expected: &str, got: &Constant) -> Self {
        RuntimeError {
            info: format!("expected {expected}, got {got}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum MachineError {
    /// The `error` term, or a traced failure routed through it. The info
    /// string is the last trace line emitted before failing, if any.
    #[error("script evaluated to error{}", .info.as_deref().map(|i| format!(": {i}")).unwrap_or_default())]
    ExplicitError { info: Option<String> },

    #[error("{0}")]
    Runtime(#[from] RuntimeError),

    #[error("budget exhausted (consumed mem {} cpu {})", .consumed.mem, .consumed.cpu)]
    OutOfBudget { consumed: ExBudget },

    #[error("open term: unbound variable with index {0}")]
    OpenTerm(u64),

    #[error("attempt to apply a non-function value")]
    NonFunctionApplication,

    #[error("force of a value that is not delayed")]
    NonPolymorphicInstantiation,

    #[error("builtin received more type instantiations than expected")]
    BuiltinForceOverflow,

    #[error("term reduced to an unsaturated builtin or lambda")]
    NonConstantResult,
}

impl MachineError {
    /// The info string tests assert on: runtime info for builtin
    /// failures, the traced message for explicit errors.
    pub fn info(&self) -> Option<&str> {
        match self {
            MachineError::ExplicitError { info } => info.as_deref(),
            MachineError::Runtime(e) => Some(&e.info),
            _ => None,
        }
    }
}
