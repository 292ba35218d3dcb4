use std::fmt::Display;

use thiserror::Error;

/// The error type returned by every engine operation.
///
/// Mirrors the shape of an actor's exit-code error: a fixed taxonomy of
/// *kinds* (§7 of the spec) carrying a free-form message for debugging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Overflow/underflow in fixed-point math. Fatal: aborts the current
    /// operation with no state change.
    #[error("ArithmeticError: {0}")]
    ArithmeticError(String),

    /// A precondition was violated: wrong lifecycle phase, expired
    /// deadline, duplicate commitment, missing role. Rejects the call
    /// with no state change.
    #[error("GuardViolation: {0}")]
    GuardViolation(String),

    /// No score, no validator, or an unknown work id was read. Callers
    /// get a well-defined empty/default result rather than an error in
    /// most cases; this variant is for reads that must distinguish
    /// "absent" from "zero".
    #[error("MissingData: {0}")]
    MissingData(String),

    /// A score vector payload had an unexpected length at a trust
    /// boundary (the strict decoder, see SPEC_FULL §9).
    #[error("AmbiguousDecode: {0}")]
    AmbiguousDecode(String),

    /// A call to an external collaborator (payout alias resolution,
    /// reputation/validation publication) failed. Always swallowed by
    /// the caller; never rolls back money-affecting state.
    #[error("ExternalInterfaceFailure: {0}")]
    ExternalInterfaceFailure(String),
}

impl EngineError {
    pub fn arithmetic(msg: impl Into<String>) -> Self {
        Self::ArithmeticError(msg.into())
    }

    pub fn guard(msg: impl Into<String>) -> Self {
        Self::GuardViolation(msg.into())
    }

    pub fn missing(msg: impl Into<String>) -> Self {
        Self::MissingData(msg.into())
    }

    pub fn ambiguous_decode(msg: impl Into<String>) -> Self {
        Self::AmbiguousDecode(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalInterfaceFailure(msg.into())
    }

    /// Prefix the error message with additional call-site context,
    /// preserving the original kind.
    pub fn wrap(self, context: impl Display) -> Self {
        use EngineError::*;
        match self {
            ArithmeticError(m) => ArithmeticError(format!("{context}: {m}")),
            GuardViolation(m) => GuardViolation(format!("{context}: {m}")),
            MissingData(m) => MissingData(format!("{context}: {m}")),
            AmbiguousDecode(m) => AmbiguousDecode(format!("{context}: {m}")),
            ExternalInterfaceFailure(m) => ExternalInterfaceFailure(format!("{context}: {m}")),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::ArithmeticError(_))
    }
}

/// Convenience wrapper so call sites can write `result.context("...")?`
/// the way the teacher's actor code writes `.context(...)`.
pub trait ErrorContext<T> {
    fn context(self, context: impl Display) -> Result<T, EngineError>;
}

impl<T> ErrorContext<T> for Result<T, EngineError> {
    fn context(self, context: impl Display) -> Result<T, EngineError> {
        self.map_err(|e| e.wrap(context))
    }
}

/// Convenience macro for building `EngineError`s, analogous to the
/// teacher's `actor_error!`.
#[macro_export]
macro_rules! engine_error {
    ($kind:ident; $msg:expr) => {
        $crate::error::EngineError::$kind($msg.to_string())
    };
    ($kind:ident; $msg:literal $(, $arg:expr)+) => {
        $crate::error::EngineError::$kind(format!($msg, $($arg,)*))
    };
}
