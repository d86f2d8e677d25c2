pub type SvmResult<T> = Result<T, SvmError>;

/// Crate-level error.
///
/// Only contract violations at the API boundary surface as `SvmError`. Failures that happen while
/// compiling one shader are captured in that shader's [`CompileStatus`](crate::CompileStatus)
/// and never abort a batch.
#[derive(thiserror::Error, Debug)]
pub enum SvmError {
    /// The shader graph violates the producer contract (unknown socket, bad link, cycle).
    #[error("validation error: {0}")]
    Validation(String),

    /// Invalid compiler options.
    #[error("config error: {0}")]
    Config(String),

    /// The batch was cancelled between shaders.
    #[error("compilation cancelled")]
    Cancelled,

    /// A compiler invariant did not hold.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapped foreign error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SvmError {
    /// Build a [`SvmError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`SvmError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`SvmError::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
