//! Internal result and error types.

/// The result type for operations whose only failure mode is a bug in forge.
///
/// User-facing failures (bad configuration, overlapping regions, a toolchain
/// exiting non-zero) have their own error enums in the crate that detects
/// them. `InternalError` is reserved for broken invariants, such as a
/// pipeline run being asked to move backwards through its lifecycle.
pub type ForgeResult<T> = Result<T, InternalError>;

/// An invariant violation inside forge, not a problem with user input.
#[derive(Debug, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the violated invariant.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("run restarted after completion");
        assert_eq!(
            format!("{err}"),
            "internal error: run restarted after completion"
        );
    }

    #[test]
    fn from_string() {
        let err: InternalError = "from string".to_string().into();
        assert_eq!(err.message, "from string");
    }

    #[test]
    fn err_path() {
        let r: ForgeResult<u32> = Err(InternalError::new("boom"));
        assert_eq!(r.unwrap_err().message, "boom");
    }
}
