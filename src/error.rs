use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the simulation core.
///
/// Numerical degeneracies during prediction (separating pairs, negative
/// discriminants, non-positive contact times) are not errors; they simply
/// produce no event. Only malformed configuration and sink failures reach
/// the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Numerical or geometric issue (e.g., non-finite event time).
    #[error("numerical error: {0}")]
    MathError(String),

    /// Propagated I/O errors from the snapshot sink.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_informative() {
        let e = Error::InvalidParam("radius must be > 0".to_string());
        let msg = format!("{e}");
        assert!(msg.contains("invalid parameter"));
        assert!(msg.contains("radius"));
    }
}
