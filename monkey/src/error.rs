//! Error handling for the monkey CLI.

use thiserror::Error;

/// Host-side failures of the CLI itself.
///
/// Language-level failures (lex, parse, runtime) never surface here; they
/// are reported through the session output and leave the process exit code
/// untouched.
#[derive(Error, Debug)]
pub enum MonkeyError {
    /// IO failure while talking to the terminal or reading input.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure while setting up logging.
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type alias using MonkeyError.
pub type Result<T> = std::result::Result<T, MonkeyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MonkeyError = io_err.into();
        assert!(matches!(err, MonkeyError::Io(_)));
    }

    #[test]
    fn test_logging_error_display() {
        let err = MonkeyError::Logging("subscriber already set".to_string());
        assert_eq!(err.to_string(), "Logging error: subscriber already set");
    }
}
