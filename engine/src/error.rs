//! Engine error types.
//!
//! The phase machine and the mappers never fail: malformed stream data is
//! dropped where it is decoded. Errors only surface at the edges, when a
//! driver parses raw payloads or validates a debate setup.

use thiserror::Error;

/// Result type alias for engine boundary operations
pub type ArenaResult<T> = Result<T, ArenaError>;

#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("Invalid stream event JSON: {0}")]
    InvalidEvent(#[from] serde_json::Error),

    #[error("Empty stream payload")]
    EmptyPayload,

    #[error("Invalid debate setup: {message}")]
    InvalidSetup { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ArenaError::InvalidSetup {
            message: "names must differ".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid debate setup: names must differ");

        let err = ArenaError::EmptyPayload;
        assert!(err.to_string().contains("Empty"));

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ArenaError = json_err.into();
        assert!(err.to_string().starts_with("Invalid stream event JSON"));
    }
}
