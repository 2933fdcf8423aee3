//! Error types for the vodhub host.

use vodhub_search::SearchError;

/// Top-level error type for the host application.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Configuration could not be read, parsed or validated.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP server could not start.
    #[error("server error: {0}")]
    Server(String),

    /// Error raised by the search core.
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_errors_convert() {
        let err: HubError = SearchError::Config("bad window".into()).into();
        assert!(matches!(err, HubError::Search(_)));
        assert_eq!(err.to_string(), "config error: bad window");
    }

    #[test]
    fn io_errors_convert() {
        let err: HubError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().starts_with("I/O error"));
    }
}
