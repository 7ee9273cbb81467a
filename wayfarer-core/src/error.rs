//! Error types for Wayfarer operations

/// Result type for Wayfarer operations
pub type Result<T> = std::result::Result<T, WayfarerError>;

/// Error types for the Wayfarer pipeline and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum WayfarerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Route lookup or geocoding failed
    #[error("Routing error: {0}")]
    Routing(String),

    /// Search backend failed
    #[error("Search error: {0}")]
    Search(String),

    /// Language model invocation failed
    #[error("LLM error: {0}")]
    Llm(String),

    /// Pipeline wiring or task failure
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for WayfarerError {
    fn from(s: String) -> Self {
        WayfarerError::Other(s)
    }
}

impl From<&str> for WayfarerError {
    fn from(s: &str) -> Self {
        WayfarerError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for WayfarerError {
    fn from(err: anyhow::Error) -> Self {
        WayfarerError::Other(err.to_string())
    }
}

impl From<tokio::task::JoinError> for WayfarerError {
    fn from(err: tokio::task::JoinError) -> Self {
        WayfarerError::Pipeline(format!("task failed to complete: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_conversion() {
        let err: WayfarerError = "boom".into();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_display_prefixes() {
        let err = WayfarerError::Routing("no segments".to_string());
        assert_eq!(err.to_string(), "Routing error: no segments");
    }
}
