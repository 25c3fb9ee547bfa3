use thiserror::Error;

/// Main error type for raidsna
#[derive(Error, Debug)]
pub enum SnaError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in an episode file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Episode content that is valid JSON but not a usable episode shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input (bad ranges, unsupported options)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No interaction edges could be derived
    #[error("No edges found: {0}")]
    EmptyGraph(String),

    /// Nothing could be loaded from the given input
    #[error("No episodes loaded from {0}")]
    NoEpisodes(String),
}

/// Convenient Result type using SnaError
pub type Result<T> = std::result::Result<T, SnaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SnaError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let sna_err: SnaError = json_err.into();
        assert!(matches!(sna_err, SnaError::Json(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let sna_err: SnaError = io_err.into();
        assert!(matches!(sna_err, SnaError::Io(_)));
    }

    #[test]
    fn test_empty_graph_message() {
        let err = SnaError::EmptyGraph("provide events or attack/heal actions".to_string());
        assert!(err.to_string().starts_with("No edges found"));
    }
}
