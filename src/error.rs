//! Error types for cql2pg.

use thiserror::Error;

/// The main error type for CQL compilation.
///
/// The first four variants are the only failures a compile call can produce.
/// `Schema`, `Config` and `Io` come from loading the schema document or the
/// CLI config file.
#[derive(Debug, Error)]
pub enum CqlError {
    /// Malformed table or JSON column identifier given at construction time.
    #[error("Field error: {0}")]
    Field(String),

    /// The server-choice index list contains an invalid entry.
    #[error("Server choice index error: {0}")]
    ServerChoiceIndexes(String),

    /// The query is well-formed CQL but cannot be translated.
    #[error("Query validation error: {0}")]
    QueryValidation(String),

    /// The query uses a CQL feature that is deliberately not implemented.
    #[error("CQL feature unsupported: {0}")]
    FeatureUnsupported(String),

    /// Invalid schema document.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid CLI config file.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CqlError {
    /// Create a field error.
    pub fn field(message: impl Into<String>) -> Self {
        Self::Field(message.into())
    }

    /// Create a server choice index error.
    pub fn server_choice(message: impl Into<String>) -> Self {
        Self::ServerChoiceIndexes(message.into())
    }

    /// Create a query validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::QueryValidation(message.into())
    }

    /// Create a feature unsupported error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::FeatureUnsupported(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }
}

impl From<serde_json::Error> for CqlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Schema(err.to_string())
    }
}

/// Result type alias for cql2pg operations.
pub type CqlResult<T> = Result<T, CqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CqlError::unsupported("CQL: Unsupported modifier regexp");
        assert_eq!(
            err.to_string(),
            "CQL feature unsupported: CQL: Unsupported modifier regexp"
        );
        let err = CqlError::validation("empty query");
        assert_eq!(err.to_string(), "Query validation error: empty query");
    }

    #[test]
    fn test_json_error_is_schema_error() {
        let err: CqlError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, CqlError::Schema(_)));
    }
}
