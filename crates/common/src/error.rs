//! Error types for the persona twin.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TwinError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TwinError {
    /// Stable machine-readable code used in error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            TwinError::Validation(_) => "VALIDATION_ERROR",
            TwinError::Embedding(_) => "EMBEDDING_ERROR",
            TwinError::Store(_) => "STORE_ERROR",
            TwinError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            TwinError::Provider(_) => "PROVIDER_ERROR",
            TwinError::Config(_) => "CONFIG_ERROR",
            TwinError::Io(_) | TwinError::Serialization(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, TwinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_for_store_failures() {
        assert_eq!(TwinError::Store("x".into()).code(), "STORE_ERROR");
        assert_eq!(
            TwinError::StoreUnavailable("down".into()).code(),
            "STORE_UNAVAILABLE"
        );
    }

    #[test]
    fn display_includes_context() {
        let err = TwinError::Provider("Gemini API error 503 Service Unavailable".into());
        assert_eq!(
            err.to_string(),
            "Provider error: Gemini API error 503 Service Unavailable"
        );
    }
}
