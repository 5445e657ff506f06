//! Custom error types for arxivdigest.
//!
//! All library functions return `Result<T, DigestError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for arxivdigest operations.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Feed, markdown or LLM output could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message from API
        message: String,
    },

    /// The fetch window contained no papers
    #[error("No papers found in {category} between {start} and {end}")]
    EmptyResult {
        category: String,
        start: String,
        end: String,
    },

    /// Input listing is missing
    #[error("Input not found: {0}")]
    InputNotFound(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl DigestError {
    /// Whether a retry of the same request may succeed.
    ///
    /// Network failures, rate limiting and server-side (5xx) errors are transient;
    /// everything else (bad credentials, malformed requests, local errors) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            DigestError::Network(_) | DigestError::RateLimited(_) => true,
            DigestError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

/// Result type alias using `DigestError`
pub type Result<T> = std::result::Result<T, DigestError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| DigestError::Parse(msg.to_string()))
    }
}
