use thiserror::Error;

/// Errors that can occur across generation, checking and accounting operations
#[derive(Error, Debug)]
pub enum ChefError {
    /// A required API key or setting is absent; no network call was attempted
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Invalid or empty input rejected before any external call
    #[error("{0}")]
    Validation(String),

    /// The generated text lacked one or more required section markers
    #[error("Missing required sections: {}", .0.join(", "))]
    MissingSections(Vec<String>),

    /// Upstream rejected our credentials (HTTP 401)
    #[error("{0}")]
    Unauthorized(String),

    /// Upstream quota or rate limit hit (HTTP 429)
    #[error("{0}")]
    RateLimited(String),

    /// Upstream account is out of credits (HTTP 402 or provider-specific marker)
    #[error("{0}")]
    InsufficientCredits(String),

    /// The user's token balance does not cover the operation's cost
    #[error("Insufficient tokens. {0}")]
    InsufficientTokens(String),

    /// The operation exceeded its time bound (request timeout or polling ceiling)
    #[error("{0}")]
    Timeout(String),

    /// Any other upstream or protocol failure
    #[error("{0}")]
    Api(String),

    /// Transport-level HTTP failure
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed JSON from an upstream or a stored document
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file or environment parsing error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Local file I/O error (history, fonts)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding failure
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl ChefError {
    /// Whether a failed operation may be retried. Authorization, payment and
    /// timeout failures are terminal; only generic upstream/transport errors
    /// are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChefError::Api(_) | ChefError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, ChefError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_message() {
        let err = ChefError::MissingSections(vec!["TITLE".into(), "HASHTAGS".into()]);
        assert_eq!(err.to_string(), "Missing required sections: TITLE, HASHTAGS");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ChefError::Api("boom".into()).is_retryable());
        assert!(!ChefError::Unauthorized("nope".into()).is_retryable());
        assert!(!ChefError::InsufficientCredits("broke".into()).is_retryable());
        assert!(!ChefError::Timeout("slow".into()).is_retryable());
    }
}
