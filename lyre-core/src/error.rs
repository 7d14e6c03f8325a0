use thiserror::Error;

#[derive(Error, Debug)]
pub enum LyreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Backend error ({code}): {message}")]
    Backend { code: i64, message: String },

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("No unread items left to pick from")]
    NoUnreadItems,

    #[error("No session token configured")]
    MissingSession,

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Malformed history field: {0}")]
    MalformedHistory(String),
}

impl LyreError {
    /// Transient failures worth another attempt: transport errors and
    /// 5xx / 429 responses. Bad requests and undecodable bodies are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            LyreError::Http(e) => !e.is_decode() && !e.is_builder(),
            LyreError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> LyreError {
        LyreError::Api {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(api(500).is_retryable());
        assert!(api(503).is_retryable());
        assert!(api(429).is_retryable());
        assert!(!api(400).is_retryable());
        assert!(!api(404).is_retryable());
        assert!(!LyreError::NoUnreadItems.is_retryable());
        assert!(!LyreError::EntityNotFound("Q1".to_string()).is_retryable());
    }
}
