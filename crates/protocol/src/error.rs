//! Provider error taxonomy.

/// Maximum number of response-body bytes kept in an error.
const MAX_BODY_IN_ERROR: usize = 512;

/// Failure of a single provider exchange.
///
/// Both a non-2xx transport status ([`Http`](Self::Http)) and a non-success
/// code embedded in the JSON envelope ([`Api`](Self::Api)) are failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {message}")]
    Transport { message: String, timeout: bool },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Builds an [`Http`](Self::Http) error, truncating long bodies.
    pub fn http(status: u16, body: &str) -> Self {
        let body = if body.len() > MAX_BODY_IN_ERROR {
            let mut end = MAX_BODY_IN_ERROR;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &body[..end])
        } else {
            body.to_string()
        };
        Self::Http { status, body }
    }

    /// Returns `true` if the provider rejected the access token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Returns `true` if the exchange hit the request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { timeout: true, .. })
    }

    /// Returns `true` for failures worth retrying on an idempotent or
    /// re-sendable request: transport failures, 408, 429 and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Http { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Api { .. } | Self::Unauthorized(_) | Self::Decode(_) => false,
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
