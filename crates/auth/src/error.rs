use panbridge_protocol::ProviderError;

/// Errors produced by the token lifecycle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("no API credentials configured")]
    MissingCredentials,

    #[error("session has no refresh token")]
    NoRefreshToken,

    #[error("credentials rejected: {0}")]
    Rejected(ProviderError),

    #[error("token endpoint unreachable: {0}")]
    Transport(ProviderError),

    #[error("malformed token response: {0}")]
    Malformed(String),
}

impl AuthError {
    /// Classifies a failed token exchange.
    pub fn from_provider(err: ProviderError) -> Self {
        match err {
            ProviderError::Transport { .. } => Self::Transport(err),
            ProviderError::Http { status, .. } if status >= 500 => Self::Transport(err),
            ProviderError::Decode(message) => Self::Malformed(message),
            other => Self::Rejected(other),
        }
    }

    /// Returns `true` if the provider refused the credentials or token.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Errors that may mean the access token was refused mid-call.
///
/// [`TokenManager::authorized`](crate::TokenManager::authorized) uses this
/// to decide on its single refresh-and-retry.
pub trait AuthFailure {
    fn is_auth_failure(&self) -> bool;
}

impl AuthFailure for ProviderError {
    fn is_auth_failure(&self) -> bool {
        self.is_unauthorized()
    }
}

impl AuthFailure for AuthError {
    fn is_auth_failure(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let t = AuthError::from_provider(ProviderError::Transport {
            message: "reset".into(),
            timeout: false,
        });
        assert!(matches!(t, AuthError::Transport(_)));

        let r = AuthError::from_provider(ProviderError::Unauthorized("bad key".into()));
        assert!(r.is_rejection());

        let api = AuthError::from_provider(ProviderError::Api {
            code: 400,
            message: "invalid secret".into(),
        });
        assert!(api.is_rejection());

        let busy = AuthError::from_provider(ProviderError::http(503, "busy"));
        assert!(matches!(busy, AuthError::Transport(_)));

        let m = AuthError::from_provider(ProviderError::Decode("missing access_token".into()));
        assert!(matches!(m, AuthError::Malformed(_)));
    }
}
