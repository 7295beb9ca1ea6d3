use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{AuthBackend, Credentials, TokenGrant};
use crate::error::{AuthError, AuthFailure};
use crate::session::SessionCredentials;

/// Owns the session credentials of one driver instance.
///
/// All renewals run under a single lock, so callers that discover an
/// expired token at the same time wait for one refresh instead of each
/// issuing their own.
pub struct TokenManager {
    backend: Arc<dyn AuthBackend>,
    credentials: Option<Credentials>,
    session: Mutex<Option<SessionCredentials>>,
}

impl TokenManager {
    /// Creates a manager with no session. `credentials` enable
    /// (re-)authentication; without them only a restored session can be
    /// refreshed.
    pub fn new(backend: Arc<dyn AuthBackend>, credentials: Option<Credentials>) -> Self {
        Self {
            backend,
            credentials,
            session: Mutex::new(None),
        }
    }

    /// Creates a manager around an existing session.
    pub fn with_session(
        backend: Arc<dyn AuthBackend>,
        credentials: Option<Credentials>,
        session: SessionCredentials,
    ) -> Self {
        Self {
            backend,
            credentials,
            session: Mutex::new(Some(session)),
        }
    }

    /// Exchanges the configured credentials for a new token pair,
    /// replacing any current session.
    pub async fn authenticate(&self) -> Result<String, AuthError> {
        let mut slot = self.session.lock().await;
        self.authenticate_into(&mut slot).await
    }

    /// Exchanges the current refresh token for a new access token.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let mut slot = self.session.lock().await;
        let refresh_token = slot
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
            .ok_or(AuthError::NoRefreshToken)?;
        self.refresh_into(&mut slot, &refresh_token).await
    }

    /// Returns an access token whose expiry is in the future, renewing
    /// the session first if needed.
    pub async fn ensure_valid(&self) -> Result<String, AuthError> {
        let mut slot = self.session.lock().await;
        match slot.as_ref() {
            Some(s) if !s.is_expired_at(Instant::now()) => return Ok(s.access_token.clone()),
            Some(_) => debug!("access token expired"),
            None => debug!("no session, authenticating"),
        }
        self.renew(&mut slot).await
    }

    /// Marks `stale` as expired if it is still the current access token.
    ///
    /// A token already replaced by another caller's renewal is left alone.
    pub async fn invalidate(&self, stale: &str) {
        let mut slot = self.session.lock().await;
        if let Some(s) = slot.as_mut()
            && s.access_token == stale
        {
            s.expires_at = Instant::now();
        }
    }

    /// Runs `op` with a valid access token, renewing and retrying once if
    /// the provider rejects the token.
    pub async fn authorized<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AuthError> + AuthFailure,
    {
        let token = self.ensure_valid().await?;
        match op(token.clone()).await {
            Err(e) if e.is_auth_failure() => {
                warn!("access token rejected, renewing and retrying once");
                self.invalidate(&token).await;
                let token = self.ensure_valid().await?;
                op(token).await
            }
            other => other,
        }
    }

    /// Copy of the current session, if any.
    pub async fn session(&self) -> Option<SessionCredentials> {
        self.session.lock().await.clone()
    }

    // -----------------------------------------------------------------------
    // Internals (session lock held)
    // -----------------------------------------------------------------------

    async fn renew(&self, slot: &mut Option<SessionCredentials>) -> Result<String, AuthError> {
        let refresh_token = slot.as_ref().and_then(|s| s.refresh_token.clone());
        match refresh_token {
            Some(refresh_token) => match self.refresh_into(slot, &refresh_token).await {
                Ok(token) => return Ok(token),
                Err(e) if e.is_rejection() && self.credentials.is_some() => {
                    warn!(error = %e, "refresh token rejected, re-authenticating");
                }
                Err(e) => return Err(e),
            },
            None if slot.is_some() && self.credentials.is_none() => {
                return Err(AuthError::NoRefreshToken);
            }
            None => {}
        }
        self.authenticate_into(slot).await
    }

    async fn authenticate_into(
        &self,
        slot: &mut Option<SessionCredentials>,
    ) -> Result<String, AuthError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(AuthError::MissingCredentials)?;

        info!("authenticating");
        let grant = self
            .backend
            .authenticate(credentials)
            .await
            .map_err(AuthError::from_provider)?;
        check_grant(&grant)?;

        let expires_in_secs = grant.expires_in.as_secs();
        let has_refresh_token = grant.refresh_token.is_some();
        let session = SessionCredentials::from_grant(grant, Instant::now());
        let token = session.access_token.clone();
        *slot = Some(session);

        info!(expires_in_secs, has_refresh_token, "authenticated");
        Ok(token)
    }

    async fn refresh_into(
        &self,
        slot: &mut Option<SessionCredentials>,
        refresh_token: &str,
    ) -> Result<String, AuthError> {
        info!("refreshing access token");
        let grant = self
            .backend
            .refresh(refresh_token)
            .await
            .map_err(AuthError::from_provider)?;
        check_grant(&grant)?;

        let expires_in_secs = grant.expires_in.as_secs();
        let token = grant.access_token.clone();
        let now = Instant::now();
        match slot.as_mut() {
            Some(session) => session.apply_refresh(grant, now),
            None => {
                let mut session = SessionCredentials::from_grant(grant, now);
                session
                    .refresh_token
                    .get_or_insert_with(|| refresh_token.to_string());
                *slot = Some(session);
            }
        }

        info!(expires_in_secs, "access token refreshed");
        Ok(token)
    }
}

fn check_grant(grant: &TokenGrant) -> Result<(), AuthError> {
    if grant.access_token.is_empty() {
        return Err(AuthError::Malformed("empty access token".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use panbridge_protocol::{BoxFuture, ProviderError};

    /// In-memory token endpoints that count calls.
    struct MockBackend {
        ttl: Duration,
        issue_refresh_token: bool,
        auth_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
        refresh_failure: StdMutex<Option<ProviderError>>,
        auth_failure: StdMutex<Option<ProviderError>>,
    }

    impl MockBackend {
        fn new(ttl_secs: u64, issue_refresh_token: bool) -> Self {
            Self {
                ttl: Duration::from_secs(ttl_secs),
                issue_refresh_token,
                auth_calls: AtomicUsize::new(0),
                refresh_calls: AtomicUsize::new(0),
                refresh_failure: StdMutex::new(None),
                auth_failure: StdMutex::new(None),
            }
        }

        fn fail_refresh(&self, err: ProviderError) {
            *self.refresh_failure.lock().unwrap() = Some(err);
        }

        fn fail_auth(&self, err: ProviderError) {
            *self.auth_failure.lock().unwrap() = Some(err);
        }

        fn auth_count(&self) -> usize {
            self.auth_calls.load(Ordering::SeqCst)
        }

        fn refresh_count(&self) -> usize {
            self.refresh_calls.load(Ordering::SeqCst)
        }
    }

    impl AuthBackend for MockBackend {
        fn authenticate<'a>(
            &'a self,
            credentials: &'a Credentials,
        ) -> BoxFuture<'a, Result<TokenGrant, ProviderError>> {
            Box::pin(async move {
                let n = self.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(err) = self.auth_failure.lock().unwrap().clone() {
                    return Err(err);
                }
                assert_eq!(credentials.api_key, "key");
                Ok(TokenGrant {
                    access_token: format!("at-{n}"),
                    refresh_token: self.issue_refresh_token.then(|| format!("rt-{n}")),
                    expires_in: self.ttl,
                })
            })
        }

        fn refresh<'a>(
            &'a self,
            refresh_token: &'a str,
        ) -> BoxFuture<'a, Result<TokenGrant, ProviderError>> {
            Box::pin(async move {
                let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(err) = self.refresh_failure.lock().unwrap().clone() {
                    return Err(err);
                }
                assert!(refresh_token.starts_with("rt-"));
                Ok(TokenGrant {
                    access_token: format!("refreshed-{n}"),
                    refresh_token: None,
                    expires_in: self.ttl,
                })
            })
        }
    }

    /// Error type of an authorized call in these tests.
    #[derive(Debug)]
    enum CallError {
        Auth(AuthError),
        Provider(ProviderError),
    }

    impl From<AuthError> for CallError {
        fn from(e: AuthError) -> Self {
            Self::Auth(e)
        }
    }

    impl AuthFailure for CallError {
        fn is_auth_failure(&self) -> bool {
            matches!(self, Self::Provider(e) if e.is_auth_failure())
        }
    }

    fn creds() -> Option<Credentials> {
        Some(Credentials::new("key", "secret"))
    }

    fn manager(backend: &Arc<MockBackend>, credentials: Option<Credentials>) -> TokenManager {
        TokenManager::new(Arc::clone(backend) as Arc<dyn AuthBackend>, credentials)
    }

    #[tokio::test(start_paused = true)]
    async fn valid_token_needs_no_renewal() {
        let backend = Arc::new(MockBackend::new(3600, true));
        let tm = manager(&backend, creds());
        assert_eq!(tm.authenticate().await.unwrap(), "at-1");

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert_eq!(tm.ensure_valid().await.unwrap(), "at-1");
        assert_eq!(backend.auth_count(), 1);
        assert_eq!(backend.refresh_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_triggers_exactly_one_refresh() {
        let backend = Arc::new(MockBackend::new(60, true));
        let tm = manager(&backend, creds());
        tm.authenticate().await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(tm.ensure_valid().await.unwrap(), "refreshed-1");
        assert_eq!(tm.ensure_valid().await.unwrap(), "refreshed-1");
        assert_eq!(backend.refresh_count(), 1);
        assert_eq!(backend.auth_count(), 1);

        let session = tm.session().await.unwrap();
        assert_eq!(session.refresh_token.as_deref(), Some("rt-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn first_call_authenticates() {
        let backend = Arc::new(MockBackend::new(60, true));
        let tm = manager(&backend, creds());
        assert_eq!(tm.ensure_valid().await.unwrap(), "at-1");
        assert_eq!(backend.auth_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_refresh_token_falls_back_to_authenticate() {
        let backend = Arc::new(MockBackend::new(60, false));
        let tm = manager(&backend, creds());
        tm.authenticate().await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(tm.ensure_valid().await.unwrap(), "at-2");
        assert_eq!(backend.refresh_count(), 0);
        assert_eq!(backend.auth_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_refresh_token_and_no_credentials_fails() {
        let backend = Arc::new(MockBackend::new(60, false));
        let session = SessionCredentials {
            access_token: "restored".into(),
            refresh_token: None,
            expires_at: Instant::now() + Duration::from_secs(10),
        };
        let tm = TokenManager::with_session(
            Arc::clone(&backend) as Arc<dyn AuthBackend>,
            None,
            session,
        );
        assert_eq!(tm.ensure_valid().await.unwrap(), "restored");

        tokio::time::advance(Duration::from_secs(10)).await;
        let err = tm.ensure_valid().await.unwrap_err();
        assert!(matches!(err, AuthError::NoRefreshToken));
        assert!(matches!(tm.refresh().await, Err(AuthError::NoRefreshToken)));
    }

    #[tokio::test]
    async fn missing_credentials() {
        let backend = Arc::new(MockBackend::new(60, true));
        let tm = manager(&backend, None);
        assert!(matches!(
            tm.ensure_valid().await,
            Err(AuthError::MissingCredentials)
        ));
        assert_eq!(backend.auth_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_refresh_reauthenticates_when_credentials_held() {
        let backend = Arc::new(MockBackend::new(60, true));
        let tm = manager(&backend, creds());
        tm.authenticate().await.unwrap();
        backend.fail_refresh(ProviderError::Unauthorized("refresh token revoked".into()));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(tm.ensure_valid().await.unwrap(), "at-2");
        assert_eq!(backend.refresh_count(), 1);
        assert_eq!(backend.auth_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_refresh_without_credentials_is_auth_error() {
        let backend = Arc::new(MockBackend::new(60, true));
        backend.fail_refresh(ProviderError::Unauthorized("refresh token revoked".into()));
        let session = SessionCredentials {
            access_token: "restored".into(),
            refresh_token: Some("rt-0".into()),
            expires_at: Instant::now(),
        };
        let tm = TokenManager::with_session(
            Arc::clone(&backend) as Arc<dyn AuthBackend>,
            None,
            session,
        );
        let err = tm.ensure_valid().await.unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(backend.auth_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_transport_failure_does_not_reauthenticate() {
        let backend = Arc::new(MockBackend::new(60, true));
        let tm = manager(&backend, creds());
        tm.authenticate().await.unwrap();
        backend.fail_refresh(ProviderError::Transport {
            message: "connection refused".into(),
            timeout: false,
        });

        tokio::time::advance(Duration::from_secs(61)).await;
        let err = tm.ensure_valid().await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
        assert_eq!(backend.auth_count(), 1);
    }

    #[tokio::test]
    async fn rejected_credentials() {
        let backend = Arc::new(MockBackend::new(60, true));
        backend.fail_auth(ProviderError::Api {
            code: 400,
            message: "invalid api secret".into(),
        });
        let tm = manager(&backend, creds());
        let err = tm.authenticate().await.unwrap_err();
        assert!(err.is_rejection());
        assert!(tm.session().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let backend = Arc::new(MockBackend::new(60, true));
        let tm = Arc::new(manager(&backend, creds()));
        tm.authenticate().await.unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let tm = Arc::clone(&tm);
            handles.push(tokio::spawn(async move { tm.ensure_valid().await }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), "refreshed-1");
        }
        assert_eq!(backend.refresh_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn authorized_retries_once_after_rejection() {
        let backend = Arc::new(MockBackend::new(3600, true));
        let tm = manager(&backend, creds());
        let seen = StdMutex::new(Vec::new());

        let result: Result<u32, CallError> = tm
            .authorized(|token| {
                let first = seen.lock().unwrap().is_empty();
                seen.lock().unwrap().push(token);
                async move {
                    if first {
                        Err(CallError::Provider(ProviderError::Unauthorized(
                            "token expired".into(),
                        )))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(*seen.lock().unwrap(), vec!["at-1", "refreshed-1"]);
        assert_eq!(backend.refresh_count(), 1);
    }

    #[tokio::test]
    async fn authorized_does_not_retry_other_errors() {
        let backend = Arc::new(MockBackend::new(3600, true));
        let tm = manager(&backend, creds());
        let calls = AtomicUsize::new(0);

        let result: Result<(), CallError> = tm
            .authorized(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CallError::Provider(ProviderError::http(500, "boom"))) }
            })
            .await;

        assert!(matches!(
            result,
            Err(CallError::Provider(ProviderError::Http { status: 500, .. }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.refresh_count(), 0);
    }

    #[tokio::test]
    async fn invalidate_ignores_replaced_token() {
        let backend = Arc::new(MockBackend::new(3600, true));
        let tm = manager(&backend, creds());
        tm.authenticate().await.unwrap();
        tm.invalidate("some-older-token").await;
        assert_eq!(tm.ensure_valid().await.unwrap(), "at-1");
        assert_eq!(backend.refresh_count(), 0);
    }
}
