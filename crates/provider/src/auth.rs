use std::time::Duration;

use panbridge_auth::{AuthBackend, Credentials, TokenGrant};
use panbridge_protocol::{AuthGrant, BoxFuture, ProviderError, RefreshGrant};
use reqwest::multipart::Form;
use tracing::debug;

use crate::client::{ProviderClient, send};

impl ProviderClient {
    async fn fetch_token(&self, credentials: &Credentials) -> Result<TokenGrant, ProviderError> {
        debug!(endpoint = "authenticate", "requesting access token");
        let request = self
            .http
            .get(self.endpoint("authenticate"))
            .header("x-api-key", &credentials.api_key)
            .header("x-api-secret", &credentials.api_secret);

        let grant: AuthGrant = send(request).await?.into_data()?;
        Ok(TokenGrant {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.filter(|t| !t.is_empty()),
            expires_in: Duration::from_secs(grant.expires_in),
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        debug!(endpoint = "refresh_token", "refreshing access token");
        let form = Form::new().text("refresh_token", refresh_token.to_string());
        let request = self.http.post(self.endpoint("refresh_token")).multipart(form);

        let grant: RefreshGrant = send(request).await?.into_data()?;
        Ok(TokenGrant {
            access_token: grant.access_token,
            refresh_token: None,
            expires_in: Duration::from_secs(grant.expires_in),
        })
    }
}

impl AuthBackend for ProviderClient {
    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<TokenGrant, ProviderError>> {
        Box::pin(self.fetch_token(credentials))
    }

    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<TokenGrant, ProviderError>> {
        Box::pin(self.refresh_token(refresh_token))
    }
}
