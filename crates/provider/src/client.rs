//! Provider HTTP client.
//!
//! Every response goes through [`read_envelope`], which checks the HTTP
//! status and the code embedded in the JSON envelope.

use std::time::Duration;

use panbridge_protocol::{Envelope, ProviderError, UploadTarget};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::config::ProviderConfig;

/// Client for the token, upload and file management endpoints.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    pub(crate) http: reqwest::Client,
    base_url: String,
    pub(crate) chunk_timeout: Duration,
}

impl ProviderClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            chunk_timeout: config.chunk_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of an API endpoint.
    pub(crate) fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }
}

/// Builds an upload node URL: `{url}/{action}?{leading}&{query}&{trailing}`.
///
/// The target query is opaque and appended verbatim; the other parameters
/// are percent-encoded.
pub(crate) fn node_url(
    target: &UploadTarget,
    action: &str,
    leading: &[(&str, &str)],
    trailing: &[(&str, &str)],
) -> String {
    let mut params: Vec<String> = leading.iter().map(|(k, v)| encode_pair(k, v)).collect();
    let query = target.query.trim_start_matches(['?', '&']);
    if !query.is_empty() {
        params.push(query.to_string());
    }
    params.extend(trailing.iter().map(|(k, v)| encode_pair(k, v)));

    let base = format!("{}/{}", target.url.trim_end_matches('/'), action);
    if params.is_empty() {
        base
    } else {
        format!("{base}?{}", params.join("&"))
    }
}

fn encode_pair(key: &str, value: &str) -> String {
    format!("{key}={}", utf8_percent_encode(value, NON_ALPHANUMERIC))
}

/// Root folder ids are sent as "no parent".
pub(crate) fn is_root(folder_id: &str) -> bool {
    folder_id.is_empty() || folder_id == "0"
}

/// Maps a `reqwest` failure to a transport error.
pub(crate) fn transport_error(e: reqwest::Error) -> ProviderError {
    ProviderError::Transport {
        message: e.to_string(),
        timeout: e.is_timeout(),
    }
}

/// Checks the HTTP status and decodes the JSON envelope of a response.
///
/// HTTP 401 maps to [`ProviderError::Unauthorized`]; any other non-2xx
/// status to [`ProviderError::Http`].
pub(crate) async fn read_envelope<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<Envelope<T>, ProviderError> {
    let status = resp.status();
    let body = resp.bytes().await.map_err(transport_error)?;

    if status == StatusCode::UNAUTHORIZED {
        return Err(ProviderError::Unauthorized(
            String::from_utf8_lossy(&body).into_owned(),
        ));
    }
    if !status.is_success() {
        return Err(ProviderError::http(
            status.as_u16(),
            &String::from_utf8_lossy(&body),
        ));
    }
    Envelope::decode(&body)
}

/// Sends a request and decodes its envelope.
pub(crate) async fn send<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<Envelope<T>, ProviderError> {
    let resp = request.send().await.map_err(transport_error)?;
    read_envelope(resp).await
}
