use serde::{Deserialize, Deserializer};
use serde::de::DeserializeOwned;

use crate::error::ProviderError;

/// Envelope codes that signal success.
///
/// Management and auth endpoints answer `200`; the chunk endpoints of some
/// upload nodes answer `0`.
pub const SUCCESS_CODES: [i64; 2] = [0, 200];

/// Envelope codes that signal a rejected or expired access token.
pub const UNAUTHORIZED_CODES: [i64; 2] = [401, 403];

/// JSON envelope wrapping every provider response.
///
/// Providers disagree on the field names (`code`/`status`, `message`/`msg`),
/// so both spellings are accepted. An envelope without any code relies on
/// the HTTP status alone.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default, alias = "status")]
    pub code: Option<i64>,
    #[serde(default, alias = "msg", deserialize_with = "null_as_empty")]
    pub message: String,
    pub data: Option<T>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decodes an envelope from a response body.
    pub fn decode(body: &[u8]) -> Result<Self, ProviderError> {
        Ok(serde_json::from_slice(body)?)
    }
}

impl<T> Envelope<T> {
    /// Returns `true` if the embedded code is a success code (or absent).
    pub fn is_success(&self) -> bool {
        self.code.is_none_or(|c| SUCCESS_CODES.contains(&c))
    }

    /// Checks the embedded code and returns the (possibly absent) payload.
    pub fn check(self) -> Result<Option<T>, ProviderError> {
        match self.code {
            Some(code) if UNAUTHORIZED_CODES.contains(&code) => {
                Err(ProviderError::Unauthorized(self.message))
            }
            Some(code) if !SUCCESS_CODES.contains(&code) => Err(ProviderError::Api {
                code,
                message: if self.message.is_empty() {
                    "unknown error".into()
                } else {
                    self.message
                },
            }),
            _ => Ok(self.data),
        }
    }

    /// Checks the embedded code and requires a payload.
    pub fn into_data(self) -> Result<T, ProviderError> {
        self.check()?
            .ok_or_else(|| ProviderError::Decode("response carries no data".into()))
    }
}
