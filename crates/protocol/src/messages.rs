//! Typed `data` payloads, one per response kind.
//!
//! Required fields are plain (non-`Option`) fields, so a response missing
//! them fails to decode instead of yielding an empty value.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Provider-assigned object identifier.
///
/// The API sends ids as JSON numbers on some endpoints and strings on
/// others; both decode to the same textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Float(f64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => Self(n.to_string()),
            RawId::Float(f) => Self(format!("{f:.0}")),
            RawId::Text(s) => Self(s),
        })
    }
}

/// Token pair returned by the authenticate endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// New access token returned by the refresh endpoint. The refresh token
/// itself is not rotated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefreshGrant {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Per-attempt upload addressing returned by the begin-upload call.
///
/// `query` is an opaque, already-encoded query string that authorises
/// requests against `url`; it is appended verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadTarget {
    pub url: String,
    #[serde(default)]
    pub query: String,
}

/// Payload of a successful merge. Some upload nodes do not report the
/// id of the assembled object.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MergeResult {
    #[serde(default, alias = "id")]
    pub file_id: Option<ObjectId>,
}

/// Payload of the instant-upload handshake.
///
/// `status == "instant"` means the provider already holds identical
/// content and has linked it into the folder as `file_id`. Otherwise the
/// remaining fields describe where to send the body and how to confirm it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FirstUploadReply {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub file_id: Option<ObjectId>,
    #[serde(default)]
    pub upload_url: Option<String>,
    #[serde(default)]
    pub csrf_token: Option<String>,
    #[serde(default)]
    pub file_key: Option<String>,
}

impl FirstUploadReply {
    pub fn is_instant(&self) -> bool {
        self.status.as_deref() == Some("instant")
    }

    /// Staging details of a non-instant reply, if all of them are present.
    pub fn staging(&self) -> Option<StagedUpload> {
        let field = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        Some(StagedUpload {
            upload_url: field(&self.upload_url)?,
            csrf_token: field(&self.csrf_token)?,
            file_key: field(&self.file_key)?,
        })
    }
}

/// Where to send a body the provider does not hold yet, and the tokens
/// that confirm it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpload {
    pub upload_url: String,
    pub csrf_token: String,
    pub file_key: String,
}

/// A file or folder in a listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileItem {
    pub id: ObjectId,
    #[serde(alias = "c_name")]
    pub name: String,
    #[serde(default, alias = "c_size")]
    pub size: u64,
    #[serde(rename = "type", alias = "c_type")]
    pub kind: String,
    #[serde(default, alias = "c_time", alias = "updated_at")]
    pub modified: Option<String>,
}

impl FileItem {
    pub fn is_folder(&self) -> bool {
        self.kind == "folder"
    }
}

/// Payload of the folder listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub items: Vec<FileItem>,
}

/// Payload of the download-link endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DownloadLink {
    #[serde(alias = "url")]
    pub download_url: String,
}

/// Payload of the create-folder endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FolderCreated {
    #[serde(alias = "id")]
    pub folder_id: ObjectId,
}
