use chrono::{DateTime, NaiveDateTime};
use panbridge_protocol::{FileItem, ObjectId};
use panbridge_provider::ItemKind;

/// Timestamp layout used by the listing endpoint.
const LISTING_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A file or folder on the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub id: ObjectId,
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    pub modified: Option<NaiveDateTime>,
}

impl RemoteObject {
    /// Refers to an object by id alone, for calls that only need the id
    /// and the kind.
    pub fn reference(id: impl Into<String>, is_dir: bool) -> Self {
        Self {
            id: ObjectId(id.into()),
            name: String::new(),
            size: 0,
            is_dir,
            modified: None,
        }
    }

    pub fn kind(&self) -> ItemKind {
        if self.is_dir {
            ItemKind::Folder
        } else {
            ItemKind::File
        }
    }
}

impl From<FileItem> for RemoteObject {
    fn from(item: FileItem) -> Self {
        let is_dir = item.is_folder();
        Self {
            modified: item.modified.as_deref().and_then(parse_modified),
            id: item.id,
            name: item.name,
            size: if is_dir { 0 } else { item.size },
            is_dir,
        }
    }
}

fn parse_modified(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, LISTING_TIME_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|t| t.naive_utc()))
}
