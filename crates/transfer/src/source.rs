use std::fmt;
use std::path::Path;
use std::pin::Pin;

use tokio::io::AsyncRead;

use crate::TransferError;
use crate::validation::validate_file_name;

/// Owned, sendable byte stream.
pub type BoxReader = Pin<Box<dyn AsyncRead + Send + Sync>>;

/// A named byte stream of known length.
///
/// The declared size is authoritative: the pipeline plans against it and
/// reports truncation when the stream ends early. Bytes past `size` are
/// never read.
pub struct StreamSource {
    name: String,
    size: u64,
    reader: BoxReader,
}

impl StreamSource {
    pub fn new(name: impl Into<String>, size: u64, reader: impl AsyncRead + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            size,
            reader: Box::pin(reader),
        }
    }

    /// Opens a local file, taking its name and size from the filesystem.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                TransferError::InvalidInput(format!("{} has no usable file name", path.display()))
            })?
            .to_string();
        validate_file_name(&name)?;

        let file = tokio::fs::File::open(path).await?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(TransferError::InvalidInput(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        Ok(Self::new(name, meta.len(), file))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn into_parts(self) -> (String, u64, BoxReader) {
        (self.name, self.size, self.reader)
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
