use crate::{DEFAULT_CHUNK_SIZE, DEFAULT_DIRECT_THRESHOLD, TransferError};

/// Static inputs of the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanConfig {
    /// Largest size sent as a single request.
    pub direct_threshold: u64,
    /// Fixed chunk size for chunked transfers.
    pub chunk_size: u64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            direct_threshold: DEFAULT_DIRECT_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// How a file of a given size is transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPlan {
    /// Single request, no chunking, no fingerprint.
    Direct { size: u64 },
    /// Fixed-size chunks followed by a server-side merge.
    Chunked(ChunkPlan),
}

/// Chunk layout of a transfer. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
    total_chunks: u32,
}

/// One planned chunk: a contiguous byte range of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    pub index: u32,
    pub offset: u64,
    pub len: u64,
}

impl ChunkPlan {
    /// Lays out `total_size` bytes in chunks of `chunk_size`.
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if total_size == 0 {
            return Err(TransferError::InvalidInput("file size must be positive".into()));
        }
        if chunk_size == 0 {
            return Err(TransferError::InvalidInput("chunk size must be positive".into()));
        }
        let total_chunks = u32::try_from(total_size.div_ceil(chunk_size)).map_err(|_| {
            TransferError::InvalidInput(format!(
                "{total_size} bytes need more than {} chunks of {chunk_size} bytes",
                u32::MAX
            ))
        })?;
        Ok(Self {
            total_size,
            chunk_size,
            total_chunks,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Returns chunk `index`, or `None` past the last chunk.
    ///
    /// The last chunk holds the remainder; when the size divides evenly it
    /// is a full chunk, never an empty one.
    pub fn chunk(&self, index: u32) -> Option<ChunkSpec> {
        if index >= self.total_chunks {
            return None;
        }
        let offset = u64::from(index) * self.chunk_size;
        let len = self.chunk_size.min(self.total_size - offset);
        Some(ChunkSpec { index, offset, len })
    }

    /// Iterates all chunks in ascending index order.
    pub fn chunks(&self) -> impl Iterator<Item = ChunkSpec> + use<> {
        let plan = *self;
        (0..plan.total_chunks).filter_map(move |i| plan.chunk(i))
    }
}

/// Classifies a transfer of `size` bytes.
///
/// Pure function of `size` and `config`. A zero size is rejected.
pub fn plan_upload(size: u64, config: &PlanConfig) -> Result<UploadPlan, TransferError> {
    if size == 0 {
        return Err(TransferError::InvalidInput("file size must be positive".into()));
    }
    if size <= config.direct_threshold {
        return Ok(UploadPlan::Direct { size });
    }
    ChunkPlan::new(size, config.chunk_size).map(UploadPlan::Chunked)
}
