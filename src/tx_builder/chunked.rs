//! Splitting large payloads across several transactions

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transaction_id::TransactionId;

pub const DEFAULT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_MAX_CHUNKS: usize = 20;

/// Payload of a chunked operation plus its splitting limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkData {
    pub data: Vec<u8>,
    pub chunk_size: usize,
    pub max_chunks: usize,
}

impl Default for ChunkData {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }
}

impl ChunkData {
    /// `max(1, ceil(len / chunk_size))`
    pub fn required_chunks(&self) -> usize {
        if self.data.is_empty() || self.chunk_size == 0 {
            return 1;
        }
        self.data.len().div_ceil(self.chunk_size)
    }

    /// Fails when the payload needs more than `max_chunks` chunks.
    pub fn check_limits(&self) -> Result<usize> {
        if self.chunk_size == 0 {
            return Err(Error::IllegalState("chunk_size must be > 0".to_string()));
        }
        let required = self.required_chunks();
        if required > self.max_chunks {
            return Err(Error::MaxChunksExceeded {
                required,
                max: self.max_chunks,
            });
        }
        Ok(required)
    }

    /// Bytes carried by chunk `index` (0-based).
    pub fn chunk(&self, index: usize) -> &[u8] {
        let start = (index * self.chunk_size).min(self.data.len());
        let end = (start + self.chunk_size).min(self.data.len());
        &self.data[start..end]
    }

    pub(crate) fn sliced(&self, index: usize) -> Self {
        Self {
            data: self.chunk(index).to_vec(),
            ..self.clone()
        }
    }
}

/// Position of one chunk within a chunked operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub initial_transaction_id: TransactionId,
    /// 1-based.
    pub number: u32,
    pub total: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(len: usize, chunk_size: usize, max_chunks: usize) -> ChunkData {
        ChunkData {
            data: (0..len).map(|i| i as u8).collect(),
            chunk_size,
            max_chunks,
        }
    }

    #[test]
    fn test_required_chunks() {
        assert_eq!(data(0, 1024, 20).required_chunks(), 1);
        assert_eq!(data(1, 1024, 20).required_chunks(), 1);
        assert_eq!(data(1024, 1024, 20).required_chunks(), 1);
        assert_eq!(data(1025, 1024, 20).required_chunks(), 2);
        assert_eq!(data(5000, 1024, 20).required_chunks(), 5);
    }

    #[test]
    fn test_max_chunks_exceeded() {
        let err = data(100, 10, 5).check_limits().unwrap_err();
        assert!(matches!(err, Error::MaxChunksExceeded { required: 10, max: 5 }));
        assert_eq!(data(50, 10, 5).check_limits().unwrap(), 5);
    }

    #[test]
    fn test_chunks_reassemble() {
        let payload = data(2500, 1024, 20);
        let rebuilt: Vec<u8> = (0..payload.required_chunks())
            .flat_map(|i| payload.chunk(i).to_vec())
            .collect();
        assert_eq!(rebuilt, payload.data);
        assert_eq!(payload.chunk(2).len(), 452);
    }
}
