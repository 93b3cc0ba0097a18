use serde::{Deserialize, Serialize};

use super::validate_id;
use crate::entity::{FileId, LedgerId};
use crate::error::Result;
use crate::tx_builder::{ChunkData, Transaction, TransactionData, TransactionKind, DEFAULT_MAX_CHUNKS};

/// File appends default to smaller chunks than topic messages.
pub const FILE_APPEND_CHUNK_SIZE: usize = 2048;

/// Append bytes to a file, split into chunks when large.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAppendData {
    pub file_id: Option<FileId>,
    pub chunk_data: ChunkData,
}

impl Default for FileAppendData {
    fn default() -> Self {
        Self {
            file_id: None,
            chunk_data: ChunkData {
                data: Vec::new(),
                chunk_size: FILE_APPEND_CHUNK_SIZE,
                max_chunks: DEFAULT_MAX_CHUNKS,
            },
        }
    }
}

impl TransactionData for FileAppendData {
    fn kind(&self) -> TransactionKind {
        TransactionKind::FileAppend
    }

    fn chunk_data(&self) -> Option<&ChunkData> {
        Some(&self.chunk_data)
    }

    fn chunk_data_mut(&mut self) -> Option<&mut ChunkData> {
        Some(&mut self.chunk_data)
    }

    fn validate_checksums(&self, ledger_id: &LedgerId) -> Result<()> {
        validate_id(self.file_id.as_ref(), ledger_id)
    }
}

impl Transaction<FileAppendData> {
    pub fn file_id(mut self, file_id: FileId) -> Self {
        self.data_mut().file_id = Some(file_id);
        self
    }

    pub fn contents(mut self, contents: impl Into<Vec<u8>>) -> Self {
        self.data_mut().chunk_data.data = contents.into();
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.data_mut().chunk_data.chunk_size = size;
        self
    }

    pub fn max_chunks(mut self, max: usize) -> Self {
        self.data_mut().chunk_data.max_chunks = max;
        self
    }
}
