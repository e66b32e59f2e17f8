//! Pipeline cursor and borrowed body views.
//!
//! # Responsibilities
//! - Track the byte range the downstream body consumer will read
//! - Hand out views of that range without copying
//!
//! # Design Decisions
//! - Ranges are reference-counted `Bytes`, so a view keeps its source alive
//!   and can never dangle
//! - The cursor is repointed only at a finished buffer or at a sub-range of
//!   itself; arbitrary byte ranges cannot be installed

use std::ops::Deref;

use bytes::Bytes;

use crate::unzip::buffer::FinishedBuffer;

/// Borrowed range of compressed body bytes.
///
/// Points either into the connection's read-ahead or into an accumulator
/// buffer; it never owns a private copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyView {
    bytes: Bytes,
}

impl BodyView {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Deref for BodyView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Mutable `[begin, end)` range of bytes available to the body consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineCursor {
    range: Bytes,
}

impl PipelineCursor {
    /// An empty cursor.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Cursor over bytes already read from the socket.
    pub fn from_read_ahead(bytes: impl Into<Bytes>) -> Self {
        Self {
            range: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.range
    }

    /// View of the first `len` bytes, or `None` if fewer are available.
    pub fn view(&self, len: usize) -> Option<BodyView> {
        (len <= self.range.len()).then(|| BodyView {
            bytes: self.range.slice(..len),
        })
    }

    /// View of every byte under the cursor.
    pub fn view_all(&self) -> BodyView {
        BodyView {
            bytes: self.range.clone(),
        }
    }

    /// Point the cursor at the full extent of `buffer`.
    pub fn repoint(&mut self, buffer: &FinishedBuffer) {
        self.range = buffer.share();
    }

    /// Drop everything after the first `len` bytes.
    pub fn truncate(&mut self, len: usize) {
        self.range.truncate(len);
    }

    /// Mark `n` bytes as consumed by the downstream reader.
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.range.len());
        let _ = self.range.split_to(n);
    }

    /// Reset to the empty range.
    pub fn clear(&mut self) {
        self.range = Bytes::new();
    }

    /// Take the current range, leaving the cursor empty.
    pub fn take(&mut self) -> Bytes {
        std::mem::take(&mut self.range)
    }
}
