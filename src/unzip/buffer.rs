//! Append-only body buffers.

use bytes::{Bytes, BytesMut};

/// Owned, append-only byte buffer.
///
/// `finish` consumes the buffer, so nothing can be appended once its
/// contents are exposed.
#[derive(Debug, Default)]
pub struct GrowableBuffer {
    inner: BytesMut,
}

impl GrowableBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer with room for `capacity` bytes before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: BytesMut::with_capacity(capacity),
        }
    }

    /// Append `data` to the end of the buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.inner.extend_from_slice(data);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Freeze the buffer into its immutable form.
    pub fn finish(self) -> FinishedBuffer {
        FinishedBuffer {
            data: self.inner.freeze(),
        }
    }
}

/// Immutable buffer with a stable contiguous byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedBuffer {
    data: Bytes,
}

impl FinishedBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the full extent of the buffer.
    pub(crate) fn share(&self) -> Bytes {
        self.data.clone()
    }
}

impl AsRef<[u8]> for FinishedBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_then_finish() {
        let mut buf = GrowableBuffer::with_capacity(4);
        assert!(buf.is_empty());
        buf.append(b"hello");
        buf.append(b" ");
        buf.append(b"world");
        assert_eq!(buf.len(), 11);

        let done = buf.finish();
        assert_eq!(done.as_slice(), b"hello world");
        assert_eq!(done.share().len(), 11);
    }

    #[test]
    fn test_empty_finish() {
        let done = GrowableBuffer::new().finish();
        assert!(done.is_empty());
        assert_eq!(done.as_slice(), b"");
    }
}
