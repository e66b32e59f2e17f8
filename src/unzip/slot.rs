//! Per-request buffer cache slot.

use crate::unzip::buffer::FinishedBuffer;

/// Holds the decompressed body owned by one request.
///
/// The slot outlives individual pipeline runs and is emptied by the
/// request teardown hook, or when it is dropped.
#[derive(Debug, Default)]
pub struct BufferCacheSlot {
    buffer: Option<FinishedBuffer>,
}

impl BufferCacheSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a finished buffer, returning the one it replaced.
    ///
    /// The new buffer is in place before the old one is released.
    pub fn install(&mut self, buffer: FinishedBuffer) -> Option<FinishedBuffer> {
        self.buffer.replace(buffer)
    }

    pub fn get(&self) -> Option<&FinishedBuffer> {
        self.buffer.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_none()
    }

    /// Release the owned buffer at request teardown.
    pub fn teardown(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            tracing::trace!(len = buffer.len(), "Released cached body buffer");
        }
    }
}

impl Drop for BufferCacheSlot {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unzip::buffer::GrowableBuffer;

    fn finished(data: &[u8]) -> FinishedBuffer {
        let mut buf = GrowableBuffer::new();
        buf.append(data);
        buf.finish()
    }

    #[test]
    fn test_install_replaces_previous() {
        let mut slot = BufferCacheSlot::new();
        assert!(slot.install(finished(b"first")).is_none());

        let old = slot.install(finished(b"second")).unwrap();
        assert_eq!(old.as_slice(), b"first");
        assert_eq!(slot.get().unwrap().as_slice(), b"second");
    }

    #[test]
    fn test_teardown_empties_slot() {
        let mut slot = BufferCacheSlot::new();
        slot.install(finished(b"body"));
        slot.teardown();
        assert!(slot.is_empty());
        // Idempotent.
        slot.teardown();
        assert!(slot.is_empty());
    }

    #[test]
    fn test_drop_releases_buffer_but_not_shared_views() {
        let mut slot = BufferCacheSlot::new();
        slot.install(finished(b"body"));
        let shared = slot.get().map(FinishedBuffer::share).unwrap();
        drop(slot);
        assert_eq!(&shared[..], b"body");
    }
}
