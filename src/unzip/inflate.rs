//! Streaming gzip/zlib inflate of an accumulated body.
//!
//! # Responsibilities
//! - Drive the inflate state machine over the compressed view, one working
//!   chunk at a time
//! - Collect the output into a growable buffer and install it in the
//!   request's cache slot
//! - Repoint the pipeline cursor at the inflated body
//!
//! # Design Decisions
//! - Framing is detected from the first bytes: gzip magic selects gzip,
//!   anything else is tried as zlib; both use a 15-bit (32 KiB) window
//! - The loop runs while input remains or the last step filled the chunk,
//!   so output still pending inside the stream is always drained
//! - Concatenated gzip members are inflated back to back; any other bytes
//!   after the end of the stream are an error, as is a stream that stops
//!   before its end marker
//! - Nothing in the cache slot or cursor changes until the output is finished

use flate2::{Decompress, FlushDecompress, Status};

use crate::unzip::arena::{ArenaScope, ScratchArena};
use crate::unzip::buffer::GrowableBuffer;
use crate::unzip::connection::Connection;
use crate::unzip::context::UnzipSettings;
use crate::unzip::cursor::BodyView;
use crate::unzip::error::{InflateCode, UnzipError, UnzipResult};
use crate::unzip::slot::BufferCacheSlot;

/// First two bytes of every gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Log2 of the inflate window.
const WINDOW_BITS: u8 = 15;

/// Container format around the deflate data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Gzip,
    Zlib,
}

impl Framing {
    /// Pick the framing from the leading bytes of the stream.
    pub fn detect(input: &[u8]) -> Self {
        if input.starts_with(&GZIP_MAGIC) {
            Framing::Gzip
        } else {
            Framing::Zlib
        }
    }
}

/// Outcome of one successful inflate step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub consumed: usize,
    pub produced: usize,
    pub stream_end: bool,
}

/// Transient inflate state, alive for one decompress call.
///
/// The engine's state is released when the stream is dropped.
pub struct InflateStream {
    inner: Decompress,
    framing: Framing,
}

impl InflateStream {
    /// Initialise a stream for `framing` with a 32 KiB window.
    pub fn init(framing: Framing) -> Self {
        let inner = match framing {
            Framing::Gzip => Decompress::new_gzip(WINDOW_BITS),
            Framing::Zlib => Decompress::new_with_window_bits(true, WINDOW_BITS),
        };
        Self { inner, framing }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Run one inflate step with sync-flush semantics.
    pub fn step(&mut self, input: &[u8], output: &mut [u8]) -> UnzipResult<Step> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();

        let status = self
            .inner
            .decompress(input, output, FlushDecompress::Sync)
            .map_err(|e| {
                let code = if e.needs_dictionary().is_some() {
                    InflateCode::NeedDict
                } else {
                    InflateCode::DataError
                };
                UnzipError::decompress(code, e.to_string())
            })?;

        let step = Step {
            consumed: (self.inner.total_in() - before_in) as usize,
            produced: (self.inner.total_out() - before_out) as usize,
            stream_end: status == Status::StreamEnd,
        };
        if status == Status::BufError && step.consumed == 0 && step.produced == 0 && !input.is_empty() {
            return Err(UnzipError::decompress(
                InflateCode::BufError,
                "inflate made no progress",
            ));
        }
        Ok(step)
    }

    /// Start the next gzip member with a fresh state.
    pub fn next_member(&mut self) {
        *self = Self::init(self.framing);
    }
}

/// Inflate `view` and install the result as the request body.
///
/// On success the cache slot owns the inflated bytes, the cursor points at
/// them, and the inflated length is returned. On failure neither is touched.
pub fn inflate_pipeline<C, A>(
    conn: &mut C,
    slot: &mut BufferCacheSlot,
    arena: &mut A,
    view: BodyView,
    settings: &UnzipSettings,
) -> UnzipResult<usize>
where
    C: Connection + ?Sized,
    A: ScratchArena + ?Sized,
{
    let mut arena = ArenaScope::enter(arena);

    // The stream's bookkeeping is charged to the workspace like its chunk.
    arena
        .allocate(std::mem::size_of::<InflateStream>())
        .map_err(|e| UnzipError::EngineInit(e.to_string()))?;
    let mut stream = InflateStream::init(Framing::detect(&view));

    let region = arena.allocate(settings.gzip_buffer)?;
    let chunk = arena.region_mut(region)?;

    let mut output = GrowableBuffer::with_capacity(view.len().saturating_mul(3));
    let mut input: &[u8] = &view;
    let mut drained = true;
    let mut ended = false;

    while !input.is_empty() || !drained {
        tracing::trace!(avail_in = input.len(), avail_out = chunk.len(), "unzip: inflate step");
        let step = match stream.step(input, chunk) {
            Ok(step) => step,
            Err(e) => {
                tracing::error!(error = %e, "unzip: inflate read buffer");
                return Err(e);
            }
        };
        output.append(&chunk[..step.produced]);
        input = &input[step.consumed..];
        drained = step.produced < chunk.len();
        ended = step.stream_end;

        if settings.max_inflated_bytes > 0 && output.len() > settings.max_inflated_bytes {
            return Err(UnzipError::decompress(
                InflateCode::BufError,
                format!("inflated body exceeds {} bytes", settings.max_inflated_bytes),
            ));
        }

        if step.stream_end {
            drained = true;
            if input.is_empty() {
                break;
            }
            if stream.framing() == Framing::Gzip && Framing::detect(input) == Framing::Gzip {
                tracing::debug!(remaining = input.len(), "unzip: next gzip member");
                stream.next_member();
                ended = false;
                continue;
            }
            return Err(UnzipError::decompress(
                InflateCode::DataError,
                format!("{} bytes of trailing data", input.len()),
            ));
        }

        if step.consumed == 0 && step.produced == 0 {
            // Nothing left to give and no end marker seen.
            break;
        }
    }
    drop(stream);

    if !ended {
        return Err(UnzipError::decompress(
            InflateCode::BufError,
            "compressed stream is truncated",
        ));
    }

    let output = output.finish();
    let len = output.len();
    conn.pipeline_mut().repoint(&output);
    if let Some(previous) = slot.install(output) {
        tracing::trace!(len = previous.len(), "unzip: replaced cached body");
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unzip::arena::BumpArena;
    use crate::unzip::connection::StreamConnection;
    use crate::unzip::cursor::PipelineCursor;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::{Empty, Write};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn run(
        compressed: &[u8],
        settings: UnzipSettings,
    ) -> (UnzipResult<usize>, StreamConnection<Empty>, BufferCacheSlot, BumpArena) {
        let mut conn = StreamConnection::new(std::io::empty(), compressed.to_vec());
        let mut slot = BufferCacheSlot::new();
        let mut arena = BumpArena::with_capacity(64 * 1024);
        let view = conn.pipeline().view_all();
        let res = inflate_pipeline(&mut conn, &mut slot, &mut arena, view, &settings);
        (res, conn, slot, arena)
    }

    fn small_chunks() -> UnzipSettings {
        UnzipSettings {
            gzip_buffer: 64,
            max_inflated_bytes: 0,
        }
    }

    #[test]
    fn test_framing_detection() {
        assert_eq!(Framing::detect(&gzip(b"x")), Framing::Gzip);
        assert_eq!(Framing::detect(&zlib(b"x")), Framing::Zlib);
        assert_eq!(Framing::detect(b""), Framing::Zlib);
    }

    #[test]
    fn test_inflates_into_slot_and_cursor() {
        let (res, conn, slot, arena) = run(&gzip(b"hello world"), UnzipSettings::default());
        assert_eq!(res.unwrap(), 11);
        assert_eq!(conn.pipeline().as_slice(), b"hello world");
        assert_eq!(slot.get().unwrap().as_slice(), b"hello world");
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn test_zlib_framing() {
        let (res, conn, _, _) = run(&zlib(b"zlib framed body"), UnzipSettings::default());
        assert_eq!(res.unwrap(), 16);
        assert_eq!(conn.pipeline().as_slice(), b"zlib framed body");
    }

    #[test]
    fn test_drains_pending_output() {
        // Highly compressible input expands far beyond one working chunk.
        let data = vec![b'a'; 100_000];
        let (res, conn, _, _) = run(&gzip(&data), small_chunks());
        assert_eq!(res.unwrap(), data.len());
        assert_eq!(conn.pipeline().as_slice(), &data[..]);
    }

    #[test]
    fn test_multi_member_concatenated() {
        let mut compressed = gzip(b"first member, ");
        compressed.extend(gzip(b"second member"));
        let (res, conn, _, _) = run(&compressed, small_chunks());
        assert!(res.is_ok());
        assert_eq!(conn.pipeline().as_slice(), b"first member, second member");
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let mut compressed = gzip(b"payload");
        compressed.extend_from_slice(b"junk");
        let (res, conn, slot, arena) = run(&compressed, UnzipSettings::default());
        match res {
            Err(UnzipError::Decompress { code, message }) => {
                assert_eq!(code, InflateCode::DataError);
                assert!(message.contains("trailing"));
            }
            other => panic!("expected decompress error, got {other:?}"),
        }
        assert_eq!(conn.pipeline().as_slice(), &compressed[..]);
        assert!(slot.is_empty());
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn test_truncated_rejected() {
        let compressed = gzip(&vec![b'z'; 10_000]);
        let cut = &compressed[..compressed.len() - 4];
        let (res, _, slot, _) = run(cut, UnzipSettings::default());
        assert!(matches!(res, Err(UnzipError::Decompress { .. })));
        assert!(slot.is_empty());
    }

    #[test]
    fn test_corrupted_rejected() {
        let mut compressed = gzip(b"some body that will be corrupted");
        compressed[12] ^= 0xff;
        compressed[13] ^= 0xff;
        let (res, _, slot, arena) = run(&compressed, UnzipSettings::default());
        assert!(matches!(res, Err(UnzipError::Decompress { .. })));
        assert!(slot.is_empty());
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn test_not_compressed_rejected() {
        let (res, _, _, _) = run(b"plain text body", UnzipSettings::default());
        assert!(matches!(res, Err(UnzipError::Decompress { .. })));
    }

    #[test]
    fn test_inflated_limit() {
        let settings = UnzipSettings {
            gzip_buffer: 1024,
            max_inflated_bytes: 4096,
        };
        let (res, _, slot, _) = run(&gzip(&vec![0u8; 10_000]), settings);
        assert!(matches!(res, Err(UnzipError::Decompress { .. })));
        assert!(slot.is_empty());

        let (res, _, _, _) = run(&gzip(&vec![0u8; 4096]), settings);
        assert_eq!(res.unwrap(), 4096);
    }

    #[test]
    fn test_workspace_too_small_for_chunk() {
        let mut conn = StreamConnection::new(std::io::empty(), gzip(b"abc"));
        let mut slot = BufferCacheSlot::new();
        let mut arena = BumpArena::with_capacity(1024);
        let view = conn.pipeline().view_all();
        let res = inflate_pipeline(&mut conn, &mut slot, &mut arena, view, &UnzipSettings::default());
        assert!(matches!(res, Err(UnzipError::WorkspaceExhausted(_))));
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn test_replaces_previous_slot_buffer() {
        let mut conn = StreamConnection::new(std::io::empty(), gzip(b"new body"));
        let mut slot = BufferCacheSlot::new();
        let mut old = GrowableBuffer::new();
        old.append(b"old body");
        slot.install(old.finish());

        let mut arena = BumpArena::with_capacity(64 * 1024);
        let view = conn.pipeline().view_all();
        inflate_pipeline(&mut conn, &mut slot, &mut arena, view, &UnzipSettings::default()).unwrap();
        assert_eq!(slot.get().unwrap().as_slice(), b"new body");
        assert_ne!(conn.pipeline(), &PipelineCursor::empty());
    }
}
