//! Fixed-length body accumulation.
//!
//! # Responsibilities
//! - Reconcile bytes already pre-buffered with fresh reads from the stream
//! - Produce one contiguous buffer holding exactly the declared length
//! - Repoint the pipeline cursor at the accumulated body
//!
//! # Data Flow
//! ```text
//! read-ahead [b, e) ──copy──┐
//!                           ├──▶ GrowableBuffer ──finish──▶ cursor
//! stream reads (8 KiB) ─────┘
//! ```
//!
//! # Design Decisions
//! - Enough read-ahead short-circuits with no copy at all
//! - Reads are capped at the remaining length so a pipelined follow-up
//!   request is never consumed
//! - The read chunk lives in the scratch arena and is released on exit

use std::io::{self, ErrorKind};

use crate::unzip::arena::{ArenaScope, ScratchArena};
use crate::unzip::buffer::GrowableBuffer;
use crate::unzip::connection::Connection;
use crate::unzip::error::{UnzipError, UnzipResult};

/// Size of each raw read from the connection.
pub const READ_BUFFER_SIZE: usize = 8192;

/// How the declared body length was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filled {
    /// The read-ahead already held this many bytes; nothing was copied.
    Prebuffered(usize),
    /// This many bytes were accumulated into a fresh buffer.
    Accumulated(usize),
}

impl Filled {
    pub fn len(&self) -> usize {
        match *self {
            Filled::Prebuffered(n) | Filled::Accumulated(n) => n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Make `target` body bytes available under the connection's cursor.
pub fn fill_pipeline<C, A>(conn: &mut C, arena: &mut A, target: usize) -> UnzipResult<Filled>
where
    C: Connection + ?Sized,
    A: ScratchArena + ?Sized,
{
    debug_assert!(target > 0, "fill_pipeline needs a positive length");

    let prebuffered = conn.pipeline().len();
    if prebuffered >= target {
        return Ok(Filled::Prebuffered(prebuffered));
    }

    let mut body = GrowableBuffer::with_capacity(target);
    body.append(conn.pipeline().as_slice());
    let mut remaining = target - prebuffered;

    let mut arena = ArenaScope::enter(arena);
    let region = arena.allocate(READ_BUFFER_SIZE)?;
    let chunk = arena.region_mut(region)?;

    while remaining > 0 {
        let want = remaining.min(chunk.len());
        let read = match conn.read_raw(&mut chunk[..want]) {
            Ok(0) => Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("body ended {remaining} bytes short of {target}"),
            )),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => Err(e),
        };
        match read {
            Ok(n) => {
                body.append(&chunk[..n]);
                remaining -= n;
            }
            Err(e) => {
                if prebuffered == 0 {
                    conn.pipeline_mut().clear();
                }
                tracing::error!(error = %e, remaining, "unzip: body read failed");
                return Err(UnzipError::Read(e));
            }
        }
    }

    let body = body.finish();
    conn.pipeline_mut().repoint(&body);
    Ok(Filled::Accumulated(body.len()))
}
