//! Bridge from an axum request body to the blocking `Connection` contract.
//!
//! # Responsibilities
//! - Pull the first body frame as the connection's read-ahead
//! - Serve blocking reads from the async frame stream
//! - Rebuild an outbound body from whatever was not consumed
//!
//! # Design Decisions
//! - Reads block on the runtime handle, so a `BodyConnection` must only be
//!   read from the blocking pool (`spawn_blocking`)
//! - A frame larger than the caller's buffer is split; the remainder is kept
//!   for the next read
//! - Each frame wait has its own deadline; a stalled client surfaces as
//!   `TimedOut` instead of pinning a blocking-pool thread

use std::io::{self, ErrorKind};
use std::time::Duration;

use axum::body::{Body, BodyDataStream};
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use tokio::runtime::Handle;
use tokio::time::timeout;

use crate::unzip::connection::Connection;
use crate::unzip::cursor::PipelineCursor;

/// Longest wait for the next body frame unless configured otherwise.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection reading a request body frame by frame.
pub struct BodyConnection {
    stream: BodyDataStream,
    handle: Handle,
    read_timeout: Duration,
    pipeline: PipelineCursor,
    pending: Bytes,
    content_length: i64,
}

impl BodyConnection {
    pub fn new(body: Body, handle: Handle) -> Self {
        Self {
            stream: body.into_data_stream(),
            handle,
            read_timeout: DEFAULT_READ_TIMEOUT,
            pipeline: PipelineCursor::empty(),
            pending: Bytes::new(),
            content_length: 0,
        }
    }

    pub fn with_content_length(mut self, len: i64) -> Self {
        self.content_length = len;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Read the first frame into the read-ahead.
    pub async fn prime(&mut self) -> Result<(), axum::Error> {
        if let Some(frame) = self.stream.next().await {
            self.pipeline = PipelineCursor::from_read_ahead(frame?);
        }
        Ok(())
    }

    /// Outbound body: the cursor, any split frame remainder, then the rest
    /// of the inbound stream.
    pub fn into_body(mut self) -> Body {
        let head = [self.pipeline.take(), self.pending]
            .into_iter()
            .filter(|b| !b.is_empty())
            .map(Ok::<_, axum::Error>);
        Body::from_stream(stream::iter(head).chain(self.stream))
    }
}

impl Connection for BodyConnection {
    fn pipeline(&self) -> &PipelineCursor {
        &self.pipeline
    }

    fn pipeline_mut(&mut self) -> &mut PipelineCursor {
        &mut self.pipeline
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pending.is_empty() {
            let limit = self.read_timeout;
            let stream = &mut self.stream;
            let next = self
                .handle
                .block_on(async move { timeout(limit, stream.next()).await });
            match next {
                Ok(Some(Ok(frame))) => self.pending = frame,
                Ok(Some(Err(e))) => return Err(io::Error::other(e)),
                Ok(None) => return Ok(0),
                Err(_) => {
                    return Err(io::Error::new(
                        ErrorKind::TimedOut,
                        format!("no body frame within {limit:?}"),
                    ))
                }
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending.split_to(n));
        Ok(n)
    }

    fn content_length(&self) -> i64 {
        self.content_length
    }

    fn set_content_length(&mut self, len: i64) {
        self.content_length = len;
    }
}
