//! Connection contract and a blocking-reader implementation.
//!
//! # Responsibilities
//! - Expose the pre-buffered read-ahead as a pipeline cursor
//! - Provide a blocking raw read for the remainder of the body
//! - Carry the connection's declared content length
//!
//! # Design Decisions
//! - Raw reads use `std::io` results instead of negative sentinels
//! - Deadlines are enforced by whoever owns the underlying stream

use std::io::{self, Read};

use bytes::Bytes;

use crate::unzip::cursor::PipelineCursor;

/// The connection a request body is read from.
pub trait Connection {
    /// Bytes available to the body consumer (initially the read-ahead).
    fn pipeline(&self) -> &PipelineCursor;

    fn pipeline_mut(&mut self) -> &mut PipelineCursor;

    /// Blocking read of at most `buf.len()` body bytes from the stream.
    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Declared body length as tracked by the connection.
    fn content_length(&self) -> i64;

    fn set_content_length(&mut self, len: i64);
}

/// Connection over any blocking reader.
#[derive(Debug)]
pub struct StreamConnection<R> {
    reader: R,
    pipeline: PipelineCursor,
    content_length: i64,
}

impl<R: Read> StreamConnection<R> {
    /// Wrap `reader`, with `read_ahead` already pulled off the socket.
    pub fn new(reader: R, read_ahead: impl Into<Bytes>) -> Self {
        Self {
            reader,
            pipeline: PipelineCursor::from_read_ahead(read_ahead),
            content_length: 0,
        }
    }

    /// Record the declared content length parsed from the headers.
    pub fn with_content_length(mut self, len: i64) -> Self {
        self.content_length = len;
        self
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Connection for StreamConnection<R> {
    fn pipeline(&self) -> &PipelineCursor {
        &self.pipeline
    }

    fn pipeline_mut(&mut self) -> &mut PipelineCursor {
        &mut self.pipeline
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }

    fn content_length(&self) -> i64 {
        self.content_length
    }

    fn set_content_length(&mut self, len: i64) {
        self.content_length = len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_stream_connection_reads() {
        let mut conn = StreamConnection::new(Cursor::new(b"rest".to_vec()), &b"head"[..])
            .with_content_length(8);
        assert_eq!(conn.pipeline().as_slice(), b"head");
        assert_eq!(conn.content_length(), 8);

        let mut buf = [0u8; 16];
        let n = conn.read_raw(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"rest");
        assert_eq!(conn.read_raw(&mut buf).unwrap(), 0);
    }
}
