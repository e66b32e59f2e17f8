//! Shared utilities for pipeline and proxy tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddr;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderValue},
    Router,
};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use tokio::net::TcpListener;

use request_unzip::unzip::{BumpArena, RequestContext, StreamConnection, UnzipSettings};

/// Header the echo backend uses to report the Content-Length it received.
pub const ECHO_CONTENT_LENGTH: &str = "x-echo-content-length";
/// Header the echo backend uses to report the Content-Encoding it received.
pub const ECHO_CONTENT_ENCODING: &str = "x-echo-content-encoding";

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Deterministic, poorly compressible payload.
pub fn noise(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xff) as u8
        })
        .collect()
}

/// Reader that hands out at most one scripted chunk per call.
#[derive(Debug, Default)]
pub struct ChunkedReader {
    chunks: VecDeque<Vec<u8>>,
    pub reads: usize,
}

impl ChunkedReader {
    pub fn new(chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
            reads: 0,
        }
    }

    /// Split `data` into chunks of at most `size` bytes.
    pub fn split(data: &[u8], size: usize) -> Self {
        Self::new(data.chunks(size).map(<[u8]>::to_vec))
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads += 1;
        let Some(mut chunk) = self.chunks.pop_front() else {
            return Ok(0);
        };
        let n = buf.len().min(chunk.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }
}

pub fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.append(*name, HeaderValue::from_str(value).unwrap());
    }
    map
}

pub type TestContext = RequestContext<HeaderMap, StreamConnection<ChunkedReader>>;

/// Context for a gzip body of which `prebuffered` bytes already arrived
/// with the headers; the remainder is served by `reader`.
pub fn gzip_context(body: &[u8], prebuffered: usize, rest: ChunkedReader) -> TestContext {
    let len = body.len().to_string();
    let map = headers(&[("content-encoding", "gzip"), ("content-length", len.as_str())]);
    let conn = StreamConnection::new(rest, body[..prebuffered].to_vec())
        .with_content_length(body.len() as i64);
    RequestContext::new(
        map,
        conn,
        BumpArena::with_capacity(64 * 1024),
        UnzipSettings::default(),
    )
}

/// Context whose whole `body` is delivered by stream reads of `chunk` bytes.
pub fn streamed_context(body: &[u8], chunk: usize) -> TestContext {
    gzip_context(body, 0, ChunkedReader::split(body, chunk))
}

/// Start an upstream that echoes the request body, reporting the
/// Content-Length and Content-Encoding it saw in response headers.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(|headers: HeaderMap, body: Bytes| async move {
        let mut echoed = HeaderMap::new();
        for (from, to) in [
            (header::CONTENT_LENGTH, ECHO_CONTENT_LENGTH),
            (header::CONTENT_ENCODING, ECHO_CONTENT_ENCODING),
        ] {
            if let Some(value) = headers.get(from) {
                echoed.insert(to, value.clone());
            }
        }
        (echoed, body)
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
