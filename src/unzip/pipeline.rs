//! Request unzip orchestration.
//!
//! # Data Flow
//! ```text
//! snapshot workspace
//!     → validate_request (phase, encodings, declared length)
//!     → fill_pipeline    (read-ahead + stream reads → N bytes)
//!     → inflate_pipeline (N bytes → cache slot, cursor repointed)
//!     → rewrite Content-Length / Content-Encoding
//!     → roll workspace back
//! ```
//!
//! # Design Decisions
//! - The workspace scope is entered before validation and dropped on every
//!   exit, so temporaries never outlive a run
//! - Headers are only rewritten after the inflated body is installed
//! - Which failures reject the request is left to the caller

use axum::http::header::{HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH};

use crate::observability::metrics;
use crate::unzip::accumulator::{fill_pipeline, Filled};
use crate::unzip::arena::{ArenaScope, ScratchArena};
use crate::unzip::connection::Connection;
use crate::unzip::context::RequestContext;
use crate::unzip::error::{UnzipError, UnzipResult};
use crate::unzip::headers::HeaderStore;
use crate::unzip::inflate::inflate_pipeline;
use crate::unzip::validator::validate_request;

/// Successful result of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnzipOutcome {
    /// No Content-Encoding; the request was left alone.
    NothingToDo,
    /// Declared length was zero.
    NoBody,
    /// Declared length was already flagged invalid; passed through verbatim.
    InvalidLength(i64),
    /// The body was replaced by its inflated form.
    Inflated { compressed: usize, inflated: usize },
}

impl UnzipOutcome {
    /// Integer form for the `unzip_request` contract.
    pub fn code(&self) -> i64 {
        match *self {
            UnzipOutcome::InvalidLength(len) => len,
            _ => 0,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            UnzipOutcome::NothingToDo => "nothing_to_do",
            UnzipOutcome::NoBody => "no_body",
            UnzipOutcome::InvalidLength(_) => "invalid_length",
            UnzipOutcome::Inflated { .. } => "inflated",
        }
    }
}

/// Replace a gzip request body with its inflated form.
///
/// Returns 0 on success or when there is nothing to do, and a negative value
/// on failure or when the declared length was already invalid.
pub fn unzip_request<H, C, A>(ctx: &mut RequestContext<H, C, A>) -> i64
where
    H: HeaderStore,
    C: Connection,
    A: ScratchArena,
{
    match try_unzip_request(ctx) {
        Ok(outcome) => outcome.code(),
        Err(e) => e.code(),
    }
}

/// Typed form of [`unzip_request`].
pub fn try_unzip_request<H, C, A>(ctx: &mut RequestContext<H, C, A>) -> UnzipResult<UnzipOutcome>
where
    H: HeaderStore,
    C: Connection,
    A: ScratchArena,
{
    let result = run(ctx);
    match &result {
        Ok(outcome) => metrics::record_unzip(outcome.label()),
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "unzip: failed");
            metrics::record_unzip(e.kind());
        }
    }
    result
}

fn run<H, C, A>(ctx: &mut RequestContext<H, C, A>) -> UnzipResult<UnzipOutcome>
where
    H: HeaderStore,
    C: Connection,
    A: ScratchArena,
{
    let RequestContext {
        phase,
        headers,
        conn,
        arena,
        slot,
        settings,
    } = ctx;
    let mut arena = ArenaScope::enter(arena);

    let declared = validate_request(*phase, &*headers)?;
    if declared == 0 && !headers.contains(&CONTENT_ENCODING) {
        return Ok(UnzipOutcome::NothingToDo);
    }
    if declared == 0 {
        return Ok(UnzipOutcome::NoBody);
    }
    if declared < 0 {
        return Ok(UnzipOutcome::InvalidLength(declared));
    }
    let target = declared as usize;

    let filled = fill_pipeline(conn, &mut *arena, target)?;
    if let Filled::Prebuffered(available) = filled {
        if available > target {
            tracing::warn!(
                surplus = available - target,
                "unzip: dropping read-ahead beyond the declared body"
            );
        }
    }
    debug_assert!(
        matches!(filled, Filled::Prebuffered(_)) || filled.len() == target,
        "accumulated {} of {} bytes",
        filled.len(),
        target
    );
    let view = conn
        .pipeline()
        .view(target)
        .ok_or_else(|| UnzipError::Read(std::io::ErrorKind::UnexpectedEof.into()))?;

    let inflated = inflate_pipeline(conn, slot, &mut *arena, view, settings)?;

    if inflated == 0 {
        headers.unset(&CONTENT_LENGTH);
    } else {
        headers.set(CONTENT_LENGTH, HeaderValue::from(inflated));
    }
    headers.unset(&CONTENT_ENCODING);
    conn.set_content_length(inflated as i64);
    metrics::record_inflated_bytes(inflated);

    tracing::debug!(compressed = target, inflated, "unzip: completed with success");
    Ok(UnzipOutcome::Inflated {
        compressed: target,
        inflated,
    })
}
