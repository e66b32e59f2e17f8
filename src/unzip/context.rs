//! Per-request pipeline context.

use crate::config::UnzipConfig;
use crate::unzip::arena::BumpArena;
use crate::unzip::slot::BufferCacheSlot;

/// Processing phase a request is in when the pipeline is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    /// Request headers received, body not yet consumed.
    Receive,
    Hash,
    Pass,
    BackendFetch,
    Deliver,
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestPhase::Receive => "receive",
            RequestPhase::Hash => "hash",
            RequestPhase::Pass => "pass",
            RequestPhase::BackendFetch => "backend_fetch",
            RequestPhase::Deliver => "deliver",
        };
        f.write_str(name)
    }
}

/// Tunables consumed by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnzipSettings {
    /// Size of the inflate working chunk.
    pub gzip_buffer: usize,
    /// Upper bound on the inflated body; 0 disables the limit.
    pub max_inflated_bytes: usize,
}

impl Default for UnzipSettings {
    fn default() -> Self {
        Self::from(&UnzipConfig::default())
    }
}

impl From<&UnzipConfig> for UnzipSettings {
    fn from(config: &UnzipConfig) -> Self {
        Self {
            gzip_buffer: config.gzip_buffer,
            max_inflated_bytes: config.max_inflated_bytes,
        }
    }
}

/// Everything one pipeline run needs, owned by a single request.
#[derive(Debug)]
pub struct RequestContext<H, C, A = BumpArena> {
    pub phase: RequestPhase,
    pub headers: H,
    pub conn: C,
    pub arena: A,
    pub slot: BufferCacheSlot,
    pub settings: UnzipSettings,
}

impl<H, C, A> RequestContext<H, C, A> {
    /// Context for a request in the receive phase.
    pub fn new(headers: H, conn: C, arena: A, settings: UnzipSettings) -> Self {
        Self {
            phase: RequestPhase::Receive,
            headers,
            conn,
            arena,
            slot: BufferCacheSlot::new(),
            settings,
        }
    }

    pub fn with_phase(mut self, phase: RequestPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Request teardown hook: releases the cached body buffer.
    ///
    /// Dropping the context has the same effect through the slot.
    pub fn teardown(&mut self) {
        self.slot.teardown();
    }

    /// Run teardown and hand back the header store and connection.
    pub fn into_parts(mut self) -> (H, C) {
        self.teardown();
        (self.headers, self.conn)
    }
}
