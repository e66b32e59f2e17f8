//! Request-body unzip subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext (phase, headers, connection, workspace, cache slot)
//!     → validator.rs   (eligibility, declared length)
//!     → accumulator.rs (read-ahead + stream → exactly N compressed bytes)
//!     → inflate.rs     (gzip/zlib inflate → cache slot)
//!     → pipeline.rs    (cursor + header rewrite, workspace rollback)
//! ```
//!
//! # Design Decisions
//! - Collaborators (headers, connection, workspace) are traits so the
//!   pipeline runs the same against an axum request or a plain reader
//! - Buffers are reference counted; the cursor can only point at finished
//!   buffers and can never outlive them
//! - Execution is synchronous; callers on an async runtime run it on the
//!   blocking pool

pub mod accumulator;
pub mod arena;
pub mod buffer;
pub mod connection;
pub mod context;
pub mod cursor;
pub mod error;
pub mod headers;
pub mod inflate;
pub mod pipeline;
pub mod slot;
pub mod validator;

pub use arena::{ArenaScope, BumpArena, ScratchArena};
pub use connection::{Connection, StreamConnection};
pub use context::{RequestContext, RequestPhase, UnzipSettings};
pub use cursor::PipelineCursor;
pub use error::{UnzipError, UNZIP_FAILED};
pub use headers::HeaderStore;
pub use pipeline::{try_unzip_request, unzip_request, UnzipOutcome};
pub use slot::BufferCacheSlot;
