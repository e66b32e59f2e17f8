//! Request body unzipping for an HTTP proxy.
//!
//! The [`unzip`] module holds the receive-phase pipeline: it validates the
//! request headers, accumulates the compressed body, inflates it with a
//! bounded working buffer and rewrites the headers. The remaining modules
//! wrap it in a reverse proxy that applies the pipeline to every request.

// Core
pub mod unzip;

// Proxy surface
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use unzip::{try_unzip_request, unzip_request, RequestContext, UnzipError, UnzipOutcome};
