//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, request span)
//!     → body.rs (body frames → blocking Connection)
//!     → unzip pipeline (receive phase)
//!     → upstream client
//!     → Send response to client
//! ```

pub mod body;
pub mod request;
pub mod server;

pub use body::BodyConnection;
pub use request::{request_id_middleware, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
