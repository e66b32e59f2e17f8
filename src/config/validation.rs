//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, chunk sizes > 0)
//! - Check the unzip workspace can hold every scratch allocation
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::unzip::accumulator::READ_BUFFER_SIZE;
use crate::unzip::inflate::InflateStream;

/// Scratch space one pipeline run needs besides the inflate chunk.
pub fn workspace_overhead() -> usize {
    // Each allocation may lose up to 7 bytes to alignment.
    READ_BUFFER_SIZE + std::mem::size_of::<InflateStream>() + 2 * 8
}

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("unzip.workspace_bytes = {workspace} cannot hold gzip_buffer {gzip_buffer} plus {overhead} bytes of scratch")]
    WorkspaceTooSmall {
        workspace: usize,
        gzip_buffer: usize,
        overhead: usize,
    },

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    LogLevel(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut check_addr = |field: &'static str, value: &str| {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.to_string(),
            });
        }
    };
    check_addr("listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_addr("observability.metrics_address", &config.observability.metrics_address);
    }

    // The upstream may be a hostname; it only has to be a valid `host:port`.
    let upstream = &config.upstream.address;
    let upstream_ok = Authority::from_str(upstream)
        .map(|a| a.port_u16().is_some())
        .unwrap_or(false);
    if !upstream_ok {
        errors.push(ValidationError::InvalidAddress {
            field: "upstream.address",
            value: upstream.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.request_secs",
        });
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero {
            field: "listener.max_body_bytes",
        });
    }

    let unzip = &config.unzip;
    if unzip.gzip_buffer == 0 {
        errors.push(ValidationError::Zero {
            field: "unzip.gzip_buffer",
        });
    }
    let overhead = workspace_overhead();
    if unzip.workspace_bytes < unzip.gzip_buffer.saturating_add(overhead) {
        errors.push(ValidationError::WorkspaceTooSmall {
            workspace: unzip.workspace_bytes,
            gzip_buffer: unzip.gzip_buffer,
            overhead,
        });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
