//! Pipeline error definitions.

use thiserror::Error;

use crate::unzip::arena::ArenaError;
use crate::unzip::context::RequestPhase;

/// Integer returned by `unzip_request` for every failure.
pub const UNZIP_FAILED: i64 = -1;

/// Raw inflate status codes, numbered the way zlib numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflateCode {
    /// A preset dictionary is required (`Z_NEED_DICT`).
    NeedDict,
    /// Corrupt or malformed compressed data (`Z_DATA_ERROR`).
    DataError,
    /// No progress was possible (`Z_BUF_ERROR`).
    BufError,
}

impl InflateCode {
    /// The zlib numeric value for this code.
    pub fn as_raw(&self) -> i32 {
        match self {
            InflateCode::NeedDict => 2,
            InflateCode::DataError => -3,
            InflateCode::BufError => -5,
        }
    }
}

impl std::fmt::Display for InflateCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}

/// Errors that abort the request-body decompression pipeline.
#[derive(Debug, Error)]
pub enum UnzipError {
    /// Invoked outside the receive phase.
    #[error("must be called in the receive phase, not {0}")]
    Phase(RequestPhase),

    /// Content-Encoding is not plain gzip, or a Transfer-Encoding is present.
    #[error("unsupported {header}: {value}")]
    UnsupportedEncoding { header: &'static str, value: String },

    /// Reading the body from the connection failed.
    #[error("read error: {0}")]
    Read(#[source] std::io::Error),

    /// The inflate stream could not be initialised.
    #[error("can't initialise inflate stream: {0}")]
    EngineInit(String),

    /// An inflate step failed.
    #[error("inflate failed ({code}/{message})")]
    Decompress { code: InflateCode, message: String },

    /// The scratch arena could not satisfy an allocation.
    #[error("workspace exhausted: {0}")]
    WorkspaceExhausted(#[from] ArenaError),
}

impl UnzipError {
    /// Integer form of this failure for the `unzip_request` contract.
    pub fn code(&self) -> i64 {
        UNZIP_FAILED
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UnzipError::Phase(_) => "phase",
            UnzipError::UnsupportedEncoding { .. } => "unsupported_encoding",
            UnzipError::Read(_) => "read",
            UnzipError::EngineInit(_) => "engine_init",
            UnzipError::Decompress { .. } => "decompress",
            UnzipError::WorkspaceExhausted(_) => "workspace",
        }
    }

    pub(crate) fn decompress(code: InflateCode, message: impl Into<String>) -> Self {
        UnzipError::Decompress {
            code,
            message: message.into(),
        }
    }
}

/// Result type for pipeline operations.
pub type UnzipResult<T> = Result<T, UnzipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_failure_is_negative() {
        let errors = [
            UnzipError::Phase(RequestPhase::Deliver),
            UnzipError::UnsupportedEncoding {
                header: "Content-Encoding",
                value: "br".into(),
            },
            UnzipError::Read(std::io::Error::other("reset")),
            UnzipError::EngineInit("oom".into()),
            UnzipError::decompress(InflateCode::DataError, "invalid block type"),
        ];
        for err in errors {
            assert!(err.code() < 0, "{} should be negative", err.kind());
        }
    }

    #[test]
    fn test_error_display() {
        let err = UnzipError::decompress(InflateCode::DataError, "incorrect header check");
        assert_eq!(err.to_string(), "inflate failed (-3/incorrect header check)");

        let err = UnzipError::Phase(RequestPhase::BackendFetch);
        assert!(err.to_string().contains("backend_fetch"));
    }
}
