//! Request eligibility checks.
//!
//! # Responsibilities
//! - Refuse to run outside the receive phase
//! - Accept only a gzip Content-Encoding and no Transfer-Encoding
//! - Resolve the declared body length to fetch
//!
//! # Design Decisions
//! - A missing Content-Encoding is a benign no-op, not an error
//! - Non-positive declared lengths are handed back verbatim so the caller can
//!   tell "no body" from "already flagged invalid"

use axum::http::header::{CONTENT_ENCODING, TRANSFER_ENCODING};

use crate::unzip::context::RequestPhase;
use crate::unzip::error::{UnzipError, UnzipResult};
use crate::unzip::headers::HeaderStore;

/// Check that the request may be unzipped and return the length to fetch.
///
/// Returns 0 when there is nothing to do and a negative value when the
/// declared length was already invalid.
pub fn validate_request<H: HeaderStore + ?Sized>(
    phase: RequestPhase,
    headers: &H,
) -> UnzipResult<i64> {
    if phase != RequestPhase::Receive {
        return Err(UnzipError::Phase(phase));
    }

    if !headers.contains(&CONTENT_ENCODING) {
        tracing::debug!("unzip: nothing to do");
        return Ok(0);
    }
    let encoding = headers.get(&CONTENT_ENCODING).unwrap_or_default();
    if encoding.contains("deflate") || !encoding.contains("gzip") {
        return Err(UnzipError::UnsupportedEncoding {
            header: "Content-Encoding",
            value: encoding.to_string(),
        });
    }

    if headers.contains(&TRANSFER_ENCODING) {
        return Err(UnzipError::UnsupportedEncoding {
            header: "Transfer-Encoding",
            value: headers.get(&TRANSFER_ENCODING).unwrap_or_default().to_string(),
        });
    }

    let declared = headers.content_length();
    if declared <= 0 {
        tracing::debug!(content_length = declared, "unzip: no Content-Length");
    }
    Ok(declared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_only_receive_phase() {
        let h = headers(&[("content-encoding", "gzip"), ("content-length", "10")]);
        assert!(validate_request(RequestPhase::Receive, &h).is_ok());
        for phase in [RequestPhase::Hash, RequestPhase::BackendFetch, RequestPhase::Deliver] {
            assert!(matches!(
                validate_request(phase, &h),
                Err(UnzipError::Phase(p)) if p == phase
            ));
        }
    }

    #[test]
    fn test_missing_encoding_is_noop() {
        let h = headers(&[("content-length", "10")]);
        assert_eq!(validate_request(RequestPhase::Receive, &h).unwrap(), 0);
    }

    #[test]
    fn test_rejected_encodings() {
        for value in ["deflate", "br", "identity", "gzip, deflate", "x-deflate-gzip"] {
            let h = headers(&[("content-encoding", value), ("content-length", "10")]);
            assert!(
                matches!(
                    validate_request(RequestPhase::Receive, &h),
                    Err(UnzipError::UnsupportedEncoding { header: "Content-Encoding", .. })
                ),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_transfer_encoding_rejected() {
        for te in ["chunked", "identity", ""] {
            let h = headers(&[("content-encoding", "gzip"), ("transfer-encoding", te)]);
            assert!(matches!(
                validate_request(RequestPhase::Receive, &h),
                Err(UnzipError::UnsupportedEncoding { header: "Transfer-Encoding", .. })
            ));
        }
    }

    #[test]
    fn test_declared_length_passthrough() {
        let mut h = headers(&[("content-encoding", "gzip")]);
        assert_eq!(validate_request(RequestPhase::Receive, &h).unwrap(), 0);

        h.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        assert_eq!(validate_request(RequestPhase::Receive, &h).unwrap(), 0);

        h.insert(CONTENT_LENGTH, HeaderValue::from_static("bogus"));
        assert_eq!(validate_request(RequestPhase::Receive, &h).unwrap(), -1);

        h.insert(CONTENT_LENGTH, HeaderValue::from_static("23"));
        assert_eq!(validate_request(RequestPhase::Receive, &h).unwrap(), 23);
    }

    #[test]
    fn test_gzip_variants_accepted() {
        for value in ["gzip", "x-gzip", "GZIP-ish gzip"] {
            let h = headers(&[("content-encoding", value), ("content-length", "5")]);
            assert_eq!(validate_request(RequestPhase::Receive, &h).unwrap(), 5);
        }
    }
}
