//! Header store contract.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};

/// Declared length reported when Content-Length is present but unusable.
pub const INVALID_CONTENT_LENGTH: i64 = -1;

/// Access to the request headers the pipeline reads and rewrites.
pub trait HeaderStore {
    /// First value of `name`, if present and valid text.
    fn get(&self, name: &HeaderName) -> Option<&str>;

    /// Whether `name` is present at all, regardless of its encoding.
    fn contains(&self, name: &HeaderName) -> bool;

    /// Replace every value of `name` with `value`.
    fn set(&mut self, name: HeaderName, value: HeaderValue);

    /// Remove every value of `name`.
    fn unset(&mut self, name: &HeaderName);

    /// Declared body length: 0 if absent, -1 if unusable.
    fn content_length(&self) -> i64;
}

impl HeaderStore for HeaderMap {
    fn get(&self, name: &HeaderName) -> Option<&str> {
        HeaderMap::get(self, name).and_then(|v| v.to_str().ok())
    }

    fn contains(&self, name: &HeaderName) -> bool {
        self.contains_key(name)
    }

    fn set(&mut self, name: HeaderName, value: HeaderValue) {
        self.insert(name, value);
    }

    fn unset(&mut self, name: &HeaderName) {
        self.remove(name);
    }

    fn content_length(&self) -> i64 {
        let mut declared: Option<i64> = None;
        for value in self.get_all(CONTENT_LENGTH) {
            let parsed = value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| *v >= 0);
            match (parsed, declared) {
                (None, _) => return INVALID_CONTENT_LENGTH,
                (Some(v), Some(prev)) if v != prev => return INVALID_CONTENT_LENGTH,
                (Some(v), _) => declared = Some(v),
            }
        }
        declared.unwrap_or(0)
    }
}
