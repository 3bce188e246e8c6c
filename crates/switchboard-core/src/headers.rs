//! Response metadata headers attached to every completion

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};

/// Whether a streaming request was answered with a single JSON body
pub const STREAM_DOWNGRADED: HeaderName = HeaderName::from_static("x-stream-downgraded");

/// Wall-clock time spent inside the gateway, in milliseconds
pub const PROCESSING_TIME_MS: HeaderName = HeaderName::from_static("x-processing-time-ms");

/// Metadata computed by the request router for one response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// The client asked for a stream but received a JSON body
    pub stream_downgraded: bool,
    /// Processing latency in milliseconds
    pub latency_ms: u64,
}

impl ResponseMetadata {
    /// Write both metadata headers into `headers`, replacing existing values
    pub fn apply(&self, headers: &mut HeaderMap) {
        let downgraded = if self.stream_downgraded { "true" } else { "false" };
        headers.insert(STREAM_DOWNGRADED, HeaderValue::from_static(downgraded));
        headers.insert(PROCESSING_TIME_MS, HeaderValue::from(self.latency_ms));
    }

    /// Read metadata back from response headers
    ///
    /// Returns `None` when either header is missing or malformed.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let stream_downgraded = match headers.get(STREAM_DOWNGRADED)?.to_str().ok()? {
            "true" => true,
            "false" => false,
            _ => return None,
        };
        let latency_ms = headers.get(PROCESSING_TIME_MS)?.to_str().ok()?.parse().ok()?;

        Some(Self {
            stream_downgraded,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_round_trip() {
        let metadata = ResponseMetadata {
            stream_downgraded: true,
            latency_ms: 42,
        };
        let mut headers = HeaderMap::new();
        metadata.apply(&mut headers);

        assert_eq!(headers.get("x-stream-downgraded").unwrap(), "true");
        assert_eq!(headers.get("x-processing-time-ms").unwrap(), "42");
        assert_eq!(ResponseMetadata::from_headers(&headers), Some(metadata));
    }

    #[test]
    fn malformed_flag_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(STREAM_DOWNGRADED, HeaderValue::from_static("yes"));
        headers.insert(PROCESSING_TIME_MS, HeaderValue::from_static("1"));
        assert_eq!(ResponseMetadata::from_headers(&headers), None);
    }
}
