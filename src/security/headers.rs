//! Response header sanitizing.
//!
//! # Responsibilities
//! - Build the header set for rewritten markup
//! - Filter upstream headers for relayed content
//! - Always allow any origin to read the response
//!
//! # Design Decisions
//! - Frame-restriction and CSP headers never reach the client, since they
//!   would block the host page from framing the content or the injected script
//! - Hop-by-hop and framing headers are dropped; the server re-frames the body

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

/// Upstream headers that would block embedding or the injected script.
pub const EMBEDDING_BLOCKERS: [HeaderName; 3] = [
    header::X_FRAME_OPTIONS,
    header::CONTENT_SECURITY_POLICY,
    header::CONTENT_SECURITY_POLICY_REPORT_ONLY,
];

/// Connection-scoped headers that must not be forwarded.
pub const HOP_BY_HOP: [HeaderName; 4] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::CONTENT_LENGTH,
    HeaderName::from_static("keep-alive"),
];

/// Content type of every rewritten document.
pub const MARKUP_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Headers for a rewritten markup response, built from scratch.
pub fn markup_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(MARKUP_CONTENT_TYPE));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers
}

/// Headers for a relayed response: a filtered clone of the upstream set.
pub fn sanitize_relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    for name in EMBEDDING_BLOCKERS.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers
}
