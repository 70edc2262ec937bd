//! Binary relay: forwards non-markup bodies as opaque byte streams.

use axum::body::Body;
use axum::response::Response;

use crate::proxy::fetch::Upstream;
use crate::security::headers::sanitize_relay_headers;

/// Build the client response for a non-markup upstream response.
///
/// Status and media type pass through; only embedding-related headers change.
pub fn relay(upstream: Upstream) -> Response {
    let status = upstream.status;
    let headers = sanitize_relay_headers(&upstream.headers);

    let mut response = Response::new(Body::from_stream(upstream.into_byte_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
