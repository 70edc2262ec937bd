//! Response handling.
//!
//! # Responsibilities
//! - Map proxy errors to status codes and plain-text bodies
//! - Keep error causes out of client-visible output
//!
//! # Design Decisions
//! - Only a missing `url` parameter is a client error (400)
//! - Every other failure collapses into one generic 500

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::proxy::error::ProxyError;

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.public_message()).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        response
    }
}
