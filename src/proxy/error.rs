//! Error taxonomy for the proxy pipeline.

use axum::http::StatusCode;
use thiserror::Error;

/// Body returned for every failure the caller cannot fix.
pub const GENERIC_FAILURE_BODY: &str = "Proxy Error: Failed to fetch target.";

/// Body returned when the `url` parameter is missing.
pub const MISSING_PARAMETER_BODY: &str = "URL Parameter is missing";

/// Errors that can occur while serving a proxy request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Caller omitted the target URL.
    #[error("url parameter is missing")]
    MissingParameter,

    /// Target could not be turned into an absolute HTTP(S) URL.
    #[error("invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// DNS, connect, TLS or protocol failure talking to the upstream.
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(#[source] reqwest::Error),

    /// Upstream did not complete within the configured deadline.
    #[error("upstream timed out after {0} seconds")]
    UpstreamTimeout(u64),

    /// Markup document exceeds the rewrite buffer limit.
    #[error("markup body of {size} bytes exceeds limit of {limit} bytes")]
    BodyTooLarge { size: u64, limit: usize },

    /// HTML rewriting failed.
    #[error("rewrite failed: {0}")]
    Rewrite(String),
}

impl ProxyError {
    /// Status code surfaced to the caller.
    ///
    /// Only a missing parameter is distinguished; everything else is a 500.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingParameter => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text body surfaced to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            ProxyError::MissingParameter => MISSING_PARAMETER_BODY,
            _ => GENERIC_FAILURE_BODY,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MissingParameter => "missing_parameter",
            ProxyError::InvalidTarget { .. } => "invalid_target",
            ProxyError::UpstreamUnreachable(_) => "upstream_unreachable",
            ProxyError::UpstreamTimeout(_) => "upstream_timeout",
            ProxyError::BodyTooLarge { .. } => "body_too_large",
            ProxyError::Rewrite(_) => "rewrite",
        }
    }
}

/// Result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;
