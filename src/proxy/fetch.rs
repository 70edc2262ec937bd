//! Upstream fetching.
//!
//! # Responsibilities
//! - Issue a single GET per proxy request with a fixed browser User-Agent
//! - Enforce connect, header and idle-read deadlines
//! - Hand back status, headers and an unconsumed body
//!
//! # Design Decisions
//! - No retries; a failed fetch is surfaced immediately
//! - No content decoding, so relayed bytes match the upstream exactly
//! - The upstream deadline covers response headers, and the buffered markup
//!   body; relayed bodies are only bounded by an idle read timeout
//! - Dropping the returned future or body stream aborts the upstream transfer

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use futures_util::{Stream, TryStreamExt};
use tokio::time::{timeout_at, Instant};

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::proxy::classify::media_type;
use crate::proxy::error::{ProxyError, ProxyResult};
use crate::proxy::target::ProxyTarget;

/// Outbound HTTP client for upstream origins.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    user_agent: HeaderValue,
    deadline_secs: u64,
}

impl Fetcher {
    /// Build a fetcher from upstream and timeout settings.
    pub fn new(upstream: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .read_timeout(Duration::from_secs(timeouts.upstream_secs));
        if !upstream.use_system_proxy {
            builder = builder.no_proxy();
        }

        // Validation rejects blank agents; anything non-ASCII falls back to the default.
        let user_agent = HeaderValue::from_str(&upstream.user_agent).unwrap_or_else(|_| {
            HeaderValue::from_static(crate::config::schema::DEFAULT_USER_AGENT)
        });

        Ok(Self {
            client: builder.build()?,
            user_agent,
            deadline_secs: timeouts.upstream_secs,
        })
    }

    /// Fetch the resolved target, waiting at most the deadline for headers.
    pub async fn fetch(&self, target: &ProxyTarget) -> ProxyResult<Upstream> {
        let deadline = Instant::now() + Duration::from_secs(self.deadline_secs);
        let request = self
            .client
            .get(target.resolved.clone())
            .header(header::USER_AGENT, self.user_agent.clone())
            .send();

        let response = timeout_at(deadline, request)
            .await
            .map_err(|_| ProxyError::UpstreamTimeout(self.deadline_secs))?
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let media_type = media_type(&headers);

        tracing::debug!(
            url = %target.resolved,
            status = %status,
            media_type = %media_type,
            "Upstream responded"
        );

        Ok(Upstream {
            status,
            headers,
            media_type,
            deadline,
            deadline_secs: self.deadline_secs,
            response,
        })
    }

    fn map_error(&self, error: reqwest::Error) -> ProxyError {
        map_reqwest_error(error, self.deadline_secs)
    }
}

fn map_reqwest_error(error: reqwest::Error, deadline_secs: u64) -> ProxyError {
    if error.is_timeout() {
        ProxyError::UpstreamTimeout(deadline_secs)
    } else {
        ProxyError::UpstreamUnreachable(error)
    }
}

/// An upstream response whose body has not been consumed yet.
pub struct Upstream {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub media_type: String,
    deadline: Instant,
    deadline_secs: u64,
    response: reqwest::Response,
}

impl Upstream {
    /// Consume the body as a raw byte stream.
    pub fn into_byte_stream(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static {
        self.response.bytes_stream().inspect_err(|e| {
            tracing::warn!(error = %e, "Upstream body stream failed mid-transfer");
        })
    }

    /// Buffer the whole body, up to `limit` bytes, and decode it to text.
    ///
    /// Reading must finish before the fetch deadline. Decoding honours the
    /// charset declared in `Content-Type`, falling back to UTF-8.
    pub async fn into_text(self, limit: usize) -> ProxyResult<String> {
        let deadline = self.deadline;
        let deadline_secs = self.deadline_secs;
        timeout_at(deadline, self.read_text(limit))
            .await
            .map_err(|_| ProxyError::UpstreamTimeout(deadline_secs))?
    }

    async fn read_text(self, limit: usize) -> ProxyResult<String> {
        let Upstream {
            headers,
            deadline_secs,
            mut response,
            ..
        } = self;

        if let Some(declared) = response.content_length() {
            if declared > limit as u64 {
                return Err(ProxyError::BodyTooLarge { size: declared, limit });
            }
        }

        let mut buffer = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| map_reqwest_error(e, deadline_secs))?
        {
            if buffer.len() + chunk.len() > limit {
                return Err(ProxyError::BodyTooLarge {
                    size: (buffer.len() + chunk.len()) as u64,
                    limit,
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        let mut buffered = axum::http::Response::new(Bytes::from(buffer));
        if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
            buffered
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type.clone());
        }

        reqwest::Response::from(buffered)
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, deadline_secs))
    }
}
