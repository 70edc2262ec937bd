//! Proxy pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! GET <endpoint>?url=...
//!     → target.rs (resolve & default the scheme)
//!     → fetch.rs (single upstream GET with deadline)
//!     → classify.rs (markup or not)
//!         ├─ markup → rewrite::markup → security::headers::markup_headers
//!         └─ other  → relay.rs (stream bytes, filtered headers)
//!     → Client
//! ```
//!
//! # Design Decisions
//! - No state is shared between requests
//! - No retries; every failure but a missing parameter is a 500
//! - The pipeline is rebuilt, not mutated, on config reload

pub mod classify;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod relay;
pub mod target;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;

use crate::config::{ProxyConfig, RewriteConfig, UpstreamConfig};
use crate::proxy::classify::{classify, ContentClass};
use crate::proxy::error::ProxyResult;
use crate::proxy::fetch::Fetcher;
use crate::proxy::target::ProxyTarget;
use crate::rewrite::{rewrite_markup, RewriteContext};
use crate::security::headers::markup_headers;

pub use error::ProxyError;
pub use handler::{proxy_handler, target_param};

/// Everything one request needs, built from a configuration snapshot.
pub struct Pipeline {
    fetcher: Fetcher,
    endpoint_path: String,
    upstream: UpstreamConfig,
    rewrite: RewriteConfig,
}

impl Pipeline {
    /// Build a pipeline for the given configuration.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            fetcher: Fetcher::new(&config.upstream, &config.timeouts)?,
            endpoint_path: config.endpoint.path.clone(),
            upstream: config.upstream.clone(),
            rewrite: config.rewrite.clone(),
        })
    }

    /// Endpoint path baked into wrapped URLs.
    pub fn endpoint_path(&self) -> &str {
        &self.endpoint_path
    }

    /// Upstream settings this pipeline was built with.
    pub fn upstream(&self) -> &UpstreamConfig {
        &self.upstream
    }

    /// Run one request through the pipeline.
    ///
    /// Returns the content class taken alongside the response.
    pub async fn serve(&self, raw_target: Option<&str>) -> ProxyResult<(ContentClass, Response)> {
        let target = ProxyTarget::resolve(raw_target)?;
        let upstream = self.fetcher.fetch(&target).await?;

        match classify(&upstream.media_type) {
            ContentClass::Binary => Ok((ContentClass::Binary, relay::relay(upstream))),
            ContentClass::Markup => {
                let html = upstream.into_text(self.upstream.max_markup_bytes).await?;
                let ctx = RewriteContext::new(
                    &target,
                    &self.endpoint_path,
                    self.rewrite.absolutize_references,
                );
                let document = rewrite_markup(&html, &ctx)?;

                let mut response = Response::new(Body::from(document));
                *response.status_mut() = StatusCode::OK;
                *response.headers_mut() = markup_headers();
                Ok((ContentClass::Markup, response))
            }
        }
    }
}
