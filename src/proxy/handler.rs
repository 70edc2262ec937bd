//! Axum handler for the proxy endpoint.

use std::time::Instant;

use axum::extract::{RawQuery, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use url::form_urlencoded;

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;

/// First `url` value of a query string.
///
/// Other parameters and repeated `url` pairs are ignored, so an unencoded
/// target with its own query never turns into a rejected request.
pub fn target_param(query: Option<&str>) -> Option<String> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(name, _)| name == "url")
        .map(|(_, value)| value.into_owned())
}

/// `GET <endpoint>?url=<target>`
pub async fn proxy_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&headers);
    let pipeline = state.pipeline.load_full();
    let target = target_param(query.as_deref());

    tracing::debug!(
        request_id = %request_id,
        url = target.as_deref().unwrap_or(""),
        "Proxying request"
    );

    match pipeline.serve(target.as_deref()).await {
        Ok((class, response)) => {
            tracing::info!(
                request_id = %request_id,
                url = target.as_deref().unwrap_or(""),
                kind = class.as_str(),
                status = response.status().as_u16(),
                "Proxied"
            );
            metrics::record_request(class.as_str(), response.status().as_u16(), start_time);
            response
        }
        Err(e) => {
            if e.status().is_server_error() {
                tracing::error!(
                    request_id = %request_id,
                    url = target.as_deref().unwrap_or(""),
                    kind = e.kind(),
                    error = %e,
                    "Proxy request failed"
                );
            } else {
                tracing::warn!(request_id = %request_id, error = %e, "Rejected proxy request");
            }
            metrics::record_request(e.kind(), e.status().as_u16(), start_time);
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_url_value_wins() {
        assert_eq!(
            target_param(Some("url=http://up/a&url=http://up/b")),
            Some("http://up/a".to_string())
        );
    }

    #[test]
    fn test_other_parameters_ignored() {
        assert_eq!(
            target_param(Some("t=1&url=https%3A%2F%2Fexample.com%2F%3Fq%3D1")),
            Some("https://example.com/?q=1".to_string())
        );
        assert_eq!(
            target_param(Some("url=http://up/a?x=1&y=2")),
            Some("http://up/a?x=1".to_string())
        );
        assert_eq!(target_param(Some("t=1")), None);
        assert_eq!(target_param(None), None);
    }
}
