//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Keep connect and upstream deadlines inside the request deadline
//! - Check the endpoint path is usable as a route and a URL prefix
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("endpoint path '{0}' must start with '/' and contain no query or fragment")]
    EndpointPath(String),

    #[error("upstream user_agent must not be empty")]
    EmptyUserAgent,

    #[error("upstream max_markup_bytes must be greater than zero")]
    ZeroMarkupLimit,

    #[error("timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("timeout '{name}' ({secs}s) must be shorter than request_secs ({request_secs}s)")]
    TimeoutOrder {
        name: &'static str,
        secs: u64,
        request_secs: u64,
    },

    #[error("unknown log format '{0}' (expected 'pretty' or 'json')")]
    LogFormat(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let path = &config.endpoint.path;
    if !path.starts_with('/') || path.len() < 2 || path.contains(['?', '#', ' ']) {
        errors.push(ValidationError::EndpointPath(path.clone()));
    }

    if config.upstream.user_agent.trim().is_empty() {
        errors.push(ValidationError::EmptyUserAgent);
    }
    if config.upstream.max_markup_bytes == 0 {
        errors.push(ValidationError::ZeroMarkupLimit);
    }

    let timeouts = [
        ("connect_secs", config.timeouts.connect_secs),
        ("upstream_secs", config.timeouts.upstream_secs),
        ("request_secs", config.timeouts.request_secs),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }
    // The request timeout wraps the whole fetch; it must fire last.
    let request_secs = config.timeouts.request_secs;
    for &(name, secs) in &timeouts[..2] {
        if request_secs > 0 && secs >= request_secs {
            errors.push(ValidationError::TimeoutOrder {
                name,
                secs,
                request_secs,
            });
        }
    }

    let format = config.observability.log_format.as_str();
    if format != "pretty" && format != "json" {
        errors.push(ValidationError::LogFormat(format.to_string()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
