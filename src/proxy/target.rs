//! Target resolution.
//!
//! Turns the caller-supplied `url` parameter into an absolute HTTP(S) URL
//! before any network access happens.

use url::Url;

use crate::proxy::error::{ProxyError, ProxyResult};

/// Scheme prepended to targets that arrive without one.
pub const DEFAULT_SCHEME: &str = "https://";

/// A resolved proxy target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    /// Value as supplied by the caller.
    pub raw: String,
    /// Absolute URL with an explicit scheme.
    pub resolved: Url,
    /// Scheme, host and port of `resolved`.
    pub origin: String,
}

impl ProxyTarget {
    /// Resolve an optional raw parameter into a target.
    pub fn resolve(raw: Option<&str>) -> ProxyResult<Self> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty());
        let raw = raw.ok_or(ProxyError::MissingParameter)?;

        let candidate = if has_scheme(raw) {
            raw.to_string()
        } else {
            format!("{DEFAULT_SCHEME}{raw}")
        };

        let resolved = Url::parse(&candidate).map_err(|e| ProxyError::InvalidTarget {
            target: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(resolved.scheme(), "http" | "https") {
            return Err(ProxyError::InvalidTarget {
                target: raw.to_string(),
                reason: format!("unsupported scheme '{}'", resolved.scheme()),
            });
        }
        if resolved.host_str().map_or(true, str::is_empty) {
            return Err(ProxyError::InvalidTarget {
                target: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        let origin = resolved.origin().ascii_serialization();

        Ok(Self {
            raw: raw.to_string(),
            resolved,
            origin,
        })
    }

    /// Origin with the trailing slash used for the base declaration.
    pub fn base_href(&self) -> String {
        format!("{}/", self.origin)
    }
}

/// True when the string starts with `<scheme>://`.
fn has_scheme(value: &str) -> bool {
    match value.find("://") {
        Some(idx) if idx > 0 => {
            let scheme = &value[..idx];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}
