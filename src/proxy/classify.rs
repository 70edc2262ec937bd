//! Content classification.
//!
//! The decision is binary: only HTML needs textual rewriting, everything else
//! (including an absent or unknown type) is relayed untouched.

use axum::http::{header, HeaderMap};

/// Media type essence that triggers markup rewriting.
pub const MARKUP_MEDIA_TYPE: &str = "text/html";

/// Which path a response takes through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    Markup,
    Binary,
}

impl ContentClass {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentClass::Markup => "markup",
            ContentClass::Binary => "binary",
        }
    }
}

/// Raw `Content-Type` value, or an empty string when absent or unreadable.
pub fn media_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Classify a `Content-Type` value.
pub fn classify(media_type: &str) -> ContentClass {
    let essence = media_type.split(';').next().unwrap_or("").trim();
    if essence.eq_ignore_ascii_case(MARKUP_MEDIA_TYPE) {
        ContentClass::Markup
    } else {
        ContentClass::Binary
    }
}
