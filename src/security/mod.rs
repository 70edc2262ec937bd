//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream response:
//!     → headers.rs (strip frame/CSP restrictions, add wildcard CORS)
//!     → Client
//! ```
//!
//! # Design Decisions
//! - Embedding restrictions are always removed; the proxy exists to be framed
//! - Markup headers are rebuilt from scratch, relay headers are filtered clones

pub mod headers;
