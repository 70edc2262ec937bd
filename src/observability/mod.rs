//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request handlers produce:
//!     → logging.rs (structured log events, one span per request)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every span
//! - Metrics are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
