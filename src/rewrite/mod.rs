//! Markup rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! decoded HTML text
//!     → markup.rs (base injection, reference absolutization, script injection)
//!     → interceptor.rs (script template rendered with the endpoint path)
//!     → rewritten HTML text
//!
//! In the client:
//!     interceptor script → wrap.rs algorithm → GET <endpoint>?url=...
//! ```

pub mod interceptor;
pub mod markup;
pub mod wrap;

pub use markup::{rewrite_markup, RewriteContext};
