//! GhostFrame: a rewriting HTTP proxy that keeps framed pages inside itself.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod rewrite;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::shutdown::Shutdown;
