//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy endpoint and liveness probe
//! - Wire up middleware (request ID, tracing, CORS header, request timeout)
//! - Bind server to listener
//! - Apply hot-reloaded configuration to the pipeline
//! - Drain in-flight requests on shutdown

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::validation::validate_config;
use crate::config::ProxyConfig;
use crate::http::request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
use crate::proxy::{proxy_handler, Pipeline};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Current pipeline; swapped atomically on config reload.
    pub pipeline: Arc<ArcSwap<Pipeline>>,
}

/// HTTP server for the rewriting proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, reqwest::Error> {
        let pipeline = Pipeline::from_config(&config)?;
        let state = AppState {
            pipeline: Arc::new(ArcSwap::from_pointee(pipeline)),
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// An expired request deadline answers 500 like any other fetch failure.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route(&config.endpoint.path, get(proxy_handler))
            .route("/healthz", get(healthz))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id(request.headers()),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                    .layer(SetResponseHeaderLayer::if_not_present(
                        header::ACCESS_CONTROL_ALLOW_ORIGIN,
                        HeaderValue::from_static("*"),
                    ))
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Duration::from_secs(config.timeouts.request_secs),
                    )),
            )
    }

    /// Run the server until the shutdown channel fires.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            endpoint = %self.config.endpoint.path,
            "HTTP server starting"
        );

        let reloader = tokio::spawn(apply_config_updates(
            self.state.pipeline.clone(),
            self.config.clone(),
            config_updates,
        ));

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Get the shared application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Rebuild the pipeline for every configuration update.
///
/// Listener, endpoint and request timeout are bound at startup and are kept
/// from the active configuration. An update whose deadlines no longer fit the
/// running request timeout is rejected.
async fn apply_config_updates(
    pipeline: Arc<ArcSwap<Pipeline>>,
    mut active: ProxyConfig,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
) {
    while let Some(mut next) = updates.recv().await {
        if next.listener != active.listener
            || next.endpoint != active.endpoint
            || next.timeouts.request_secs != active.timeouts.request_secs
        {
            tracing::warn!("Listener, endpoint and request timeout changes require a restart");
            next.listener = active.listener.clone();
            next.endpoint = active.endpoint.clone();
            next.timeouts.request_secs = active.timeouts.request_secs;
        }

        if let Err(errors) = validate_config(&next) {
            for error in &errors {
                tracing::error!(error = %error, "Rejected reloaded config. Keeping current configuration.");
            }
            continue;
        }

        match Pipeline::from_config(&next) {
            Ok(rebuilt) => {
                pipeline.store(Arc::new(rebuilt));
                tracing::info!(
                    upstream_secs = next.timeouts.upstream_secs,
                    absolutize_references = next.rewrite.absolutize_references,
                    "Configuration reloaded"
                );
                active = next;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to apply reloaded config. Keeping current configuration.");
            }
        }
    }
}
