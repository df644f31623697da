//! HTTP server wiring: shared state, middleware and the listener.
use crate::authorize::PolicyConfig;
use crate::reauth::{LoginRedirect, Reauthenticator};
use crate::settings::Settings;
use crate::state::{MemoryStateStore, StateStore};
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::Router;
use miette::IntoDiagnostic;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub policy: Arc<PolicyConfig>,
    pub states: Arc<dyn StateStore>,
    pub reauth: Arc<dyn Reauthenticator>,
}

impl AppState {
    /// State with the in-process collaborators configured by `settings`.
    pub fn new(settings: Settings, policy: PolicyConfig) -> Self {
        let states = Arc::new(MemoryStateStore::new(
            settings.state.ttl_secs,
            settings.state.max_entries,
        ));
        let reauth = Arc::new(LoginRedirect::new(
            settings.reauthentication.login_url.clone(),
        ));
        Self {
            settings: Arc::new(settings),
            policy: Arc::new(policy),
            states,
            reauth,
        }
    }
}

// Security headers middleware
async fn security_headers(request: Request<Body>, next: Next) -> impl IntoResponse {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'self'; style-src 'self' 'unsafe-inline'; form-action 'self'"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );

    response
}

pub fn app(state: AppState) -> Router {
    crate::authorize::web::router()
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(settings: Settings, policy: PolicyConfig) -> miette::Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    let router = app(AppState::new(settings, policy));

    tracing::info!(%addr, "Authorization service listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
