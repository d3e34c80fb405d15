//! HTTP server for Scribe.
//!
//! `POST /` takes a document as a plain-text body and answers with the
//! processed document. Query parameters override the server defaults
//! per request (see [`query::RequestOverrides`]).
//!
//! Built on Axum.

pub mod query;

use axum::extract::{DefaultBodyLimit, RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use scribe_agent::{run_chat, ChatRunOptions};
use scribe_config::AppConfig;
use scribe_core::{Provider, ProviderError};
use scribe_providers::{build_provider, Gateway};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::query::RequestOverrides;

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Builds the provider serving a request for the given gateway.
pub type ProviderFactory = Arc<dyn Fn(Gateway) -> Result<Arc<dyn Provider>, ProviderError> + Send + Sync>;

/// Shared state for the server.
pub struct ServerState {
    /// Gateway used when a request names none
    pub gateway: Gateway,
    /// Run options used when a request overrides nothing
    pub defaults: ChatRunOptions,
    pub providers: ProviderFactory,
}

impl ServerState {
    /// State whose providers are built from the catalog and the
    /// configured gateway overrides.
    pub fn from_config(config: &AppConfig, gateway: Gateway, defaults: ChatRunOptions) -> Self {
        let overrides = config.gateways.clone();
        let providers: ProviderFactory = Arc::new(move |gateway: Gateway| -> Result<Arc<dyn Provider>, ProviderError> {
            let provider = build_provider(gateway, overrides.get(gateway.as_str()))?;
            Ok(Arc::new(provider) as Arc<dyn Provider>)
        });
        Self {
            gateway,
            defaults,
            providers,
        }
    }
}

type SharedState = Arc<ServerState>;

/// Build the Axum router with all server routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(chat_handler).options(|| async { StatusCode::OK }))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and serve until the process ends.
pub async fn start(state: ServerState, host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{host}:{port}");
    let app = build_router(Arc::new(state));

    info!(addr = %addr, "Server starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

async fn health_handler() -> &'static str {
    "ok"
}

async fn chat_handler(State(state): State<SharedState>, RawQuery(query): RawQuery, body: String) -> Response {
    if body.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Empty request body").into_response();
    }

    let overrides = RequestOverrides::parse(query.as_deref().unwrap_or_default());
    let (gateway, options) = match overrides.apply(state.gateway, &state.defaults) {
        Ok(resolved) => resolved,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };

    info!(
        gateway = %gateway,
        model = %options.model,
        body_len = body.len(),
        "Chat request received"
    );

    let outcome = match (state.providers)(gateway) {
        Ok(provider) => run_chat(&body, &options, provider).await,
        Err(e) => Err(e.into()),
    };

    match outcome {
        Ok(document) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            document,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Chat processing failed");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}
