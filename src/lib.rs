//!  Class Connect is the authentication and class resources API behind the
//!  Class Connect education platform.

#![forbid(unsafe_code)]
pub mod account;
pub mod assistant;
pub mod classroom;
pub mod config;
pub mod error;
pub mod export;
pub mod notification;
mod router;
pub mod security;
pub mod session;
pub mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use class_connect_limits::RateLimiter;
use class_connect_limits::axum::ClientLimiter;
use error::ServerError;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

/// Overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
const LOGIN_WINDOW: Duration = Duration::from_secs(60);
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    token: Option<&str>,
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub accounts: Arc<account::AccountStore>,
    pub sessions: Arc<session::SessionManager>,
    pub classes: Arc<classroom::ClassStore>,
    pub notifier: Arc<notification::Notifier>,
    pub assistant: Arc<dyn assistant::Assistant>,
    pub login_limiter: Arc<RateLimiter>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Build every store from the configuration.
    pub fn new(config: Arc<config::Configuration>) -> Self {
        Self {
            accounts: Arc::new(account::AccountStore::new(
                config.accounts.iter().cloned(),
            )),
            sessions: Arc::new(session::SessionManager::new(
                config.session.clone(),
            )),
            classes: Arc::new(classroom::ClassStore::new(
                config.classes.iter().cloned(),
            )),
            notifier: Arc::new(notification::Notifier::new()),
            assistant: Arc::new(assistant::DisabledAssistant),
            login_limiter: Arc::new(RateLimiter::new(
                config.rate_limit.login,
                LOGIN_WINDOW,
            )),
            metrics: None,
            config,
        }
    }

    /// Expose Prometheus metrics on `/metrics`.
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    // Everything below requires a session.
    let authenticated = Router::new()
        // `POST /logout` goes to `logout`.
        .route("/logout", post(router::login::logout))
        // `GET /users/@me` goes to `me`.
        .route("/users/@me", get(router::users::me))
        .nest("/classes", router::classes::router(&state))
        .nest("/assistant", router::assistant::router())
        .route_layer(AxumMiddleware::from_fn_with_state(
            state.clone(),
            router::auth,
        ));

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .route("/metrics", get(router::status::metrics))
        // `POST /login` goes to `login`, limited per client.
        .route(
            "/login",
            post(router::login::handler).route_layer(
                AxumMiddleware::from_fn_with_state(
                    ClientLimiter::new(Arc::clone(&state.login_limiter))
                        .trust_forwarded(state.config.rate_limit.trust_forwarded),
                    class_connect_limits::axum::rate_limiter,
                ),
            ),
        )
        .route("/password/forgot", post(router::login::forgot_password))
        .merge(authenticated)
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>> {
    let path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_default();

    // read configuration file. let it in memory.
    let config = config::Configuration::default().path(path).read()?;

    if config.classes.is_empty() {
        tracing::warn!("no `classes` entry on `config.yaml` file");
    }

    let metrics = match telemetry::setup_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::error!(error = %err, "prometheus recorder not installed");
            None
        },
    };

    let state = AppState::new(config).with_metrics(metrics);
    tracing::info!(
        accounts = state.accounts.len(),
        classes = state.classes.list().len(),
        "state initialized"
    );

    Ok(state)
}

/// Periodically drop expired sessions and idle rate-limit buckets.
pub fn spawn_maintenance(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;

            let purged = state.sessions.purge_expired();
            state.login_limiter.retain_active();
            metrics::gauge!("active_sessions").set(state.sessions.len() as f64);

            if purged > 0 {
                tracing::debug!(purged, "expired sessions removed");
            }
        }
    })
}
