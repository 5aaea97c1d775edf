//! Public configuration page for front-end identification and customization.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{AppState, ServerError};

/// Structured configuration.
#[derive(Debug, Serialize, Deserialize)]
pub struct Status {
    name: String,
    version: String,
    url: String,
    assistant: bool,
}

/// Public server status (configuration).
pub async fn status(State(state): State<AppState>) -> Json<Status> {
    Json(Status {
        name: state.config.name.clone(),
        version: state.config.version().to_owned(),
        url: state.config.url.clone(),
        assistant: state.assistant.is_enabled(),
    })
}

/// Prometheus exposition.
pub async fn metrics(State(state): State<AppState>) -> Result<String> {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .ok_or(ServerError::NotFound("metrics"))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::router::tests::{json, state};
    use crate::*;

    #[tokio::test]
    async fn test_status_handler() {
        let app = app(state());
        let response =
            make_request(None, app, Method::GET, "/status.json", String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["name"], "Class Connect");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["assistant"], false);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let app = app(state());
        let response =
            make_request(None, app, Method::GET, "/metrics", String::default()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
