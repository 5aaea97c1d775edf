use crate::RateLimiter;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Limiter state of the [`rate_limiter`] middleware.
#[derive(Debug, Clone)]
pub struct ClientLimiter {
    limiter: Arc<RateLimiter>,
    trust_forwarded: bool,
}

impl ClientLimiter {
    /// Limit clients by their peer address.
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        ClientLimiter {
            limiter,
            trust_forwarded: false,
        }
    }

    /// Identify clients by the first `X-Forwarded-For` entry instead.
    ///
    /// The header is set by the client itself, so this must only be enabled
    /// behind a reverse proxy that overwrites it.
    pub fn trust_forwarded(mut self, trust: bool) -> Self {
        self.trust_forwarded = trust;
        self
    }
}

/// Identify the client behind a request.
///
/// The peer address is used, then the loopback address. When
/// `trust_forwarded` is set, the first `X-Forwarded-For` entry wins.
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> String {
    let forwarded = trust_forwarded
        .then(|| headers.get(FORWARDED_FOR))
        .flatten()
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_owned())
        .filter(|ip| !ip.is_empty());

    forwarded.unwrap_or_else(|| {
        peer.map(|addr| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .to_string()
    })
}

/// Middleware to limit request per window time.
///
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn rate_limiter(
    State(state): State<ClientLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(req.headers(), peer, state.trust_forwarded);

    if state.limiter.check(&key) {
        next.run(req).await
    } else {
        let retry_after = HeaderValue::from(state.limiter.window().as_secs());
        (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after)],
            "Rate limit exceeded.",
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use std::time::Duration;
    use tower::ServiceExt;

    fn request(peer: &str, forwarded: &str) -> Request {
        let peer: SocketAddr = peer.parse().unwrap();
        let mut req = Request::builder()
            .uri("/")
            .header(FORWARDED_FOR, forwarded)
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        req
    }

    fn app(state: ClientLimiter) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(state, rate_limiter))
    }

    #[test]
    fn test_client_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, None, false), "127.0.0.1");

        let peer: SocketAddr = "10.0.0.2:4000".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer), true), "10.0.0.2");

        headers.insert(FORWARDED_FOR, HeaderValue::from_static("8.8.8.8, 10.0.0.1"));
        assert_eq!(client_key(&headers, Some(peer), false), "10.0.0.2");
        assert_eq!(client_key(&headers, Some(peer), true), "8.8.8.8");
    }

    #[tokio::test]
    async fn test_middleware() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)));
        let app = app(ClientLimiter::new(limiter));

        let response = app
            .clone()
            .oneshot(request("1.2.3.4:5000", "9.9.9.9"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("1.2.3.4:5001", "9.9.9.9"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");

        let response = app
            .oneshot(request("4.3.2.1:5000", "9.9.9.9"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for() {
        let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(60)));
        let app = app(ClientLimiter::new(limiter));

        let mut statuses = Vec::new();
        for i in 0..20 {
            let forwarded = format!("10.0.0.{i}");
            let response = app
                .clone()
                .oneshot(request("1.2.3.4:5000", &forwarded))
                .await
                .unwrap();
            statuses.push(response.status());
        }

        assert!(statuses[..5].iter().all(|s| *s == StatusCode::OK));
        assert!(statuses[5..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn test_trusted_forwarded_for() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)));
        let app = app(ClientLimiter::new(limiter).trust_forwarded(true));

        // Same proxy, distinct clients.
        let response = app
            .clone()
            .oneshot(request("10.0.0.1:5000", "8.8.8.8"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("10.0.0.1:5000", "8.8.4.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request("10.0.0.1:5000", "8.8.8.8"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
