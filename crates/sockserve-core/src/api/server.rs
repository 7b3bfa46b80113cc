//! Request server — axum router over the selected listening endpoint.
//!
//! Routing is static and case-sensitive on the raw request target.
//! `GET /health` and `GET /` answer with JSON; every other target or method,
//! including `HEAD` and anything carrying a query string, gets an empty 404.

use std::future::Future;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use sockserve_config::ServerConfig;

use super::types::*;
use crate::logging::{RequestRecord, RequestSink};
use crate::transport::ListeningEndpoint;

/// Name and language tag a service reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub name: &'static str,
    pub language: &'static str,
}

impl ServiceIdentity {
    pub const fn new(name: &'static str, language: &'static str) -> Self {
        Self { name, language }
    }
}

/// Read-only state shared by every route handler.
pub struct AppState {
    pub identity: ServiceIdentity,
    pub environment_label: String,
    pub version_label: String,
    pub requests: Arc<dyn RequestSink>,
}

impl AppState {
    pub fn new(
        identity: ServiceIdentity,
        config: &ServerConfig,
        requests: Arc<dyn RequestSink>,
    ) -> Self {
        Self {
            identity,
            environment_label: config.environment_label.clone(),
            version_label: config.version_label.clone(),
            requests,
        }
    }
}

/// Build the router with every route and the request log layer.
pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route(
            "/health",
            get(handle_health)
                .head(handle_not_found)
                .fallback(handle_not_found),
        )
        .route(
            "/",
            get(handle_info)
                .head(handle_not_found)
                .fallback(handle_not_found),
        )
        .fallback(handle_not_found)
        .layer(middleware::from_fn(reject_query))
        .layer(middleware::from_fn_with_state(state.clone(), log_request))
        .with_state(state)
}

/// Serve `app` on `endpoint` until `shutdown` completes.
///
/// Stops accepting once `shutdown` resolves, lets in-flight requests finish,
/// then closes the listener. For Unix sockets the socket file is unlinked
/// before returning, whether serving ended cleanly or with an error.
pub async fn serve<F>(
    endpoint: ListeningEndpoint,
    app: axum::Router,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    match endpoint {
        ListeningEndpoint::Tcp(listener) => {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
        }
        ListeningEndpoint::Unix {
            listener,
            socket_file,
        } => {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await;
            socket_file.release();
            result
        }
    }
}

// ── Middleware ──────────────────────────────────────────────────────────

async fn log_request(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .uri()
        .path_and_query()
        .map_or(req.uri().path(), |target| target.as_str())
        .to_string();

    let response = next.run(req).await;

    state.requests.record(&RequestRecord {
        service: state.identity.name,
        method,
        path,
        status: response.status().as_u16(),
    });
    response
}

/// Routes match the whole target, so `/health?x=1` is not `/health`.
async fn reject_query(req: Request, next: Next) -> Response {
    if req.uri().query().is_some() {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(req).await
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: state.identity.name.to_string(),
    })
}

async fn handle_info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        service: state.identity.name.to_string(),
        language: state.identity.language.to_string(),
        env: state.environment_label.clone(),
        version: state.version_label.clone(),
    })
}

async fn handle_not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryRequestSink;
    use axum::body::Body;
    use axum::http::{Method, header};
    use pretty_assertions::assert_eq;
    use sockserve_config::TransportKind;
    use tower::ServiceExt;

    const IDENTITY: ServiceIdentity = ServiceIdentity::new("python-api", "python");

    fn test_state(config: &ServerConfig) -> (Arc<AppState>, Arc<MemoryRequestSink>) {
        let sink = Arc::new(MemoryRequestSink::new(16));
        let state = Arc::new(AppState::new(IDENTITY, config, sink.clone()));
        (state, sink)
    }

    async fn send(app: axum::Router, method: Method, uri: &str) -> (StatusCode, Response) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        (resp.status(), resp)
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _) = test_state(&ServerConfig::default());
        let (status, resp) = send(router(state), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            body_string(resp).await,
            r#"{"status":"ok","service":"python-api"}"#
        );
    }

    #[tokio::test]
    async fn test_info_endpoint_echoes_labels() {
        let config = ServerConfig {
            transport: TransportKind::Tcp { port: 9001 },
            environment_label: "staging".to_string(),
            version_label: "1.2.3".to_string(),
        };
        let (state, _) = test_state(&config);
        let (status, resp) = send(router(state), Method::GET, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body_string(resp).await,
            r#"{"service":"python-api","language":"python","env":"staging","version":"1.2.3"}"#
        );
    }

    #[tokio::test]
    async fn test_info_endpoint_defaults_to_unknown() {
        let (state, _) = test_state(&ServerConfig::default());
        let (_, resp) = send(router(state), Method::GET, "/").await;
        let info: InfoResponse = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(info.env, "unknown");
        assert_eq!(info.version, "unknown");
    }

    #[tokio::test]
    async fn test_unknown_path_is_empty_404() {
        let (state, _) = test_state(&ServerConfig::default());
        for uri in ["/nonexistent", "/HEALTH", "/health/", "/health/extra"] {
            let (status, resp) = send(router(state.clone()), Method::GET, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "GET {uri}");
            assert_eq!(body_string(resp).await, "", "GET {uri}");
        }
    }

    #[tokio::test]
    async fn test_other_methods_are_empty_404() {
        let (state, _) = test_state(&ServerConfig::default());
        for (method, uri) in [
            (Method::POST, "/health"),
            (Method::HEAD, "/health"),
            (Method::HEAD, "/"),
            (Method::DELETE, "/"),
            (Method::PUT, "/nonexistent"),
        ] {
            let (status, resp) = send(router(state.clone()), method.clone(), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
            assert_eq!(body_string(resp).await, "", "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn test_query_string_is_empty_404() {
        let (state, sink) = test_state(&ServerConfig::default());
        for uri in ["/health?x=1", "/?a=b", "/health?"] {
            let (status, resp) = send(router(state.clone()), Method::GET, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "GET {uri}");
            assert_eq!(body_string(resp).await, "", "GET {uri}");
        }

        let logged: Vec<_> = sink.records().into_iter().map(|r| r.path).collect();
        assert_eq!(logged, vec!["/health?x=1", "/?a=b", "/health?"]);
    }

    #[tokio::test]
    async fn test_every_request_is_logged() {
        let (state, sink) = test_state(&ServerConfig::default());
        send(router(state.clone()), Method::GET, "/health").await;
        send(router(state.clone()), Method::POST, "/missing").await;

        let records = sink.records();
        assert_eq!(
            records,
            vec![
                RequestRecord {
                    service: "python-api",
                    method: "GET".to_string(),
                    path: "/health".to_string(),
                    status: 200,
                },
                RequestRecord {
                    service: "python-api",
                    method: "POST".to_string(),
                    path: "/missing".to_string(),
                    status: 404,
                },
            ]
        );
    }
}
