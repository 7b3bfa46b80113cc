//! Endpoint client — HTTP/1.1 over either a TCP address or a Unix socket.
//!
//! Used by the `check` command to probe a running server and by the test
//! suites. Every exchange is bounded by a timeout so a wedged server cannot
//! hang the caller.

use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tracing::debug;

use super::types::*;
use crate::transport::EndpointAddr;

/// Default bound on connecting plus one request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the endpoint client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: EndpointAddr,
        source: std::io::Error,
    },

    #[error("no response from {addr} within {timeout:?}")]
    Timeout { addr: EndpointAddr, timeout: Duration },

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status: {0}")]
    Status(StatusCode),

    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Raw response: status, content type, and the collected body.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl ClientResponse {
    /// Body as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Client for one listening endpoint.
#[derive(Debug, Clone)]
pub struct EndpointClient {
    addr: EndpointAddr,
    timeout: Duration,
}

impl EndpointClient {
    pub fn new(addr: EndpointAddr) -> Self {
        Self {
            addr,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &EndpointAddr {
        &self.addr
    }

    /// `GET path`, any status.
    pub async fn get(&self, path: &str) -> Result<ClientResponse, ClientError> {
        self.request(Method::GET, path).await
    }

    /// Send a bodiless request and return the raw response.
    pub async fn request(&self, method: Method, path: &str) -> Result<ClientResponse, ClientError> {
        tokio::time::timeout(self.timeout, self.exchange(method, path))
            .await
            .map_err(|_| ClientError::Timeout {
                addr: self.addr.clone(),
                timeout: self.timeout,
            })?
    }

    /// `GET /health`, requiring 200.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let resp = self.get_ok("/health").await?;
        serde_json::from_slice(&resp.body).map_err(|e| ClientError::Parse(format!("health: {e}")))
    }

    /// `GET /`, requiring 200.
    pub async fn info(&self) -> Result<InfoResponse, ClientError> {
        let resp = self.get_ok("/").await?;
        serde_json::from_slice(&resp.body).map_err(|e| ClientError::Parse(format!("info: {e}")))
    }

    async fn get_ok(&self, path: &str) -> Result<ClientResponse, ClientError> {
        let resp = self.get(path).await?;
        if resp.status != StatusCode::OK {
            return Err(ClientError::Status(resp.status));
        }
        Ok(resp)
    }

    async fn exchange(&self, method: Method, path: &str) -> Result<ClientResponse, ClientError> {
        let connect_err = |source| ClientError::Connect {
            addr: self.addr.clone(),
            source,
        };
        match &self.addr {
            EndpointAddr::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await.map_err(connect_err)?;
                send_request(stream, method, path).await
            }
            EndpointAddr::Unix(path_on_disk) => {
                let stream = UnixStream::connect(path_on_disk)
                    .await
                    .map_err(connect_err)?;
                send_request(stream, method, path).await
            }
        }
    }
}

async fn send_request<S>(stream: S, method: Method, path: &str) -> Result<ClientResponse, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, Full<Bytes>>(io)
        .await
        .map_err(|e| ClientError::Request(format!("HTTP handshake failed: {e}")))?;

    // Drive the connection in the background
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "client connection closed with error");
        }
    });

    debug!(%method, path, "sending request");

    let req = hyper::Request::builder()
        .method(method)
        .uri(path)
        .header("host", "localhost")
        .body(Full::new(Bytes::new()))
        .map_err(|e| ClientError::Request(format!("failed to build request: {e}")))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| ClientError::Request(format!("request failed: {e}")))?;

    let status = resp.status();
    let content_type = resp
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| ClientError::Request(format!("failed to read response body: {e}")))?
        .to_bytes();

    Ok(ClientResponse {
        status,
        content_type,
        body,
    })
}
