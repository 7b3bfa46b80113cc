//! Response bodies served by the request server.
//!
//! Both the server and [`EndpointClient`](super::EndpointClient) use these
//! types. Field order is the wire order.

use serde::{Deserialize, Serialize};

/// `GET /health` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// `GET /` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub service: String,
    pub language: String,
    pub env: String,
    pub version: String,
}
