//! RPC Transport Module
//!
//! Seams between the connection layer and the wire:
//! - [`RpcProxy`]: one XML-RPC endpoint, call a method with positional params
//! - [`Transport`]: opens proxies and performs side-channel JSON requests
//!
//! [`HttpTransport`] is the production implementation on top of reqwest.

mod http;
pub mod xmlrpc;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use http::HttpTransport;

// == RPC Error ==
/// Failures raised below the connection layer.
///
/// The connection layer translates every variant into
/// [`OdooError`](crate::error::OdooError); callers never see this type
/// from facade operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    /// The server answered with an XML-RPC fault
    #[error("fault {code}: {message}")]
    Fault { code: i64, message: String },

    /// The request did not complete within the configured timeout
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success HTTP status
    #[error("HTTP error {0}")]
    Http(u16),

    /// Connection refused, DNS failure, broken pipe...
    #[error("transport error: {0}")]
    Transport(String),

    /// The payload could not be encoded or decoded
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RpcError {
    /// Message carried to callers; faults expose only the server's text.
    pub fn message(&self) -> String {
        match self {
            RpcError::Fault { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

// == HTTP Reply ==
/// Status and parsed JSON body of a side-channel request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    /// `None` when the body was empty or not JSON
    pub body: Option<Value>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// == Traits ==
/// A handle bound to one XML-RPC endpoint.
#[async_trait]
pub trait RpcProxy: Send + Sync + fmt::Debug {
    /// Calls `method` with positional `params`.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;

    /// Absolute URL this proxy talks to.
    fn url(&self) -> &str;
}

/// Factory for proxies plus the plain HTTP side channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Builds a proxy for an absolute endpoint URL. Must not do I/O.
    fn open(&self, url: &str) -> Result<Arc<dyn RpcProxy>, RpcError>;

    /// GETs `url` with extra headers and parses the JSON body.
    ///
    /// Non-success statuses are returned as a reply, not as an error.
    async fn get_json(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpReply, RpcError>;
}
