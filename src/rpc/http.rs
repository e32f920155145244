//! HTTP transport
//!
//! reqwest-backed implementation of [`Transport`] and [`RpcProxy`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{xmlrpc, HttpReply, RpcError, RpcProxy, Transport};

/// Opens XML-RPC proxies sharing one reqwest client.
///
/// Every request, side-channel ones included, is bounded by the timeout
/// given at construction.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn map_reqwest(err: reqwest::Error) -> RpcError {
    if err.is_timeout() {
        RpcError::Timeout
    } else {
        RpcError::Transport(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn open(&self, url: &str) -> Result<Arc<dyn RpcProxy>, RpcError> {
        reqwest::Url::parse(url).map_err(|e| RpcError::Transport(format!("{}: {}", url, e)))?;
        Ok(Arc::new(XmlRpcProxy {
            client: self.client.clone(),
            url: url.to_string(),
        }))
    }

    async fn get_json(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpReply, RpcError> {
        let mut request = self.client.get(url).header("Accept", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(map_reqwest)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_reqwest)?;
        let body = serde_json::from_slice::<Value>(&bytes).ok();

        Ok(HttpReply { status, body })
    }
}

/// Proxy bound to one XML-RPC endpoint URL.
#[derive(Debug)]
pub struct XmlRpcProxy {
    client: Client,
    url: String,
}

#[async_trait]
impl RpcProxy for XmlRpcProxy {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        debug!(url = %self.url, method, "xml-rpc call");
        let body = xmlrpc::encode_call(method, &params);

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Http(status.as_u16()));
        }

        let text = response.text().await.map_err(map_reqwest)?;
        xmlrpc::decode_response(&text)
    }

    fn url(&self) -> &str {
        &self.url
    }
}
