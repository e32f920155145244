//! Endpoint Resolver
//!
//! Validates the configured server URL and derives the RPC endpoint URLs.

use std::fmt;

use url::Url;

use crate::error::{OdooError, Result};

/// Database management service (listing).
pub const DB_ENDPOINT: &str = "/mcp/xmlrpc/db";
/// Authentication and version probing.
pub const COMMON_ENDPOINT: &str = "/mcp/xmlrpc/common";
/// Object operations (`execute_kw`).
pub const OBJECT_ENDPOINT: &str = "/mcp/xmlrpc/object";
/// Side-channel API key validation.
pub const AUTH_VALIDATE_ENDPOINT: &str = "/mcp/auth/validate";

// == Service ==
/// The three XML-RPC services exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Db,
    Common,
    Object,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Db, Service::Common, Service::Object];

    /// Path of the service below the base URL.
    pub fn path(self) -> &'static str {
        match self {
            Service::Db => DB_ENDPOINT,
            Service::Common => COMMON_ENDPOINT,
            Service::Object => OBJECT_ENDPOINT,
        }
    }
}

// == Endpoint ==
/// Parsed and validated server location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Path prefix without trailing slash, empty when the server sits at `/`
    pub base_path: String,
}

impl Endpoint {
    /// Parses a base URL such as `https://erp.example.com:8069/odoo/`.
    ///
    /// Only `http` and `https` are accepted and a host is required. The
    /// port defaults to 80 or 443 when absent.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim())
            .map_err(|e| OdooError::Configuration(format!("Failed to parse URL: {}", e)))?;

        let scheme = url.scheme().to_string();
        if scheme != "http" && scheme != "https" {
            return Err(OdooError::Configuration(format!(
                "Invalid URL scheme: {}. Must be http or https",
                scheme
            )));
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => {
                return Err(OdooError::Configuration(
                    "Invalid URL: missing hostname".to_string(),
                ))
            }
        };

        let port = url
            .port()
            .unwrap_or(if scheme == "https" { 443 } else { 80 });
        let base_path = url.path().trim_end_matches('/').to_string();

        Ok(Self {
            scheme,
            host,
            port,
            base_path,
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.base_path)
    }

    /// Absolute URL of an arbitrary path below the base.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Absolute URL of one of the XML-RPC services.
    pub fn service_url(&self, service: Service) -> String {
        self.url_for(service.path())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
