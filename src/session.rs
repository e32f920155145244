//! Session state of one logical connection.

use serde::Serialize;

/// Credential method that produced the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    ApiKey,
    Password,
}

/// Who the backend knows us as once authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: i64,
    pub database: String,
    pub method: AuthMethod,
}

/// Connection and authentication state.
///
/// Authentication is represented by an [`Identity`], so a session can
/// never claim to be authenticated without both a uid and a database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    connected: bool,
    identity: Option<Identity>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn uid(&self) -> Option<i64> {
        self.identity.as_ref().map(|i| i.uid)
    }

    pub fn database(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.database.as_str())
    }

    pub fn auth_method(&self) -> Option<AuthMethod> {
        self.identity.as_ref().map(|i| i.method)
    }

    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    /// Records a successful authentication. Re-authenticating replaces the
    /// previous identity.
    pub fn authenticated(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    /// Back to the initial empty state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
