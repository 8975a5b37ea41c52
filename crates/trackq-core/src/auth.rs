//! Credential capability consumed by the backend client.
//!
//! The orchestrator never inspects credentials; it asks the source to
//! authorize outgoing requests and invalidates it when the backend answers 401.

use std::fmt;
use std::sync::RwLock;

/// Credentials attached to backend requests.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic {
        username: String,
        password: Option<String>,
    },
    Bearer(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

impl Credentials {
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credentials::Basic { username, password } => {
                request.basic_auth(username, password.as_deref())
            }
            Credentials::Bearer(token) => request.bearer_auth(token),
        }
    }
}

/// Source of credentials shared by every request the client makes.
pub trait CredentialSource: Send + Sync {
    /// Current credentials, if any are held.
    fn credentials(&self) -> Option<Credentials>;

    /// Forget stored credentials (backend answered 401).
    fn invalidate(&self);
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct CredentialStore {
    inner: RwLock<Option<Credentials>>,
}

impl CredentialStore {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self {
            inner: RwLock::new(credentials),
        }
    }

    pub fn set(&self, credentials: Credentials) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(credentials);
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl CredentialSource for CredentialStore {
    fn credentials(&self) -> Option<Credentials> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn invalidate(&self) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if guard.take().is_some() {
            tracing::warn!("backend rejected credentials; cleared stored credentials");
        }
    }
}
