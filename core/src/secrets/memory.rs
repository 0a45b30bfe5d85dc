use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use super::{SecretError, SecretStore};

/// Map-backed secret store, handy for local runs against fixed credentials.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: HashMap<String, String>,
    denied: HashSet<String>,
    requests: AtomicUsize,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, secret_id: impl Into<String>, payload: impl Into<String>) -> Self {
        self.secrets.insert(secret_id.into(), payload.into());
        self
    }

    /// Any fetch of `secret_id` answers with access denied.
    pub fn with_denied(mut self, secret_id: impl Into<String>) -> Self {
        self.denied.insert(secret_id.into());
        self
    }

    /// How many fetches this store has served, failed ones included.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn fetch_secret_string(&self, secret_id: &str) -> Result<String, SecretError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if self.denied.contains(secret_id) {
            return Err(SecretError::AccessDenied(secret_id.to_string()));
        }

        self.secrets
            .get(secret_id)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(secret_id.to_string()))
    }
}
