mod aws;
mod connection;
mod memory;

use async_trait::async_trait;
pub use aws::AwsSecretsManager;
pub use connection::{ConnectionResolver, DatabaseCredentials, DatabaseEngine, UnsupportedEngine};
pub use memory::InMemorySecretStore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, info};

#[derive(thiserror::Error, Debug)]
pub enum SecretError {
    #[error("Secret {0} was not found in the secret store")]
    NotFound(String),

    #[error("Access to secret {0} was denied")]
    AccessDenied(String),

    #[error("Secret {secret_id} is not valid JSON: {source}")]
    Malformed {
        secret_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Secret {secret_id} has no entry named {key}")]
    MissingKey { secret_id: String, key: String },

    #[error("Secret {secret_id} does not have the expected shape: {reason}")]
    InvalidShape { secret_id: String, reason: String },

    #[error("Secret store request for {secret_id} failed: {message}")]
    Backend { secret_id: String, message: String },
}

/// Anything that can hand back the raw string payload of a secret by its logical name.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch_secret_string(&self, secret_id: &str) -> Result<String, SecretError>;
}

/// Undoes one layer of `\\` / `\"` escaping, other escape sequences are left for the JSON
/// decoder.
fn unescape_once(raw: &str) -> String {
    let mut unescaped = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '\\' || next == '"' {
                    unescaped.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        unescaped.push(c);
    }
    unescaped
}

fn decode_payload(secret_id: &str, raw: &str) -> Result<Value, SecretError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => Ok(value),
        Err(source) => {
            if raw.contains('\\') {
                if let Ok(value) = serde_json::from_str::<Value>(&unescape_once(raw)) {
                    return Ok(value);
                }
            }
            Err(SecretError::Malformed { secret_id: secret_id.to_string(), source })
        }
    }
}

/// Fetches a secret and decodes it as JSON.
pub async fn resolve_secret(
    store: &dyn SecretStore,
    secret_id: &str,
) -> Result<Value, SecretError> {
    let raw = store.fetch_secret_string(secret_id).await.map_err(|e| {
        error!("Error fetching secret {}: {}", secret_id, e);
        e
    })?;

    let value = decode_payload(secret_id, &raw).map_err(|e| {
        error!("Error decoding secret {}: {}", secret_id, e);
        e
    })?;

    info!("Credentials loaded from secret {}", secret_id);
    Ok(value)
}

/// Fetches an outer secret and decodes the JSON document stored under `key`.
///
/// The inner value is usually a JSON-encoded string, an object is accepted as-is.
pub async fn resolve_nested_secret(
    store: &dyn SecretStore,
    secret_id: &str,
    key: &str,
) -> Result<Value, SecretError> {
    let outer = resolve_secret(store, secret_id).await?;
    let inner_id = format!("{}/{}", secret_id, key);

    let inner = match outer.get(key) {
        Some(Value::String(encoded)) => decode_payload(&inner_id, encoded).map_err(|e| {
            error!("Error decoding secret {}: {}", inner_id, e);
            e
        })?,
        Some(value @ Value::Object(_)) => value.clone(),
        Some(_) => {
            error!("Secret {} entry {} is neither a JSON string nor an object", secret_id, key);
            return Err(SecretError::InvalidShape {
                secret_id: inner_id,
                reason: "entry is neither a JSON string nor an object".to_string(),
            })
        }
        None => {
            error!("Secret {} has no entry for {}", secret_id, key);
            return Err(SecretError::MissingKey {
                secret_id: secret_id.to_string(),
                key: key.to_string(),
            });
        }
    };

    Ok(inner)
}

/// Deserializes an already decoded secret into `T`, logging when the shape does not match.
pub fn decode_secret<T: DeserializeOwned>(
    secret_id: &str,
    value: Value,
) -> Result<T, SecretError> {
    serde_json::from_value(value).map_err(|e| {
        error!("Error decoding secret {}: {}", secret_id, e);
        SecretError::InvalidShape { secret_id: secret_id.to_string(), reason: e.to_string() }
    })
}
