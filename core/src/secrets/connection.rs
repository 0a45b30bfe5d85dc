use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use super::{decode_secret, resolve_nested_secret, SecretError, SecretStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseEngine {
    Postgres,
    Mysql,
    Sqlite,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Database engine {0} is not supported, expected postgres, mysql or sqlite")]
pub struct UnsupportedEngine(pub String);

impl FromStr for DatabaseEngine {
    type Err = UnsupportedEngine;

    /// Accepts dialect names with an optional driver suffix such as `postgresql+psycopg2`.
    fn from_str(engine: &str) -> Result<Self, Self::Err> {
        let dialect = engine.split('+').next().unwrap_or_default().trim().to_lowercase();
        match dialect.as_str() {
            "postgres" | "postgresql" => Ok(DatabaseEngine::Postgres),
            "mysql" | "mariadb" => Ok(DatabaseEngine::Mysql),
            "sqlite" | "sqlite3" => Ok(DatabaseEngine::Sqlite),
            _ => Err(UnsupportedEngine(engine.to_string())),
        }
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(port)) => Ok(Some(port)),
        Some(Port::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Port::Text(text)) => text.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Connection parameters for one logical database server.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub engine: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,

    #[serde(default, alias = "dbname")]
    pub database: Option<String>,
}

impl DatabaseCredentials {
    pub fn engine(&self) -> Result<DatabaseEngine, UnsupportedEngine> {
        self.engine.parse()
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Connection URL with the password masked, safe to log.
    pub fn redacted_url(&self) -> String {
        let mut url = format!("{}://", self.engine);
        if let Some(username) = &self.username {
            url.push_str(username);
            if self.password.is_some() {
                url.push_str(":***");
            }
            url.push('@');
        }
        if let Some(host) = &self.host {
            url.push_str(host);
        }
        if let Some(port) = self.port {
            url.push_str(&format!(":{}", port));
        }
        if let Some(database) = &self.database {
            url.push('/');
            url.push_str(database);
        }
        url
    }
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("engine", &self.engine)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

/// Resolves database credentials out of one nested secret, keeping the most recently
/// resolved server so repeated lookups within a run skip the secret store.
pub struct ConnectionResolver<'a> {
    store: &'a dyn SecretStore,
    secret_id: String,
    current: Option<(String, DatabaseCredentials)>,
}

impl<'a> ConnectionResolver<'a> {
    pub fn new(store: &'a dyn SecretStore, secret_id: impl Into<String>) -> Self {
        Self { store, secret_id: secret_id.into(), current: None }
    }

    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }

    pub async fn resolve(&mut self, server: &str) -> Result<DatabaseCredentials, SecretError> {
        if let Some((current_server, credentials)) = &self.current {
            if current_server == server {
                debug!("Reusing credentials for server {}", server);
                return Ok(credentials.clone());
            }
        }

        let value = resolve_nested_secret(self.store, &self.secret_id, server).await?;
        let credentials: DatabaseCredentials =
            decode_secret(&format!("{}/{}", self.secret_id, server), value)?;
        info!("Resolved database credentials for server {}", server);

        self.current = Some((server.to_string(), credentials.clone()));
        Ok(credentials)
    }
}
