use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, RunError};
use bb8_postgres::PostgresConnectionManager;
use futures::pin_mut;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio::{task, time::timeout};
use tokio_postgres::{
    binary_copy::BinaryCopyInWriter, config::SslMode, types::ToSql, Config, Error as PgError,
    Transaction as PgTransaction,
};
pub use tokio_postgres::types::Type as PgType;
use tracing::{debug, error, info, warn};

use super::sql_type_wrapper::column_kind_to_pg_type;
use crate::{
    database::{
        common_sql::generate::{
            generate_columns_names_sql, generate_delete_all_sql, quote_table_name,
        },
        Destination, DestinationError,
    },
    row_set::{CellValue, RowSet},
    secrets::{DatabaseCredentials, DatabaseEngine},
};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);
const DEFAULT_PORT: u16 = 5432;
/// Above this many rows the append switches from a multi-row INSERT to binary COPY.
const COPY_THRESHOLD: usize = 100;

#[derive(thiserror::Error, Debug)]
pub enum PostgresConnectionError {
    #[error("Postgres credentials are missing `{0}`")]
    MissingParameter(&'static str),

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(#[from] tokio_postgres::Error),

    #[error("Connection pool runtime error: {0}")]
    ConnectionPoolRuntimeError(#[from] RunError<tokio_postgres::Error>),

    #[error("Can not connect to the database at {0}")]
    CanNotConnectToDatabase(String),

    #[error("Could not create tls connector")]
    CouldNotCreateTlsConnector,
}

#[derive(thiserror::Error, Debug)]
pub enum PostgresError {
    #[error("PgError {0}")]
    PgError(#[from] PgError),

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(#[from] RunError<tokio_postgres::Error>),
}

pub struct PostgresTransaction<'a> {
    pub transaction: PgTransaction<'a>,
}

impl<'a> PostgresTransaction<'a> {
    pub async fn execute(
        &mut self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, PostgresError> {
        self.transaction.execute(query, params).await.map_err(PostgresError::PgError)
    }

    pub async fn commit(self) -> Result<(), PostgresError> {
        self.transaction.commit().await.map_err(PostgresError::PgError)
    }

    pub async fn rollback(self) -> Result<(), PostgresError> {
        self.transaction.rollback().await.map_err(PostgresError::PgError)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BulkInsertPostgresError {
    #[error("{0}")]
    PostgresError(#[from] PostgresError),

    #[error("{0}")]
    CouldNotWriteDataToPostgres(#[from] tokio_postgres::Error),
}

fn postgres_config(credentials: &DatabaseCredentials) -> Result<Config, PostgresConnectionError> {
    let host = credentials.host.as_deref().filter(|host| !host.is_empty());
    let user = credentials.username.as_deref().filter(|user| !user.is_empty());

    let mut config = Config::new();
    config
        .host(host.ok_or(PostgresConnectionError::MissingParameter("host"))?)
        .user(user.ok_or(PostgresConnectionError::MissingParameter("username"))?)
        .port(credentials.port.unwrap_or(DEFAULT_PORT))
        .application_name("sheets-refresh");

    if let Some(password) = &credentials.password {
        config.password(password);
    }
    if let Some(database) = &credentials.database {
        config.dbname(database);
    }

    Ok(config)
}

/// Whether `error` or anything in its source chain came from the TLS layer.
fn is_tls_error(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if e.is::<native_tls::Error>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// One multi-row INSERT with `$n` placeholders numbered row by row.
pub fn generate_insert_sql(table_name: &str, column_names: &[String], row_count: usize) -> String {
    let total_columns = column_names.len();

    let mut query = format!(
        "INSERT INTO {} ({}) VALUES ",
        quote_table_name(table_name),
        generate_columns_names_sql(column_names),
    );

    for i in 0..row_count {
        if i > 0 {
            query.push(',');
        }
        let placeholders: Vec<String> =
            (0..total_columns).map(|j| format!("${}", i * total_columns + j + 1)).collect();
        query.push_str(&format!("({})", placeholders.join(",")));
    }

    query
}

pub struct PostgresClient {
    pool: Pool<PostgresConnectionManager<MakeTlsConnector>>,
}

impl PostgresClient {
    pub async fn new(credentials: &DatabaseCredentials) -> Result<Self, PostgresConnectionError> {
        async fn _new(
            credentials: &DatabaseCredentials,
            disable_ssl: bool,
        ) -> Result<PostgresClient, PostgresConnectionError> {
            let mut config = postgres_config(credentials)?;
            if disable_ssl {
                config.ssl_mode(SslMode::Disable);
            }

            let connector = TlsConnector::builder()
                .build()
                .map_err(|_| PostgresConnectionError::CouldNotCreateTlsConnector)?;
            let tls_connector = MakeTlsConnector::new(connector);
            let target = credentials.redacted_url();

            let (client, connection) =
                match timeout(CONNECT_TIMEOUT, config.connect(tls_connector.clone())).await {
                    Ok(Ok((client, connection))) => (client, connection),
                    Ok(Err(e)) => {
                        // only a failed tls handshake is worth a plain-text retry
                        if !disable_ssl
                            && config.get_ssl_mode() == SslMode::Prefer
                            && is_tls_error(&e)
                        {
                            warn!("TLS connection to {} failed ({}), retrying without", target, e);
                            return Box::pin(_new(credentials, true)).await;
                        }
                        error!("Error connecting to database {}: {}", target, e);
                        return Err(PostgresConnectionError::CanNotConnectToDatabase(target));
                    }
                    Err(e) => {
                        error!("Timeout connecting to database {}: {}", target, e);
                        return Err(PostgresConnectionError::CanNotConnectToDatabase(target));
                    }
                };

            let connection_handle = task::spawn(connection);

            if let Err(e) = client.query_one("SELECT 1", &[]).await {
                error!("Connection check against {} failed: {}", target, e);
                return Err(PostgresConnectionError::CanNotConnectToDatabase(target));
            }

            drop(client);
            match connection_handle.await {
                Ok(Ok(())) => (),
                _ => return Err(PostgresConnectionError::CanNotConnectToDatabase(target)),
            }

            let manager = PostgresConnectionManager::new(config, tls_connector);
            let pool = Pool::builder().build(manager).await?;

            info!("Connected to {}", target);
            Ok(PostgresClient { pool })
        }

        _new(credentials, false).await
    }

    /// Types of `column_names` as declared in the destination table.
    async fn column_types(
        &self,
        table_name: &str,
        column_names: &[String],
    ) -> Result<Vec<PgType>, PostgresError> {
        let conn = self.pool.get().await?;
        let statement = conn
            .prepare(&format!(
                "SELECT {} FROM {} LIMIT 0",
                generate_columns_names_sql(column_names),
                quote_table_name(table_name)
            ))
            .await?;

        Ok(statement.columns().iter().map(|column| column.type_().clone()).collect())
    }

    pub async fn bulk_insert_via_copy(
        &self,
        table_name: &str,
        column_names: &[String],
        column_types: &[PgType],
        data: &[Vec<CellValue>],
    ) -> Result<u64, BulkInsertPostgresError> {
        let stmt = format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT binary)",
            quote_table_name(table_name),
            generate_columns_names_sql(column_names),
        );
        debug!("Bulk insert statement: {}", stmt);

        let conn = self.pool.get().await.map_err(PostgresError::ConnectionPoolError)?;
        let sink = conn.copy_in(&stmt).await?;

        let writer = BinaryCopyInWriter::new(sink, column_types);
        pin_mut!(writer);

        for row in data {
            let params: Vec<&(dyn ToSql + Sync)> =
                row.iter().map(|cell| cell as &(dyn ToSql + Sync)).collect();
            writer.as_mut().write(&params).await?;
        }

        Ok(writer.finish().await?)
    }

    pub async fn bulk_insert(
        &self,
        table_name: &str,
        column_names: &[String],
        bulk_data: &[Vec<CellValue>],
    ) -> Result<u64, PostgresError> {
        let query = generate_insert_sql(table_name, column_names, bulk_data.len());
        let params: Vec<&(dyn ToSql + Sync)> =
            bulk_data.iter().flatten().map(|cell| cell as &(dyn ToSql + Sync)).collect();

        let conn = self.pool.get().await?;
        conn.execute(query.as_str(), &params).await.map_err(PostgresError::PgError)
    }

    /// Uses COPY for large row-sets and a single INSERT otherwise, both are atomic.
    pub async fn insert_bulk(
        &self,
        table_name: &str,
        row_set: &RowSet,
    ) -> Result<u64, DestinationError> {
        if row_set.is_empty() || row_set.columns().is_empty() {
            return Ok(0);
        }

        let column_names = row_set.column_names();

        if row_set.len() > COPY_THRESHOLD {
            let column_types = match self.column_types(table_name, &column_names).await {
                Ok(types) => types,
                Err(e) => {
                    debug!(
                        "Could not read column types of {} ({}), using row-set kinds",
                        table_name, e
                    );
                    row_set
                        .columns()
                        .iter()
                        .map(|column| column_kind_to_pg_type(column.kind))
                        .collect()
                }
            };

            Ok(self
                .bulk_insert_via_copy(table_name, &column_names, &column_types, row_set.rows())
                .await?)
        } else {
            Ok(self.bulk_insert(table_name, &column_names, row_set.rows()).await?)
        }
    }
}

#[async_trait]
impl Destination for PostgresClient {
    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::Postgres
    }

    async fn delete_all(&self, table: &str) -> Result<u64, DestinationError> {
        let mut conn = self.pool.get().await.map_err(PostgresError::ConnectionPoolError)?;
        let transaction = conn.transaction().await.map_err(PostgresError::PgError)?;
        let mut transaction = PostgresTransaction { transaction };

        match transaction.execute(&generate_delete_all_sql(table), &[]).await {
            Ok(count) => {
                transaction.commit().await?;
                Ok(count)
            }
            Err(e) => {
                error!("Deleting rows of {} failed, rolling back: {}", table, e);
                if let Err(rollback_error) = transaction.rollback().await {
                    error!("Rollback of delete on {} failed: {}", table, rollback_error);
                }
                Err(e.into())
            }
        }
    }

    async fn append(&self, table: &str, row_set: &RowSet) -> Result<u64, DestinationError> {
        self.insert_bulk(table, row_set).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> DatabaseCredentials {
        serde_json::from_value(serde_json::json!({
            "engine": "postgresql",
            "username": "etl",
            "password": "hunter2",
            "host": "db.internal",
            "port": 6543,
            "database": "analytics_db"
        }))
        .unwrap()
    }

    #[test]
    fn test_postgres_config_from_credentials() {
        let config = postgres_config(&credentials()).unwrap();
        assert_eq!(config.get_user(), Some("etl"));
        assert_eq!(config.get_password(), Some("hunter2".as_bytes()));
        assert_eq!(config.get_dbname(), Some("analytics_db"));
        assert_eq!(config.get_ports(), &[6543]);
    }

    #[test]
    fn test_postgres_config_defaults_port() {
        let mut credentials = credentials();
        credentials.port = None;
        let config = postgres_config(&credentials).unwrap();
        assert_eq!(config.get_ports(), &[DEFAULT_PORT]);
    }

    #[test]
    fn test_postgres_config_requires_host() {
        let mut credentials = credentials();
        credentials.host = None;
        assert!(matches!(
            postgres_config(&credentials),
            Err(PostgresConnectionError::MissingParameter("host"))
        ));
    }

    #[test]
    fn test_generate_insert_sql() {
        let columns = vec!["id".to_string(), "importe_EUR".to_string()];
        assert_eq!(
            generate_insert_sql("sales_table", &columns, 2),
            "INSERT INTO \"sales_table\" (\"id\", \"importe_EUR\") VALUES ($1,$2),($3,$4)"
        );
    }

    #[derive(Debug)]
    struct Wrapped(Box<dyn std::error::Error + Send + Sync>);

    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "wrapped: {}", self.0)
        }
    }

    impl std::error::Error for Wrapped {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(self.0.as_ref())
        }
    }

    #[test]
    fn test_only_tls_failures_trigger_plain_retry() {
        let tls_failure = match native_tls::Identity::from_pkcs12(b"not a pkcs12 bundle", "") {
            Err(e) => e,
            Ok(_) => panic!("garbage should not parse as an identity"),
        };
        assert!(is_tls_error(&tls_failure));
        assert!(is_tls_error(&Wrapped(Box::new(tls_failure))));

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(!is_tls_error(&refused));
        assert!(!is_tls_error(&Wrapped(Box::new(refused))));
    }
}
