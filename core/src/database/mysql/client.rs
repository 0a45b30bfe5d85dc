use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::{debug, error, info};

use crate::{
    database::{common_sql::generate::IdentifierQuote, Destination, DestinationError},
    row_set::RowSet,
    secrets::{DatabaseCredentials, DatabaseEngine},
};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);
const DEFAULT_PORT: u16 = 3306;
/// A prepared statement can carry at most this many placeholders.
const MAX_PLACEHOLDERS: usize = 65_535;
const QUOTE: IdentifierQuote = IdentifierQuote::Backtick;

#[derive(thiserror::Error, Debug)]
pub enum MysqlConnectionError {
    #[error("MySQL credentials are missing `{0}`")]
    MissingParameter(&'static str),

    #[error("Can not connect to the database at {target}: {source}")]
    CanNotConnectToDatabase {
        target: String,
        #[source]
        source: sqlx::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum MysqlError {
    #[error("MySQL error: {0}")]
    SqlxError(#[from] sqlx::Error),
}

fn mysql_connect_options(
    credentials: &DatabaseCredentials,
) -> Result<MySqlConnectOptions, MysqlConnectionError> {
    let host = credentials.host.as_deref().filter(|host| !host.is_empty());
    let user = credentials.username.as_deref().filter(|user| !user.is_empty());

    let mut options = MySqlConnectOptions::new()
        .host(host.ok_or(MysqlConnectionError::MissingParameter("host"))?)
        .username(user.ok_or(MysqlConnectionError::MissingParameter("username"))?)
        .port(credentials.port.unwrap_or(DEFAULT_PORT));

    if let Some(password) = &credentials.password {
        options = options.password(password);
    }
    if let Some(database) = &credentials.database {
        options = options.database(database);
    }

    Ok(options)
}

/// One multi-row INSERT with `?` placeholders.
pub fn generate_insert_sql(table_name: &str, column_names: &[String], row_count: usize) -> String {
    let row = format!("({})", vec!["?"; column_names.len()].join(", "));

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        QUOTE.quote_table_name(table_name),
        QUOTE.columns_names_sql(column_names),
        vec![row; row_count].join(",")
    )
}

/// How many rows fit in one INSERT without exceeding the placeholder limit.
pub fn rows_per_statement(column_count: usize) -> usize {
    (MAX_PLACEHOLDERS / column_count.max(1)).max(1)
}

pub struct MysqlClient {
    pool: MySqlPool,
}

impl MysqlClient {
    pub async fn new(credentials: &DatabaseCredentials) -> Result<Self, MysqlConnectionError> {
        let options = mysql_connect_options(credentials)?;
        let target = credentials.redacted_url();

        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|source| {
                error!("Error connecting to database {}: {}", target, source);
                MysqlConnectionError::CanNotConnectToDatabase { target: target.clone(), source }
            })?;

        if let Err(source) = sqlx::query("SELECT 1").execute(&pool).await {
            error!("Connection check against {} failed: {}", target, source);
            return Err(MysqlConnectionError::CanNotConnectToDatabase { target, source });
        }

        info!("Connected to {}", target);
        Ok(MysqlClient { pool })
    }

    /// Inserts every row inside one transaction, split into as few statements as the
    /// placeholder limit allows.
    pub async fn insert_bulk(&self, table_name: &str, row_set: &RowSet) -> Result<u64, MysqlError> {
        if row_set.is_empty() || row_set.columns().is_empty() {
            return Ok(0);
        }

        let column_names = row_set.column_names();
        let chunk_size = rows_per_statement(column_names.len());

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for chunk in row_set.rows().chunks(chunk_size) {
            let sql = generate_insert_sql(table_name, &column_names, chunk.len());
            debug!("Bulk insert of {} rows into {}", chunk.len(), table_name);

            let mut query = sqlx::query(&sql);
            for cell in chunk.iter().flatten() {
                query = query.bind(cell);
            }

            match query.execute(&mut *tx).await {
                Ok(result) => inserted += result.rows_affected(),
                Err(e) => {
                    error!("Failed to insert rows into {}: {}", table_name, e);
                    if let Err(rollback_error) = tx.rollback().await {
                        error!("Rollback of insert on {} failed: {}", table_name, rollback_error);
                    }
                    return Err(e.into());
                }
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

#[async_trait]
impl Destination for MysqlClient {
    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::Mysql
    }

    async fn delete_all(&self, table: &str) -> Result<u64, DestinationError> {
        let sql = QUOTE.delete_all_sql(table);
        let mut tx = self.pool.begin().await.map_err(MysqlError::from)?;

        match sqlx::query(&sql).execute(&mut *tx).await {
            Ok(result) => {
                tx.commit().await.map_err(MysqlError::from)?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                error!("Deleting rows of {} failed, rolling back: {}", table, e);
                if let Err(rollback_error) = tx.rollback().await {
                    error!("Rollback of delete on {} failed: {}", table, rollback_error);
                }
                Err(MysqlError::from(e).into())
            }
        }
    }

    async fn append(&self, table: &str, row_set: &RowSet) -> Result<u64, DestinationError> {
        Ok(self.insert_bulk(table, row_set).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> DatabaseCredentials {
        serde_json::from_value(serde_json::json!({
            "engine": "mysql+pymysql",
            "username": "etl",
            "password": "hunter2",
            "host": "db.internal",
            "port": "3307",
            "database": "analytics_db"
        }))
        .unwrap()
    }

    #[test]
    fn test_connect_options_from_credentials() {
        let options = mysql_connect_options(&credentials()).unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 3307);
        assert_eq!(options.get_username(), "etl");
        assert_eq!(options.get_database(), Some("analytics_db"));
    }

    #[test]
    fn test_connect_options_default_port() {
        let mut credentials = credentials();
        credentials.port = None;
        let options = mysql_connect_options(&credentials).unwrap();
        assert_eq!(options.get_port(), DEFAULT_PORT);
    }

    #[test]
    fn test_connect_options_require_host_and_username() {
        let mut without_host = credentials();
        without_host.host = Some(String::new());
        assert!(matches!(
            mysql_connect_options(&without_host),
            Err(MysqlConnectionError::MissingParameter("host"))
        ));

        let mut without_user = credentials();
        without_user.username = None;
        assert!(matches!(
            mysql_connect_options(&without_user),
            Err(MysqlConnectionError::MissingParameter("username"))
        ));
    }

    #[test]
    fn test_generate_insert_sql() {
        let columns = vec!["id".to_string(), "importe_EUR".to_string()];
        assert_eq!(
            generate_insert_sql("reporting.sales_table", &columns, 2),
            "INSERT INTO `reporting`.`sales_table` (`id`, `importe_EUR`) VALUES (?, ?),(?, ?)"
        );
    }

    #[test]
    fn test_rows_per_statement_stays_under_placeholder_limit() {
        assert_eq!(rows_per_statement(1), MAX_PLACEHOLDERS);
        assert_eq!(rows_per_statement(7), 9362);
        assert!(rows_per_statement(7) * 7 <= MAX_PLACEHOLDERS);
        assert_eq!(rows_per_statement(0), MAX_PLACEHOLDERS);
        assert_eq!(rows_per_statement(100_000), 1);
    }
}
