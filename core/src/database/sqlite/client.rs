use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection};
use tokio::task;
use tracing::{debug, error, info};

use crate::{
    database::{
        common_sql::generate::{
            generate_columns_names_sql, generate_delete_all_sql, quote_table_name,
        },
        Destination, DestinationError,
    },
    row_set::RowSet,
    secrets::DatabaseEngine,
};

#[derive(thiserror::Error, Debug)]
pub enum SqliteConnectionError {
    #[error("Could not create the directory for SQLite database {path}: {source}")]
    CouldNotCreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Can not open SQLite database {path}: {source}")]
    CanNotConnectToDatabase {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQLite setup task failed: {0}")]
    BlockingTaskFailed(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SqliteError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("SQLite task failed: {0}")]
    BlockingTaskFailed(String),
}

/// `INSERT` for one row with `?n` placeholders.
pub fn generate_insert_sql(table_name: &str, column_names: &[String]) -> String {
    let placeholders =
        (1..=column_names.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_table_name(table_name),
        generate_columns_names_sql(column_names),
        placeholders
    )
}

fn open_connection(db_path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    Ok(conn)
}

/// SQLite destination. Every call opens its own connection on the blocking pool.
pub struct SqliteClient {
    db_path: PathBuf,
}

impl SqliteClient {
    pub async fn new(db_path: impl Into<PathBuf>) -> Result<Self, SqliteConnectionError> {
        let db_path = db_path.into();
        info!("Connecting to SQLite database at: {}", db_path.display());

        let path = db_path.clone();
        task::spawn_blocking(move || {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                if !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|source| {
                        error!(
                            "Failed to create parent directories for SQLite database: {}",
                            source
                        );
                        SqliteConnectionError::CouldNotCreateDirectory {
                            path: parent.display().to_string(),
                            source,
                        }
                    })?;
                }
            }

            open_connection(&path).map_err(|source| {
                error!("Error connecting to SQLite database: {}", source);
                SqliteConnectionError::CanNotConnectToDatabase {
                    path: path.display().to_string(),
                    source,
                }
            })?;

            Ok::<(), SqliteConnectionError>(())
        })
        .await
        .map_err(|e| SqliteConnectionError::BlockingTaskFailed(e.to_string()))??;

        info!("Successfully connected to SQLite database");
        Ok(SqliteClient { db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T, SqliteError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        task::spawn_blocking(move || {
            let mut conn = open_connection(&db_path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| SqliteError::BlockingTaskFailed(e.to_string()))?
        .map_err(SqliteError::SqliteError)
    }

    pub async fn batch_execute(&self, sql: &str) -> Result<(), SqliteError> {
        let sql = sql.to_string();
        self.run_blocking(move |conn| conn.execute_batch(&sql)).await
    }

    /// Inserts every row inside one transaction, any failing row rolls the whole batch back.
    pub async fn insert_bulk(
        &self,
        table_name: &str,
        row_set: &RowSet,
    ) -> Result<u64, SqliteError> {
        if row_set.is_empty() || row_set.columns().is_empty() {
            return Ok(0);
        }

        let query = generate_insert_sql(table_name, &row_set.column_names());
        let rows = row_set.rows().to_vec();
        let table_name = table_name.to_string();
        debug!("Bulk insert statement: {}", query);

        self.run_blocking(move |conn| {
            let transaction = conn.transaction()?;

            let inserted = {
                let mut statement = transaction.prepare(&query)?;
                let mut inserted = 0u64;
                for row in &rows {
                    if let Err(e) = statement.execute(params_from_iter(row.iter())) {
                        error!("Failed to insert row into {}: {}", table_name, e);
                        return Err(e);
                    }
                    inserted += 1;
                }
                inserted
            };

            transaction.commit()?;
            Ok(inserted)
        })
        .await
    }
}

#[async_trait]
impl Destination for SqliteClient {
    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::Sqlite
    }

    async fn delete_all(&self, table: &str) -> Result<u64, DestinationError> {
        let query = generate_delete_all_sql(table);
        let table = table.to_string();

        let deleted = self
            .run_blocking(move |conn| {
                let transaction = conn.transaction()?;
                match transaction.execute(&query, []) {
                    Ok(count) => {
                        transaction.commit()?;
                        Ok(count as u64)
                    }
                    Err(e) => {
                        error!("Deleting rows of {} failed, rolling back: {}", table, e);
                        if let Err(rollback_error) = transaction.rollback() {
                            error!("Rollback of delete on {} failed: {}", table, rollback_error);
                        }
                        Err(e)
                    }
                }
            })
            .await?;

        Ok(deleted)
    }

    async fn append(&self, table: &str, row_set: &RowSet) -> Result<u64, DestinationError> {
        Ok(self.insert_bulk(table, row_set).await?)
    }
}
