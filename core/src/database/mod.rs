use async_trait::async_trait;
use tracing::info;

use crate::{
    row_set::RowSet,
    secrets::{DatabaseCredentials, DatabaseEngine, UnsupportedEngine},
};

mod common_sql;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use common_sql::generate::{quote_identifier, quote_table_name, IdentifierQuote};
use mysql::{MysqlClient, MysqlConnectionError, MysqlError};
use postgres::{BulkInsertPostgresError, PostgresClient, PostgresConnectionError, PostgresError};
use sqlite::{SqliteClient, SqliteConnectionError, SqliteError};

#[derive(thiserror::Error, Debug)]
pub enum DestinationError {
    #[error("{0}")]
    Postgres(#[from] PostgresError),

    #[error("{0}")]
    PostgresBulkInsert(#[from] BulkInsertPostgresError),

    #[error("{0}")]
    Mysql(#[from] MysqlError),

    #[error("{0}")]
    Sqlite(#[from] SqliteError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConnectDestinationError {
    #[error("{0}")]
    UnsupportedEngine(#[from] UnsupportedEngine),

    #[error("{engine} credentials are missing `{parameter}`")]
    MissingParameter { engine: String, parameter: &'static str },

    #[error("{0}")]
    Postgres(#[from] PostgresConnectionError),

    #[error("{0}")]
    Mysql(#[from] MysqlConnectionError),

    #[error("{0}")]
    Sqlite(#[from] SqliteConnectionError),
}

/// A table store that can be emptied and appended to.
#[async_trait]
pub trait Destination: Send + Sync {
    fn engine(&self) -> DatabaseEngine;

    /// Removes every row of `table` in its own transaction, returning how many went.
    async fn delete_all(&self, table: &str) -> Result<u64, DestinationError>;

    /// Appends the whole row-set by column name, all or nothing.
    async fn append(&self, table: &str, row_set: &RowSet) -> Result<u64, DestinationError>;
}

pub async fn connect_destination(
    credentials: &DatabaseCredentials,
) -> Result<Box<dyn Destination>, ConnectDestinationError> {
    let engine = credentials.engine()?;
    info!("Connecting to {}", credentials.redacted_url());

    match engine {
        DatabaseEngine::Postgres => {
            let client = PostgresClient::new(credentials).await?;
            Ok(Box::new(client))
        }
        DatabaseEngine::Mysql => {
            let client = MysqlClient::new(credentials).await?;
            Ok(Box::new(client))
        }
        DatabaseEngine::Sqlite => {
            let path = credentials.database.as_deref().filter(|path| !path.is_empty()).ok_or(
                ConnectDestinationError::MissingParameter {
                    engine: credentials.engine.clone(),
                    parameter: "database",
                },
            )?;
            let client = SqliteClient::new(path).await?;
            Ok(Box::new(client))
        }
    }
}
