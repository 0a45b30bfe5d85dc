use tracing::{error, info, warn};

use crate::{
    database::{ConnectDestinationError, Destination, DestinationError},
    row_set::RowSet,
};

/// What a failed refresh left behind in the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// The delete never committed, previous rows are intact.
    Unchanged,
    /// The delete committed but the new rows did not land.
    LeftEmpty,
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("Could not connect to the destination database: {0}")]
    Connect(#[from] ConnectDestinationError),

    #[error("Could not clear table {table}: {source}")]
    Delete {
        table: String,
        #[source]
        source: DestinationError,
    },

    #[error("Table {table} was cleared but inserting the new rows failed: {source}")]
    Insert {
        table: String,
        #[source]
        source: DestinationError,
    },
}

impl LoadError {
    pub fn table_state(&self) -> TableState {
        match self {
            LoadError::Connect(_) | LoadError::Delete { .. } => TableState::Unchanged,
            LoadError::Insert { .. } => TableState::LeftEmpty,
        }
    }

    pub fn data_loss(&self) -> bool {
        self.table_state() == TableState::LeftEmpty
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub table: String,
    pub rows_deleted: u64,
    pub rows_inserted: u64,
}

/// Replaces the contents of `table` with `row_set`.
///
/// The delete commits on its own before the append starts, so a failed append leaves the
/// table empty. An empty row-set only clears the table.
pub async fn full_refresh(
    destination: &dyn Destination,
    table: &str,
    row_set: &RowSet,
) -> Result<LoadSummary, LoadError> {
    info!("Clearing table {} ({:?})", table, destination.engine());
    let rows_deleted = destination.delete_all(table).await.map_err(|source| {
        error!("Clearing table {} failed, it was left unchanged: {}", table, source);
        LoadError::Delete { table: table.to_string(), source }
    })?;
    info!("Deleted {} rows from {}", rows_deleted, table);

    if row_set.is_empty() || row_set.columns().is_empty() {
        warn!("No rows to insert, table {} is now empty", table);
        return Ok(LoadSummary { table: table.to_string(), rows_deleted, rows_inserted: 0 });
    }

    let rows_inserted = destination.append(table, row_set).await.map_err(|source| {
        error!(
            "Inserting into {} failed after it was cleared, the table is empty: {}",
            table, source
        );
        LoadError::Insert { table: table.to_string(), source }
    })?;
    info!("Inserted {} rows into {}", rows_inserted, table);

    Ok(LoadSummary { table: table.to_string(), rows_deleted, rows_inserted })
}
