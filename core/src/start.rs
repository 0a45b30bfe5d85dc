use reqwest::Client;
use tracing::{error, info};

use crate::{
    config::RefreshConfig,
    database::connect_destination,
    loader::{full_refresh, LoadError, TableState},
    normalize::normalize,
    secrets::{AwsSecretsManager, ConnectionResolver, SecretError, SecretStore},
    sheets::{resolve_service_account_key, SheetsClient, SourceError, DEFAULT_SHEETS_API_URL},
};

#[derive(thiserror::Error, Debug)]
pub enum RefreshError {
    #[error("Secret unavailable: {0}")]
    SecretUnavailable(#[from] SecretError),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("Load failed: {0}")]
    LoadFailed(#[from] LoadError),
}

impl RefreshError {
    /// The destination table was cleared and not refilled.
    pub fn data_loss(&self) -> bool {
        matches!(self, RefreshError::LoadFailed(e) if e.data_loss())
    }

    pub fn table_state(&self) -> Option<TableState> {
        match self {
            RefreshError::LoadFailed(e) => Some(e.table_state()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub table: String,
    pub rows_fetched: usize,
    pub rows_deleted: u64,
    pub rows_loaded: u64,
}

/// One full-refresh run with its external dependencies supplied by the caller.
pub struct FullRefreshJob<'a> {
    pub config: &'a RefreshConfig,
    pub secrets: &'a dyn SecretStore,
    pub http: Client,
    pub sheets_api_url: String,
}

impl<'a> FullRefreshJob<'a> {
    pub fn new(config: &'a RefreshConfig, secrets: &'a dyn SecretStore, http: Client) -> Self {
        Self { config, secrets, http, sheets_api_url: DEFAULT_SHEETS_API_URL.to_string() }
    }

    pub fn with_sheets_api_url(mut self, url: impl Into<String>) -> Self {
        self.sheets_api_url = url.into();
        self
    }

    pub async fn run(&self) -> Result<RefreshSummary, RefreshError> {
        let config = self.config;

        let key = resolve_service_account_key(self.secrets, &config.google_secret_id).await?;
        let sheets = SheetsClient::authorize(self.http.clone(), &self.sheets_api_url, &key)
            .await
            .map_err(|e| {
                error!("Could not authorize sheets access as {}: {}", key.client_email, e);
                e
            })?;

        let grid = sheets
            .fetch_grid(&config.spreadsheet_id, config.worksheet_name.as_deref())
            .await
            .map_err(|e| {
                error!("Could not read spreadsheet {}: {}", config.spreadsheet_id, e);
                e
            })?;
        let rows_fetched = grid.len().saturating_sub(1);

        let row_set = normalize(&grid, &config.rules);

        let mut resolver = ConnectionResolver::new(self.secrets, config.db_secret_id.as_str());
        let credentials =
            resolver.resolve(&config.db_server_key).await?.with_database(config.db_name.as_str());

        let destination = connect_destination(&credentials).await.map_err(|e| {
            error!("Could not connect to {}: {}", credentials.redacted_url(), e);
            LoadError::from(e)
        })?;

        let summary = full_refresh(destination.as_ref(), &config.target_table, &row_set).await?;

        info!(
            "Full refresh of {} complete: {} rows fetched, {} deleted, {} loaded",
            summary.table, rows_fetched, summary.rows_deleted, summary.rows_inserted
        );

        Ok(RefreshSummary {
            table: summary.table,
            rows_fetched,
            rows_deleted: summary.rows_deleted,
            rows_loaded: summary.rows_inserted,
        })
    }
}

/// Runs the job against AWS Secrets Manager and the public Sheets API.
pub async fn run_full_refresh(config: &RefreshConfig) -> Result<RefreshSummary, RefreshError> {
    info!(
        "Starting full refresh of {} from spreadsheet {}",
        config.target_table, config.spreadsheet_id
    );

    let secrets = AwsSecretsManager::new(&config.aws_region).await;
    let result = FullRefreshJob::new(config, &secrets, Client::new()).run().await;

    if let Err(e) = &result {
        if e.data_loss() {
            error!("Table {} was left empty by a failed refresh", config.target_table);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{database::DestinationError, database::sqlite::SqliteError};

    #[test]
    fn test_data_loss_only_for_insert_failures() {
        let insert = RefreshError::from(LoadError::Insert {
            table: "sales_table".to_string(),
            source: DestinationError::Sqlite(SqliteError::BlockingTaskFailed("x".to_string())),
        });
        assert!(insert.data_loss());
        assert_eq!(insert.table_state(), Some(TableState::LeftEmpty));

        let delete = RefreshError::from(LoadError::Delete {
            table: "sales_table".to_string(),
            source: DestinationError::Sqlite(SqliteError::BlockingTaskFailed("x".to_string())),
        });
        assert!(!delete.data_loss());
        assert_eq!(delete.table_state(), Some(TableState::Unchanged));

        let secret = RefreshError::from(SecretError::NotFound("google".to_string()));
        assert!(!secret.data_loss());
        assert_eq!(secret.table_state(), None);
    }
}
