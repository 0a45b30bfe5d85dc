use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::{
    auth::{
        fetch_access_token, ServiceAccountKey, DRIVE_READONLY_SCOPE, SPREADSHEETS_READONLY_SCOPE,
    },
    SourceError,
};
use crate::row_set::Grid;

pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com/";

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    // omitted entirely when the worksheet is empty
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// A1 range covering a whole worksheet, quotes in the title are doubled.
fn whole_sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pads every row with empty cells up to the widest row.
fn pad_rows(mut grid: Grid) -> Grid {
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    for row in grid.iter_mut() {
        row.resize(width, String::new());
    }
    grid
}

/// Read-only client for the Sheets v4 values API.
pub struct SheetsClient {
    http: Client,
    base_url: Url,
    access_token: String,
}

impl SheetsClient {
    pub fn new(
        http: Client,
        base_url: &str,
        access_token: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SourceError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self { http, base_url, access_token: access_token.into() })
    }

    /// Exchanges the service account key for a read-only access token.
    pub async fn authorize(
        http: Client,
        base_url: &str,
        key: &ServiceAccountKey,
    ) -> Result<Self, SourceError> {
        let token =
            fetch_access_token(&http, key, &[SPREADSHEETS_READONLY_SCOPE, DRIVE_READONLY_SCOPE])
                .await?;
        info!("Authorized sheets access as {}", key.client_email);
        Self::new(http, base_url, token)
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str, extra: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id])
            .extend(extra);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        spreadsheet_id: &str,
    ) -> Result<T, SourceError> {
        debug!("GET {}", url);
        let response = self.http.get(url).bearer_auth(&self.access_token).send().await?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(SourceError::Unauthorized(format!(
                    "sheets API answered {} for spreadsheet {}",
                    status, spreadsheet_id
                )))
            }
            StatusCode::NOT_FOUND => {
                Err(SourceError::SpreadsheetNotFound(spreadsheet_id.to_string()))
            }
            _ if !status.is_success() => Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
            _ => Ok(response.json::<T>().await?),
        }
    }

    pub async fn worksheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, SourceError> {
        let mut url = self.spreadsheet_url(spreadsheet_id, &[])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties.title");

        let metadata: SpreadsheetMetadata = self.get_json(url, spreadsheet_id).await?;
        Ok(metadata.sheets.into_iter().map(|sheet| sheet.properties.title).collect())
    }

    /// Fetches every cell of the named worksheet, or of the first one when `worksheet` is `None`.
    pub async fn fetch_grid(
        &self,
        spreadsheet_id: &str,
        worksheet: Option<&str>,
    ) -> Result<Grid, SourceError> {
        let titles = self.worksheet_titles(spreadsheet_id).await?;

        let title = match worksheet {
            Some(name) => titles.iter().find(|title| title.as_str() == name).ok_or_else(|| {
                SourceError::WorksheetNotFound {
                    spreadsheet_id: spreadsheet_id.to_string(),
                    worksheet: name.to_string(),
                }
            })?,
            None => titles
                .first()
                .ok_or_else(|| SourceError::NoWorksheets(spreadsheet_id.to_string()))?,
        };

        let range = whole_sheet_range(title);
        let mut url = self.spreadsheet_url(spreadsheet_id, &["values", range.as_str()])?;
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");

        let value_range: ValueRange = self.get_json(url, spreadsheet_id).await?;
        let grid = pad_rows(
            value_range
                .values
                .into_iter()
                .map(|row| row.into_iter().map(cell_to_string).collect())
                .collect(),
        );

        info!(
            "Loaded {} rows from worksheet '{}' (spreadsheet_id='{}')",
            grid.len(),
            title,
            spreadsheet_id
        );
        Ok(grid)
    }
}
