mod auth;
mod client;

pub use auth::{
    fetch_access_token, resolve_service_account_key, ServiceAccountKey, DRIVE_READONLY_SCOPE,
    SPREADSHEETS_READONLY_SCOPE,
};
pub use client::{SheetsClient, DEFAULT_SHEETS_API_URL};

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("Not authorized to read spreadsheet data: {0}")]
    Unauthorized(String),

    #[error("Spreadsheet {0} does not exist or is not shared with the service account")]
    SpreadsheetNotFound(String),

    #[error("Worksheet {worksheet} not found in spreadsheet {spreadsheet_id}")]
    WorksheetNotFound { spreadsheet_id: String, worksheet: String },

    #[error("Spreadsheet {0} has no worksheets")]
    NoWorksheets(String),

    #[error("Service account key is invalid: {0}")]
    InvalidServiceAccount(String),

    #[error("Invalid sheets API url: {0}")]
    InvalidUrl(String),

    #[error("Sheets API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Sheets API answered {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}
