use std::env::{self, VarError};

use dotenv::dotenv;
use tracing::debug;

use crate::normalize::NormalizationRules;

pub const ENV_PREFIX: &str = "SHEETS_REFRESH_";

pub fn public_read_env_value(var_name: &str) -> Result<String, VarError> {
    dotenv().ok();
    env::var(var_name)
}

/// Fixed identifiers of one deployment of the refresh job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    pub google_secret_id: String,
    pub spreadsheet_id: String,
    /// `None` reads the first worksheet.
    pub worksheet_name: Option<String>,
    pub db_secret_id: String,
    /// Key of the server entry inside the database secret.
    pub db_server_key: String,
    /// Overrides the database named in the secret, a file path for SQLite.
    pub db_name: String,
    pub target_table: String,
    pub aws_region: String,
    pub rules: NormalizationRules,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            google_secret_id: "google_service_account_secret".to_string(),
            spreadsheet_id: "your_spreadsheet_id".to_string(),
            worksheet_name: Some("Sales 2025".to_string()),
            db_secret_id: "db_credentials_secret".to_string(),
            db_server_key: "mysql_reporting".to_string(),
            db_name: "analytics_db".to_string(),
            target_table: "sales_table".to_string(),
            aws_region: "us-east-1".to_string(),
            rules: NormalizationRules::default(),
        }
    }
}

impl RefreshConfig {
    /// Defaults overridden by `SHEETS_REFRESH_*` variables from the environment or `.env`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| public_read_env_value(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str| {
            let name = format!("{}{}", ENV_PREFIX, suffix);
            let value = lookup(&name);
            if value.is_some() {
                debug!("Using {} from the environment", name);
            }
            value
        };

        let mut config = Self::default();

        if let Some(value) = read("GOOGLE_SECRET_ID") {
            config.google_secret_id = value;
        }
        if let Some(value) = read("SPREADSHEET_ID") {
            config.spreadsheet_id = value;
        }
        if let Some(value) = read("WORKSHEET") {
            let value = value.trim().to_string();
            config.worksheet_name = if value.is_empty() { None } else { Some(value) };
        }
        if let Some(value) = read("DB_SECRET_ID") {
            config.db_secret_id = value;
        }
        if let Some(value) = read("DB_SERVER") {
            config.db_server_key = value;
        }
        if let Some(value) = read("DB_NAME") {
            config.db_name = value;
        }
        if let Some(value) = read("TARGET_TABLE") {
            config.target_table = value;
        }
        if let Some(value) = read("AWS_REGION") {
            config.aws_region = value;
        }
        if let Some(value) = read("DATE_FORMAT") {
            config.rules.date_format = value;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(values: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> =
            values.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_overrides() {
        assert_eq!(RefreshConfig::from_lookup(lookup(&[])), RefreshConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = RefreshConfig::from_lookup(lookup(&[
            ("SHEETS_REFRESH_SPREADSHEET_ID", "1AbC"),
            ("SHEETS_REFRESH_DB_SERVER", "pg_reporting"),
            ("SHEETS_REFRESH_TARGET_TABLE", "reporting.sales"),
            ("SHEETS_REFRESH_DATE_FORMAT", "%Y-%m-%d"),
        ]));

        assert_eq!(config.spreadsheet_id, "1AbC");
        assert_eq!(config.db_server_key, "pg_reporting");
        assert_eq!(config.target_table, "reporting.sales");
        assert_eq!(config.rules.date_format, "%Y-%m-%d");
        assert_eq!(config.google_secret_id, "google_service_account_secret");
    }

    #[test]
    fn test_blank_worksheet_means_first() {
        let config = RefreshConfig::from_lookup(lookup(&[("SHEETS_REFRESH_WORKSHEET", "  ")]));
        assert_eq!(config.worksheet_name, None);
    }
}
