mod config;
pub use config::{public_read_env_value, RefreshConfig, ENV_PREFIX};

pub mod database;
pub use database::{connect_destination, ConnectDestinationError, Destination, DestinationError};

mod loader;
pub use loader::{full_refresh, LoadError, LoadSummary, TableState};

mod logger;
pub use logger::{setup_info_logger, setup_logger};

pub mod normalize;
pub use normalize::{normalize, NormalizationRules};

mod row_set;
pub use row_set::{CellValue, Column, ColumnKind, Grid, RowSet};

pub mod secrets;

pub mod sheets;

mod start;
pub use start::{run_full_refresh, FullRefreshJob, RefreshError, RefreshSummary};

pub use async_trait::async_trait;
pub use tracing::level_filters::LevelFilter;
