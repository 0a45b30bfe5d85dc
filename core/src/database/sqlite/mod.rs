mod client;
mod sql_type_wrapper;

pub use client::{generate_insert_sql, SqliteClient, SqliteConnectionError, SqliteError};
