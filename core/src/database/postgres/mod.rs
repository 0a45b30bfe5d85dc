mod client;
mod sql_type_wrapper;

pub use client::{
    generate_insert_sql, BulkInsertPostgresError, PostgresClient, PostgresConnectionError,
    PostgresError, PostgresTransaction,
};
pub use sql_type_wrapper::column_kind_to_pg_type;
