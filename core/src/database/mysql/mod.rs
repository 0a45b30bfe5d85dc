mod client;
mod sql_type_wrapper;

pub use client::{
    generate_insert_sql, rows_per_statement, MysqlClient, MysqlConnectionError, MysqlError,
};
