/// How a dialect delimits identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierQuote {
    /// `"name"`, used by Postgres and SQLite.
    Double,
    /// `` `name` ``, used by MySQL and MariaDB.
    Backtick,
}

impl IdentifierQuote {
    fn mark(self) -> char {
        match self {
            IdentifierQuote::Double => '"',
            IdentifierQuote::Backtick => '`',
        }
    }

    /// Wraps an identifier in the dialect's quote mark, doubling any embedded ones.
    pub fn quote(self, name: &str) -> String {
        let mark = self.mark();
        let escaped = name.replace(mark, &format!("{}{}", mark, mark));
        format!("{}{}{}", mark, escaped, mark)
    }

    /// Quotes a possibly schema-qualified table name part by part.
    pub fn quote_table_name(self, table_name: &str) -> String {
        table_name.split('.').map(|part| self.quote(part)).collect::<Vec<String>>().join(".")
    }

    pub fn columns_names_sql(self, column_names: &[String]) -> String {
        column_names.iter().map(|name| self.quote(name)).collect::<Vec<String>>().join(", ")
    }

    pub fn delete_all_sql(self, table_name: &str) -> String {
        format!("DELETE FROM {}", self.quote_table_name(table_name))
    }
}

/// Double-quotes an identifier, doubling any embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    IdentifierQuote::Double.quote(name)
}

/// Quotes a possibly schema-qualified table name part by part, `sales.madrid` becomes
/// `"sales"."madrid"`.
pub fn quote_table_name(table_name: &str) -> String {
    IdentifierQuote::Double.quote_table_name(table_name)
}

pub fn generate_columns_names_sql(column_names: &[String]) -> String {
    IdentifierQuote::Double.columns_names_sql(column_names)
}

pub fn generate_delete_all_sql(table_name: &str) -> String {
    IdentifierQuote::Double.delete_all_sql(table_name)
}
