use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// The raw 2D cell grid fetched from a worksheet, first row holds the headers.
pub type Grid = Vec<Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Decimal,
    Date,
}

impl ColumnKind {
    pub fn raw_name(&self) -> &'static str {
        match self {
            ColumnKind::Text => "Text",
            ColumnKind::Integer => "Integer",
            ColumnKind::Decimal => "Decimal",
            ColumnKind::Date => "Date",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// A single normalized cell. A non-null cell always matches the kind of its column.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDate),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Renders the cell the way it would appear in the source grid.
    pub fn to_grid_string(&self, date_format: &str) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Text(value) => value.clone(),
            CellValue::Integer(value) => value.to_string(),
            CellValue::Decimal(value) => value.to_string(),
            CellValue::Date(value) => value.format(date_format).to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Text(value) => write!(f, "{}", value),
            CellValue::Integer(value) => write!(f, "{}", value),
            CellValue::Decimal(value) => write!(f, "{}", value),
            CellValue::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
        }
    }
}

/// Typed, in-memory snapshot of a worksheet ready to be loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<Column>,
    rows: Vec<Vec<CellValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(index))
    }

    /// Renders the row-set back into a headed grid, nulls become empty strings.
    pub fn to_grid(&self, date_format: &str) -> Grid {
        if self.columns.is_empty() {
            return Vec::new();
        }

        let mut grid = Vec::with_capacity(self.rows.len() + 1);
        grid.push(self.column_names());
        for row in &self.rows {
            grid.push(row.iter().map(|cell| cell.to_grid_string(date_format)).collect());
        }
        grid
    }
}
