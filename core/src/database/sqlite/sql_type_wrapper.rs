use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rust_decimal::prelude::ToPrimitive;

use crate::row_set::CellValue;

impl ToSql for CellValue {
    /// Decimals are stored as REAL and dates as ISO `YYYY-MM-DD` text.
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(Value::Null),
            CellValue::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            CellValue::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            CellValue::Decimal(value) => match value.to_f64() {
                Some(real) => ToSqlOutput::Owned(Value::Real(real)),
                None => ToSqlOutput::Owned(Value::Text(value.to_string())),
            },
            CellValue::Date(value) => {
                ToSqlOutput::Owned(Value::Text(value.format("%Y-%m-%d").to_string()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;

    fn owned(cell: &CellValue) -> Value {
        match cell.to_sql().unwrap() {
            ToSqlOutput::Owned(value) => value,
            ToSqlOutput::Borrowed(value) => value.into(),
            _ => panic!("unexpected output"),
        }
    }

    #[test]
    fn test_cell_values_to_sqlite() {
        assert_eq!(owned(&CellValue::Null), Value::Null);
        assert_eq!(owned(&CellValue::Integer(7)), Value::Integer(7));
        assert_eq!(
            owned(&CellValue::Text("Madrid".to_string())),
            Value::Text("Madrid".to_string())
        );
        assert_eq!(
            owned(&CellValue::Decimal(Decimal::from_str("10.50").unwrap())),
            Value::Real(10.5)
        );
        assert_eq!(
            owned(&CellValue::Date(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap())),
            Value::Text("2025-01-31".to_string())
        );
    }
}
