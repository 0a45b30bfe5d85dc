use std::error::Error;

use bytes::BytesMut;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type as PgType};

use crate::row_set::{CellValue, ColumnKind};

type ToSqlResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

/// The postgres type a column of this kind maps to when nothing else is known.
pub fn column_kind_to_pg_type(kind: ColumnKind) -> PgType {
    match kind {
        ColumnKind::Text => PgType::TEXT,
        ColumnKind::Integer => PgType::INT8,
        ColumnKind::Decimal => PgType::NUMERIC,
        ColumnKind::Date => PgType::DATE,
    }
}

fn is_text_type(ty: &PgType) -> bool {
    [PgType::TEXT, PgType::VARCHAR, PgType::BPCHAR, PgType::NAME, PgType::UNKNOWN].contains(ty)
}

fn mismatch(value: &CellValue, ty: &PgType) -> Box<dyn Error + Sync + Send> {
    format!("can not write {} into a column of type {}", value, ty).into()
}

fn integer_to_sql(value: i64, ty: &PgType, out: &mut BytesMut) -> ToSqlResult {
    if *ty == PgType::INT2 {
        i16::try_from(value)?.to_sql(ty, out)
    } else if *ty == PgType::INT4 {
        i32::try_from(value)?.to_sql(ty, out)
    } else if *ty == PgType::NUMERIC {
        Decimal::from(value).to_sql(ty, out)
    } else if *ty == PgType::FLOAT8 {
        (value as f64).to_sql(ty, out)
    } else if *ty == PgType::FLOAT4 {
        (value as f32).to_sql(ty, out)
    } else if is_text_type(ty) {
        value.to_string().to_sql(ty, out)
    } else {
        value.to_sql(ty, out)
    }
}

fn decimal_to_sql(value: &Decimal, ty: &PgType, out: &mut BytesMut) -> ToSqlResult {
    if *ty == PgType::FLOAT8 {
        value.to_f64().ok_or("decimal out of range for float8")?.to_sql(ty, out)
    } else if *ty == PgType::FLOAT4 {
        value.to_f32().ok_or("decimal out of range for float4")?.to_sql(ty, out)
    } else if [PgType::INT2, PgType::INT4, PgType::INT8].contains(ty) {
        if !value.fract().is_zero() {
            return Err(format!("{} has a fractional part, column type is {}", value, ty).into());
        }
        let integer = value.to_i64().ok_or("decimal out of range for an integer column")?;
        integer_to_sql(integer, ty, out)
    } else if is_text_type(ty) {
        value.to_string().to_sql(ty, out)
    } else {
        value.to_sql(ty, out)
    }
}

fn date_to_sql(value: &NaiveDate, ty: &PgType, out: &mut BytesMut) -> ToSqlResult {
    if *ty == PgType::TIMESTAMP {
        NaiveDateTime::new(*value, NaiveTime::MIN).to_sql(ty, out)
    } else if *ty == PgType::TIMESTAMPTZ {
        Utc.from_utc_datetime(&NaiveDateTime::new(*value, NaiveTime::MIN)).to_sql(ty, out)
    } else if is_text_type(ty) {
        value.format("%Y-%m-%d").to_string().to_sql(ty, out)
    } else {
        value.to_sql(ty, out)
    }
}

fn text_to_sql(value: &CellValue, text: &str, ty: &PgType, out: &mut BytesMut) -> ToSqlResult {
    if is_text_type(ty) || *ty == PgType::JSON || *ty == PgType::JSONB {
        return text.to_sql(ty, out);
    }

    let trimmed = text.trim();
    if [PgType::INT2, PgType::INT4, PgType::INT8].contains(ty) {
        let integer: i64 = trimmed.parse().map_err(|_| mismatch(value, ty))?;
        integer_to_sql(integer, ty, out)
    } else if [PgType::NUMERIC, PgType::FLOAT4, PgType::FLOAT8].contains(ty) {
        let decimal: Decimal = trimmed.parse().map_err(|_| mismatch(value, ty))?;
        decimal_to_sql(&decimal, ty, out)
    } else if *ty == PgType::BOOL {
        let flag: bool = trimmed.to_lowercase().parse().map_err(|_| mismatch(value, ty))?;
        flag.to_sql(ty, out)
    } else {
        Err(mismatch(value, ty))
    }
}

impl ToSql for CellValue {
    /// Writes the cell in the wire format of the destination column, so an integer cell can
    /// land in an `int4` column and a date cell in a `timestamp` one.
    fn to_sql(&self, ty: &PgType, out: &mut BytesMut) -> ToSqlResult {
        match self {
            CellValue::Null => Ok(IsNull::Yes),
            CellValue::Text(text) => text_to_sql(self, text, ty, out),
            CellValue::Integer(value) => integer_to_sql(*value, ty, out),
            CellValue::Decimal(value) => decimal_to_sql(value, ty, out),
            CellValue::Date(value) => date_to_sql(value, ty, out),
        }
    }

    fn accepts(_ty: &PgType) -> bool {
        true // conversion is decided per column type in to_sql
    }

    to_sql_checked!();
}
