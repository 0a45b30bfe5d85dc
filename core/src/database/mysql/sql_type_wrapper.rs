use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    mysql::{MySql, MySqlTypeInfo},
    Database, Encode, Type,
};

use crate::row_set::CellValue;

impl Type<MySql> for CellValue {
    fn type_info() -> MySqlTypeInfo {
        <str as Type<MySql>>::type_info()
    }

    /// Every cell is bound with its own type through `produces`.
    fn compatible(_ty: &MySqlTypeInfo) -> bool {
        true
    }
}

impl<'q> Encode<'q, MySql> for CellValue {
    fn encode_by_ref(
        &self,
        buf: &mut <MySql as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        match self {
            CellValue::Null => Ok(IsNull::Yes),
            CellValue::Text(value) => <String as Encode<'q, MySql>>::encode_by_ref(value, buf),
            CellValue::Integer(value) => <i64 as Encode<'q, MySql>>::encode_by_ref(value, buf),
            CellValue::Decimal(value) => {
                <Decimal as Encode<'q, MySql>>::encode_by_ref(value, buf)
            }
            CellValue::Date(value) => <NaiveDate as Encode<'q, MySql>>::encode_by_ref(value, buf),
        }
    }

    fn produces(&self) -> Option<MySqlTypeInfo> {
        Some(match self {
            CellValue::Null | CellValue::Text(_) => <str as Type<MySql>>::type_info(),
            CellValue::Integer(_) => <i64 as Type<MySql>>::type_info(),
            CellValue::Decimal(_) => <Decimal as Type<MySql>>::type_info(),
            CellValue::Date(_) => <NaiveDate as Type<MySql>>::type_info(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn encode(cell: &CellValue) -> (bool, Vec<u8>) {
        let mut buf = Vec::new();
        let is_null = <CellValue as Encode<MySql>>::encode_by_ref(cell, &mut buf).unwrap();
        (matches!(is_null, IsNull::Yes), buf)
    }

    fn expected<'q, T: Encode<'q, MySql>>(value: &T) -> (bool, Vec<u8>) {
        let mut buf = Vec::new();
        let is_null = value.encode_by_ref(&mut buf).unwrap();
        (matches!(is_null, IsNull::Yes), buf)
    }

    fn produces(cell: &CellValue) -> Option<MySqlTypeInfo> {
        <CellValue as Encode<MySql>>::produces(cell)
    }

    #[test]
    fn test_null_is_sent_as_null() {
        assert_eq!(encode(&CellValue::Null), (true, Vec::new()));
    }

    #[test]
    fn test_cells_encode_like_their_inner_values() {
        let amount = Decimal::from_str("1234.50").unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();

        assert_eq!(encode(&CellValue::Integer(42)), expected(&42i64));
        assert_eq!(encode(&CellValue::Decimal(amount)), expected(&amount));
        assert_eq!(encode(&CellValue::Date(date)), expected(&date));
        assert_eq!(
            encode(&CellValue::Text("Madrid".to_string())),
            expected(&"Madrid".to_string())
        );
    }

    #[test]
    fn test_cells_declare_their_own_type() {
        assert_eq!(produces(&CellValue::Integer(1)), Some(<i64 as Type<MySql>>::type_info()));
        assert_eq!(
            produces(&CellValue::Decimal(Decimal::ONE)),
            Some(<Decimal as Type<MySql>>::type_info())
        );
        assert_eq!(
            produces(&CellValue::Date(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap())),
            Some(<NaiveDate as Type<MySql>>::type_info())
        );
        assert_eq!(produces(&CellValue::Null), Some(<str as Type<MySql>>::type_info()));
    }
}
