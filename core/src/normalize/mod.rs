mod parsers;
mod rules;

pub use parsers::{is_blank, parse_currency, parse_date, parse_identifier};
pub use rules::{ColumnRule, NormalizationRules, DEFAULT_DATE_FORMAT};
use tracing::{debug, info, warn};

use crate::row_set::{CellValue, Column, RowSet};

fn apply_rule(rule: ColumnRule, raw: &str, rules: &NormalizationRules) -> CellValue {
    match rule {
        ColumnRule::Currency => parse_currency(raw).map_or(CellValue::Null, CellValue::Decimal),
        ColumnRule::Integer => parse_identifier(raw).map_or(CellValue::Null, CellValue::Integer),
        ColumnRule::Date => {
            parse_date(raw, &rules.date_format).map_or(CellValue::Null, CellValue::Date)
        }
        ColumnRule::Blankable => {
            if is_blank(raw) {
                CellValue::Null
            } else {
                CellValue::Text(raw.to_string())
            }
        }
        ColumnRule::PassThrough => CellValue::Text(raw.to_string()),
    }
}

/// Turns a raw worksheet grid into a typed row-set.
///
/// The first row is the header. An empty grid gives an empty row-set with no columns. Columns
/// the rules expect but the sheet lacks are skipped, columns the rules do not know pass through
/// as text. Values that fail to coerce become nulls, this never errors.
pub fn normalize(grid: &[Vec<String>], rules: &NormalizationRules) -> RowSet {
    let Some((header, records)) = grid.split_first() else {
        info!("Grid has no header row, nothing to normalize");
        return RowSet::empty();
    };

    for expected in rules.expected_columns() {
        if !header.iter().any(|name| name == expected) {
            info!("Column {} not present in sheet, skipping its rule", expected);
        }
    }

    let column_rules: Vec<ColumnRule> = header.iter().map(|name| rules.rule_for(name)).collect();
    let columns: Vec<Column> = header
        .iter()
        .zip(&column_rules)
        .map(|(name, rule)| Column::new(name.clone(), rule.kind()))
        .collect();

    let mut coerced_to_null = vec![0usize; header.len()];
    let mut rows = Vec::with_capacity(records.len());

    for (row_number, record) in records.iter().enumerate() {
        if record.len() > header.len() {
            debug!(
                "Row {} has {} cells but only {} headers, extra cells dropped",
                row_number + 2,
                record.len(),
                header.len()
            );
        }

        let mut cells = Vec::with_capacity(header.len());
        for (index, rule) in column_rules.iter().enumerate() {
            let raw = record.get(index).map(String::as_str).unwrap_or_default();
            let value = apply_rule(*rule, raw, rules);
            if value.is_null() && !is_blank(raw) {
                coerced_to_null[index] += 1;
            }
            cells.push(value);
        }
        rows.push(cells);
    }

    for (column, count) in columns.iter().zip(coerced_to_null) {
        if count > 0 {
            warn!(
                "{} value(s) in column {} could not be read as {} and were set to null",
                count,
                column.name,
                column.kind.raw_name()
            );
        }
    }

    info!("Normalized {} rows across {} columns", rows.len(), columns.len());
    RowSet::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;
    use crate::row_set::ColumnKind;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter().map(|row| row.iter().map(|cell| cell.to_string()).collect()).collect()
    }

    #[test]
    fn test_empty_grid_has_no_columns() {
        let row_set = normalize(&[], &NormalizationRules::default());
        assert!(row_set.columns().is_empty());
        assert!(row_set.is_empty());
    }

    #[test]
    fn test_header_only_grid_keeps_columns() {
        let row_set = normalize(&grid(&[&["id", "importe_EUR", "notes"]]), &Default::default());
        assert_eq!(row_set.column_names(), vec!["id", "importe_EUR", "notes"]);
        assert_eq!(row_set.column("id").unwrap().kind, ColumnKind::Integer);
        assert_eq!(row_set.len(), 0);
    }

    #[test]
    fn test_currency_and_identifier_scenario() {
        let row_set = normalize(
            &grid(&[&["id", "importe_EUR"], &["1", "10,50€"], &["2", ""]]),
            &NormalizationRules::default(),
        );

        assert_eq!(
            row_set.rows(),
            &[
                vec![
                    CellValue::Integer(1),
                    CellValue::Decimal(Decimal::from_str("10.50").unwrap()),
                ],
                vec![CellValue::Integer(2), CellValue::Null],
            ]
        );
    }

    #[test]
    fn test_thousands_currency() {
        let row_set = normalize(&grid(&[&["importe_EUR"], &["1,234€"]]), &Default::default());
        assert_eq!(
            row_set.get(0, "importe_EUR"),
            Some(&CellValue::Decimal(Decimal::from_str("1234.00").unwrap()))
        );
    }

    #[test]
    fn test_whitespace_identifier_is_null() {
        let row_set =
            normalize(&grid(&[&["id_cliente", "id"], &["   ", " "]]), &Default::default());
        assert_eq!(row_set.get(0, "id_cliente"), Some(&CellValue::Null));
        assert_eq!(row_set.get(0, "id"), Some(&CellValue::Null));
    }

    #[test]
    fn test_dates() {
        let row_set = normalize(
            &grid(&[&["fecha", "fecha_de_envio"], &["05/03/2025", "not-a-date"]]),
            &Default::default(),
        );
        assert_eq!(
            row_set.get(0, "fecha"),
            Some(&CellValue::Date(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()))
        );
        assert_eq!(row_set.get(0, "fecha_de_envio"), Some(&CellValue::Null));
    }

    #[test]
    fn test_blankable_and_pass_through_columns() {
        let row_set = normalize(
            &grid(&[&["estado", "observaciones", "extra"], &["  ", " ok ", "  "]]),
            &Default::default(),
        );
        assert_eq!(row_set.get(0, "estado"), Some(&CellValue::Null));
        assert_eq!(row_set.get(0, "observaciones"), Some(&CellValue::Text(" ok ".to_string())));
        assert_eq!(row_set.get(0, "extra"), Some(&CellValue::Text("  ".to_string())));
        assert_eq!(row_set.column("extra").unwrap().kind, ColumnKind::Text);
    }

    #[test]
    fn test_ragged_rows_are_padded_and_truncated() {
        let row_set = normalize(
            &grid(&[&["id", "estado"], &["1"], &["2", "enviado", "surplus"]]),
            &Default::default(),
        );
        assert_eq!(row_set.rows()[0], vec![CellValue::Integer(1), CellValue::Null]);
        assert_eq!(
            row_set.rows()[1],
            vec![CellValue::Integer(2), CellValue::Text("enviado".to_string())]
        );
    }

    #[test]
    fn test_normalize_is_idempotent_through_grid() {
        let rules = NormalizationRules::default();
        let first = normalize(
            &grid(&[
                &["id", "id_cliente", "importe_EUR", "fecha", "estado", "extra"],
                &["1", "77", "1,234€", "05/03/2025", "pagado", "x"],
                &["2", "  ", "", "bad", " ", ""],
                &["3", "8", "10,50€", "31/12/2024", "enviado", "y"],
            ]),
            &rules,
        );

        let second = normalize(&first.to_grid(&rules.date_format), &rules);
        assert_eq!(first, second);
    }
}
