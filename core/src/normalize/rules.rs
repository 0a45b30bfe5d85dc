use crate::row_set::ColumnKind;

pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

const SALES_BLANKABLE_COLUMNS: &[&str] = &[
    "estado",
    "tipo_de_venta",
    "vendedor_email",
    "nombre_cliente",
    "telefono_cliente",
    "servicio_o_producto",
    "linea_de_negocio",
    "item_type",
    "numero_de_pedido",
    "id_pago",
    "id_orden",
    "forma_de_pago",
    "observaciones",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRule {
    Currency,
    Integer,
    Date,
    Blankable,
    PassThrough,
}

impl ColumnRule {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnRule::Currency => ColumnKind::Decimal,
            ColumnRule::Integer => ColumnKind::Integer,
            ColumnRule::Date => ColumnKind::Date,
            ColumnRule::Blankable | ColumnRule::PassThrough => ColumnKind::Text,
        }
    }
}

/// Which columns get coerced and how. A column named by more than one list takes the first
/// match in the order currency, integer, date, blankable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationRules {
    pub currency_columns: Vec<String>,
    pub integer_columns: Vec<String>,
    pub date_columns: Vec<String>,
    pub date_format: String,
    pub blankable_columns: Vec<String>,
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for NormalizationRules {
    fn default() -> Self {
        Self {
            currency_columns: to_strings(&["importe_EUR"]),
            integer_columns: to_strings(&["id_cliente", "id"]),
            date_columns: to_strings(&["fecha", "fecha_de_envio"]),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            blankable_columns: to_strings(SALES_BLANKABLE_COLUMNS),
        }
    }
}

impl NormalizationRules {
    /// Rules that leave every column as raw text.
    pub fn pass_through() -> Self {
        Self {
            currency_columns: vec![],
            integer_columns: vec![],
            date_columns: vec![],
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            blankable_columns: vec![],
        }
    }

    pub fn rule_for(&self, column: &str) -> ColumnRule {
        let named = |columns: &[String]| columns.iter().any(|c| c == column);

        if named(&self.currency_columns) {
            ColumnRule::Currency
        } else if named(&self.integer_columns) {
            ColumnRule::Integer
        } else if named(&self.date_columns) {
            ColumnRule::Date
        } else if named(&self.blankable_columns) {
            ColumnRule::Blankable
        } else {
            ColumnRule::PassThrough
        }
    }

    /// Every column some rule refers to, in rule order without duplicates.
    pub fn expected_columns(&self) -> Vec<&str> {
        let mut expected: Vec<&str> = Vec::new();
        for column in self
            .currency_columns
            .iter()
            .chain(&self.integer_columns)
            .chain(&self.date_columns)
            .chain(&self.blankable_columns)
        {
            if !expected.contains(&column.as_str()) {
                expected.push(column.as_str());
            }
        }
        expected
    }
}
