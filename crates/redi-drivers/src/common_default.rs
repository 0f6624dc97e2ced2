//! Renders a schema-IR `@default(...)` literal (§4.2) to a dialect's SQL
//! `DEFAULT` clause text. Split out from `dialect::format_value` because it
//! operates on `redi_schema::LiteralValue`, not the driver's own `Value`.

use redi_core::DialectKind;
use redi_schema::LiteralValue;

pub fn literal_to_sql(literal: &LiteralValue, dialect: DialectKind) -> String {
    match literal {
        LiteralValue::String(s) | LiteralValue::EnumValue(s) => quote(s, dialect),
        LiteralValue::Int(i) => i.to_string(),
        LiteralValue::Float(f) => f.to_string(),
        LiteralValue::Bool(b) => match dialect {
            DialectKind::Postgres => if *b { "TRUE" } else { "FALSE" }.to_string(),
            _ => if *b { "1" } else { "0" }.to_string(),
        },
        LiteralValue::List(items) => {
            let rendered: Vec<String> = items.iter().map(|i| literal_to_sql(i, dialect)).collect();
            quote(&format!("[{}]", rendered.join(",")), dialect)
        }
    }
}

fn quote(s: &str, _dialect: DialectKind) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
