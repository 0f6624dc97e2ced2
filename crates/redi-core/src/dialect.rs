//! Identifier quoting and value-literal formatting, owned per dialect (§4.4:
//! "the query builder emits raw identifiers and defers quoting to the
//! driver"). Generalizes the teacher's `engine/sql_generator.rs::SqlDialect`.

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectKind {
    Sqlite,
    MySql,
    Postgres,
    MongoDb,
}

impl DialectKind {
    /// `?` for MySQL/SQLite, `$N` for PostgreSQL; Mongo has no placeholder
    /// concept and callers should not ask for one.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            DialectKind::Sqlite | DialectKind::MySql => "?".to_string(),
            DialectKind::Postgres => format!("${index}"),
            DialectKind::MongoDb => String::new(),
        }
    }

    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            DialectKind::Postgres | DialectKind::Sqlite => {
                format!("\"{}\"", name.replace('"', "\"\""))
            }
            DialectKind::MySql => format!("`{}`", name.replace('`', "``")),
            DialectKind::MongoDb => name.to_string(),
        }
    }

    /// Formats a value as an inline SQL literal. Drivers normally bind
    /// parameters instead; this exists for DDL default clauses and for the
    /// migrator, which must render literal `DEFAULT` expressions.
    pub fn format_value(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match self {
                DialectKind::Postgres => if *b { "TRUE" } else { "FALSE" }.to_string(),
                _ => if *b { "1" } else { "0" }.to_string(),
            },
            Value::Int(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_nan() || f.is_infinite() {
                    self.escape_string(&f.to_string())
                } else {
                    format!("{f}")
                }
            }
            Value::Decimal(d) => d.to_string(),
            Value::Text(s) => self.escape_string(s),
            Value::DateTime(dt) => self.escape_string(&dt.to_rfc3339()),
            Value::Bytes(b) => self.format_bytes(b),
            Value::Json(j) => {
                let s = serde_json::to_string(j).unwrap_or_else(|_| "null".to_string());
                self.escape_string(&s)
            }
            Value::Array(items) => match self {
                DialectKind::Postgres => {
                    let rendered: Vec<String> = items.iter().map(|v| self.format_value(v)).collect();
                    format!("ARRAY[{}]", rendered.join(", "))
                }
                _ => {
                    let json = serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string());
                    self.escape_string(&json)
                }
            },
        }
    }

    fn escape_string(&self, s: &str) -> String {
        let escaped = s.replace('\'', "''");
        format!("'{escaped}'")
    }

    fn format_bytes(&self, bytes: &[u8]) -> String {
        match self {
            DialectKind::Postgres => format!("'\\x{}'", hex::encode(bytes)),
            DialectKind::MySql | DialectKind::Sqlite => format!("X'{}'", hex::encode(bytes)),
            DialectKind::MongoDb => hex::encode(bytes),
        }
    }
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_quotes_with_double_quotes_and_escapes() {
        assert_eq!(DialectKind::Postgres.quote_ident("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn mysql_quotes_with_backticks() {
        assert_eq!(DialectKind::MySql.quote_ident("col"), "`col`");
    }

    #[test]
    fn postgres_placeholder_is_indexed() {
        assert_eq!(DialectKind::Postgres.placeholder(3), "$3");
        assert_eq!(DialectKind::Sqlite.placeholder(3), "?");
    }

    #[test]
    fn format_value_escapes_quotes_in_text() {
        assert_eq!(
            DialectKind::Sqlite.format_value(&Value::Text("it's".into())),
            "'it''s'"
        );
    }

    #[test]
    fn format_value_bool_differs_by_dialect() {
        assert_eq!(DialectKind::Postgres.format_value(&Value::Bool(true)), "TRUE");
        assert_eq!(DialectKind::MySql.format_value(&Value::Bool(true)), "1");
    }
}
