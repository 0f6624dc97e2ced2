//! Dialect-agnostic SQL string building shared by `sqlite`, `mysql`, and
//! `postgres` (§4.3, §4.5). Generalizes the teacher's per-driver
//! `quote_ident`/query-string assembly (`engine/drivers/{sqlite,mysql,postgres}.rs`)
//! into one place parameterized by [`DialectKind`], since the three SQL
//! dialects differ only in identifier quoting and placeholder syntax for
//! everything this module builds.
//!
//! MongoDB has no SQL surface and does not use this module; its condition
//! translation lives in `mongodb.rs`.

use redi_core::query::ast::{Condition, Op, OrderDirection, SelectQuery};
use redi_core::{DialectKind, RowData, Value};
use redi_schema::{Relation, Schema, SchemaRegistry};

/// Renders `cond` to a parameterized SQL boolean expression, appending bind
/// values to `params` in the order placeholders appear. `next_index` is the
/// 1-based placeholder counter threaded through for dialects (Postgres) whose
/// placeholders are numbered across the whole statement rather than just the
/// WHERE clause.
pub fn condition_to_sql(
    cond: &Condition,
    schema: &Schema,
    dialect: DialectKind,
    params: &mut Vec<Value>,
    next_index: &mut usize,
) -> String {
    match cond {
        Condition::Leaf { field, op, values } => leaf_to_sql(field, op, values, schema, dialect, params, next_index),
        Condition::And(parts) => join_parts(parts, "AND", schema, dialect, params, next_index),
        Condition::Or(parts) => join_parts(parts, "OR", schema, dialect, params, next_index),
        Condition::Not(inner) => {
            let rendered = condition_to_sql(inner, schema, dialect, params, next_index);
            format!("NOT ({rendered})")
        }
    }
}

fn join_parts(
    parts: &[Condition],
    joiner: &str,
    schema: &Schema,
    dialect: DialectKind,
    params: &mut Vec<Value>,
    next_index: &mut usize,
) -> String {
    if parts.is_empty() {
        return "1=1".to_string();
    }
    let rendered: Vec<String> = parts
        .iter()
        .map(|p| format!("({})", condition_to_sql(p, schema, dialect, params, next_index)))
        .collect();
    rendered.join(&format!(" {joiner} "))
}

fn column_for(field: &str, schema: &Schema) -> String {
    schema.get_column_name_by_field_name(field).unwrap_or_else(|| field.to_string())
}

fn bind(value: Value, dialect: DialectKind, params: &mut Vec<Value>, next_index: &mut usize) -> String {
    let placeholder = dialect.placeholder(*next_index);
    *next_index += 1;
    params.push(value);
    placeholder
}

fn leaf_to_sql(
    field: &str,
    op: &Op,
    values: &[Value],
    schema: &Schema,
    dialect: DialectKind,
    params: &mut Vec<Value>,
    next_index: &mut usize,
) -> String {
    let column = dialect.quote_ident(&column_for(field, schema));
    match op {
        Op::IsNull => format!("{column} IS NULL"),
        Op::IsNotNull => format!("{column} IS NOT NULL"),
        Op::Equals => format!("{column} = {}", bind(values[0].clone(), dialect, params, next_index)),
        Op::NotEquals => format!("{column} != {}", bind(values[0].clone(), dialect, params, next_index)),
        Op::GreaterThan => format!("{column} >= {}", bind(values[0].clone(), dialect, params, next_index)),
        Op::LessThan => format!("{column} <= {}", bind(values[0].clone(), dialect, params, next_index)),
        Op::Between => {
            let lo = bind(values[0].clone(), dialect, params, next_index);
            let hi = bind(values[1].clone(), dialect, params, next_index);
            format!("{column} BETWEEN {lo} AND {hi}")
        }
        Op::In | Op::NotIn => {
            let placeholders: Vec<String> =
                values.iter().map(|v| bind(v.clone(), dialect, params, next_index)).collect();
            let keyword = if matches!(op, Op::In) { "IN" } else { "NOT IN" };
            format!("{column} {keyword} ({})", placeholders.join(", "))
        }
        Op::Contains => {
            let pattern = like_pattern(&values[0], "%", "%");
            format!("{column} LIKE {}", bind(pattern, dialect, params, next_index))
        }
        Op::StartsWith => {
            let pattern = like_pattern(&values[0], "", "%");
            format!("{column} LIKE {}", bind(pattern, dialect, params, next_index))
        }
        Op::EndsWith => {
            let pattern = like_pattern(&values[0], "%", "");
            format!("{column} LIKE {}", bind(pattern, dialect, params, next_index))
        }
        Op::Like => format!("{column} LIKE {}", bind(values[0].clone(), dialect, params, next_index)),
    }
}

fn like_pattern(value: &Value, prefix: &str, suffix: &str) -> Value {
    let text = match value {
        Value::Text(s) => s.clone(),
        other => format!("{other:?}"),
    };
    Value::Text(format!("{prefix}{text}{suffix}"))
}

/// Builds a `SELECT` statement and its bind parameters for `query` against
/// `schema`.
pub fn build_select_sql(query: &SelectQuery, schema: &Schema, dialect: DialectKind) -> (String, Vec<Value>) {
    let table = dialect.quote_ident(&schema.resolved_table_name());
    let columns: Vec<String> = match &query.fields {
        Some(fields) if !fields.is_empty() => {
            fields.iter().map(|f| dialect.quote_ident(&column_for(f, schema))).collect()
        }
        _ => schema.fields.iter().map(|f| dialect.quote_ident(&f.column_name())).collect(),
    };
    let distinct = if query.distinct { "DISTINCT " } else { "" };
    let mut sql = format!("SELECT {distinct}{} FROM {table}", columns.join(", "));

    let mut params = Vec::new();
    let mut next_index = 1;
    if let Some(cond) = &query.where_ {
        let clause = condition_to_sql(cond, schema, dialect, &mut params, &mut next_index);
        sql.push_str(&format!(" WHERE {clause}"));
    }
    if !query.order_by.is_empty() {
        let parts: Vec<String> = query
            .order_by
            .iter()
            .map(|o| {
                let dir = match o.direction {
                    OrderDirection::Asc => "ASC",
                    OrderDirection::Desc => "DESC",
                };
                format!("{} {dir}", dialect.quote_ident(&column_for(&o.field, schema)))
            })
            .collect();
        sql.push_str(&format!(" ORDER BY {}", parts.join(", ")));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = query.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }
    (sql, params)
}

/// Builds a `SELECT COUNT(*)` statement for `query`, ignoring its field list,
/// ordering, and pagination (§4.5 `Count`/`Exists` only care about the rows
/// a filter selects).
pub fn build_count_sql(query: &SelectQuery, schema: &Schema, dialect: DialectKind) -> (String, Vec<Value>) {
    let table = dialect.quote_ident(&schema.resolved_table_name());
    let mut sql = format!("SELECT COUNT(*) AS count FROM {table}");
    let mut params = Vec::new();
    let mut next_index = 1;
    if let Some(cond) = &query.where_ {
        let clause = condition_to_sql(cond, schema, dialect, &mut params, &mut next_index);
        sql.push_str(&format!(" WHERE {clause}"));
    }
    (sql, params)
}

/// Builds an `INSERT` statement. `returning_id` appends a `RETURNING`
/// clause naming the primary key column, for dialects that support it
/// (§4.3 `supports_returning`).
pub fn build_insert_sql(
    data: &RowData,
    schema: &Schema,
    dialect: DialectKind,
    returning_id: Option<&str>,
) -> (String, Vec<Value>) {
    let table = dialect.quote_ident(&schema.resolved_table_name());
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    let mut params = Vec::new();
    let mut next_index = 1;
    for (field, value) in &data.fields {
        columns.push(dialect.quote_ident(&column_for(field, schema)));
        placeholders.push(bind(value.clone(), dialect, &mut params, &mut next_index));
    }
    let mut sql = if columns.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES")
    } else {
        format!("INSERT INTO {table} ({}) VALUES ({})", columns.join(", "), placeholders.join(", "))
    };
    if let Some(pk) = returning_id {
        sql.push_str(&format!(" RETURNING {}", dialect.quote_ident(pk)));
    }
    (sql, params)
}

/// Builds an `UPDATE` statement, continuing the placeholder sequence from
/// the `SET` clause into the `WHERE` clause.
pub fn build_update_sql(
    data: &RowData,
    filter: Option<&Condition>,
    schema: &Schema,
    dialect: DialectKind,
) -> (String, Vec<Value>) {
    let table = dialect.quote_ident(&schema.resolved_table_name());
    let mut params = Vec::new();
    let mut next_index = 1;
    let assignments: Vec<String> = data
        .fields
        .iter()
        .map(|(field, value)| {
            let column = dialect.quote_ident(&column_for(field, schema));
            format!("{column} = {}", bind(value.clone(), dialect, &mut params, &mut next_index))
        })
        .collect();
    let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
    if let Some(cond) = filter {
        let clause = condition_to_sql(cond, schema, dialect, &mut params, &mut next_index);
        sql.push_str(&format!(" WHERE {clause}"));
    }
    (sql, params)
}

/// Builds a `DELETE` statement.
pub fn build_delete_sql(filter: Option<&Condition>, schema: &Schema, dialect: DialectKind) -> (String, Vec<Value>) {
    let table = dialect.quote_ident(&schema.resolved_table_name());
    let mut sql = format!("DELETE FROM {table}");
    let mut params = Vec::new();
    let mut next_index = 1;
    if let Some(cond) = filter {
        let clause = condition_to_sql(cond, schema, dialect, &mut params, &mut next_index);
        sql.push_str(&format!(" WHERE {clause}"));
    }
    (sql, params)
}

/// Renders one relation's `FOREIGN KEY (...) REFERENCES ...` clause for a
/// `CREATE TABLE` statement. Resolves the referenced model's table and
/// column names through `registry` rather than using `relation.model`/
/// `relation.references` directly, since those are the schema IR's
/// PascalCase model name and raw field names, not necessarily the table and
/// column names the referenced model actually maps to (§4.1, §4.4). Falls
/// back to the raw names when the referenced model isn't registered yet, so
/// a schema can still be rendered during incremental construction.
pub fn foreign_key_clause(relation: &Relation, local_schema: &Schema, registry: &SchemaRegistry, dialect: DialectKind) -> String {
    let local: Vec<String> = relation
        .foreign_key
        .iter()
        .filter_map(|f| local_schema.field(f))
        .map(|f| dialect.quote_ident(&f.column_name()))
        .collect();
    let referenced = registry.get(&relation.model);
    let ref_table = referenced.map(|s| s.resolved_table_name()).unwrap_or_else(|| relation.model.clone());
    let ref_columns: Vec<String> = relation
        .references
        .iter()
        .map(|field_name| {
            let column = referenced.and_then(|s| s.get_column_name_by_field_name(field_name)).unwrap_or_else(|| field_name.clone());
            dialect.quote_ident(&column)
        })
        .collect();
    format!(
        "FOREIGN KEY ({}) REFERENCES {} ({})",
        local.join(", "),
        dialect.quote_ident(&ref_table),
        ref_columns.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use redi_core::query::builder::FieldCondition;
    use redi_schema::{Field, FieldType};

    fn user_schema() -> Schema {
        let mut id = Field::new("id", FieldType::Int);
        id.primary_key = true;
        Schema::new("User").add_field(id).add_field(Field::new("email", FieldType::String))
    }

    #[test]
    fn select_with_filter_uses_dialect_placeholders() {
        let schema = user_schema();
        let mut query = SelectQuery::new("User");
        query.where_ = Some(FieldCondition::new("email").equals("a@example.com"));
        let (sql, params) = build_select_sql(&query, &schema, DialectKind::Postgres);
        assert!(sql.contains("WHERE \"email\" = $1"));
        assert_eq!(params, vec![Value::Text("a@example.com".to_string())]);
    }

    #[test]
    fn insert_skips_returning_clause_when_not_requested() {
        let schema = user_schema();
        let mut data = RowData::new();
        data = data.with_field("email", Value::Text("a@example.com".to_string()));
        let (sql, params) = build_insert_sql(&data, &schema, DialectKind::Sqlite, None);
        assert_eq!(sql, "INSERT INTO \"users\" (\"email\") VALUES (?)");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn insert_with_returning_appends_clause() {
        let schema = user_schema();
        let mut data = RowData::new();
        data = data.with_field("email", Value::Text("a@example.com".to_string()));
        let (sql, _) = build_insert_sql(&data, &schema, DialectKind::Postgres, Some("id"));
        assert!(sql.ends_with("RETURNING \"id\""));
    }

    #[test]
    fn update_continues_placeholder_numbering_into_where_clause() {
        let schema = user_schema();
        let mut data = RowData::new();
        data = data.with_field("email", Value::Text("new@example.com".to_string()));
        let filter = FieldCondition::new("id").equals(1i64);
        let (sql, params) = build_update_sql(&data, Some(&filter), &schema, DialectKind::Postgres);
        assert!(sql.contains("SET \"email\" = $1"));
        assert!(sql.contains("WHERE \"id\" = $2"));
        assert_eq!(params.len(), 2);
    }
}
