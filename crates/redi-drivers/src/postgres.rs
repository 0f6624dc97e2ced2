//! PostgreSQL driver (§4.3, §4.4).
//!
//! Grounded on the teacher's `engine/drivers/postgres.rs` and
//! `postgres_utils.rs`: `PgPoolOptions` connection setup and the dedicated
//! transaction-connection pattern. `RETURNING id` for `LastInsertID` (§4.3,
//! §8) and `INFORMATION_SCHEMA`/`pg_catalog` introspection have no teacher
//! counterpart.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::{Column, Row as SqlxRow, TypeInfo};
use tokio::sync::Mutex;

use redi_core::query::ast::SelectQuery;
use redi_core::registry::DriverFactory;
use redi_core::traits::{Database, DatabaseMigrator, Transaction};
use redi_core::{
    CancelToken, ColumnInfo, CoreError, CoreResult, DialectKind, ExecResult, ForeignKeyInfo, IndexInfo, MigrationPlan,
    Row, RowData, TableInfo, Value,
};
use redi_schema::{DefaultValue, Field, FieldType, Index, Schema, SchemaRegistry};

use crate::common::{build_count_sql, build_delete_sql, build_insert_sql, build_select_sql, build_update_sql, foreign_key_clause};

const DIALECT: DialectKind = DialectKind::Postgres;

fn bind_value<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    match value {
        Value::Null => query.bind(Option::<i64>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.as_str()),
        Value::Bytes(b) => query.bind(b.as_slice()),
        Value::DateTime(dt) => query.bind(*dt),
        Value::Decimal(d) => query.bind(*d),
        Value::Json(j) => query.bind(j.clone()),
        Value::Array(items) => query.bind(serde_json::to_value(items).unwrap_or(serde_json::Value::Null)),
    }
}

fn extract_value(row: &PgRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::Float).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<rust_decimal::Decimal>, _>(idx) {
        return v.map(Value::Decimal).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
        return v.map(Value::DateTime).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(idx) {
        return v.map(Value::Json).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::Text).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(Value::Bytes).unwrap_or(Value::Null);
    }
    Value::Null
}

fn row_to_redi_row(pg_row: &PgRow) -> Row {
    let mut row = Row::new();
    for col in pg_row.columns() {
        row = row.with_column(col.name().to_string(), extract_value(pg_row, col.ordinal()));
    }
    row
}

async fn query_rows(pool: &PgPool, sql: &str, params: &[Value]) -> CoreResult<Vec<Row>> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = bind_value(query, p);
    }
    let rows = query.fetch_all(pool).await.map_err(|e| CoreError::connection(e.to_string()))?;
    Ok(rows.iter().map(row_to_redi_row).collect())
}

async fn exec_statement(pool: &PgPool, sql: &str, params: &[Value]) -> CoreResult<ExecResult> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = bind_value(query, p);
    }
    let result = query.execute(pool).await.map_err(|e| CoreError::connection(e.to_string()))?;
    Ok(ExecResult { rows_affected: result.rows_affected(), last_insert_id: None })
}

pub struct PostgresDatabase {
    pool: PgPool,
    schemas: Arc<RwLock<SchemaRegistry>>,
    cancel: CancelToken,
}

impl PostgresDatabase {
    pub async fn connect(uri: &str) -> CoreResult<Self> {
        let pool =
            PgPoolOptions::new().max_connections(5).connect(uri).await.map_err(|e| CoreError::connection(e.to_string()))?;
        Ok(Self { pool, schemas: Arc::new(RwLock::new(SchemaRegistry::new())), cancel: CancelToken::new() })
    }

    fn schema_for(&self, model: &str) -> CoreResult<Schema> {
        self.schemas.read().unwrap().get(model).cloned().ok_or_else(|| CoreError::unknown_model(model))
    }

    fn check_cancelled(&self, cancel: &CancelToken) -> CoreResult<()> {
        if self.cancel.is_cancelled() || cancel.is_cancelled() {
            return Err(CoreError::cancelled());
        }
        Ok(())
    }

    /// Inserts and reads back the primary key via `RETURNING`, since
    /// `PgQueryResult` carries no last-insert-id of its own (§4.3, §8:
    /// "PostgreSQL... LastInsertID via RETURNING").
    async fn insert_with_returning(&self, schema: &Schema, data: RowData) -> CoreResult<ExecResult> {
        let pk = schema.single_primary_key_field().map(|f| f.column_name());
        let (sql, params) = build_insert_sql(&data, schema, DIALECT, pk.as_deref());
        if pk.is_some() {
            let rows = query_rows(&self.pool, &sql, &params).await?;
            let last_insert_id = rows.first().and_then(|r| r.columns.values().next()).and_then(Value::as_i64);
            Ok(ExecResult { rows_affected: rows.len() as u64, last_insert_id })
        } else {
            exec_statement(&self.pool, &sql, &params).await
        }
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    fn driver_type(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn supports_last_insert_id(&self) -> bool {
        true
    }

    fn characteristics(&self) -> redi_core::DriverCharacteristics {
        redi_core::DriverCharacteristics {
            returns_zero_rows_affected_for_unchanged: false,
            supports_last_insert_id: true,
            supports_returning_clause: true,
            migration_table_name: "redi_migrations".to_string(),
            system_index_patterns: vec!["pg_%".to_string()],
            auto_increment_integer_type: "SERIAL".to_string(),
        }
    }

    async fn connect(&self) -> CoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| CoreError::connection(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> CoreResult<()> {
        self.pool.close().await;
        Ok(())
    }

    async fn ping(&self) -> CoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| CoreError::connection(e.to_string()))?;
        Ok(())
    }

    fn register_schema(&self, schema: Schema) -> CoreResult<()> {
        self.schemas.write().unwrap().register(schema)?;
        Ok(())
    }

    fn get_schema(&self, name: &str) -> Option<Schema> {
        self.schemas.read().unwrap().get(name).cloned()
    }

    fn get_models(&self) -> Vec<String> {
        self.schemas.read().unwrap().models().into_iter().map(String::from).collect()
    }

    async fn create_model(&self, name: &str) -> CoreResult<()> {
        let schema = self.schema_for(name)?;
        let migrator = PostgresMigrator { pool: self.pool.clone(), schemas: self.schemas.clone() };
        let sql = migrator.generate_create_table_sql(&schema)?;
        sqlx::query(&sql).execute(&self.pool).await.map_err(|e| CoreError::migration(e.to_string()))?;
        for index in schema.unique_indexes().into_iter().chain(schema.indexes.clone()) {
            let sql = migrator.generate_create_index_sql(&schema.resolved_table_name(), &index);
            sqlx::query(&sql).execute(&self.pool).await.map_err(|e| CoreError::migration(e.to_string()))?;
        }
        Ok(())
    }

    async fn drop_model(&self, name: &str) -> CoreResult<()> {
        let schema = self.schema_for(name)?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", DIALECT.quote_ident(&schema.resolved_table_name())))
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::migration(e.to_string()))?;
        Ok(())
    }

    async fn sync_schemas(&self) -> CoreResult<()> {
        let ordered: Vec<String> = {
            let registry = self.schemas.read().unwrap();
            registry.topological_order().iter().map(|s| s.name.clone()).collect()
        };
        for name in ordered {
            self.create_model(&name).await?;
        }
        Ok(())
    }

    fn migrator(&self) -> Arc<dyn DatabaseMigrator> {
        Arc::new(PostgresMigrator { pool: self.pool.clone(), schemas: self.schemas.clone() })
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn insert(&self, model: &str, data: RowData, cancel: &CancelToken) -> CoreResult<ExecResult> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(model)?;
        self.insert_with_returning(&schema, data).await
    }

    async fn find_many(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<Vec<Row>> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(&query.model)?;
        let (sql, params) = build_select_sql(&query, &schema, DIALECT);
        query_rows(&self.pool, &sql, &params).await
    }

    async fn find_first(&self, mut query: SelectQuery, cancel: &CancelToken) -> CoreResult<Option<Row>> {
        query.limit = Some(1);
        Ok(self.find_many(query, cancel).await?.into_iter().next())
    }

    async fn find_by_id(&self, model: &str, id: Value, cancel: &CancelToken) -> CoreResult<Row> {
        let schema = self.schema_for(model)?;
        let pk_field = schema
            .single_primary_key_field()
            .ok_or_else(|| CoreError::unknown_field(model, "<primary key>"))?
            .name
            .clone();
        let mut query = SelectQuery::new(model);
        query.where_ = Some(redi_core::query::builder::FieldCondition::new(&pk_field).equals(id));
        self.find_first(query, cancel).await?.ok_or_else(|| CoreError::unknown_field(model, &pk_field))
    }

    async fn update(&self, model: &str, filter: Option<redi_core::Condition>, data: RowData, cancel: &CancelToken) -> CoreResult<ExecResult> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(model)?;
        let (sql, params) = build_update_sql(&data, filter.as_ref(), &schema, DIALECT);
        exec_statement(&self.pool, &sql, &params).await
    }

    async fn delete(&self, model: &str, filter: Option<redi_core::Condition>, cancel: &CancelToken) -> CoreResult<ExecResult> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(model)?;
        let (sql, params) = build_delete_sql(filter.as_ref(), &schema, DIALECT);
        exec_statement(&self.pool, &sql, &params).await
    }

    async fn count(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<u64> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(&query.model)?;
        let (sql, params) = build_count_sql(&query, &schema, DIALECT);
        let rows = query_rows(&self.pool, &sql, &params).await?;
        Ok(rows.first().and_then(|r| r.get("count")).and_then(Value::as_i64).unwrap_or(0) as u64)
    }

    async fn exists(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<bool> {
        Ok(self.count(query, cancel).await? > 0)
    }

    async fn raw(&self, statement: &str, params: Vec<Value>, cancel: &CancelToken) -> CoreResult<Vec<Row>> {
        self.check_cancelled(cancel)?;
        query_rows(&self.pool, statement, &params).await
    }

    async fn begin(&self) -> CoreResult<Box<dyn Transaction>> {
        let tx = self.pool.begin().await.map_err(|e| CoreError::transaction(e.to_string()))?;
        Ok(Box::new(PostgresTransaction { tx: Mutex::new(Some(tx)), schemas: self.schemas.clone(), cancel: self.cancel.clone() }))
    }
}

pub struct PostgresTransaction {
    tx: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
    schemas: Arc<RwLock<SchemaRegistry>>,
    cancel: CancelToken,
}

impl PostgresTransaction {
    fn schema_for(&self, model: &str) -> CoreResult<Schema> {
        self.schemas.read().unwrap().get(model).cloned().ok_or_else(|| CoreError::unknown_model(model))
    }

    fn check_cancelled(&self, cancel: &CancelToken) -> CoreResult<()> {
        if self.cancel.is_cancelled() || cancel.is_cancelled() {
            return Err(CoreError::cancelled());
        }
        Ok(())
    }
}

macro_rules! in_tx {
    ($self:expr, $sql:expr, $params:expr, $method:ident) => {{
        let mut guard = $self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(|| CoreError::transaction("transaction already finished"))?;
        let mut q = sqlx::query($sql);
        for p in $params {
            q = bind_value(q, p);
        }
        q.$method(&mut **tx).await.map_err(|e| CoreError::connection(e.to_string()))
    }};
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn insert(&self, model: &str, data: RowData, cancel: &CancelToken) -> CoreResult<ExecResult> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(model)?;
        let pk = schema.single_primary_key_field().map(|f| f.column_name());
        let (sql, params) = build_insert_sql(&data, &schema, DIALECT, pk.as_deref());
        if pk.is_some() {
            let rows = in_tx!(self, &sql, &params, fetch_all)?;
            let redi_rows: Vec<Row> = rows.iter().map(row_to_redi_row).collect();
            let last_insert_id = redi_rows.first().and_then(|r| r.columns.values().next()).and_then(Value::as_i64);
            Ok(ExecResult { rows_affected: redi_rows.len() as u64, last_insert_id })
        } else {
            let result = in_tx!(self, &sql, &params, execute)?;
            Ok(ExecResult { rows_affected: result.rows_affected(), last_insert_id: None })
        }
    }

    async fn find_many(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<Vec<Row>> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(&query.model)?;
        let (sql, params) = build_select_sql(&query, &schema, DIALECT);
        let rows = in_tx!(self, &sql, &params, fetch_all)?;
        Ok(rows.iter().map(row_to_redi_row).collect())
    }

    async fn find_first(&self, mut query: SelectQuery, cancel: &CancelToken) -> CoreResult<Option<Row>> {
        query.limit = Some(1);
        Ok(self.find_many(query, cancel).await?.into_iter().next())
    }

    async fn find_by_id(&self, model: &str, id: Value, cancel: &CancelToken) -> CoreResult<Row> {
        let schema = self.schema_for(model)?;
        let pk_field = schema
            .single_primary_key_field()
            .ok_or_else(|| CoreError::unknown_field(model, "<primary key>"))?
            .name
            .clone();
        let mut query = SelectQuery::new(model);
        query.where_ = Some(redi_core::query::builder::FieldCondition::new(&pk_field).equals(id));
        self.find_first(query, cancel).await?.ok_or_else(|| CoreError::unknown_field(model, &pk_field))
    }

    async fn update(&self, model: &str, filter: Option<redi_core::Condition>, data: RowData, cancel: &CancelToken) -> CoreResult<ExecResult> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(model)?;
        let (sql, params) = build_update_sql(&data, filter.as_ref(), &schema, DIALECT);
        let result = in_tx!(self, &sql, &params, execute)?;
        Ok(ExecResult { rows_affected: result.rows_affected(), last_insert_id: None })
    }

    async fn delete(&self, model: &str, filter: Option<redi_core::Condition>, cancel: &CancelToken) -> CoreResult<ExecResult> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(model)?;
        let (sql, params) = build_delete_sql(filter.as_ref(), &schema, DIALECT);
        let result = in_tx!(self, &sql, &params, execute)?;
        Ok(ExecResult { rows_affected: result.rows_affected(), last_insert_id: None })
    }

    async fn count(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<u64> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(&query.model)?;
        let (sql, params) = build_count_sql(&query, &schema, DIALECT);
        let rows = in_tx!(self, &sql, &params, fetch_all)?;
        let count = rows.first().map(|r| extract_value(r, 0)).and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(count as u64)
    }

    async fn raw(&self, statement: &str, params: Vec<Value>, cancel: &CancelToken) -> CoreResult<Vec<Row>> {
        self.check_cancelled(cancel)?;
        let rows = in_tx!(self, statement, &params, fetch_all)?;
        Ok(rows.iter().map(row_to_redi_row).collect())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let tx = self.tx.lock().await.take().ok_or_else(|| CoreError::transaction("transaction already finished"))?;
        tx.commit().await.map_err(|e| CoreError::transaction(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> CoreResult<()> {
        let tx = self.tx.lock().await.take().ok_or_else(|| CoreError::transaction("transaction already finished"))?;
        tx.rollback().await.map_err(|e| CoreError::transaction(e.to_string()))
    }
}

pub struct PostgresMigrator {
    pool: PgPool,
    schemas: Arc<RwLock<SchemaRegistry>>,
}

impl PostgresMigrator {
    fn column_def_sql(&self, field: &Field) -> String {
        let type_sql = if field.primary_key && field.auto_increment {
            "SERIAL".to_string()
        } else {
            self.map_field_type(&field.r#type)
        };
        let mut parts = vec![DIALECT.quote_ident(&field.column_name()), type_sql];
        if !field.nullable && !(field.primary_key && field.auto_increment) {
            parts.push("NOT NULL".to_string());
        }
        if field.unique && !field.primary_key {
            parts.push("UNIQUE".to_string());
        }
        if let Some(default) = &field.default {
            let rendered = self.format_default_value(default);
            if !rendered.is_empty() {
                parts.push(format!("DEFAULT {rendered}"));
            }
        }
        parts.join(" ")
    }
}

#[async_trait]
impl DatabaseMigrator for PostgresMigrator {
    async fn get_tables(&self) -> CoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::introspection(e.to_string()))?;
        Ok(rows.iter().map(|r| r.get::<String, _>(0)).collect())
    }

    async fn get_table_info(&self, table: &str) -> CoreResult<TableInfo> {
        let columns_raw = sqlx::query(
            "SELECT column_name, data_type, is_nullable, column_default \
             FROM information_schema.columns WHERE table_schema = 'public' AND table_name = $1 ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::introspection(e.to_string()))?;

        let pk_rows = sqlx::query(
            "SELECT kcu.column_name FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu ON tc.constraint_name = kcu.constraint_name \
             WHERE tc.table_name = $1 AND tc.constraint_type = 'PRIMARY KEY'",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::introspection(e.to_string()))?;
        let pk_columns: Vec<String> = pk_rows.iter().map(|r| r.get::<String, _>(0)).collect();

        let columns = columns_raw
            .iter()
            .map(|row| {
                let name: String = row.get("column_name");
                let default_value: Option<String> = row.try_get("column_default").ok();
                ColumnInfo {
                    is_primary_key: pk_columns.contains(&name),
                    auto_increment: default_value.as_deref().map(|d| d.contains("nextval")).unwrap_or(false),
                    name,
                    data_type: row.get("data_type"),
                    nullable: row.get::<String, _>("is_nullable") == "YES",
                    default_value,
                }
            })
            .collect();

        let fks_raw = sqlx::query(
            "SELECT kcu.column_name, ccu.table_name AS referenced_table, ccu.column_name AS referenced_column, tc.constraint_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu ON tc.constraint_name = kcu.constraint_name \
             JOIN information_schema.constraint_column_usage ccu ON tc.constraint_name = ccu.constraint_name \
             WHERE tc.table_name = $1 AND tc.constraint_type = 'FOREIGN KEY'",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::introspection(e.to_string()))?;
        let foreign_keys = fks_raw
            .iter()
            .map(|r| ForeignKeyInfo {
                column: r.get("column_name"),
                referenced_table: r.get("referenced_table"),
                referenced_column: r.get("referenced_column"),
                constraint_name: r.try_get("constraint_name").ok(),
            })
            .collect();

        let idx_raw = sqlx::query(
            "SELECT i.relname AS index_name, a.attname AS column_name, ix.indisunique AS is_unique \
             FROM pg_class t JOIN pg_index ix ON t.oid = ix.indrelid \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
             WHERE t.relname = $1 AND NOT ix.indisprimary",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::introspection(e.to_string()))?;
        let mut by_name: HashMap<String, IndexInfo> = HashMap::new();
        for row in &idx_raw {
            let name: String = row.get("index_name");
            let col: String = row.get("column_name");
            let unique: bool = row.get("is_unique");
            by_name.entry(name.clone()).or_insert_with(|| IndexInfo { name, columns: Vec::new(), unique }).columns.push(col);
        }

        Ok(TableInfo { columns, indexes: by_name.into_values().collect(), foreign_keys })
    }

    fn is_system_table(&self, table: &str) -> bool {
        table == "redi_migrations" || table.starts_with("pg_") || table.starts_with("sql_")
    }

    fn generate_create_table_sql(&self, schema: &Schema) -> CoreResult<String> {
        let table = DIALECT.quote_ident(&schema.resolved_table_name());
        let mut defs: Vec<String> = schema.fields.iter().map(|f| self.column_def_sql(f)).collect();
        if let Some(composite) = &schema.composite_key {
            let cols: Vec<String> =
                composite.iter().filter_map(|name| schema.field(name)).map(|f| DIALECT.quote_ident(&f.column_name())).collect();
            defs.push(format!("PRIMARY KEY ({})", cols.join(", ")));
        } else if let Some(pk) = schema.single_primary_key_field() {
            if !pk.auto_increment {
                defs.push(format!("PRIMARY KEY ({})", DIALECT.quote_ident(&pk.column_name())));
            }
        }
        let registry = self.schemas.read().unwrap();
        for relation in schema.relations.values() {
            if relation.foreign_key.is_empty() {
                continue;
            }
            defs.push(foreign_key_clause(relation, schema, &registry, DIALECT));
        }
        Ok(format!("CREATE TABLE {table} ({})", defs.join(", ")))
    }

    fn generate_drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", DIALECT.quote_ident(table))
    }

    fn generate_add_column_sql(&self, table: &str, field: &Field) -> CoreResult<String> {
        Ok(format!("ALTER TABLE {} ADD COLUMN {}", DIALECT.quote_ident(table), self.column_def_sql(field)))
    }

    async fn generate_modify_column_sql(&self, table: &str, field: &Field) -> CoreResult<Vec<String>> {
        let quoted_table = DIALECT.quote_ident(table);
        let column = DIALECT.quote_ident(&field.column_name());
        let mut statements = vec![format!(
            "ALTER TABLE {quoted_table} ALTER COLUMN {column} TYPE {} USING {column}::{}",
            self.map_field_type(&field.r#type),
            self.map_field_type(&field.r#type)
        )];
        statements.push(format!(
            "ALTER TABLE {quoted_table} ALTER COLUMN {column} {}",
            if field.nullable { "DROP NOT NULL" } else { "SET NOT NULL" }
        ));
        Ok(statements)
    }

    fn generate_drop_column_sql(&self, table: &str, column: &str) -> Vec<String> {
        vec![format!("ALTER TABLE {} DROP COLUMN {}", DIALECT.quote_ident(table), DIALECT.quote_ident(column))]
    }

    fn generate_create_index_sql(&self, table: &str, index: &Index) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let cols: Vec<String> = index.fields.iter().map(|c| DIALECT.quote_ident(c)).collect();
        format!("CREATE {unique}INDEX {} ON {} ({})", DIALECT.quote_ident(&index.name), DIALECT.quote_ident(table), cols.join(", "))
    }

    fn generate_drop_index_sql(&self, _table: &str, index_name: &str) -> String {
        format!("DROP INDEX IF EXISTS {}", DIALECT.quote_ident(index_name))
    }

    async fn apply_migration(&self, statements: &[String], cancel: &CancelToken) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| CoreError::migration(e.to_string()))?;
        for statement in statements {
            if cancel.is_cancelled() {
                return Err(CoreError::cancelled());
            }
            sqlx::query(statement).execute(&mut *tx).await.map_err(|e| CoreError::migration(e.to_string()))?;
        }
        tx.commit().await.map_err(|e| CoreError::migration(e.to_string()))
    }

    fn compare_schema(&self, registry: &SchemaRegistry, tables: &HashMap<String, TableInfo>) -> CoreResult<MigrationPlan> {
        crate::diffing::compare_schema(registry, tables, self, DIALECT)
    }

    async fn generate_migration_sql(&self, plan: &MigrationPlan, registry: &SchemaRegistry) -> CoreResult<Vec<String>> {
        crate::diffing::render_plan(plan, registry, self).await
    }

    fn map_database_type_to_field_type(&self, db_type: &str) -> FieldType {
        let lower = db_type.to_lowercase();
        if lower.contains("bool") {
            FieldType::Bool
        } else if lower.contains("int") {
            FieldType::Int64
        } else if lower.contains("double") || lower.contains("real") || lower.contains("float") {
            FieldType::Float
        } else if lower.contains("numeric") || lower.contains("decimal") {
            FieldType::Decimal
        } else if lower.contains("timestamp") || lower.contains("date") {
            FieldType::DateTime
        } else if lower.contains("json") {
            FieldType::Json
        } else {
            FieldType::String
        }
    }

    fn map_field_type(&self, field_type: &FieldType) -> String {
        match field_type {
            FieldType::String | FieldType::Enum(_) => "TEXT".to_string(),
            FieldType::Int => "INTEGER".to_string(),
            FieldType::Int64 => "BIGINT".to_string(),
            FieldType::Float => "DOUBLE PRECISION".to_string(),
            FieldType::Bool => "BOOLEAN".to_string(),
            FieldType::DateTime => "TIMESTAMPTZ".to_string(),
            FieldType::Json => "JSONB".to_string(),
            FieldType::Decimal => "NUMERIC(65,30)".to_string(),
            FieldType::Array(inner) => format!("{}[]", self.map_field_type(inner)),
        }
    }

    fn format_default_value(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::Now => "now()".to_string(),
            DefaultValue::AutoIncrement => String::new(),
            DefaultValue::Uuid => "gen_random_uuid()".to_string(),
            DefaultValue::Cuid => String::new(),
            DefaultValue::Literal(lit) => crate::common_default::literal_to_sql(lit, DIALECT),
        }
    }

    fn normalize_default_to_prisma_function(&self, raw: &str) -> Option<DefaultValue> {
        let lower = raw.to_lowercase();
        if lower.starts_with("now()") || lower.contains("current_timestamp") {
            Some(DefaultValue::Now)
        } else if lower.contains("gen_random_uuid") || lower.contains("uuid_generate") {
            Some(DefaultValue::Uuid)
        } else {
            None
        }
    }
}

pub struct PostgresFactory;

#[async_trait]
impl DriverFactory for PostgresFactory {
    fn scheme(&self) -> &'static str {
        "postgresql"
    }

    async fn connect(&self, uri: &str) -> CoreResult<Arc<dyn Database>> {
        Ok(Arc::new(PostgresDatabase::connect(uri).await?))
    }
}
