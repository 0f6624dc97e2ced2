//! MySQL/MariaDB driver (§4.3, §4.4).
//!
//! Grounded on the teacher's `engine/drivers/mysql.rs`: `MySqlPoolOptions`
//! connection-string assembly and the `extract_value` cascade trying
//! integer widths before falling back to float/string/bytes/json. The
//! `AUTO_INCREMENT` keyword and `INFORMATION_SCHEMA` introspection queries
//! have no teacher counterpart.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlPool, MySqlPoolOptions, MySqlRow};
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

const DIALECT: DialectKind = DialectKind::MySql;

fn bind_value<'q>(
    query: sqlx::query::Query<'q, MySql, sqlx::mysql::MySqlArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, MySql, sqlx::mysql::MySqlArguments> {
    match value {
        Value::Null => query.bind(Option::<i64>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.as_str()),
        Value::Bytes(b) => query.bind(b.as_slice()),
        Value::DateTime(dt) => query.bind(*dt),
        Value::Decimal(d) => query.bind(d.to_string()),
        Value::Json(j) => query.bind(j.to_string()),
        Value::Array(items) => query.bind(serde_json::to_string(items).unwrap_or_default()),
    }
}

/// Tries integer widths widest-to-narrowest (matching MySQL's own
/// `TINYINT`/`SMALLINT`/`INT`/`BIGINT`/unsigned spread) before float,
/// string, bytes, and JSON.
fn extract_value(row: &MySqlRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::Float).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::Text).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(Value::Bytes).unwrap_or(Value::Null);
    }
    Value::Null
}

fn row_to_redi_row(mysql_row: &MySqlRow) -> Row {
    let mut row = Row::new();
    for col in mysql_row.columns() {
        row = row.with_column(col.name().to_string(), extract_value(mysql_row, col.ordinal()));
    }
    row
}

async fn exec_statement(pool: &MySqlPool, sql: &str, params: &[Value]) -> CoreResult<ExecResult> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = bind_value(query, p);
    }
    let result = query.execute(pool).await.map_err(|e| CoreError::connection(e.to_string()))?;
    Ok(ExecResult { rows_affected: result.rows_affected(), last_insert_id: Some(result.last_insert_id() as i64) })
}

async fn query_rows(pool: &MySqlPool, sql: &str, params: &[Value]) -> CoreResult<Vec<Row>> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = bind_value(query, p);
    }
    let rows = query.fetch_all(pool).await.map_err(|e| CoreError::connection(e.to_string()))?;
    Ok(rows.iter().map(row_to_redi_row).collect())
}

pub struct MySqlDatabase {
    pool: MySqlPool,
    database_name: String,
    schemas: Arc<RwLock<SchemaRegistry>>,
    cancel: CancelToken,
}

impl MySqlDatabase {
    pub async fn connect(uri: &str) -> CoreResult<Self> {
        let pool =
            MySqlPoolOptions::new().max_connections(5).connect(uri).await.map_err(|e| CoreError::connection(e.to_string()))?;
        let database_name =
            url::Url::parse(uri).ok().map(|u| u.path().trim_start_matches('/').to_string()).unwrap_or_default();
        Ok(Self { pool, database_name, schemas: Arc::new(RwLock::new(SchemaRegistry::new())), cancel: CancelToken::new() })
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
}

#[async_trait]
impl Database for MySqlDatabase {
    fn driver_type(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn supports_last_insert_id(&self) -> bool {
        true
    }

    fn characteristics(&self) -> redi_core::DriverCharacteristics {
        redi_core::DriverCharacteristics {
            returns_zero_rows_affected_for_unchanged: true,
            supports_last_insert_id: true,
            supports_returning_clause: false,
            migration_table_name: "redi_migrations".to_string(),
            system_index_patterns: vec!["PRIMARY".to_string()],
            auto_increment_integer_type: "BIGINT".to_string(),
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
        let migrator = MySqlMigrator { pool: self.pool.clone(), database_name: self.database_name.clone(), schemas: self.schemas.clone() };
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
        Arc::new(MySqlMigrator { pool: self.pool.clone(), database_name: self.database_name.clone(), schemas: self.schemas.clone() })
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
        let (sql, params) = build_insert_sql(&data, &schema, DIALECT, None);
        exec_statement(&self.pool, &sql, &params).await
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
        Ok(Box::new(MySqlTransaction { tx: Mutex::new(Some(tx)), schemas: self.schemas.clone(), cancel: self.cancel.clone() }))
    }
}

pub struct MySqlTransaction {
    tx: Mutex<Option<sqlx::Transaction<'static, MySql>>>,
    schemas: Arc<RwLock<SchemaRegistry>>,
    cancel: CancelToken,
}

impl MySqlTransaction {
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
impl Transaction for MySqlTransaction {
    async fn insert(&self, model: &str, data: RowData, cancel: &CancelToken) -> CoreResult<ExecResult> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(model)?;
        let (sql, params) = build_insert_sql(&data, &schema, DIALECT, None);
        let result = in_tx!(self, &sql, &params, execute)?;
        Ok(ExecResult { rows_affected: result.rows_affected(), last_insert_id: Some(result.last_insert_id() as i64) })
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

pub struct MySqlMigrator {
    pool: MySqlPool,
    database_name: String,
    schemas: Arc<RwLock<SchemaRegistry>>,
}

impl MySqlMigrator {
    fn column_def_sql(&self, field: &Field) -> String {
        let mut parts = vec![DIALECT.quote_ident(&field.column_name()), self.map_field_type(&field.r#type)];
        if !field.nullable {
            parts.push("NOT NULL".to_string());
        }
        if field.auto_increment {
            parts.push("AUTO_INCREMENT".to_string());
        }
        if let Some(default) = &field.default {
            let rendered = self.format_default_value(default);
            if !rendered.is_empty() {
                parts.push(format!("DEFAULT {rendered}"));
            }
        }
        if field.unique && !field.primary_key {
            parts.push("UNIQUE".to_string());
        }
        parts.join(" ")
    }
}

#[async_trait]
impl DatabaseMigrator for MySqlMigrator {
    async fn get_tables(&self) -> CoreResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = ?",
        )
        .bind(&self.database_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::introspection(e.to_string()))?;
        Ok(rows.iter().map(|r| r.get::<String, _>(0)).collect())
    }

    async fn get_table_info(&self, table: &str) -> CoreResult<TableInfo> {
        let columns_raw = sqlx::query(
            "SELECT column_name, column_type, is_nullable, column_default, column_key, extra \
             FROM information_schema.columns WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
        )
        .bind(&self.database_name)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::introspection(e.to_string()))?;

        let columns = columns_raw
            .iter()
            .map(|row| {
                let extra: String = row.get("extra");
                let key: String = row.get("column_key");
                ColumnInfo {
                    name: row.get("column_name"),
                    data_type: row.get("column_type"),
                    nullable: row.get::<String, _>("is_nullable") == "YES",
                    default_value: row.try_get("column_default").ok(),
                    is_primary_key: key == "PRI",
                    auto_increment: extra.contains("auto_increment"),
                }
            })
            .collect();

        let fks_raw = sqlx::query(
            "SELECT column_name, referenced_table_name, referenced_column_name, constraint_name \
             FROM information_schema.key_column_usage \
             WHERE table_schema = ? AND table_name = ? AND referenced_table_name IS NOT NULL",
        )
        .bind(&self.database_name)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::introspection(e.to_string()))?;
        let foreign_keys = fks_raw
            .iter()
            .map(|r| ForeignKeyInfo {
                column: r.get("column_name"),
                referenced_table: r.get("referenced_table_name"),
                referenced_column: r.get("referenced_column_name"),
                constraint_name: r.try_get("constraint_name").ok(),
            })
            .collect();

        let idx_raw = sqlx::query(&format!("SHOW INDEX FROM {}", DIALECT.quote_ident(table)))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::introspection(e.to_string()))?;
        let mut by_name: HashMap<String, IndexInfo> = HashMap::new();
        for row in &idx_raw {
            let name: String = row.get("Key_name");
            let col: String = row.get("Column_name");
            let non_unique: i64 = row.get("Non_unique");
            by_name
                .entry(name.clone())
                .or_insert_with(|| IndexInfo { name, columns: Vec::new(), unique: non_unique == 0 })
                .columns
                .push(col);
        }
        let indexes = by_name.into_values().filter(|i| i.name != "PRIMARY").collect();

        Ok(TableInfo { columns, indexes, foreign_keys })
    }

    fn is_system_table(&self, table: &str) -> bool {
        table == "redi_migrations"
    }

    fn generate_create_table_sql(&self, schema: &Schema) -> CoreResult<String> {
        let table = DIALECT.quote_ident(&schema.resolved_table_name());
        let mut defs: Vec<String> = schema.fields.iter().map(|f| self.column_def_sql(f)).collect();
        let pk_cols: Vec<String> = if let Some(composite) = &schema.composite_key {
            composite.iter().filter_map(|name| schema.field(name)).map(|f| DIALECT.quote_ident(&f.column_name())).collect()
        } else {
            schema.single_primary_key_field().map(|f| vec![DIALECT.quote_ident(&f.column_name())]).unwrap_or_default()
        };
        if !pk_cols.is_empty() {
            defs.push(format!("PRIMARY KEY ({})", pk_cols.join(", ")));
        }
        let registry = self.schemas.read().unwrap();
        for relation in schema.relations.values() {
            if relation.foreign_key.is_empty() {
                continue;
            }
            defs.push(foreign_key_clause(relation, schema, &registry, DIALECT));
        }
        Ok(format!("CREATE TABLE {table} ({}) ENGINE=InnoDB", defs.join(", ")))
    }

    fn generate_drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", DIALECT.quote_ident(table))
    }

    fn generate_add_column_sql(&self, table: &str, field: &Field) -> CoreResult<String> {
        Ok(format!("ALTER TABLE {} ADD COLUMN {}", DIALECT.quote_ident(table), self.column_def_sql(field)))
    }

    async fn generate_modify_column_sql(&self, table: &str, field: &Field) -> CoreResult<Vec<String>> {
        Ok(vec![format!("ALTER TABLE {} MODIFY COLUMN {}", DIALECT.quote_ident(table), self.column_def_sql(field))])
    }

    fn generate_drop_column_sql(&self, table: &str, column: &str) -> Vec<String> {
        vec![format!("ALTER TABLE {} DROP COLUMN {}", DIALECT.quote_ident(table), DIALECT.quote_ident(column))]
    }

    fn generate_create_index_sql(&self, table: &str, index: &Index) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let cols: Vec<String> = index.fields.iter().map(|c| DIALECT.quote_ident(c)).collect();
        format!("CREATE {unique}INDEX {} ON {} ({})", DIALECT.quote_ident(&index.name), DIALECT.quote_ident(table), cols.join(", "))
    }

    fn generate_drop_index_sql(&self, table: &str, index_name: &str) -> String {
        format!("DROP INDEX {} ON {}", DIALECT.quote_ident(index_name), DIALECT.quote_ident(table))
    }

    async fn apply_migration(&self, statements: &[String], cancel: &CancelToken) -> CoreResult<()> {
        // MySQL implicitly commits DDL, so each statement runs on its own;
        // a failure partway leaves earlier statements applied (§4.6 step 4
        // documents this as a MySQL-specific limitation of transactional DDL).
        for statement in statements {
            if cancel.is_cancelled() {
                return Err(CoreError::cancelled());
            }
            sqlx::query(statement).execute(&self.pool).await.map_err(|e| CoreError::migration(e.to_string()))?;
        }
        Ok(())
    }

    fn compare_schema(&self, registry: &SchemaRegistry, tables: &HashMap<String, TableInfo>) -> CoreResult<MigrationPlan> {
        crate::diffing::compare_schema(registry, tables, self, DIALECT)
    }

    async fn generate_migration_sql(&self, plan: &MigrationPlan, registry: &SchemaRegistry) -> CoreResult<Vec<String>> {
        crate::diffing::render_plan(plan, registry, self).await
    }

    fn map_database_type_to_field_type(&self, db_type: &str) -> FieldType {
        let upper = db_type.to_uppercase();
        if upper.contains("TINYINT(1)") || upper.contains("BOOL") {
            FieldType::Bool
        } else if upper.contains("INT") {
            FieldType::Int64
        } else if upper.contains("FLOAT") || upper.contains("DOUBLE") {
            FieldType::Float
        } else if upper.contains("DECIMAL") || upper.contains("NUMERIC") {
            FieldType::Decimal
        } else if upper.contains("DATETIME") || upper.contains("TIMESTAMP") || upper.contains("DATE") {
            FieldType::DateTime
        } else if upper.contains("JSON") {
            FieldType::Json
        } else {
            FieldType::String
        }
    }

    fn map_field_type(&self, field_type: &FieldType) -> String {
        match field_type {
            FieldType::String | FieldType::Enum(_) => "VARCHAR(191)".to_string(),
            FieldType::Int => "INT".to_string(),
            FieldType::Int64 => "BIGINT".to_string(),
            FieldType::Float => "DOUBLE".to_string(),
            FieldType::Bool => "TINYINT(1)".to_string(),
            FieldType::DateTime => "DATETIME(3)".to_string(),
            FieldType::Json => "JSON".to_string(),
            FieldType::Decimal => "DECIMAL(65,30)".to_string(),
            FieldType::Array(_) => "JSON".to_string(),
        }
    }

    fn format_default_value(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::Now => "CURRENT_TIMESTAMP(3)".to_string(),
            DefaultValue::AutoIncrement => String::new(),
            DefaultValue::Uuid | DefaultValue::Cuid => String::new(),
            DefaultValue::Literal(lit) => crate::common_default::literal_to_sql(lit, DIALECT),
        }
    }

    fn normalize_default_to_prisma_function(&self, raw: &str) -> Option<DefaultValue> {
        let upper = raw.to_uppercase();
        if upper.starts_with("CURRENT_TIMESTAMP") {
            Some(DefaultValue::Now)
        } else {
            None
        }
    }
}

pub struct MySqlFactory;

#[async_trait]
impl DriverFactory for MySqlFactory {
    fn scheme(&self) -> &'static str {
        "mysql"
    }

    async fn connect(&self, uri: &str) -> CoreResult<Arc<dyn Database>> {
        Ok(Arc::new(MySqlDatabase::connect(uri).await?))
    }
}
