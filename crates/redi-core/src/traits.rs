//! The dialect driver interface (§4.3): `Database`, `Transaction`, and
//! `DatabaseMigrator`. `Database` generalizes the teacher's `DataEngine`
//! trait (`engine/traits.rs`) from a single raw `execute(session, &str)`
//! call to the full declarative CRUD/transaction/DDL surface this spec
//! requires, keeping its `#[async_trait] + Send + Sync` shape and
//! capability-query methods almost verbatim.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use redi_schema::{DefaultValue, Field, FieldType, Index, Schema, SchemaRegistry};

use crate::cancel::CancelToken;
use crate::characteristics::DriverCharacteristics;
use crate::dialect::DialectKind;
use crate::error::CoreResult;
use crate::migration::{MigrationPlan, TableInfo};
use crate::query::ast::{Condition, SelectQuery};
use crate::value::{ExecResult, Row, RowData, Value};

/// A boxed, `Send`, lifetime-bound future — used only by [`transaction`] so
/// the scoped-transaction closure can borrow its `&dyn Transaction`
/// argument instead of requiring an owned one.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A live connection to one dialect, presenting the CRUD/DDL/transaction
/// surface every driver in `redi-drivers` implements (§4.3).
#[async_trait]
pub trait Database: Send + Sync {
    fn driver_type(&self) -> DialectKind;
    fn supports_returning(&self) -> bool;
    fn supports_last_insert_id(&self) -> bool;
    /// Conformance exceptions the black-box harness branches on (§4.8, §9).
    fn characteristics(&self) -> DriverCharacteristics;

    async fn connect(&self) -> CoreResult<()>;
    async fn close(&self) -> CoreResult<()>;
    async fn ping(&self) -> CoreResult<()>;

    /// Validates and (re-)registers `schema`. A failed registration never
    /// partially mutates the registry (§7).
    fn register_schema(&self, schema: Schema) -> CoreResult<()>;
    fn get_schema(&self, name: &str) -> Option<Schema>;
    fn get_models(&self) -> Vec<String>;

    async fn create_model(&self, name: &str) -> CoreResult<()>;
    async fn drop_model(&self, name: &str) -> CoreResult<()>;
    /// Creates every registered model's table in topological (leaves-first)
    /// order, per the schema registry's dependency sort (§3).
    async fn sync_schemas(&self) -> CoreResult<()>;
    fn migrator(&self) -> Arc<dyn DatabaseMigrator>;

    /// Flips this connection's cancellation switch: every CRUD/raw call
    /// still in flight (and every transaction/migrator derived from this
    /// connection, since they share the same token) returns
    /// [`crate::error::CoreError::cancelled`] at its next suspension point
    /// (§5).
    fn cancel(&self);
    /// Whether [`Database::cancel`] has been called on this connection.
    fn is_cancelled(&self) -> bool;

    async fn insert(&self, model: &str, data: RowData, cancel: &CancelToken) -> CoreResult<ExecResult>;
    async fn find_many(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<Vec<Row>>;
    async fn find_first(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<Option<Row>>;
    /// Convenience over `find_first` with an equality filter on the primary
    /// key; unlike `find_first`, not-found is an error (§7).
    async fn find_by_id(&self, model: &str, id: Value, cancel: &CancelToken) -> CoreResult<Row>;
    async fn update(&self, model: &str, filter: Option<Condition>, data: RowData, cancel: &CancelToken) -> CoreResult<ExecResult>;
    async fn delete(&self, model: &str, filter: Option<Condition>, cancel: &CancelToken) -> CoreResult<ExecResult>;
    async fn count(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<u64>;
    async fn exists(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<bool>;
    async fn raw(&self, statement: &str, params: Vec<Value>, cancel: &CancelToken) -> CoreResult<Vec<Row>>;

    async fn begin(&self) -> CoreResult<Box<dyn Transaction>>;
}

/// A transaction handle bound to a single connection (§5: "must not be
/// shared across threads"). Mirrors `Database`'s CRUD surface exactly, as
/// the scoped `transaction` helper below relies on.
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn insert(&self, model: &str, data: RowData, cancel: &CancelToken) -> CoreResult<ExecResult>;
    async fn find_many(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<Vec<Row>>;
    async fn find_first(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<Option<Row>>;
    async fn find_by_id(&self, model: &str, id: Value, cancel: &CancelToken) -> CoreResult<Row>;
    async fn update(&self, model: &str, filter: Option<Condition>, data: RowData, cancel: &CancelToken) -> CoreResult<ExecResult>;
    async fn delete(&self, model: &str, filter: Option<Condition>, cancel: &CancelToken) -> CoreResult<ExecResult>;
    async fn count(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<u64>;
    async fn raw(&self, statement: &str, params: Vec<Value>, cancel: &CancelToken) -> CoreResult<Vec<Row>>;

    async fn commit(self: Box<Self>) -> CoreResult<()>;
    async fn rollback(self: Box<Self>) -> CoreResult<()>;
}

/// Runs `f` inside a transaction: commits on `Ok`, rolls back on `Err` (and
/// on any error from `begin`/`commit` itself), guaranteeing release on every
/// exit path (§5). `f` is handed a borrowed `&dyn Transaction` rather than
/// an owned handle, since `commit`/`rollback` need to consume the box
/// afterwards.
pub async fn transaction<T>(
    db: &dyn Database,
    f: impl for<'c> FnOnce(&'c dyn Transaction) -> BoxFuture<'c, CoreResult<T>>,
) -> CoreResult<T> {
    let tx = db.begin().await?;
    match f(tx.as_ref()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            let _ = tx.rollback().await;
            Err(err)
        }
    }
}

/// Per-dialect DDL generation, catalog introspection, and diffing (§4.3,
/// §4.6). Every concrete driver in `redi-drivers` implements this alongside
/// `Database`; `redi-migrate` orchestrates calls into it across the whole
/// schema registry.
#[async_trait]
pub trait DatabaseMigrator: Send + Sync {
    async fn get_tables(&self) -> CoreResult<Vec<String>>;
    async fn get_table_info(&self, table: &str) -> CoreResult<TableInfo>;
    fn is_system_table(&self, table: &str) -> bool;

    fn generate_create_table_sql(&self, schema: &Schema) -> CoreResult<String>;
    fn generate_drop_table_sql(&self, table: &str) -> String;
    fn generate_add_column_sql(&self, table: &str, field: &Field) -> CoreResult<String>;
    /// SQLite has no native `ALTER COLUMN`; it returns the create-new/copy/
    /// drop-old/rename sequence as multiple statements (§4.4), reading the
    /// table's current shape via [`DatabaseMigrator::get_table_info`] to
    /// rebuild every column and index, not just the one being changed.
    /// Other dialects return one or a few `ALTER TABLE` statements and don't
    /// need to look anything up, but the method is async across the board
    /// so the trait has one calling convention.
    async fn generate_modify_column_sql(&self, table: &str, field: &Field) -> CoreResult<Vec<String>>;
    fn generate_drop_column_sql(&self, table: &str, column: &str) -> Vec<String>;
    fn generate_create_index_sql(&self, table: &str, index: &Index) -> String;
    fn generate_drop_index_sql(&self, table: &str, index_name: &str) -> String;

    /// Applies `statements` in order, inside a single transaction when the
    /// dialect supports transactional DDL; otherwise best-effort with early
    /// abort on first failure (§4.6 step 4). Checked against `cancel` before
    /// each statement, so a migration aborted mid-way leaves exactly the
    /// statements already applied in place.
    async fn apply_migration(&self, statements: &[String], cancel: &CancelToken) -> CoreResult<()>;

    /// Computes the full [`MigrationPlan`] reconciling `registry` against
    /// the live `tables` (§4.6 step 2).
    fn compare_schema(
        &self,
        registry: &SchemaRegistry,
        tables: &HashMap<String, TableInfo>,
    ) -> CoreResult<MigrationPlan>;

    /// Renders `plan` to SQL in the fixed order: create tables, add
    /// columns, modify columns, create indexes, drop indexes, drop columns,
    /// drop tables (§4.6 step 3).
    async fn generate_migration_sql(&self, plan: &MigrationPlan, registry: &SchemaRegistry) -> CoreResult<Vec<String>>;

    fn map_database_type_to_field_type(&self, db_type: &str) -> FieldType;
    fn map_field_type(&self, field_type: &FieldType) -> String;
    fn format_default_value(&self, default: &DefaultValue) -> String;
    /// Recognises dialect-specific spellings (`CURRENT_TIMESTAMP`, `NOW()`)
    /// and normalises them to the `now()` IR sentinel (§4.4, §4.7).
    fn normalize_default_to_prisma_function(&self, raw: &str) -> Option<DefaultValue>;
}
