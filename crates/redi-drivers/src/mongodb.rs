//! MongoDB driver (§4.3, §4.4).
//!
//! Grounded on the teacher's `engine/drivers/mongodb.rs`: a single `Client`
//! shared across calls, connection-string assembly, and the
//! `Mutex<Option<ClientSession>>` pattern for transactions. Everything
//! downstream of that is MongoDB-specific since there is no SQL surface:
//! models map to collections, rows to BSON documents, and `Condition` is
//! translated to a BSON filter document instead of a WHERE clause.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, ClientSession};
use tokio::sync::{Mutex, RwLock};

use redi_core::migration::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableInfo};
use redi_core::query::ast::{Condition, Op, OrderDirection, SelectQuery};
use redi_core::registry::DriverFactory;
use redi_core::traits::{Database, DatabaseMigrator, Transaction};
use redi_core::{CancelToken, CoreError, CoreResult, DialectKind, ExecResult, MigrationPlan, Row, RowData, Value};
use redi_schema::{DefaultValue, FieldType, Index, Schema, SchemaRegistry};

fn value_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Int(i) => Bson::Int64(*i),
        Value::Float(f) => Bson::Double(*f),
        Value::Text(s) => Bson::String(s.clone()),
        Value::Bytes(b) => Bson::Binary(mongodb::bson::Binary { subtype: mongodb::bson::spec::BinarySubtype::Generic, bytes: b.clone() }),
        Value::DateTime(dt) => Bson::DateTime(mongodb::bson::DateTime::from_chrono(*dt)),
        Value::Decimal(d) => Bson::String(d.to_string()),
        Value::Json(j) => mongodb::bson::to_bson(j).unwrap_or(Bson::Null),
        Value::Array(items) => Bson::Array(items.iter().map(value_to_bson).collect()),
    }
}

fn bson_to_value(bson: &Bson) -> Value {
    match bson {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::Int(*i as i64),
        Bson::Int64(i) => Value::Int(*i),
        Bson::Double(f) => Value::Float(*f),
        Bson::String(s) => Value::Text(s.clone()),
        Bson::Binary(b) => Value::Bytes(b.bytes.clone()),
        Bson::DateTime(dt) => Value::DateTime(dt.to_chrono()),
        Bson::ObjectId(oid) => Value::Text(oid.to_hex()),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_value).collect()),
        Bson::Document(doc) => {
            Value::Json(serde_json::to_value(doc).unwrap_or(serde_json::Value::Null))
        }
        other => Value::Text(other.to_string()),
    }
}

fn document_to_row(schema: &Schema, doc: &Document) -> Row {
    let mut row = Row::new();
    for field in &schema.fields {
        let bson = if field.primary_key && field.column_name() == "_id" {
            doc.get("_id")
        } else {
            doc.get(&field.column_name())
        };
        row = row.with_column(field.name.clone(), bson.map(bson_to_value).unwrap_or(Value::Null));
    }
    row
}

fn row_data_to_document(data: &RowData) -> Document {
    let mut doc = Document::new();
    for (field, value) in &data.fields {
        doc.insert(field.clone(), value_to_bson(value));
    }
    doc
}

/// Translates a query-builder [`Condition`] tree into a MongoDB filter
/// document (§4.5). Column names are resolved through `schema` so field
/// names in the IR map to the document keys actually stored.
fn condition_to_filter(cond: &Condition, schema: &Schema) -> CoreResult<Document> {
    match cond {
        Condition::Leaf { field, op, values } => {
            let key = schema.get_column_name_by_field_name(field).unwrap_or_else(|| field.clone());
            let doc = match op {
                Op::Equals => doc! { &key: value_to_bson(&values[0]) },
                Op::NotEquals => doc! { &key: { "$ne": value_to_bson(&values[0]) } },
                Op::GreaterThan => doc! { &key: { "$gte": value_to_bson(&values[0]) } },
                Op::LessThan => doc! { &key: { "$lte": value_to_bson(&values[0]) } },
                Op::In => doc! { &key: { "$in": values.iter().map(value_to_bson).collect::<Vec<_>>() } },
                Op::NotIn => doc! { &key: { "$nin": values.iter().map(value_to_bson).collect::<Vec<_>>() } },
                Op::Contains => {
                    let text = values[0].as_str().unwrap_or_default();
                    doc! { &key: { "$regex": regex::escape(text), "$options": "i" } }
                }
                Op::StartsWith => {
                    let text = values[0].as_str().unwrap_or_default();
                    doc! { &key: { "$regex": format!("^{}", regex::escape(text)), "$options": "i" } }
                }
                Op::EndsWith => {
                    let text = values[0].as_str().unwrap_or_default();
                    doc! { &key: { "$regex": format!("{}$", regex::escape(text)), "$options": "i" } }
                }
                Op::Like => {
                    let pattern = values[0].as_str().unwrap_or_default().replace('%', ".*");
                    doc! { &key: { "$regex": pattern, "$options": "i" } }
                }
                Op::Between => {
                    doc! { &key: { "$gte": value_to_bson(&values[0]), "$lte": value_to_bson(&values[1]) } }
                }
                Op::IsNull => doc! { &key: Bson::Null },
                Op::IsNotNull => doc! { &key: { "$ne": Bson::Null } },
            };
            Ok(doc)
        }
        Condition::And(parts) => {
            let rendered: CoreResult<Vec<Document>> = parts.iter().map(|p| condition_to_filter(p, schema)).collect();
            Ok(doc! { "$and": rendered?.into_iter().map(Bson::Document).collect::<Vec<_>>() })
        }
        Condition::Or(parts) => {
            let rendered: CoreResult<Vec<Document>> = parts.iter().map(|p| condition_to_filter(p, schema)).collect();
            Ok(doc! { "$or": rendered?.into_iter().map(Bson::Document).collect::<Vec<_>>() })
        }
        Condition::Not(inner) => {
            let rendered = condition_to_filter(inner, schema)?;
            Ok(doc! { "$nor": [Bson::Document(rendered)] })
        }
    }
}

fn find_options_for(query: &SelectQuery) -> FindOptions {
    let mut builder = FindOptions::builder();
    if !query.order_by.is_empty() {
        let mut sort = Document::new();
        for order in &query.order_by {
            sort.insert(order.field.clone(), if order.direction == OrderDirection::Asc { 1 } else { -1 });
        }
        builder = builder.sort(sort);
    }
    if let Some(limit) = query.limit {
        builder = builder.limit(limit);
    }
    if let Some(offset) = query.offset {
        builder = builder.skip(offset as u64);
    }
    builder.build()
}

pub struct MongoDatabase {
    client: Client,
    database_name: String,
    schemas: Arc<std::sync::RwLock<SchemaRegistry>>,
    cancel: CancelToken,
}

impl MongoDatabase {
    pub async fn connect(uri: &str) -> CoreResult<Self> {
        let options = ClientOptions::parse(uri).await.map_err(|e| CoreError::connection(e.to_string()))?;
        let database_name = options.default_database.clone().unwrap_or_else(|| "redi".to_string());
        let client = Client::with_options(options).map_err(|e| CoreError::connection(e.to_string()))?;
        Ok(Self { client, database_name, schemas: Arc::new(std::sync::RwLock::new(SchemaRegistry::new())), cancel: CancelToken::new() })
    }

    fn schema_for(&self, model: &str) -> CoreResult<Schema> {
        self.schemas.read().unwrap().get(model).cloned().ok_or_else(|| CoreError::unknown_model(model))
    }

    fn collection(&self, schema: &Schema) -> mongodb::Collection<Document> {
        self.client.database(&self.database_name).collection(&schema.resolved_table_name())
    }

    fn check_cancelled(&self, cancel: &CancelToken) -> CoreResult<()> {
        if self.cancel.is_cancelled() || cancel.is_cancelled() {
            return Err(CoreError::cancelled());
        }
        Ok(())
    }
}

#[async_trait]
impl Database for MongoDatabase {
    fn driver_type(&self) -> DialectKind {
        DialectKind::MongoDb
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn supports_last_insert_id(&self) -> bool {
        false
    }

    fn characteristics(&self) -> redi_core::DriverCharacteristics {
        redi_core::DriverCharacteristics {
            returns_zero_rows_affected_for_unchanged: false,
            supports_last_insert_id: false,
            supports_returning_clause: false,
            migration_table_name: "redi_migrations".to_string(),
            system_index_patterns: vec!["system.%".to_string()],
            auto_increment_integer_type: "ObjectId".to_string(),
        }
    }

    async fn connect(&self) -> CoreResult<()> {
        self.client.database("admin").run_command(doc! { "ping": 1 }).await.map_err(|e| CoreError::connection(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> CoreResult<()> {
        Ok(())
    }

    async fn ping(&self) -> CoreResult<()> {
        self.client.database("admin").run_command(doc! { "ping": 1 }).await.map_err(|e| CoreError::connection(e.to_string()))?;
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

    /// Collections are created implicitly on first write; this only
    /// materializes declared unique indexes up front (§4.3: "model
    /// creation" on document stores means provisioning indexes, not DDL).
    async fn create_model(&self, name: &str) -> CoreResult<()> {
        let schema = self.schema_for(name)?;
        let collection = self.collection(&schema);
        for index in schema.unique_indexes().into_iter().chain(schema.indexes.clone()) {
            let keys: Document = index.fields.iter().map(|f| (f.clone(), Bson::Int32(1))).collect();
            let model = mongodb::IndexModel::builder()
                .keys(keys)
                .options(mongodb::options::IndexOptions::builder().unique(index.unique).name(index.name.clone()).build())
                .build();
            collection.create_index(model).await.map_err(|e| CoreError::migration(e.to_string()))?;
        }
        Ok(())
    }

    async fn drop_model(&self, name: &str) -> CoreResult<()> {
        let schema = self.schema_for(name)?;
        self.collection(&schema).drop().await.map_err(|e| CoreError::migration(e.to_string()))?;
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
        Arc::new(MongoMigrator { client: self.client.clone(), database_name: self.database_name.clone() })
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
        let doc = row_data_to_document(&data);
        let result = self.collection(&schema).insert_one(doc).await.map_err(|e| CoreError::connection(e.to_string()))?;
        let last_insert_id = result.inserted_id.as_object_id().map(|_| 0);
        Ok(ExecResult { rows_affected: 1, last_insert_id })
    }

    async fn find_many(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<Vec<Row>> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(&query.model)?;
        let filter = match &query.where_ {
            Some(cond) => condition_to_filter(cond, &schema)?,
            None => Document::new(),
        };
        let options = find_options_for(&query);
        let mut cursor =
            self.collection(&schema).find(filter).with_options(options).await.map_err(|e| CoreError::connection(e.to_string()))?;
        let mut rows = Vec::new();
        use futures::stream::TryStreamExt;
        while let Some(doc) = cursor.try_next().await.map_err(|e| CoreError::connection(e.to_string()))? {
            rows.push(document_to_row(&schema, &doc));
        }
        Ok(rows)
    }

    async fn find_first(&self, mut query: SelectQuery, cancel: &CancelToken) -> CoreResult<Option<Row>> {
        query.limit = Some(1);
        Ok(self.find_many(query, cancel).await?.into_iter().next())
    }

    async fn find_by_id(&self, model: &str, id: Value, cancel: &CancelToken) -> CoreResult<Row> {
        let schema = self.schema_for(model)?;
        let pk_field =
            schema.single_primary_key_field().ok_or_else(|| CoreError::unknown_field(model, "<primary key>"))?.name.clone();
        let mut query = SelectQuery::new(model);
        query.where_ = Some(redi_core::query::builder::FieldCondition::new(&pk_field).equals(id));
        self.find_first(query, cancel).await?.ok_or_else(|| CoreError::unknown_field(model, &pk_field))
    }

    async fn update(&self, model: &str, filter: Option<Condition>, data: RowData, cancel: &CancelToken) -> CoreResult<ExecResult> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(model)?;
        let mongo_filter = match &filter {
            Some(cond) => condition_to_filter(cond, &schema)?,
            None => Document::new(),
        };
        let update_doc = doc! { "$set": row_data_to_document(&data) };
        let result = self
            .collection(&schema)
            .update_many(mongo_filter, update_doc)
            .await
            .map_err(|e| CoreError::connection(e.to_string()))?;
        Ok(ExecResult { rows_affected: result.modified_count, last_insert_id: None })
    }

    async fn delete(&self, model: &str, filter: Option<Condition>, cancel: &CancelToken) -> CoreResult<ExecResult> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(model)?;
        let mongo_filter = match &filter {
            Some(cond) => condition_to_filter(cond, &schema)?,
            None => Document::new(),
        };
        let result =
            self.collection(&schema).delete_many(mongo_filter).await.map_err(|e| CoreError::connection(e.to_string()))?;
        Ok(ExecResult { rows_affected: result.deleted_count, last_insert_id: None })
    }

    async fn count(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<u64> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(&query.model)?;
        let filter = match &query.where_ {
            Some(cond) => condition_to_filter(cond, &schema)?,
            None => Document::new(),
        };
        self.collection(&schema).count_documents(filter).await.map_err(|e| CoreError::connection(e.to_string()))
    }

    async fn exists(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<bool> {
        Ok(self.count(query, cancel).await? > 0)
    }

    /// Treats `statement` as a JSON-encoded command document run against
    /// the database (`{"find": "...", ...}`), since Mongo has no SQL text
    /// to speak of.
    async fn raw(&self, statement: &str, _params: Vec<Value>, cancel: &CancelToken) -> CoreResult<Vec<Row>> {
        self.check_cancelled(cancel)?;
        let command: Document =
            serde_json::from_str::<serde_json::Value>(statement)
                .ok()
                .and_then(|v| mongodb::bson::to_document(&v).ok())
                .ok_or_else(|| CoreError::config("raw statement must be a JSON command document"))?;
        let result = self
            .client
            .database(&self.database_name)
            .run_command(command)
            .await
            .map_err(|e| CoreError::connection(e.to_string()))?;
        let mut row = Row::new();
        for (k, v) in result.iter() {
            row = row.with_column(k.clone(), bson_to_value(v));
        }
        Ok(vec![row])
    }

    async fn begin(&self) -> CoreResult<Box<dyn Transaction>> {
        let session = self.client.start_session().await.map_err(|e| CoreError::transaction(e.to_string()))?;
        Ok(Box::new(MongoTransaction {
            client: self.client.clone(),
            database_name: self.database_name.clone(),
            session: Mutex::new(Some(session)),
            schemas: self.schemas.clone(),
            cancel: self.cancel.clone(),
        }))
    }
}

/// Wraps a `ClientSession` in a replica-set transaction (§4.3). Standalone
/// Mongo deployments without replication cannot start transactions; callers
/// targeting those should avoid `begin()`.
pub struct MongoTransaction {
    client: Client,
    database_name: String,
    session: Mutex<Option<ClientSession>>,
    schemas: Arc<std::sync::RwLock<SchemaRegistry>>,
    cancel: CancelToken,
}

impl MongoTransaction {
    fn schema_for(&self, model: &str) -> CoreResult<Schema> {
        self.schemas.read().unwrap().get(model).cloned().ok_or_else(|| CoreError::unknown_model(model))
    }

    fn collection(&self, schema: &Schema) -> mongodb::Collection<Document> {
        self.client.database(&self.database_name).collection(&schema.resolved_table_name())
    }

    fn check_cancelled(&self, cancel: &CancelToken) -> CoreResult<()> {
        if self.cancel.is_cancelled() || cancel.is_cancelled() {
            return Err(CoreError::cancelled());
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for MongoTransaction {
    async fn insert(&self, model: &str, data: RowData, cancel: &CancelToken) -> CoreResult<ExecResult> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(model)?;
        let doc = row_data_to_document(&data);
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(|| CoreError::transaction("transaction already finished"))?;
        self.collection(&schema)
            .insert_one(doc)
            .session(session)
            .await
            .map_err(|e| CoreError::connection(e.to_string()))?;
        Ok(ExecResult { rows_affected: 1, last_insert_id: None })
    }

    async fn find_many(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<Vec<Row>> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(&query.model)?;
        let filter = match &query.where_ {
            Some(cond) => condition_to_filter(cond, &schema)?,
            None => Document::new(),
        };
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(|| CoreError::transaction("transaction already finished"))?;
        let mut cursor = self
            .collection(&schema)
            .find(filter)
            .with_options(find_options_for(&query))
            .session(&mut *session)
            .await
            .map_err(|e| CoreError::connection(e.to_string()))?;
        let mut rows = Vec::new();
        while let Some(doc) =
            cursor.next(&mut *session).await.transpose().map_err(|e| CoreError::connection(e.to_string()))?
        {
            rows.push(document_to_row(&schema, &doc));
        }
        Ok(rows)
    }

    async fn find_first(&self, mut query: SelectQuery, cancel: &CancelToken) -> CoreResult<Option<Row>> {
        query.limit = Some(1);
        Ok(self.find_many(query, cancel).await?.into_iter().next())
    }

    async fn find_by_id(&self, model: &str, id: Value, cancel: &CancelToken) -> CoreResult<Row> {
        let schema = self.schema_for(model)?;
        let pk_field =
            schema.single_primary_key_field().ok_or_else(|| CoreError::unknown_field(model, "<primary key>"))?.name.clone();
        let mut query = SelectQuery::new(model);
        query.where_ = Some(redi_core::query::builder::FieldCondition::new(&pk_field).equals(id));
        self.find_first(query, cancel).await?.ok_or_else(|| CoreError::unknown_field(model, &pk_field))
    }

    async fn update(&self, model: &str, filter: Option<Condition>, data: RowData, cancel: &CancelToken) -> CoreResult<ExecResult> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(model)?;
        let mongo_filter = match &filter {
            Some(cond) => condition_to_filter(cond, &schema)?,
            None => Document::new(),
        };
        let update_doc = doc! { "$set": row_data_to_document(&data) };
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(|| CoreError::transaction("transaction already finished"))?;
        let result = self
            .collection(&schema)
            .update_many(mongo_filter, update_doc)
            .session(session)
            .await
            .map_err(|e| CoreError::connection(e.to_string()))?;
        Ok(ExecResult { rows_affected: result.modified_count, last_insert_id: None })
    }

    async fn delete(&self, model: &str, filter: Option<Condition>, cancel: &CancelToken) -> CoreResult<ExecResult> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(model)?;
        let mongo_filter = match &filter {
            Some(cond) => condition_to_filter(cond, &schema)?,
            None => Document::new(),
        };
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(|| CoreError::transaction("transaction already finished"))?;
        let result = self
            .collection(&schema)
            .delete_many(mongo_filter)
            .session(session)
            .await
            .map_err(|e| CoreError::connection(e.to_string()))?;
        Ok(ExecResult { rows_affected: result.deleted_count, last_insert_id: None })
    }

    async fn count(&self, query: SelectQuery, cancel: &CancelToken) -> CoreResult<u64> {
        self.check_cancelled(cancel)?;
        let schema = self.schema_for(&query.model)?;
        let filter = match &query.where_ {
            Some(cond) => condition_to_filter(cond, &schema)?,
            None => Document::new(),
        };
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(|| CoreError::transaction("transaction already finished"))?;
        self.collection(&schema).count_documents(filter).session(session).await.map_err(|e| CoreError::connection(e.to_string()))
    }

    async fn raw(&self, statement: &str, _params: Vec<Value>, cancel: &CancelToken) -> CoreResult<Vec<Row>> {
        self.check_cancelled(cancel)?;
        let command: Document =
            serde_json::from_str::<serde_json::Value>(statement)
                .ok()
                .and_then(|v| mongodb::bson::to_document(&v).ok())
                .ok_or_else(|| CoreError::config("raw statement must be a JSON command document"))?;
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(|| CoreError::transaction("transaction already finished"))?;
        let result = self
            .client
            .database(&self.database_name)
            .run_command(command)
            .session(session)
            .await
            .map_err(|e| CoreError::connection(e.to_string()))?;
        let mut row = Row::new();
        for (k, v) in result.iter() {
            row = row.with_column(k.clone(), bson_to_value(v));
        }
        Ok(vec![row])
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let mut guard = self.session.lock().await;
        let mut session = guard.take().ok_or_else(|| CoreError::transaction("transaction already finished"))?;
        session.commit_transaction().await.map_err(|e| CoreError::transaction(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> CoreResult<()> {
        let mut guard = self.session.lock().await;
        let mut session = guard.take().ok_or_else(|| CoreError::transaction("transaction already finished"))?;
        session.abort_transaction().await.map_err(|e| CoreError::transaction(e.to_string()))
    }
}

/// MongoDB has no catalog DDL; "migration" here means provisioning indexes
/// and reporting what exists. Column type changes and renames have no
/// equivalent on a schema-less store, so the diff only ever produces index
/// and collection adds/drops.
pub struct MongoMigrator {
    client: Client,
    database_name: String,
}

#[async_trait]
impl DatabaseMigrator for MongoMigrator {
    async fn get_tables(&self) -> CoreResult<Vec<String>> {
        self.client
            .database(&self.database_name)
            .list_collection_names()
            .await
            .map_err(|e| CoreError::introspection(e.to_string()))
    }

    async fn get_table_info(&self, table: &str) -> CoreResult<TableInfo> {
        let collection = self.client.database(&self.database_name).collection::<Document>(table);
        let indexes_cursor = collection.list_indexes().await.map_err(|e| CoreError::introspection(e.to_string()))?;
        use futures::stream::TryStreamExt;
        let models: Vec<mongodb::IndexModel> = indexes_cursor.try_collect().await.map_err(|e| CoreError::introspection(e.to_string()))?;
        let indexes = models
            .into_iter()
            .filter(|m| m.options.as_ref().and_then(|o| o.name.clone()).as_deref() != Some("_id_"))
            .map(|m| {
                let columns = m.keys.keys().map(|k| k.to_string()).collect();
                let unique = m.options.as_ref().and_then(|o| o.unique).unwrap_or(false);
                let name = m.options.and_then(|o| o.name).unwrap_or_default();
                IndexInfo { name, columns, unique }
            })
            .collect();
        Ok(TableInfo { columns: Vec::new(), indexes, foreign_keys: Vec::new() })
    }

    fn is_system_table(&self, table: &str) -> bool {
        table == "redi_migrations" || table.starts_with("system.")
    }

    fn generate_create_table_sql(&self, _schema: &Schema) -> CoreResult<String> {
        Ok(String::new())
    }

    fn generate_drop_table_sql(&self, table: &str) -> String {
        table.to_string()
    }

    fn generate_add_column_sql(&self, _table: &str, _field: &redi_schema::Field) -> CoreResult<String> {
        Ok(String::new())
    }

    async fn generate_modify_column_sql(&self, _table: &str, _field: &redi_schema::Field) -> CoreResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn generate_drop_column_sql(&self, _table: &str, _column: &str) -> Vec<String> {
        Vec::new()
    }

    fn generate_create_index_sql(&self, table: &str, index: &Index) -> String {
        format!("{table}::create_index::{}", index.name)
    }

    fn generate_drop_index_sql(&self, table: &str, index_name: &str) -> String {
        format!("{table}::drop_index::{index_name}")
    }

    /// Statements encode `{table}::create_index::{name}` /
    /// `{table}::drop_index::{name}` markers produced above, since there is
    /// no DDL text to execute as such.
    async fn apply_migration(&self, statements: &[String], cancel: &CancelToken) -> CoreResult<()> {
        for statement in statements {
            if cancel.is_cancelled() {
                return Err(CoreError::cancelled());
            }
            if statement.is_empty() {
                continue;
            }
            let Some((table, rest)) = statement.split_once("::") else { continue };
            let Some((action, name)) = rest.split_once("::") else { continue };
            let collection = self.client.database(&self.database_name).collection::<Document>(table);
            match action {
                "create_index" => {
                    let model = mongodb::IndexModel::builder()
                        .keys(doc! { name: 1 })
                        .options(mongodb::options::IndexOptions::builder().name(name.to_string()).build())
                        .build();
                    collection.create_index(model).await.map_err(|e| CoreError::migration(e.to_string()))?;
                }
                "drop_index" => {
                    collection.drop_index(name).await.map_err(|e| CoreError::migration(e.to_string()))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn compare_schema(&self, registry: &SchemaRegistry, tables: &HashMap<String, TableInfo>) -> CoreResult<MigrationPlan> {
        let mut plan = MigrationPlan::new();
        for schema in registry.iter() {
            let table = schema.resolved_table_name();
            if !tables.contains_key(&table) {
                plan.create_tables.push(table.clone());
            }
            let mut declared = schema.unique_indexes();
            declared.extend(schema.indexes.clone());
            let live = tables.get(&table);
            for index in &declared {
                let exists = live.map(|t| t.indexes.iter().any(|i| i.name == index.name)).unwrap_or(false);
                if !exists {
                    plan.create_indexes.push(redi_core::migration::IndexDiff {
                        table: table.clone(),
                        index: IndexInfo { name: index.name.clone(), columns: index.fields.clone(), unique: index.unique },
                    });
                }
            }
        }
        Ok(plan)
    }

    async fn generate_migration_sql(&self, plan: &MigrationPlan, _registry: &SchemaRegistry) -> CoreResult<Vec<String>> {
        let mut statements = Vec::new();
        for table in &plan.create_tables {
            statements.push(String::new());
            let _ = table;
        }
        for diff in &plan.create_indexes {
            let index = Index { name: diff.index.name.clone(), fields: diff.index.columns.clone(), unique: diff.index.unique };
            statements.push(self.generate_create_index_sql(&diff.table, &index));
        }
        for diff in &plan.drop_indexes {
            statements.push(self.generate_drop_index_sql(&diff.table, &diff.index.name));
        }
        Ok(statements)
    }

    fn map_database_type_to_field_type(&self, _db_type: &str) -> FieldType {
        FieldType::Json
    }

    fn map_field_type(&self, _field_type: &FieldType) -> String {
        String::new()
    }

    fn format_default_value(&self, _default: &DefaultValue) -> String {
        String::new()
    }

    fn normalize_default_to_prisma_function(&self, _raw: &str) -> Option<DefaultValue> {
        None
    }
}

pub struct MongoFactory;

#[async_trait]
impl DriverFactory for MongoFactory {
    fn scheme(&self) -> &'static str {
        "mongodb"
    }

    async fn connect(&self, uri: &str) -> CoreResult<Arc<dyn Database>> {
        Ok(Arc::new(MongoDatabase::connect(uri).await?))
    }
}
