//! C7: reconstructs schema IR from a live catalog (§4.7). Grounded on the
//! same introspection-connector pairing shape the teacher uses for its
//! table-browser metadata, repurposed here from "describe a table for the
//! UI" to "reconstruct a typed model".

use std::collections::HashMap;

use redi_core::traits::DatabaseMigrator;
use redi_core::{ColumnInfo, CoreResult, ForeignKeyInfo, TableInfo};
use redi_schema::naming::{column_name_to_field_name, table_name_to_model_name};
use redi_schema::{DefaultValue, Field, FieldType, Index, LiteralValue, Relation, RelationType, Schema};

/// Reconstructs one [`Schema`] per non-system table, without yet resolving
/// relations (needs every schema built first so foreign keys can be
/// resolved against the referenced model's field names).
fn table_to_schema(table: &str, info: &TableInfo, migrator: &dyn DatabaseMigrator) -> Schema {
    let model_name = table_name_to_model_name(table);
    let mut schema = Schema::new(&model_name);
    if model_name_roundtrip_mismatch(&model_name, table) {
        schema = schema.with_table_name(table);
    }

    let pk_columns: Vec<&ColumnInfo> = info.columns.iter().filter(|c| c.is_primary_key).collect();
    let single_column_unique: std::collections::HashSet<&str> = info
        .indexes
        .iter()
        .filter(|idx| idx.unique && idx.columns.len() == 1)
        .map(|idx| idx.columns[0].as_str())
        .collect();

    for column in &info.columns {
        let mut field = column_to_field(column, migrator, single_column_unique.contains(column.name.as_str()));
        if pk_columns.len() > 1 {
            field.primary_key = false;
        }
        schema = schema.add_field(field);
    }

    if pk_columns.len() > 1 {
        let composite: Vec<String> = pk_columns.iter().map(|c| column_name_to_field_name(&c.name)).collect();
        schema = schema.with_composite_key(composite);
    }

    for index in &info.indexes {
        if index.columns.len() == 1 && index.unique {
            continue; // already folded into the field's `unique` flag
        }
        let fields = index.columns.iter().map(|c| column_name_to_field_name(c)).collect();
        schema = schema.add_index(Index { name: index.name.clone(), fields, unique: index.unique });
    }

    schema
}

/// `table_name_to_model_name` is lossy for irregular plurals/casing; when
/// the forward mapping wouldn't reproduce the original table name, pin it
/// explicitly with `@@map` instead of silently renaming the live table.
fn model_name_roundtrip_mismatch(model_name: &str, table: &str) -> bool {
    redi_schema::naming::model_name_to_table_name(model_name) != table
}

fn column_to_field(column: &ColumnInfo, migrator: &dyn DatabaseMigrator, unique_via_index: bool) -> Field {
    let field_name = column_name_to_field_name(&column.name);
    let mut field = Field::new(&field_name, migrator.map_database_type_to_field_type(&column.data_type));
    field.primary_key = column.is_primary_key;
    field.auto_increment = column.auto_increment;
    field.nullable = column.nullable;
    field.unique = unique_via_index;
    if redi_schema::naming::field_name_to_column_name(&field_name) != column.name {
        field.map = Some(column.name.clone());
    }
    if let Some(raw) = &column.default_value {
        field.default = Some(normalize_default(raw, migrator));
    }
    field
}

fn normalize_default(raw: &str, migrator: &dyn DatabaseMigrator) -> DefaultValue {
    migrator.normalize_default_to_prisma_function(raw).unwrap_or_else(|| DefaultValue::Literal(LiteralValue::String(raw.to_string())))
}

/// Infers the two sides of every foreign key (§4.7): a `ManyToOne` on the
/// child pointing at the parent, and a reciprocal `OneToMany` on the parent.
/// Runs after every table's base schema exists so referenced column names
/// resolve to field names on the parent model.
fn infer_relations(schemas: &mut HashMap<String, Schema>, table_to_model: &HashMap<String, String>, fks_by_table: &HashMap<String, Vec<ForeignKeyInfo>>) {
    let mut to_apply: Vec<(String, Relation, String, Relation)> = Vec::new();

    for (table, fks) in fks_by_table {
        let Some(child_model) = table_to_model.get(table) else { continue };
        for fk in fks {
            let Some(parent_model) = table_to_model.get(&fk.referenced_table) else { continue };
            let Some(parent_schema) = schemas.get(parent_model) else { continue };
            let fk_field = column_name_to_field_name(&fk.column);
            let referenced_field = parent_schema
                .get_field_name_by_column_name(&fk.referenced_column)
                .unwrap_or_else(|| column_name_to_field_name(&fk.referenced_column));

            let child_relation_name = singular_lower(parent_model);
            let child_relation = Relation {
                field_name: child_relation_name,
                r#type: RelationType::ManyToOne,
                model: parent_model.clone(),
                foreign_key: vec![fk_field],
                references: vec![referenced_field],
                on_delete: None,
                on_update: None,
                through_table: None,
            };

            let parent_relation_name = plural_lower(child_model);
            let parent_relation = Relation {
                field_name: parent_relation_name,
                r#type: RelationType::OneToMany,
                model: child_model.clone(),
                foreign_key: Vec::new(),
                references: Vec::new(),
                on_delete: None,
                on_update: None,
                through_table: None,
            };

            to_apply.push((child_model.clone(), child_relation, parent_model.clone(), parent_relation));
        }
    }

    for (child_model, child_relation, parent_model, parent_relation) in to_apply {
        if let Some(schema) = schemas.remove(&child_model) {
            schemas.insert(child_model, schema.add_relation(child_relation));
        }
        if let Some(schema) = schemas.remove(&parent_model) {
            schemas.insert(parent_model, schema.add_relation(parent_relation));
        }
    }
}

/// camelCase singular of a model name, used as a `ManyToOne` relation's
/// field name (`Author` -> `author`).
fn singular_lower(model_name: &str) -> String {
    use convert_case::{Case, Casing};
    model_name.to_case(Case::Camel)
}

/// camelCase plural of a model name, used as the reciprocal `OneToMany`
/// relation's field name (`Post` -> `posts`, `Category` -> `categories`).
fn plural_lower(model_name: &str) -> String {
    use convert_case::{Case, Casing};
    redi_schema::naming::model_name_to_table_name(model_name).to_case(Case::Camel)
}

/// Reconstructs every non-system table in `tables` into a [`Schema`], with
/// relations inferred from foreign keys (§4.7).
pub fn reconstruct_schemas(tables: &HashMap<String, TableInfo>, migrator: &dyn DatabaseMigrator) -> Vec<Schema> {
    let mut schemas: HashMap<String, Schema> = HashMap::new();
    let mut table_to_model: HashMap<String, String> = HashMap::new();
    let mut fks_by_table: HashMap<String, Vec<ForeignKeyInfo>> = HashMap::new();

    for (table, info) in tables {
        let schema = table_to_schema(table, info, migrator);
        table_to_model.insert(table.clone(), schema.name.clone());
        fks_by_table.insert(table.clone(), info.foreign_keys.clone());
        schemas.insert(schema.name.clone(), schema);
    }

    infer_relations(&mut schemas, &table_to_model, &fks_by_table);

    let mut out: Vec<Schema> = schemas.into_values().collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

/// Introspects the live database and reconstructs every table it contains.
pub async fn pull(migrator: &dyn DatabaseMigrator) -> CoreResult<Vec<Schema>> {
    let tables = crate::introspect::introspect_all(migrator).await?;
    Ok(reconstruct_schemas(&tables, migrator))
}

/// Renders `schemas` back to Prisma-compatible DSL text (§4.2, §4.7), the
/// inverse of `redi_schema::prisma::parse_schema`.
pub fn render_prisma(schemas: &[Schema]) -> String {
    let mut out = String::new();
    for schema in schemas {
        out.push_str(&render_model(schema));
        out.push('\n');
    }
    out
}

fn render_model(schema: &Schema) -> String {
    let mut out = format!("model {} {{\n", schema.name);
    for field in &schema.fields {
        out.push_str(&render_field(field));
    }
    for relation in schema.relations.values() {
        out.push_str(&render_relation(relation));
    }
    if let Some(table_name) = &schema.table_name {
        out.push_str(&format!("  @@map(\"{table_name}\")\n"));
    }
    if let Some(composite) = &schema.composite_key {
        out.push_str(&format!("  @@id([{}])\n", composite.join(", ")));
    }
    for index in &schema.indexes {
        let fields = index.fields.join(", ");
        if index.unique {
            out.push_str(&format!("  @@unique([{fields}], map: \"{}\")\n", index.name));
        } else {
            out.push_str(&format!("  @@index([{fields}])\n"));
        }
    }
    out.push_str("}\n");
    out
}

fn render_field(field: &Field) -> String {
    let mut type_name = render_type(&field.r#type);
    if field.nullable {
        type_name.push('?');
    }
    let mut attrs = Vec::new();
    if field.primary_key {
        attrs.push("@id".to_string());
    }
    if let Some(default) = &field.default {
        attrs.push(format!("@default({})", render_default(default)));
    }
    if field.unique {
        attrs.push("@unique".to_string());
    }
    if let Some(map) = &field.map {
        attrs.push(format!("@map(\"{map}\")"));
    }
    let attr_text = if attrs.is_empty() { String::new() } else { format!(" {}", attrs.join(" ")) };
    format!("  {} {}{}\n", field.name, type_name, attr_text)
}

fn render_relation(relation: &Relation) -> String {
    let model = match relation.r#type {
        RelationType::OneToMany => format!("{}[]", relation.model),
        _ => relation.model.clone(),
    };
    if relation.foreign_key.is_empty() {
        format!("  {} {}\n", relation.field_name, model)
    } else {
        format!(
            "  {} {} @relation(fields: [{}], references: [{}])\n",
            relation.field_name,
            model,
            relation.foreign_key.join(", "),
            relation.references.join(", ")
        )
    }
}

fn render_type(field_type: &FieldType) -> String {
    match field_type {
        FieldType::String => "String".to_string(),
        FieldType::Int => "Int".to_string(),
        FieldType::Int64 => "BigInt".to_string(),
        FieldType::Float => "Float".to_string(),
        FieldType::Bool => "Boolean".to_string(),
        FieldType::DateTime => "DateTime".to_string(),
        FieldType::Json => "Json".to_string(),
        FieldType::Decimal => "Decimal".to_string(),
        FieldType::Enum(name) => name.clone(),
        FieldType::Array(inner) => format!("{}[]", render_type(inner)),
    }
}

fn render_default(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Now => "now()".to_string(),
        DefaultValue::AutoIncrement => "autoincrement()".to_string(),
        DefaultValue::Uuid => "uuid()".to_string(),
        DefaultValue::Cuid => "cuid()".to_string(),
        DefaultValue::Literal(lit) => render_literal(lit),
    }
}

fn render_literal(literal: &LiteralValue) -> String {
    match literal {
        LiteralValue::String(s) | LiteralValue::EnumValue(s) => format!("\"{}\"", s.replace('"', "\\\"")),
        LiteralValue::Int(i) => i.to_string(),
        LiteralValue::Float(f) => f.to_string(),
        LiteralValue::Bool(b) => b.to_string(),
        LiteralValue::List(items) => format!("[{}]", items.iter().map(render_literal).collect::<Vec<_>>().join(", ")),
    }
}

/// Appends models from `pulled` whose name is not already declared in
/// `existing_source` to the end of the file, leaving every existing model
/// untouched (§4.7: "never overwrites existing ones").
pub fn merge_into_existing(existing_source: &str, pulled: &[Schema]) -> String {
    let new_models: Vec<&Schema> = pulled.iter().filter(|s| !existing_source.contains(&format!("model {} {{", s.name))).collect();
    if new_models.is_empty() {
        return existing_source.to_string();
    }
    let rendered: Vec<Schema> = new_models.into_iter().cloned().collect();
    let mut out = existing_source.to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&render_prisma(&rendered));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use redi_core::IndexInfo;

    struct StubMigrator;

    #[async_trait::async_trait]
    impl DatabaseMigrator for StubMigrator {
        async fn get_tables(&self) -> CoreResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn get_table_info(&self, _table: &str) -> CoreResult<TableInfo> {
            Ok(TableInfo::default())
        }
        fn is_system_table(&self, _table: &str) -> bool {
            false
        }
        fn generate_create_table_sql(&self, _schema: &Schema) -> CoreResult<String> {
            Ok(String::new())
        }
        fn generate_drop_table_sql(&self, table: &str) -> String {
            format!("DROP TABLE {table}")
        }
        fn generate_add_column_sql(&self, _table: &str, _field: &Field) -> CoreResult<String> {
            Ok(String::new())
        }
        async fn generate_modify_column_sql(&self, _table: &str, _field: &Field) -> CoreResult<Vec<String>> {
            Ok(Vec::new())
        }
        fn generate_drop_column_sql(&self, _table: &str, _column: &str) -> Vec<String> {
            Vec::new()
        }
        fn generate_create_index_sql(&self, _table: &str, _index: &Index) -> String {
            String::new()
        }
        fn generate_drop_index_sql(&self, _table: &str, _index_name: &str) -> String {
            String::new()
        }
        async fn apply_migration(&self, _statements: &[String], _cancel: &redi_core::CancelToken) -> CoreResult<()> {
            Ok(())
        }
        fn compare_schema(
            &self,
            _registry: &redi_schema::SchemaRegistry,
            _tables: &HashMap<String, TableInfo>,
        ) -> CoreResult<redi_core::MigrationPlan> {
            Ok(redi_core::MigrationPlan::new())
        }
        async fn generate_migration_sql(&self, _plan: &redi_core::MigrationPlan, _registry: &redi_schema::SchemaRegistry) -> CoreResult<Vec<String>> {
            Ok(Vec::new())
        }
        fn map_database_type_to_field_type(&self, db_type: &str) -> FieldType {
            match db_type {
                "INTEGER" => FieldType::Int,
                "BOOLEAN" => FieldType::Bool,
                _ => FieldType::String,
            }
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

    fn author_table() -> TableInfo {
        TableInfo {
            columns: vec![
                ColumnInfo { name: "id".into(), data_type: "INTEGER".into(), nullable: false, default_value: None, is_primary_key: true, auto_increment: true },
                ColumnInfo { name: "name".into(), data_type: "TEXT".into(), nullable: false, default_value: None, is_primary_key: false, auto_increment: false },
            ],
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    fn post_table() -> TableInfo {
        TableInfo {
            columns: vec![
                ColumnInfo { name: "id".into(), data_type: "INTEGER".into(), nullable: false, default_value: None, is_primary_key: true, auto_increment: true },
                ColumnInfo { name: "title".into(), data_type: "TEXT".into(), nullable: false, default_value: None, is_primary_key: false, auto_increment: false },
                ColumnInfo { name: "author_id".into(), data_type: "INTEGER".into(), nullable: false, default_value: None, is_primary_key: false, auto_increment: false },
            ],
            indexes: vec![IndexInfo { name: "posts_author_id_idx".into(), columns: vec!["author_id".into()], unique: false }],
            foreign_keys: vec![ForeignKeyInfo {
                column: "author_id".into(),
                referenced_table: "authors".into(),
                referenced_column: "id".into(),
                constraint_name: Some("posts_author_id_fkey".into()),
            }],
        }
    }

    #[test]
    fn reconstructs_model_names_and_field_names() {
        let migrator = StubMigrator;
        let mut tables = HashMap::new();
        tables.insert("authors".to_string(), author_table());
        let schemas = reconstruct_schemas(&tables, &migrator);
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "Author");
        assert!(schemas[0].field("id").unwrap().primary_key);
        assert!(schemas[0].field("name").is_some());
    }

    #[test]
    fn infers_many_to_one_and_one_to_many_relations() {
        let migrator = StubMigrator;
        let mut tables = HashMap::new();
        tables.insert("authors".to_string(), author_table());
        tables.insert("posts".to_string(), post_table());
        let schemas = reconstruct_schemas(&tables, &migrator);

        let post = schemas.iter().find(|s| s.name == "Post").unwrap();
        let author = schemas.iter().find(|s| s.name == "Author").unwrap();

        let to_author = post.relations.get("author").expect("Post should have an author relation");
        assert_eq!(to_author.r#type, RelationType::ManyToOne);
        assert_eq!(to_author.model, "Author");
        assert_eq!(to_author.foreign_key, vec!["authorId".to_string()]);
        assert_eq!(to_author.references, vec!["id".to_string()]);

        let to_posts = author.relations.get("posts").expect("Author should have a posts relation");
        assert_eq!(to_posts.r#type, RelationType::OneToMany);
        assert_eq!(to_posts.model, "Post");
    }

    #[test]
    fn column_names_that_roundtrip_are_not_explicitly_mapped() {
        let migrator = StubMigrator;
        let mut tables = HashMap::new();
        tables.insert("authors".to_string(), author_table());
        let schemas = reconstruct_schemas(&tables, &migrator);
        assert!(schemas[0].field("name").unwrap().map.is_none());
    }

    #[test]
    fn render_prisma_emits_id_and_relation_attributes() {
        let migrator = StubMigrator;
        let mut tables = HashMap::new();
        tables.insert("authors".to_string(), author_table());
        tables.insert("posts".to_string(), post_table());
        let schemas = reconstruct_schemas(&tables, &migrator);
        let rendered = render_prisma(&schemas);
        assert!(rendered.contains("model Author {"));
        assert!(rendered.contains("model Post {"));
        assert!(rendered.contains("@id"));
        assert!(rendered.contains("@relation(fields: [authorId], references: [id])"));
    }

    #[test]
    fn merge_into_existing_skips_models_already_present() {
        let existing = "model Author {\n  id Int @id\n}\n";
        let migrator = StubMigrator;
        let mut tables = HashMap::new();
        tables.insert("authors".to_string(), author_table());
        tables.insert("posts".to_string(), post_table());
        let schemas = reconstruct_schemas(&tables, &migrator);
        let merged = merge_into_existing(existing, &schemas);
        assert_eq!(merged.matches("model Author {").count(), 1);
        assert!(merged.contains("model Post {"));
    }
}
