//! Black-box scenario functions (§4.8, §8), parameterized over any
//! `&dyn Database` the way the teacher's `tests/integration_databases.rs`
//! parameterizes scenarios over a driver id. A driver's own test suite calls
//! these directly against a live connection; this crate's own tests run them
//! against an in-memory SQLite connection, cheap and hermetic.

use redi_core::traits::Database;
use redi_core::{CancelToken, FieldCondition, RowData, SelectQuery, Value};
use redi_migrate::{build_migration, compare, introspect_all};
use redi_schema::{Field, FieldType, Schema, SchemaRegistry};

/// A panic-free assertion surface: every scenario returns `Err` on the first
/// violated expectation instead of panicking, so a caller driving several
/// dialects through the same scenario can collect failures per-dialect.
pub type ScenarioResult = Result<(), String>;

fn user_schema() -> Schema {
    let mut id = Field::new("id", FieldType::Int);
    id.primary_key = true;
    id.auto_increment = true;
    let mut email = Field::new("email", FieldType::String);
    email.unique = true;
    let mut age = Field::new("age", FieldType::Int);
    age.nullable = true;
    let mut active = Field::new("active", FieldType::Bool);
    active.default = Some(redi_schema::DefaultValue::Literal(redi_schema::LiteralValue::Bool(true)));
    Schema::new("User").add_field(id).add_field(Field::new("name", FieldType::String)).add_field(email).add_field(age).add_field(active)
}

fn expect(condition: bool, message: impl Into<String>) -> ScenarioResult {
    if condition {
        Ok(())
    } else {
        Err(message.into())
    }
}

/// Scenario 1 (§8): insert, expect `LastInsertID=1`, and a row with
/// `age`/other-unset fields coming back null and the declared default
/// applied.
pub async fn crud_happy_path(db: &dyn Database) -> ScenarioResult {
    let cancel = CancelToken::new();
    db.register_schema(user_schema()).map_err(|e| e.to_string())?;
    db.create_model("User").await.map_err(|e| e.to_string())?;

    let data = RowData::new().with_field("name", Value::Text("Alice".into())).with_field("email", Value::Text("alice@example.com".into()));
    let result = db.insert("User", data, &cancel).await.map_err(|e| e.to_string())?;
    expect(result.last_insert_id == Some(1), format!("expected LastInsertID=1, got {:?}", result.last_insert_id))?;

    let row = db.find_by_id("User", Value::Int(1), &cancel).await.map_err(|e| e.to_string())?;
    expect(row.get("name") == Some(&Value::Text("Alice".into())), "name mismatch")?;
    expect(row.get("email") == Some(&Value::Text("alice@example.com".into())), "email mismatch")?;
    expect(row.get("age").map(|v| v.is_null()).unwrap_or(true), "age should be null")?;
    expect(row.get("active") == Some(&Value::Bool(true)), "active should default to true")
}

/// Scenario 2 (§8): grow `User{id,name}` by two nullable columns, confirm
/// the existing row survives with nulls filled in, and a new insert gets
/// the next id.
pub async fn column_addition_migration(db: &dyn Database) -> ScenarioResult {
    let cancel = CancelToken::new();
    let mut small = Schema::new("User");
    let mut id = Field::new("id", FieldType::Int);
    id.primary_key = true;
    id.auto_increment = true;
    small = small.add_field(id).add_field(Field::new("name", FieldType::String));
    db.register_schema(small).map_err(|e| e.to_string())?;
    db.create_model("User").await.map_err(|e| e.to_string())?;
    db.insert("User", RowData::new().with_field("name", Value::Text("Alice".into())), &cancel).await.map_err(|e| e.to_string())?;

    let mut grown = user_schema();
    grown.fields.retain(|f| f.name != "active");
    db.register_schema(grown).map_err(|e| e.to_string())?;

    let migrator = db.migrator();
    let mut registry = SchemaRegistry::new();
    registry.register(db.get_schema("User").unwrap()).map_err(|e| e.to_string())?;
    let tables = introspect_all(migrator.as_ref()).await.map_err(|e| e.to_string())?;
    let plan = compare(&registry, &tables, migrator.as_ref()).map_err(|e| e.to_string())?;
    let migration = build_migration(&plan, &registry, migrator.as_ref(), "20260101000000", "add_email_and_age", false).await.map_err(|e| e.to_string())?;
    migrator.apply_migration(&migration.statements, &cancel).await.map_err(|e| e.to_string())?;

    let existing = db.find_by_id("User", Value::Int(1), &cancel).await.map_err(|e| e.to_string())?;
    expect(existing.get("name") == Some(&Value::Text("Alice".into())), "preserved row's name changed")?;
    expect(existing.get("email").map(|v| v.is_null()).unwrap_or(true), "preserved row's email should be null")?;

    let inserted = db
        .insert("User", RowData::new().with_field("name", Value::Text("Bob".into())).with_field("email", Value::Text("bob@test.com".into())).with_field("age", Value::Int(25)), &cancel)
        .await
        .map_err(|e| e.to_string())?;
    expect(inserted.last_insert_id == Some(2), format!("expected LastInsertID=2, got {:?}", inserted.last_insert_id))
}

/// Scenario 3 (§8): update a non-changing value on a mix of matching rows;
/// `RowsAffected` varies by `characteristics().returns_zero_rows_affected_for_unchanged`,
/// but `Count` after the update is dialect-independent.
pub async fn unchanged_update_rows_affected(db: &dyn Database) -> ScenarioResult {
    let cancel = CancelToken::new();
    db.register_schema(user_schema()).map_err(|e| e.to_string())?;
    db.create_model("User").await.map_err(|e| e.to_string())?;

    for i in 0..5 {
        let active = i != 4;
        db.insert(
            "User",
            RowData::new()
                .with_field("name", Value::Text(format!("User{i}")))
                .with_field("email", Value::Text(format!("user{i}@test.com")))
                .with_field("active", Value::Bool(active)),
            &cancel,
        )
        .await
        .map_err(|e| e.to_string())?;
    }

    let result = db.update("User", None, RowData::new().with_field("active", Value::Bool(false)), &cancel).await.map_err(|e| e.to_string())?;
    let characteristics = db.characteristics();
    let expected_rows_affected = if characteristics.returns_zero_rows_affected_for_unchanged { 4 } else { 5 };
    expect(result.rows_affected == expected_rows_affected, format!("expected RowsAffected={expected_rows_affected}, got {}", result.rows_affected))?;

    let mut count_query = SelectQuery::new("User");
    count_query.where_ = Some(FieldCondition::new("active").equals(false));
    let count = db.count(count_query, &cancel).await.map_err(|e| e.to_string())?;
    expect(count == 5, format!("expected Count(active=false)=5, got {count}"))
}

/// Scenario 4 (§8): insert without `RETURNING` yields `LastInsertID=0` on a
/// dialect without native auto-increment id retrieval; this is exercised
/// directly against `PostgresDatabase` by its own driver tests, since the
/// behaviour depends on whether the insert path requested a returning id.
pub async fn last_insert_id_without_native_support(db: &dyn Database, expects_zero_without_returning: bool) -> ScenarioResult {
    let cancel = CancelToken::new();
    db.register_schema(user_schema()).map_err(|e| e.to_string())?;
    db.create_model("User").await.map_err(|e| e.to_string())?;
    let result = db.insert("User", RowData::new().with_field("name", Value::Text("Alice".into())).with_field("email", Value::Text("alice@example.com".into())), &cancel).await.map_err(|e| e.to_string())?;
    if expects_zero_without_returning {
        expect(result.last_insert_id.unwrap_or(0) == 0, "expected LastInsertID=0 without RETURNING")
    } else {
        expect(result.last_insert_id.is_some(), "expected a LastInsertID")
    }
}

/// Scenario 5 (§8): deleting a `User` referenced by `Post`/`Comment` rows
/// must fail until the dependents are removed first; the core never
/// silently cascades.
pub async fn foreign_key_delete_ordering(db: &dyn Database) -> ScenarioResult {
    let cancel = CancelToken::new();
    let mut user_id = Field::new("id", FieldType::Int);
    user_id.primary_key = true;
    user_id.auto_increment = true;
    let user = Schema::new("FkUser").add_field(user_id).add_field(Field::new("name", FieldType::String));

    let mut post_id = Field::new("id", FieldType::Int);
    post_id.primary_key = true;
    post_id.auto_increment = true;
    let author_id = Field::new("authorId", FieldType::Int);
    let post_relation = redi_schema::Relation {
        field_name: "author".to_string(),
        r#type: redi_schema::RelationType::ManyToOne,
        model: "FkUser".to_string(),
        foreign_key: vec!["authorId".to_string()],
        references: vec!["id".to_string()],
        on_delete: Some(redi_schema::ReferentialAction::Restrict),
        on_update: None,
        through_table: None,
    };
    let post = Schema::new("FkPost").add_field(post_id).add_field(author_id).add_relation(post_relation);

    db.register_schema(user).map_err(|e| e.to_string())?;
    db.register_schema(post).map_err(|e| e.to_string())?;
    db.sync_schemas().await.map_err(|e| e.to_string())?;

    let user_insert = db.insert("FkUser", RowData::new().with_field("name", Value::Text("Alice".into())), &cancel).await.map_err(|e| e.to_string())?;
    let user_id_value = user_insert.last_insert_id.ok_or("missing inserted user id")?;
    db.insert("FkPost", RowData::new().with_field("authorId", Value::Int(user_id_value)), &cancel).await.map_err(|e| e.to_string())?;

    let filter = FieldCondition::new("id").equals(user_id_value);
    let delete_result = db.delete("FkUser", Some(filter), &cancel).await;
    expect(delete_result.is_err(), "deleting a referenced user should fail while dependents exist")?;

    let post_filter = FieldCondition::new("authorId").equals(user_id_value);
    db.delete("FkPost", Some(post_filter), &cancel).await.map_err(|e| e.to_string())?;
    let filter = FieldCondition::new("id").equals(user_id_value);
    db.delete("FkUser", Some(filter), &cancel).await.map_err(|e| e.to_string())?;
    Ok(())
}

/// Scenario 6 (§8): dry-run a migration that only adds a new model; the
/// plan must contain exactly one `CREATE TABLE` and the live catalog must be
/// unchanged afterwards.
pub async fn dry_run_migration_leaves_catalog_unchanged(db: &dyn Database) -> ScenarioResult {
    db.register_schema(user_schema()).map_err(|e| e.to_string())?;
    db.create_model("User").await.map_err(|e| e.to_string())?;

    let mut post_id = Field::new("id", FieldType::Int);
    post_id.primary_key = true;
    post_id.auto_increment = true;
    let post = Schema::new("Post").add_field(post_id).add_field(Field::new("title", FieldType::String));

    let mut registry = SchemaRegistry::new();
    registry.register(db.get_schema("User").unwrap()).map_err(|e| e.to_string())?;
    registry.register(post).map_err(|e| e.to_string())?;

    let migrator = db.migrator();
    let tables_before = introspect_all(migrator.as_ref()).await.map_err(|e| e.to_string())?;
    let plan = compare(&registry, &tables_before, migrator.as_ref()).map_err(|e| e.to_string())?;
    expect(plan.create_tables.len() == 1, format!("expected exactly one CREATE TABLE, got {}", plan.create_tables.len()))?;
    expect(plan.add_columns.is_empty() && plan.modify_columns.is_empty() && plan.drop_tables.is_empty(), "dry-run plan should contain no other statements")?;

    let _generated = build_migration(&plan, &registry, migrator.as_ref(), "20260101000000", "add_post", false).await.map_err(|e| e.to_string())?;

    let tables_after = introspect_all(migrator.as_ref()).await.map_err(|e| e.to_string())?;
    expect(!tables_after.contains_key("posts"), "dry-run must not touch the live catalog")
}

/// Scenario 7 (§8): a token flipped before a call starts must reject that
/// call outright rather than let it run to completion, and must not corrupt
/// the connection for callers using a fresh token afterwards.
pub async fn cancelled_token_rejects_the_call(db: &dyn Database) -> ScenarioResult {
    let live = CancelToken::new();
    db.register_schema(user_schema()).map_err(|e| e.to_string())?;
    db.create_model("User").await.map_err(|e| e.to_string())?;

    let cancelled = CancelToken::new();
    cancelled.cancel();
    let data = RowData::new().with_field("name", Value::Text("Alice".into())).with_field("email", Value::Text("alice@example.com".into()));
    let result = db.insert("User", data, &cancelled).await;
    expect(result.is_err(), "insert with a pre-cancelled token should fail")?;

    let count_query = SelectQuery::new("User");
    let count = db.count(count_query, &live).await.map_err(|e| e.to_string())?;
    expect(count == 0, format!("the rejected insert should not have run, got Count={count}"))?;

    let data = RowData::new().with_field("name", Value::Text("Bob".into())).with_field("email", Value::Text("bob@test.com".into()));
    let result = db.insert("User", data, &live).await.map_err(|e| e.to_string())?;
    expect(result.last_insert_id == Some(1), "a fresh token on the same connection should insert normally")
}
