//! Applies a [`GeneratedMigration`] and records it in `redi_migrations`
//! (§4.6 step 4-5, §6). The history table is modeled as an ordinary
//! [`Schema`] and provisioned through the `Database` trait like any other
//! model, so every dialect (including Mongo, where it's just a collection)
//! gets it for free instead of needing dialect-specific bootstrap DDL.

use redi_core::traits::{Database, DatabaseMigrator};
use redi_core::{CancelToken, CoreError, CoreResult, RowData, Value};
use redi_schema::{Field, FieldType, Schema};

use crate::plan::GeneratedMigration;

pub const MIGRATIONS_MODEL: &str = "RediMigration";
pub const MIGRATIONS_TABLE: &str = "redi_migrations";
const LOCK_VERSION: &str = "__lock__";

/// `redi_migrations{version, name, checksum, applied_at}` (§6).
pub fn migrations_history_schema() -> Schema {
    let mut version = Field::new("version", FieldType::String);
    version.primary_key = true;
    Schema::new(MIGRATIONS_MODEL)
        .with_table_name(MIGRATIONS_TABLE)
        .add_field(version)
        .add_field(Field::new("name", FieldType::String))
        .add_field(Field::new("checksum", FieldType::String))
        .add_field(Field::new("appliedAt", FieldType::DateTime))
}

pub async fn ensure_migrations_table(db: &dyn Database) -> CoreResult<()> {
    if db.get_schema(MIGRATIONS_MODEL).is_none() {
        db.register_schema(migrations_history_schema())?;
    }
    db.create_model(MIGRATIONS_MODEL).await
}

/// Process-wide advisory lock implemented as a sentinel row with a
/// reserved `version` value (§5: "a row in redi_migrations or a named
/// lock"). A concurrent second caller's insert fails on the primary-key
/// conflict and is surfaced as a migration-in-progress error.
pub async fn acquire_migration_lock(db: &dyn Database, cancel: &CancelToken) -> CoreResult<()> {
    let data = RowData::new()
        .with_field("version", Value::Text(LOCK_VERSION.to_string()))
        .with_field("name", Value::Text("lock".to_string()))
        .with_field("checksum", Value::Text(String::new()))
        .with_field("appliedAt", Value::DateTime(chrono_now()));
    db.insert(MIGRATIONS_MODEL, data, cancel)
        .await
        .map_err(|_| CoreError::migration("migration already in progress"))?;
    Ok(())
}

pub async fn release_migration_lock(db: &dyn Database, cancel: &CancelToken) -> CoreResult<()> {
    let filter = redi_core::query::builder::FieldCondition::new("version").equals(LOCK_VERSION);
    db.delete(MIGRATIONS_MODEL, Some(filter), cancel).await?;
    Ok(())
}

/// Runs `migration`'s statements through the dialect's `apply_migration`
/// (transactional where supported, best-effort sequential otherwise, per
/// §4.6 step 4) and records the history row on success.
pub async fn apply_and_record(
    db: &dyn Database,
    migrator: &dyn DatabaseMigrator,
    migration: &GeneratedMigration,
    cancel: &CancelToken,
) -> CoreResult<()> {
    if migration.is_empty() {
        return Ok(());
    }
    migrator.apply_migration(&migration.statements, cancel).await?;
    let record = RowData::new()
        .with_field("version", Value::Text(migration.version.clone()))
        .with_field("name", Value::Text(migration.name.clone()))
        .with_field("checksum", Value::Text(migration.checksum.clone()))
        .with_field("appliedAt", Value::DateTime(chrono_now()));
    db.insert(MIGRATIONS_MODEL, record, cancel).await?;
    Ok(())
}

/// One row of `redi_migrations`, as read back for `migrate:status`.
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: String,
    pub name: String,
    pub checksum: String,
}

pub async fn applied_migrations(db: &dyn Database, cancel: &CancelToken) -> CoreResult<Vec<MigrationRecord>> {
    let query = redi_core::SelectQuery::new(MIGRATIONS_MODEL);
    let rows = db.find_many(query, cancel).await?;
    let mut records: Vec<MigrationRecord> = rows
        .into_iter()
        .filter_map(|row| {
            let version = row.get("version")?.as_str()?.to_string();
            if version == LOCK_VERSION {
                return None;
            }
            let name = row.get("name")?.as_str()?.to_string();
            let checksum = row.get("checksum")?.as_str()?.to_string();
            Some(MigrationRecord { version, name, checksum })
        })
        .collect();
    records.sort_by(|a, b| a.version.cmp(&b.version));
    Ok(records)
}

/// Pops the most recently applied migration, running its companion
/// `.down.sql` file if present (§4.6 "Modes"). Returns a non-fatal
/// `MigrationError` when no down file exists, rather than silently
/// succeeding or applying nothing.
pub async fn rollback_last(
    db: &dyn Database,
    migrator: &dyn DatabaseMigrator,
    migrations_dir: &std::path::Path,
    cancel: &CancelToken,
) -> CoreResult<()> {
    let mut applied = applied_migrations(db, cancel).await?;
    let Some(last) = applied.pop() else {
        return Err(CoreError::migration("no migrations have been applied"));
    };
    let down_path = migrations_dir.join(format!("{}_{}.down.sql", last.version, last.name));
    let sql = std::fs::read_to_string(&down_path)
        .map_err(|_| CoreError::migration(format!("no rollback available for {} (missing {:?})", last.version, down_path)))?;
    let statements: Vec<String> = sql.split(';').map(str::trim).filter(|s| !s.is_empty()).map(|s| format!("{s};")).collect();
    migrator.apply_migration(&statements, cancel).await?;
    let filter = redi_core::query::builder::FieldCondition::new("version").equals(last.version.clone());
    db.delete(MIGRATIONS_MODEL, Some(filter), cancel).await?;
    Ok(())
}

/// The one place this crate would call `chrono::Utc::now()`; kept as a
/// named function so a future caller could swap in injected time for
/// deterministic tests.
fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_history_schema_has_expected_shape() {
        let schema = migrations_history_schema();
        assert_eq!(schema.resolved_table_name(), MIGRATIONS_TABLE);
        assert!(schema.field("version").unwrap().primary_key);
        assert_eq!(schema.field("appliedAt").unwrap().column_name(), "applied_at");
    }
}
