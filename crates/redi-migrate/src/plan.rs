//! SQL emission from a computed [`MigrationPlan`] (§4.6 step 3) and the
//! typed config struct gating safety/mode, mirroring the teacher's
//! preference for explicit config structs (`ConnectionConfig`,
//! `SshTunnelConfig`) over named-argument bags (§9).

use std::path::PathBuf;

use redi_core::traits::DatabaseMigrator;
use redi_core::{CoreError, CoreResult, MigrationPlan};
use redi_schema::SchemaRegistry;

use crate::checksum::checksum_statements;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationMode {
    /// Diff the live database and apply immediately.
    Auto,
    /// Write a named SQL file under `migrations_dir`, to be applied later
    /// in version order.
    File,
}

#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub dry_run: bool,
    pub force: bool,
    pub mode: MigrationMode,
    pub migrations_dir: PathBuf,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self { dry_run: false, force: false, mode: MigrationMode::Auto, migrations_dir: PathBuf::from("migrations") }
    }
}

/// A migration ready to be applied or written to disk: SQL statements plus
/// the history-table identity (`version`, `name`, `checksum`) §4.6 step 5
/// records on successful apply.
#[derive(Debug, Clone)]
pub struct GeneratedMigration {
    pub version: String,
    pub name: String,
    pub statements: Vec<String>,
    pub checksum: String,
}

impl GeneratedMigration {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// `<timestamp>_<snake_name>.sql` (§6).
    pub fn file_name(&self) -> String {
        format!("{}_{}.sql", self.version, self.name)
    }
}

/// Renders `plan` to SQL and packages it with its checksum, rejecting
/// destructive plans unless `force` is set (§4.6 "Safety").
pub async fn build_migration(
    plan: &MigrationPlan,
    registry: &SchemaRegistry,
    migrator: &dyn DatabaseMigrator,
    version: impl Into<String>,
    name: impl Into<String>,
    force: bool,
) -> CoreResult<GeneratedMigration> {
    if plan.is_destructive() && !force {
        return Err(CoreError::migration(
            "plan contains a destructive change (dropped table/column or column type change) and Force was not set",
        ));
    }
    let statements = migrator.generate_migration_sql(plan, registry).await?;
    let checksum = checksum_statements(&statements);
    Ok(GeneratedMigration { version: version.into(), name: name.into(), statements, checksum })
}

/// Writes `migration` to `<migrations_dir>/<version>_<name>.sql`, creating
/// the directory if needed.
pub fn write_migration_file(migration: &GeneratedMigration, migrations_dir: &std::path::Path) -> CoreResult<PathBuf> {
    std::fs::create_dir_all(migrations_dir).map_err(|e| CoreError::migration(e.to_string()))?;
    let path = migrations_dir.join(migration.file_name());
    let body = migration.statements.join(";\n") + ";\n";
    std::fs::write(&path, body).map_err(|e| CoreError::migration(e.to_string()))?;
    Ok(path)
}

/// A `version` timestamp in `YYYYMMDDHHMMSS` form (§4.6 step 5, §6).
pub fn version_from_timestamp(now: chrono::DateTime<chrono::Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn destructive_plan_without_force_is_rejected() {
        let mut plan = MigrationPlan::new();
        plan.drop_tables.push("widgets".to_string());
        let registry = SchemaRegistry::new();
        struct NoopMigrator;
        #[async_trait::async_trait]
        impl DatabaseMigrator for NoopMigrator {
            async fn get_tables(&self) -> CoreResult<Vec<String>> {
                Ok(Vec::new())
            }
            async fn get_table_info(&self, _table: &str) -> CoreResult<redi_core::TableInfo> {
                Ok(redi_core::TableInfo::default())
            }
            fn is_system_table(&self, _table: &str) -> bool {
                false
            }
            fn generate_create_table_sql(&self, _schema: &redi_schema::Schema) -> CoreResult<String> {
                Ok(String::new())
            }
            fn generate_drop_table_sql(&self, table: &str) -> String {
                format!("DROP TABLE {table}")
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
            fn generate_create_index_sql(&self, _table: &str, _index: &redi_schema::Index) -> String {
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
                _registry: &SchemaRegistry,
                _tables: &std::collections::HashMap<String, redi_core::TableInfo>,
            ) -> CoreResult<MigrationPlan> {
                Ok(MigrationPlan::new())
            }
            async fn generate_migration_sql(&self, plan: &MigrationPlan, _registry: &SchemaRegistry) -> CoreResult<Vec<String>> {
                Ok(plan.drop_tables.iter().map(|t| format!("DROP TABLE {t}")).collect())
            }
            fn map_database_type_to_field_type(&self, _db_type: &str) -> redi_schema::FieldType {
                redi_schema::FieldType::String
            }
            fn map_field_type(&self, _field_type: &redi_schema::FieldType) -> String {
                String::new()
            }
            fn format_default_value(&self, _default: &redi_schema::DefaultValue) -> String {
                String::new()
            }
            fn normalize_default_to_prisma_function(&self, _raw: &str) -> Option<redi_schema::DefaultValue> {
                None
            }
        }
        let migrator = NoopMigrator;
        let result = build_migration(&plan, &registry, &migrator, "20260101000000", "drop_widgets", false).await;
        assert!(result.is_err());
        let forced = build_migration(&plan, &registry, &migrator, "20260101000000", "drop_widgets", true).await;
        assert!(forced.is_ok());
    }
}
