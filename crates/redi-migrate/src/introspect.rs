//! Catalog introspection: the "describer" half of the migration pipeline
//! (§4.6 step 1). Thin orchestration over the per-dialect
//! `DatabaseMigrator::{get_tables,get_table_info}` pair, which already do
//! the dialect-specific catalog queries (`PRAGMA table_info`,
//! `INFORMATION_SCHEMA`, `pg_catalog`, Mongo index listing).

use std::collections::HashMap;

use redi_core::traits::DatabaseMigrator;
use redi_core::{CoreResult, TableInfo};

/// Reads back every non-system table's `TableInfo`, logging and skipping
/// (rather than failing the whole introspection) any table whose read
/// errors — `IntrospectionError`'s policy (§7) is "treat as empty and warn",
/// not abort.
pub async fn introspect_all(migrator: &dyn DatabaseMigrator) -> CoreResult<HashMap<String, TableInfo>> {
    let tables = migrator.get_tables().await?;
    let mut result = HashMap::new();
    for table in tables {
        if migrator.is_system_table(&table) {
            continue;
        }
        match migrator.get_table_info(&table).await {
            Ok(info) => {
                result.insert(table, info);
            }
            Err(err) => {
                tracing::warn!(table = %table, error = %err, "introspection failed, treating table as absent");
            }
        }
    }
    Ok(result)
}
