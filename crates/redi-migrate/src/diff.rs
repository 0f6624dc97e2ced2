//! Schema-vs-catalog comparison (§4.6 step 2). The dialect-specific walk
//! lives in `redi-drivers::diffing` behind each `DatabaseMigrator`; this is
//! the one-line seam the rest of the pipeline calls through, kept as its
//! own module so `plan`/`apply` don't reach into a driver's internals.

use std::collections::HashMap;

use redi_core::traits::DatabaseMigrator;
use redi_core::{CoreResult, MigrationPlan, TableInfo};
use redi_schema::SchemaRegistry;

pub fn compare(
    registry: &SchemaRegistry,
    tables: &HashMap<String, TableInfo>,
    migrator: &dyn DatabaseMigrator,
) -> CoreResult<MigrationPlan> {
    migrator.compare_schema(registry, tables)
}
