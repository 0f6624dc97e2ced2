//! Schema-vs-catalog diffing and statement rendering shared by the SQL
//! dialect migrators (§4.6 steps 2-3). Each driver's `DatabaseMigrator`
//! delegates `compare_schema`/`generate_migration_sql` here, passing itself
//! so type mapping and DDL text stay dialect-specific while the walk over
//! the registry is written once. MongoDB has no catalog in this sense and
//! implements its own no-op versions.

use std::collections::HashMap;

use redi_core::migration::{ColumnDiff, ColumnInfo, IndexDiff, IndexInfo, ModifyColumnDiff, TableInfo};
use redi_core::traits::DatabaseMigrator;
use redi_core::{CoreResult, DialectKind, MigrationPlan};
use redi_schema::{Field, Index, Schema, SchemaRegistry};

fn find_schema_by_table<'a>(registry: &'a SchemaRegistry, table: &str) -> Option<&'a Schema> {
    registry.iter().find(|s| s.resolved_table_name() == table)
}

fn target_column_info(field: &Field, migrator: &dyn DatabaseMigrator) -> ColumnInfo {
    ColumnInfo {
        name: field.column_name(),
        data_type: migrator.map_field_type(&field.r#type),
        nullable: field.nullable,
        default_value: field.default.as_ref().map(|d| migrator.format_default_value(d)),
        is_primary_key: field.primary_key,
        auto_increment: field.auto_increment,
    }
}

fn target_index_info(schema: &Schema, index: &Index) -> IndexInfo {
    let columns = index
        .fields
        .iter()
        .map(|name| schema.get_column_name_by_field_name(name).unwrap_or_else(|| name.clone()))
        .collect();
    IndexInfo { name: index.name.clone(), columns, unique: index.unique }
}

/// Compares `registry` against the live `tables` catalog, producing the
/// full set of changes needed to reconcile them (§4.6 step 2). Column type
/// changes are detected with a loose case-insensitive substring match since
/// the live catalog's type names and the dialect's own `map_field_type`
/// output don't always agree on spelling (`INTEGER` vs `INT`).
pub fn compare_schema(
    registry: &SchemaRegistry,
    tables: &HashMap<String, TableInfo>,
    migrator: &dyn DatabaseMigrator,
    _dialect: DialectKind,
) -> CoreResult<MigrationPlan> {
    let mut plan = MigrationPlan::new();

    for schema in registry.iter() {
        let table = schema.resolved_table_name();
        let Some(live) = tables.get(&table) else {
            plan.create_tables.push(table.clone());
            continue;
        };

        for field in &schema.fields {
            let target = target_column_info(field, migrator);
            match live.columns.iter().find(|c| c.name == target.name) {
                None => plan.add_columns.push(ColumnDiff { table: table.clone(), column: target }),
                Some(existing) => {
                    let existing_upper = existing.data_type.to_uppercase();
                    let target_upper = target.data_type.to_uppercase();
                    let type_changed = !existing_upper.contains(&target_upper) && !target_upper.contains(&existing_upper);
                    if type_changed || existing.nullable != target.nullable {
                        plan.modify_columns.push(ModifyColumnDiff {
                            table: table.clone(),
                            from: existing.clone(),
                            to: target,
                        });
                    }
                }
            }
        }

        let schema_columns: std::collections::HashSet<String> =
            schema.fields.iter().map(|f| f.column_name()).collect();
        for existing in &live.columns {
            if !schema_columns.contains(&existing.name) {
                plan.drop_columns.push(ColumnDiff { table: table.clone(), column: existing.clone() });
            }
        }

        let mut declared_indexes = schema.unique_indexes();
        declared_indexes.extend(schema.indexes.clone());
        for index in &declared_indexes {
            let target = target_index_info(schema, index);
            let exists = live.indexes.iter().any(|i| i.columns == target.columns && i.unique == target.unique);
            if !exists {
                plan.create_indexes.push(IndexDiff { table: table.clone(), index: target });
            }
        }
    }

    for (table, _) in tables {
        if migrator.is_system_table(table) {
            continue;
        }
        if find_schema_by_table(registry, table).is_none() {
            plan.drop_tables.push(table.clone());
        }
    }

    Ok(plan)
}

/// Renders `plan` to SQL in the fixed order (§4.6 step 3): create tables,
/// add columns, modify columns, create indexes, drop indexes, drop columns,
/// drop tables.
pub async fn render_plan(plan: &MigrationPlan, registry: &SchemaRegistry, migrator: &dyn DatabaseMigrator) -> CoreResult<Vec<String>> {
    let mut statements = Vec::new();

    for table in &plan.create_tables {
        if let Some(schema) = find_schema_by_table(registry, table) {
            statements.push(migrator.generate_create_table_sql(schema)?);
        }
    }

    for diff in &plan.add_columns {
        if let Some(schema) = find_schema_by_table(registry, &diff.table) {
            if let Some(field) = schema.fields.iter().find(|f| f.column_name() == diff.column.name) {
                statements.push(migrator.generate_add_column_sql(&diff.table, field)?);
            }
        }
    }

    for diff in &plan.modify_columns {
        if let Some(schema) = find_schema_by_table(registry, &diff.table) {
            if let Some(field) = schema.fields.iter().find(|f| f.column_name() == diff.to.name) {
                statements.extend(migrator.generate_modify_column_sql(&diff.table, field).await?);
            }
        }
    }

    for diff in &plan.create_indexes {
        if let Some(schema) = find_schema_by_table(registry, &diff.table) {
            let index = Index { name: diff.index.name.clone(), fields: diff.index.columns.clone(), unique: diff.index.unique };
            statements.push(migrator.generate_create_index_sql(&schema.resolved_table_name(), &index));
        }
    }

    for diff in &plan.drop_indexes {
        statements.push(migrator.generate_drop_index_sql(&diff.table, &diff.index.name));
    }

    for diff in &plan.drop_columns {
        statements.extend(migrator.generate_drop_column_sql(&diff.table, &diff.column.name));
    }

    for table in &plan.drop_tables {
        statements.push(migrator.generate_drop_table_sql(table));
    }

    Ok(statements)
}
