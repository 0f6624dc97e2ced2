//! Catalog and migration-plan value types shared between the per-dialect
//! `DatabaseMigrator` implementations and the orchestration layer in
//! `redi-migrate` (§4.3, §4.6). Shaped like the teacher's
//! `engine/types.rs::{TableSchema, TableColumn, ForeignKey, TableIndex}`,
//! adapted from "metadata for a UI table browser" to "input to a differ".

use serde::{Deserialize, Serialize};

/// A single column as read back from a live catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    pub auto_increment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub constraint_name: Option<String>,
}

/// Everything introspection reads back for one non-system table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableInfo {
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDiff {
    pub table: String,
    pub column: ColumnInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyColumnDiff {
    pub table: String,
    pub from: ColumnInfo,
    pub to: ColumnInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDiff {
    pub table: String,
    pub index: IndexInfo,
}

/// The full set of changes needed to reconcile a live database with the
/// declared schema (§4.6 step 2). Statement emission walks these lists in
/// the fixed order documented on [`MigrationPlan::statement_order_note`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub create_tables: Vec<String>,
    pub drop_tables: Vec<String>,
    pub add_columns: Vec<ColumnDiff>,
    pub modify_columns: Vec<ModifyColumnDiff>,
    pub drop_columns: Vec<ColumnDiff>,
    pub create_indexes: Vec<IndexDiff>,
    pub drop_indexes: Vec<IndexDiff>,
}

impl MigrationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.create_tables.is_empty()
            && self.drop_tables.is_empty()
            && self.add_columns.is_empty()
            && self.modify_columns.is_empty()
            && self.drop_columns.is_empty()
            && self.create_indexes.is_empty()
            && self.drop_indexes.is_empty()
    }

    /// True when the plan contains a table drop, column drop, or a column
    /// type change that may lose data — the class of changes §4.6's
    /// "Safety" rule gates behind `Force`.
    pub fn is_destructive(&self) -> bool {
        !self.drop_tables.is_empty() || !self.drop_columns.is_empty() || !self.modify_columns.is_empty()
    }
}
