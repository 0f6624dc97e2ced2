//! Per-dialect conformance exceptions (§4.8, §9 "Config objects"): an
//! explicit struct rather than a grab-bag of capability methods, so
//! `redi-conformance` can branch its expectations in one place instead of
//! querying the driver piecemeal.

use serde::{Deserialize, Serialize};

/// What `redi-conformance`'s black-box scenarios need to know about a
/// driver before asserting an expectation that genuinely varies by dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverCharacteristics {
    /// MySQL reports 0 rows affected by an `UPDATE` whose SET clause doesn't
    /// actually change any value, even when rows matched the WHERE clause.
    /// Every other dialect in this spec reports the matched count.
    pub returns_zero_rows_affected_for_unchanged: bool,
    pub supports_last_insert_id: bool,
    pub supports_returning_clause: bool,
    pub migration_table_name: String,
    /// Name patterns `DatabaseMigrator::is_system_table` / index introspection
    /// treat as belonging to the dialect's own catalog rather than
    /// user-declared schema.
    pub system_index_patterns: Vec<String>,
    /// The native integer column type used for an auto-increment primary
    /// key, for scenarios that assert on introspected column types.
    pub auto_increment_integer_type: String,
}
