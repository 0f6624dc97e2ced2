//! Driver interface, query AST/builder, and shared value/error types (C3,
//! C5, §4.3/§4.5). `redi-drivers` implements [`traits::Database`] and
//! [`traits::DatabaseMigrator`] per dialect; `redi-migrate` orchestrates
//! [`traits::DatabaseMigrator`] across the whole schema registry.

pub mod cancel;
pub mod characteristics;
pub mod dialect;
pub mod error;
pub mod migration;
pub mod query;
pub mod registry;
pub mod traits;
pub mod value;

pub use cancel::{CancelSupport, CancelToken};
pub use characteristics::DriverCharacteristics;
pub use dialect::DialectKind;
pub use error::{ConstraintKind, CoreError, CoreResult};
pub use migration::{ColumnDiff, ColumnInfo, ForeignKeyInfo, IndexDiff, IndexInfo, MigrationPlan, ModifyColumnDiff, TableInfo};
pub use query::ast::{Condition, Include, IncludeOptions, Op, OrderBy, OrderDirection, SelectQuery};
pub use query::builder::{Action, FieldCondition, ModelQuery};
pub use registry::{DriverFactory, DriverRegistry};
pub use traits::{transaction, BoxFuture, Database, DatabaseMigrator, Transaction};
pub use value::{ExecResult, Row, RowData, Value};
