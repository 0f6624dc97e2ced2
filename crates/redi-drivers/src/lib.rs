//! Concrete dialect drivers for RediORM (§4.3, §4.4).
//!
//! `common` and `diffing` hold the logic shared by the three SQL dialects;
//! each of `sqlite`, `mysql`, `postgres`, `mongodb` supplies the
//! connection, bind/extract, and catalog-introspection code specific to
//! that engine, plus a [`redi_core::registry::DriverFactory`] for wiring
//! into a [`redi_core::registry::DriverRegistry`].

mod common;
mod common_default;
mod diffing;

pub mod mongodb;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mongodb::{MongoDatabase, MongoFactory, MongoMigrator, MongoTransaction};
pub use mysql::{MySqlDatabase, MySqlFactory, MySqlMigrator, MySqlTransaction};
pub use postgres::{PostgresDatabase, PostgresFactory, PostgresMigrator, PostgresTransaction};
pub use sqlite::{SqliteDatabase, SqliteFactory, SqliteMigrator, SqliteTransaction};

/// Registers all four built-in drivers under their URI schemes
/// (`sqlite`, `mysql`, `postgresql`, `mongodb`). `rediorm::NewFromURI`
/// builds its default registry from this.
pub fn register_builtin_drivers(registry: &mut redi_core::registry::DriverRegistry) {
    registry.register(std::sync::Arc::new(SqliteFactory));
    registry.register(std::sync::Arc::new(MySqlFactory));
    registry.register(std::sync::Arc::new(PostgresFactory));
    registry.register(std::sync::Arc::new(MongoFactory));
}
