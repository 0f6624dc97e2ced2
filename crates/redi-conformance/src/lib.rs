//! Driver conformance harness (§4.8): a black-box scenario suite any
//! `redi-drivers` dialect can be run against. A driver's own test module
//! imports [`scenarios`] and drives each function against a live connection
//! for that dialect; this crate's own tests run the same functions against
//! an in-memory SQLite connection, so the scenarios themselves are verified
//! without needing a MySQL/Postgres/Mongo instance on hand.

pub mod scenarios;

pub use scenarios::{
    cancelled_token_rejects_the_call, column_addition_migration, crud_happy_path, dry_run_migration_leaves_catalog_unchanged,
    foreign_key_delete_ordering, last_insert_id_without_native_support, unchanged_update_rows_affected, ScenarioResult,
};

#[cfg(test)]
mod tests {
    use redi_drivers::sqlite::SqliteDatabase;

    use super::*;

    async fn memory_db() -> SqliteDatabase {
        SqliteDatabase::connect(":memory:").await.expect("in-memory sqlite connection")
    }

    #[tokio::test]
    async fn crud_happy_path_against_sqlite() {
        let db = memory_db().await;
        crud_happy_path(&db).await.expect("scenario 1 should pass against sqlite");
    }

    #[tokio::test]
    async fn column_addition_migration_against_sqlite() {
        let db = memory_db().await;
        column_addition_migration(&db).await.expect("scenario 2 should pass against sqlite");
    }

    #[tokio::test]
    async fn unchanged_update_rows_affected_against_sqlite() {
        let db = memory_db().await;
        unchanged_update_rows_affected(&db).await.expect("scenario 3 should pass against sqlite");
    }

    #[tokio::test]
    async fn last_insert_id_against_sqlite() {
        let db = memory_db().await;
        // SQLite always reports a native last_insert_rowid, so it belongs to
        // the "expects a value" branch, not the Postgres no-RETURNING one.
        last_insert_id_without_native_support(&db, false).await.expect("scenario 4 should pass against sqlite");
    }

    #[tokio::test]
    async fn foreign_key_delete_ordering_against_sqlite() {
        let db = memory_db().await;
        foreign_key_delete_ordering(&db).await.expect("scenario 5 should pass against sqlite");
    }

    #[tokio::test]
    async fn dry_run_migration_against_sqlite() {
        let db = memory_db().await;
        dry_run_migration_leaves_catalog_unchanged(&db).await.expect("scenario 6 should pass against sqlite");
    }

    #[tokio::test]
    async fn cancelled_token_against_sqlite() {
        let db = memory_db().await;
        cancelled_token_rejects_the_call(&db).await.expect("scenario 7 should pass against sqlite");
    }
}
