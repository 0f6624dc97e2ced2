//! Migration engine (C6, §4.6) and schema pull (C7, §4.7): orchestrates
//! introspection, diffing, SQL generation, and application into one
//! `Migrator` entry point, wired through the dialect-agnostic
//! `Database`/`DatabaseMigrator` pair rather than any one driver crate.

pub mod apply;
pub mod checksum;
pub mod diff;
pub mod introspect;
pub mod plan;
pub mod pull;

pub use apply::{applied_migrations, apply_and_record, migrations_history_schema, MigrationRecord, MIGRATIONS_MODEL, MIGRATIONS_TABLE};
pub use checksum::checksum_statements;
pub use diff::compare;
pub use introspect::introspect_all;
pub use plan::{build_migration, version_from_timestamp, write_migration_file, GeneratedMigration, MigrationMode, MigrationOptions};
pub use pull::{merge_into_existing, pull, reconstruct_schemas, render_prisma};

use apply::{acquire_migration_lock, ensure_migrations_table, release_migration_lock, rollback_last};
use redi_core::traits::{Database, DatabaseMigrator};
use redi_core::{CancelToken, CoreResult, MigrationPlan};
use redi_schema::SchemaRegistry;

/// Strings the pipeline together (§4.6 step 1-5): introspect the live
/// database, diff it against `registry`, render SQL, and either apply it
/// immediately (`Auto`) or write it to disk (`File`) depending on
/// `options.mode`. `DryRun` computes the plan without touching anything.
pub struct Migrator<'a> {
    db: &'a dyn Database,
    migrator: &'a dyn DatabaseMigrator,
    registry: &'a SchemaRegistry,
    options: MigrationOptions,
    /// Shared by every CRUD/apply call this runner makes; a caller holding
    /// a clone can abort a long-running `run`/`apply_pending` call (§5).
    cancel: CancelToken,
}

/// Outcome of a single `Migrator::run` call: either nothing changed, a
/// migration was generated (and, unless `DryRun`, applied or written), or
/// the plan was rejected for being destructive without `Force`.
pub enum MigrationOutcome {
    UpToDate,
    Generated(GeneratedMigration),
}

impl<'a> Migrator<'a> {
    pub fn new(db: &'a dyn Database, migrator: &'a dyn DatabaseMigrator, registry: &'a SchemaRegistry, options: MigrationOptions) -> Self {
        Self { db, migrator, registry, options, cancel: CancelToken::new() }
    }

    /// A clone of this runner's cancellation token; flipping it aborts the
    /// in-progress `run`/`apply_pending`/`rollback` call at its next
    /// suspension point (§5).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs the full pipeline once (§4.6). Idempotent: running twice in a
    /// row against an unchanged schema yields `UpToDate` both times (§8),
    /// since a fresh introspection after the first apply shows nothing left
    /// to diff.
    pub async fn run(&self, version: impl Into<String>, name: impl Into<String>) -> CoreResult<MigrationOutcome> {
        let tables = introspect_all(self.migrator).await?;
        let plan: MigrationPlan = compare(self.registry, &tables, self.migrator)?;
        if plan.is_empty() {
            return Ok(MigrationOutcome::UpToDate);
        }

        let migration = build_migration(&plan, self.registry, self.migrator, version, name, self.options.force).await?;

        if self.options.dry_run {
            return Ok(MigrationOutcome::Generated(migration));
        }

        match self.options.mode {
            MigrationMode::Auto => {
                ensure_migrations_table(self.db).await?;
                acquire_migration_lock(self.db, &self.cancel).await?;
                let result = apply_and_record(self.db, self.migrator, &migration, &self.cancel).await;
                release_migration_lock(self.db, &self.cancel).await?;
                result?;
            }
            MigrationMode::File => {
                write_migration_file(&migration, &self.options.migrations_dir)?;
            }
        }

        Ok(MigrationOutcome::Generated(migration))
    }

    /// Applies every `.sql` file in `migrations_dir` not yet recorded in
    /// `redi_migrations`, in filename (version) order (§4.6 "File" mode).
    pub async fn apply_pending(&self) -> CoreResult<Vec<String>> {
        ensure_migrations_table(self.db).await?;
        let applied = applied_migrations(self.db, &self.cancel).await?;
        let applied_versions: std::collections::HashSet<String> = applied.into_iter().map(|r| r.version).collect();

        let mut entries: Vec<std::path::PathBuf> = std::fs::read_dir(&self.options.migrations_dir)
            .map_err(|e| redi_core::CoreError::migration(e.to_string()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "sql") && !p.to_string_lossy().ends_with(".down.sql"))
            .collect();
        entries.sort();

        let mut applied_names = Vec::new();
        acquire_migration_lock(self.db, &self.cancel).await?;
        let result = self.apply_pending_locked(&entries, &applied_versions, &mut applied_names).await;
        release_migration_lock(self.db, &self.cancel).await?;
        result?;
        Ok(applied_names)
    }

    async fn apply_pending_locked(
        &self,
        entries: &[std::path::PathBuf],
        applied_versions: &std::collections::HashSet<String>,
        applied_names: &mut Vec<String>,
    ) -> CoreResult<()> {
        for path in entries {
            if self.cancel.is_cancelled() {
                return Err(redi_core::CoreError::cancelled());
            }
            let file_name = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
            let Some((version, name)) = file_name.split_once('_') else { continue };
            if applied_versions.contains(version) {
                continue;
            }
            let sql = std::fs::read_to_string(path).map_err(|e| redi_core::CoreError::migration(e.to_string()))?;
            let statements: Vec<String> = sql.split(';').map(str::trim).filter(|s| !s.is_empty()).map(|s| format!("{s};")).collect();
            let checksum = checksum_statements(&statements);
            let migration = GeneratedMigration { version: version.to_string(), name: name.to_string(), statements, checksum };
            apply_and_record(self.db, self.migrator, &migration, &self.cancel).await?;
            applied_names.push(migration.file_name());
        }
        Ok(())
    }

    pub async fn status(&self) -> CoreResult<Vec<MigrationRecord>> {
        ensure_migrations_table(self.db).await?;
        applied_migrations(self.db, &self.cancel).await
    }

    pub async fn rollback(&self) -> CoreResult<()> {
        rollback_last(self.db, self.migrator, &self.options.migrations_dir, &self.cancel).await
    }

    pub async fn pull(&self) -> CoreResult<Vec<redi_schema::Schema>> {
        pull(self.migrator).await
    }
}
