//! Lifecycle glue around a single migration: validate, write the file,
//! project it onto the schema, and (when a remote is configured) sync it
//! upstream and record its version.

use std::path::Path;

use crate::error::{Result, TestTrackError};
use crate::remote::{NullRemoteClient, RemoteClient, SyncOutcome};
use crate::repository::MigrationRepository;
use crate::resource::Migration;
use crate::schema::Schema;

/// Glues the migration repository, the schema store, and a remote client
/// together around a single migration's lifecycle. Generic over
/// [`RemoteClient`] so filesystem-only operation (schema regeneration,
/// local serving, tests) never needs a live network endpoint.
pub struct MigrationManager<'a, C: RemoteClient = NullRemoteClient> {
    migrate_dir: &'a Path,
    schema_path: &'a Path,
    remote: &'a C,
}

impl<'a> MigrationManager<'a, NullRemoteClient> {
    /// Filesystem-only mode: every remote sync is treated as accepted.
    pub fn filesystem_only(migrate_dir: &'a Path, schema_path: &'a Path, null_client: &'a NullRemoteClient) -> Self {
        Self {
            migrate_dir,
            schema_path,
            remote: null_client,
        }
    }
}

impl<'a, C: RemoteClient> MigrationManager<'a, C> {
    pub fn with_remote(migrate_dir: &'a Path, schema_path: &'a Path, remote: &'a C) -> Self {
        Self {
            migrate_dir,
            schema_path,
            remote,
        }
    }

    /// Validates, writes the migration file (requiring the migrate
    /// directory to already exist), reloads the repository, projects the
    /// migration onto the schema, and writes the result.
    pub fn create_migration(&self, mut migration: Migration, version: String) -> Result<Schema> {
        migration.validate()?;
        let migration = with_version(migration, version);

        if !self.migrate_dir.exists() {
            return Err(TestTrackError::FilesystemError(format!(
                "{} does not exist; run init_project first",
                self.migrate_dir.display()
            )));
        }

        let filename = migration.filename();
        let path = self.migrate_dir.join(&filename);
        let file = migration.to_file();
        let content = serde_yaml::to_string(&file)?;
        std::fs::write(&path, content)?;

        let repo = MigrationRepository::load(self.migrate_dir)?;
        let result = self.project_new_migration(&migration, &repo);

        match result {
            Ok(schema) => {
                schema.write(self.schema_path)?;
                tracing::info!(migration = %filename, "created migration");
                Ok(schema)
            }
            Err(e) => {
                // Keep the filesystem consistent: don't leave an
                // unprojectable migration file behind.
                let _ = std::fs::remove_file(&path);
                Err(e)
            }
        }
    }

    /// Projects `migration` (already written to `repo`) onto the schema.
    /// If `testtrack/schema.yml` doesn't exist yet, generating from `repo`
    /// already folds the new migration in, so it is not applied a second
    /// time; otherwise the existing schema is parsed and the migration is
    /// applied on top of it.
    fn project_new_migration(&self, migration: &Migration, repo: &MigrationRepository) -> Result<Schema> {
        let mut schema = match Schema::load_if_exists(self.schema_path)? {
            Some(existing) => existing,
            None => return Schema::generate(repo, None),
        };
        migration.apply_to_schema(&mut schema, repo, false)?;
        if let Some(version) = migration.migration_version() {
            schema.schema_version = version.to_string();
        }
        schema.canonicalize();
        Ok(schema)
    }

    /// Validates, then projects `migration` onto the schema read (or
    /// generated) from `repo`. Used by the runner when reapplying a
    /// migration during undo, where the schema is not necessarily the
    /// freshly-written one.
    pub fn apply_to_schema(&self, migration: &Migration, repo: &MigrationRepository, idempotent: bool) -> Result<Schema> {
        migration.validate()?;
        let mut schema = Schema::read(self.schema_path, repo)?;
        migration.apply_to_schema(&mut schema, repo, idempotent)?;
        if let Some(version) = migration.migration_version() {
            schema.schema_version = version.to_string();
        }
        schema.canonicalize();
        Ok(schema)
    }

    /// Syncs the migration's resource to the remote, then records its
    /// version in the remote's applied-versions set. A 422 on the resource
    /// sync is surfaced as `RemoteUnaccepted`; any other non-204 response
    /// on either call is a protocol error.
    pub async fn migrate(&self, migration: &Migration) -> Result<()> {
        let version = migration
            .migration_version()
            .ok_or_else(|| TestTrackError::InvalidInput("migration has no assigned version".to_string()))?
            .to_string();

        match self.remote.sync_resource(migration.sync_path(), &migration.serializable()).await? {
            SyncOutcome::Accepted => {}
            SyncOutcome::Rejected { reason } => {
                return Err(TestTrackError::RemoteUnaccepted { version, reason });
            }
        }

        self.remote.record_applied_version(&version).await?;
        tracing::info!(version = %version, "migrated");
        Ok(())
    }
}

fn with_version(migration: Migration, version: String) -> Migration {
    match migration {
        Migration::Split { name, weights, owner, .. } => Migration::Split {
            migration_version: Some(version),
            name,
            weights,
            owner,
        },
        Migration::SplitDecision { split, variant, .. } => Migration::SplitDecision {
            migration_version: Some(version),
            split,
            variant,
        },
        Migration::SplitRetirement { split, decision, .. } => Migration::SplitRetirement {
            migration_version: Some(version),
            split,
            decision,
        },
        Migration::FeatureCompletion { feature_gate, app_version, .. } => Migration::FeatureCompletion {
            migration_version: Some(version),
            feature_gate,
            app_version,
        },
        Migration::RemoteKill { split, reason, override_to, first_bad_version, fixed_version, .. } => {
            Migration::RemoteKill {
                migration_version: Some(version),
                split,
                reason,
                override_to,
                first_bad_version,
                fixed_version,
            }
        }
        Migration::IdentifierType { name, .. } => Migration::IdentifierType {
            migration_version: Some(version),
            name,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::Weights;
    use std::collections::BTreeMap;

    fn weights(pairs: &[(&str, u32)]) -> Weights {
        let map: BTreeMap<String, u32> = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Weights::from_map(map).unwrap()
    }

    #[test]
    fn create_migration_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let migrate_dir = dir.path().join("migrate");
        let schema_path = dir.path().join("schema.yml");
        let null = NullRemoteClient;
        let manager = MigrationManager::filesystem_only(&migrate_dir, &schema_path, &null);
        let migration = Migration::Split {
            migration_version: None,
            name: "foo_experiment".to_string(),
            weights: weights(&[("a", 100)]),
            owner: None,
        };
        assert!(manager.create_migration(migration, "1000000000001".to_string()).is_err());
    }

    #[test]
    fn create_migration_writes_file_and_projects_schema() {
        let dir = tempfile::tempdir().unwrap();
        let migrate_dir = dir.path().join("migrate");
        std::fs::create_dir_all(&migrate_dir).unwrap();
        let schema_path = dir.path().join("schema.yml");
        let null = NullRemoteClient;
        let manager = MigrationManager::filesystem_only(&migrate_dir, &schema_path, &null);
        let migration = Migration::Split {
            migration_version: None,
            name: "foo_experiment".to_string(),
            weights: weights(&[("a", 100)]),
            owner: None,
        };
        let schema = manager.create_migration(migration, "1000000000001".to_string()).unwrap();
        assert_eq!(schema.splits.len(), 1);
        assert_eq!(schema.schema_version, "1000000000001");
        assert!(migrate_dir.join("1000000000001_create_split_foo_experiment.yml").exists());
    }

    #[tokio::test]
    async fn migrate_with_null_remote_always_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let migrate_dir = dir.path().join("migrate");
        let schema_path = dir.path().join("schema.yml");
        let null = NullRemoteClient;
        let manager = MigrationManager::filesystem_only(&migrate_dir, &schema_path, &null);
        let migration = Migration::Split {
            migration_version: Some("1000000000001".to_string()),
            name: "foo_experiment".to_string(),
            weights: weights(&[("a", 100)]),
            owner: None,
        };
        assert!(manager.migrate(&migration).await.is_ok());
    }
}
