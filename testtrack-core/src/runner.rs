//! Drives outstanding and undo flows across the migration repository.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{Result, TestTrackError};
use crate::manager::MigrationManager;
use crate::remote::RemoteClient;
use crate::repository::MigrationRepository;
use crate::schema::Schema;

pub struct Runner<'a, C: RemoteClient> {
    migrate_dir: &'a Path,
    schema_path: &'a Path,
    remote: &'a C,
}

impl<'a, C: RemoteClient> Runner<'a, C> {
    pub fn new(migrate_dir: &'a Path, schema_path: &'a Path, remote: &'a C) -> Self {
        Self {
            migrate_dir,
            schema_path,
            remote,
        }
    }

    /// Loads the repo, fetches the set of already-applied versions from
    /// the remote, and migrates the remainder in ascending version order.
    pub async fn run_outstanding(&self) -> Result<Vec<String>> {
        let repo = MigrationRepository::load(self.migrate_dir)?;
        let applied: HashSet<String> = self.remote.list_applied_versions().await?.into_iter().collect();
        let outstanding = repo.without_versions(&applied);

        let manager = MigrationManager::with_remote(self.migrate_dir, self.schema_path, self.remote);
        let mut migrated = Vec::new();
        for (version, migration) in outstanding.iter_in_order() {
            manager.migrate(migration).await?;
            migrated.push(version.clone());
        }
        tracing::info!(count = migrated.len(), "ran outstanding migrations");
        Ok(migrated)
    }

    /// Removes the most recent migration: reapplies the preceding
    /// migration on the same resource to the remote if one exists,
    /// otherwise applies the migration's inverse; unregisters the version
    /// upstream; regenerates the schema without it; deletes the file.
    pub async fn undo(&self) -> Result<Schema> {
        let repo = MigrationRepository::load(self.migrate_dir)?;
        let versions = repo.sorted_versions();
        let Some(latest_version) = versions.last().cloned() else {
            return Err(TestTrackError::FilesystemError("no migration to undo".to_string()));
        };
        let latest = repo.get(&latest_version).expect("version came from repo").clone();

        let predecessor = versions[..versions.len() - 1]
            .iter()
            .rev()
            .find_map(|v| repo.get(v).filter(|m| m.same_resource_as(&latest)));

        match predecessor {
            Some(predecessor) => {
                self.remote
                    .sync_resource(predecessor.sync_path(), &predecessor.serializable())
                    .await?;
            }
            None => {
                let inverse = latest.inverse()?;
                self.remote.sync_resource(inverse.sync_path(), &inverse.serializable()).await?;
            }
        }

        self.remote.delete_applied_version(&latest_version).await?;

        let remaining = repo.without_versions(&HashSet::from([latest_version.clone()]));
        let schema = Schema::generate(&remaining, None)?;
        schema.write(self.schema_path)?;

        let path = self.migrate_dir.join(latest.filename());
        std::fs::remove_file(&path)?;

        tracing::info!(version = %latest_version, "undid migration");
        Ok(schema)
    }
}
