//! Shared process state: the config telling every handler where the
//! merged schema and overrides files live, plus the single mutex that
//! serializes every read-or-write of either of them.

use testtrack_core::overrides::AssignmentOverrides;
use testtrack_core::schema::Schema;
use testtrack_core::TestTrackConfig;

use crate::error::Result;

pub struct AppState {
    pub config: TestTrackConfig,
    lock: tokio::sync::Mutex<()>,
}

impl AppState {
    pub fn new(config: TestTrackConfig) -> Self {
        Self {
            config,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Reads the merged cross-app schema and the overrides file as a
    /// consistent pair, under the service mutex.
    pub async fn read_merged(&self) -> Result<(Schema, AssignmentOverrides)> {
        let _guard = self.lock.lock().await;
        let schema = Schema::read_merged(&self.config.schemas_link_dir())?;
        let overrides = AssignmentOverrides::read(&self.config.assignments_path())?;
        Ok((schema, overrides))
    }

    /// Reads the overrides file, lets `f` mutate it, and writes it back —
    /// all under the service mutex so a concurrent read never observes a
    /// half-applied merge.
    pub async fn merge_overrides(&self, f: impl FnOnce(&mut AssignmentOverrides)) -> Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.config.assignments_path();
        let mut overrides = AssignmentOverrides::read(&path)?;
        f(&mut overrides);
        overrides.write(&path)?;
        Ok(())
    }
}
