//! `init_project`: the one-time setup a fresh checkout needs before any
//! other command can run against it.

use crate::config::TestTrackConfig;
use crate::error::Result;
use crate::repository::MigrationRepository;
use crate::schema::Schema;

/// Creates `testtrack/migrate/`, seeds its `.gitignore` with the temp files
/// the write-to-temp-then-rename discipline leaves behind on a crash, and
/// writes a fresh `schema.yml` folded from whatever migrations are already
/// there (none, on a brand-new checkout).
pub fn init_project(config: &TestTrackConfig) -> Result<()> {
    let migrate_dir = config.migrate_dir();
    std::fs::create_dir_all(&migrate_dir)?;

    let gitignore_path = migrate_dir.join(".gitignore");
    if !gitignore_path.exists() {
        std::fs::write(&gitignore_path, "*.yml.tmp\n")?;
    }

    let repo = MigrationRepository::load(&migrate_dir)?;
    let schema = Schema::generate(&repo, None)?;
    schema.write(&config.schema_path())?;
    tracing::info!(dir = %migrate_dir.display(), "initialized project");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_config(work_dir: PathBuf) -> TestTrackConfig {
        TestTrackConfig {
            work_dir: work_dir.clone(),
            cli_url: None,
            app_name: None,
            config_dir: work_dir.join("config"),
            fake_server_config_dir: work_dir.join("config").join("fake_server"),
            ownership_file: work_dir.join("owners.yml"),
            allowed_origins: Vec::new(),
        }
    }

    #[test]
    fn creates_migrate_dir_gitignore_and_empty_schema() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());

        init_project(&config).unwrap();

        assert!(config.migrate_dir().is_dir());
        assert!(config.migrate_dir().join(".gitignore").exists());
        assert!(config.schema_path().exists());
        let repo = MigrationRepository::empty();
        let schema = Schema::read(&config.schema_path(), &repo).unwrap();
        assert!(schema.splits.is_empty());
        assert_eq!(schema.schema_version, "");
    }

    #[test]
    fn is_idempotent_on_an_already_initialized_project() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());
        init_project(&config).unwrap();
        init_project(&config).unwrap();
        assert!(config.migrate_dir().is_dir());
    }
}
