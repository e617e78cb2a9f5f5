//! Reads migration files from the well-known `testtrack/migrate` directory,
//! dispatches by tag to the matching variant, and exposes an ordered view
//! by version. Backed by a `BTreeMap` so the repository is simultaneously
//! an indexed immutable sequence (needed for the O(n) back-reference walk
//! in split revival) and a hash-only map (needed for undo's resource-key
//! lookup) without keeping two data structures in sync.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, TestTrackError};
use crate::migration::extract_version_from_filename;
use crate::resource::{Migration, MigrationFileYaml};

#[derive(Debug, Clone, Default)]
pub struct MigrationRepository {
    by_version: BTreeMap<String, Migration>,
}

impl MigrationRepository {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Enumerates `migrate_dir`, ignoring dotfiles, requiring every
    /// filename to match the fixed migration-filename grammar. Each file
    /// is parsed as a `MigrationFile`; an unknown or missing resource tag
    /// is a load error.
    pub fn load(migrate_dir: &Path) -> Result<Self> {
        let mut by_version = BTreeMap::new();
        if !migrate_dir.exists() {
            return Err(TestTrackError::FilesystemError(format!(
                "{} does not exist; run init_project first",
                migrate_dir.display()
            )));
        }
        let mut entries: Vec<_> = std::fs::read_dir(migrate_dir)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            let version = extract_version_from_filename(name)?;
            let content = std::fs::read_to_string(entry.path())?;
            let file: MigrationFileYaml = serde_yaml::from_str(&content)?;
            let migration = Migration::from_file(Some(version.clone()), file)?;
            by_version.insert(version, migration);
        }

        Ok(Self { by_version })
    }

    pub fn get(&self, version: &str) -> Option<&Migration> {
        self.by_version.get(version)
    }

    pub fn sorted_versions(&self) -> Vec<String> {
        self.by_version.keys().cloned().collect()
    }

    pub fn iter_in_order(&self) -> impl Iterator<Item = (&String, &Migration)> {
        self.by_version.iter()
    }

    pub fn len(&self) -> usize {
        self.by_version.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_version.is_empty()
    }

    pub fn latest(&self) -> Option<(&String, &Migration)> {
        self.by_version.iter().next_back()
    }

    pub fn without_versions(&self, versions: &std::collections::HashSet<String>) -> Self {
        Self {
            by_version: self
                .by_version
                .iter()
                .filter(|(v, _)| !versions.contains(*v))
                .map(|(v, m)| (v.clone(), m.clone()))
                .collect(),
        }
    }

    pub fn remove(&mut self, version: &str) -> Option<Migration> {
        self.by_version.remove(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::Weights;
    use std::collections::BTreeMap as StdBTreeMap;

    fn write_split_migration(dir: &Path, version: &str, name: &str) {
        let content = format!(
            "serializer_version: 1\nsplit:\n  name: {name}\n  weights:\n    a: 100\n"
        );
        std::fs::write(dir.join(format!("{version}_create_split_{name}.yml")), content).unwrap();
    }

    #[test]
    fn load_orders_by_lexicographic_version() {
        let dir = tempfile::tempdir().unwrap();
        write_split_migration(dir.path(), "1000000000002", "b");
        write_split_migration(dir.path(), "1000000000001", "a");
        let repo = MigrationRepository::load(dir.path()).unwrap();
        assert_eq!(repo.sorted_versions(), vec!["1000000000001", "1000000000002"]);
    }

    #[test]
    fn load_rejects_unknown_migration_tag() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("1000000000001_create_mystery_x.yml"),
            "serializer_version: 1\n",
        )
        .unwrap();
        assert!(MigrationRepository::load(dir.path()).is_err());
    }

    #[test]
    fn load_ignores_dotfiles() {
        let dir = tempfile::tempdir().unwrap();
        write_split_migration(dir.path(), "1000000000001", "a");
        std::fs::write(dir.path().join(".gitignore"), "").unwrap();
        let repo = MigrationRepository::load(dir.path()).unwrap();
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn load_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        assert!(MigrationRepository::load(dir.path()).is_err());
    }

    #[allow(dead_code)]
    fn weights_map(pairs: &[(&str, u32)]) -> Weights {
        let map: StdBTreeMap<String, u32> = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Weights::from_map(map).unwrap()
    }
}
