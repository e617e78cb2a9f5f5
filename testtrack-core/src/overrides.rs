//! The per-visitor assignment overrides file: a flat YAML map of split
//! name to variant, kept in the user's config directory, independent of
//! the Schema. Mutated only under the local service's process-wide mutex
//! (see `testtrack-server`).

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentOverrides {
    assignments: BTreeMap<String, String>,
}

impl AssignmentOverrides {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads `<config_dir>/assignments.yml`, treating a missing file as an
    /// empty mapping rather than an error — the file is created lazily on
    /// first write.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::empty());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::empty());
        }
        let assignments: BTreeMap<String, String> = serde_yaml::from_str(&content)?;
        Ok(Self { assignments })
    }

    /// Writes the mapping back via write-to-temp-then-rename, same as the
    /// schema store, so a crash mid-write never leaves a partial file.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(&self.assignments)?;
        let tmp_path = path.with_extension("yml.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn get(&self, split_name: &str) -> Option<&str> {
        self.assignments.get(split_name).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assignments.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn assign(&mut self, split_name: impl Into<String>, variant: impl Into<String>) {
        self.assignments.insert(split_name.into(), variant.into());
    }

    pub fn unassign(&mut self, split_name: &str) {
        self.assignments.remove(split_name);
    }

    pub fn unassign_all(&mut self) {
        self.assignments.clear();
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
