//! The authoritative materialized document produced by folding migrations
//! in order, plus the cross-project merged view the local service reads.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::repository::MigrationRepository;
use crate::resource::{FeatureCompletion, IdentifierType, RemoteKill, Split, SERIALIZER_VERSION};
use crate::weights::Weights;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    pub serializer_version: u32,
    pub schema_version: String,
    pub splits: Vec<Split>,
    pub identifier_types: Vec<IdentifierType>,
    pub remote_kills: Vec<RemoteKill>,
    pub feature_completions: Vec<FeatureCompletion>,
}

impl Schema {
    pub fn empty() -> Self {
        Self {
            serializer_version: SERIALIZER_VERSION,
            ..Default::default()
        }
    }

    /// Sorts every resource list deterministically: splits and identifier
    /// types by name, feature completions by gate, remote kills by
    /// (split, reason). Folding the same migrations twice and canonically
    /// sorting both results must produce bitwise-identical schemas.
    pub fn canonicalize(&mut self) {
        self.splits.sort_by(|a, b| a.name.cmp(&b.name));
        self.identifier_types.sort_by(|a, b| a.name.cmp(&b.name));
        self.feature_completions.sort_by(|a, b| a.feature_gate.cmp(&b.feature_gate));
        self.remote_kills
            .sort_by(|a, b| (a.split.as_str(), a.reason.as_str()).cmp(&(b.split.as_str(), b.reason.as_str())));
    }

    fn canonicalized(&self) -> Schema {
        let mut clone = self.clone();
        clone.canonicalize();
        clone
    }

    pub fn eq_after_canonical_sort(&self, other: &Schema) -> bool {
        self.canonicalized() == other.canonicalized()
    }

    /// If `testtrack/schema.yml` exists, parses it; otherwise generates it
    /// fresh from `repo` and writes the result to disk.
    pub fn read(schema_path: &Path, repo: &MigrationRepository) -> Result<Schema> {
        if let Some(schema) = Schema::load_if_exists(schema_path)? {
            return Ok(schema);
        }
        let schema = Schema::generate(repo, None)?;
        schema.write(schema_path)?;
        Ok(schema)
    }

    /// Parses `schema_path` if present, without falling back to
    /// generation. Lets a caller that already knows how to project a
    /// single new migration distinguish "parse the existing file" from
    /// "there was nothing to parse" rather than risk folding the same
    /// migration twice.
    pub fn load_if_exists(schema_path: &Path) -> Result<Option<Schema>> {
        if !schema_path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(schema_path)?;
        let wire: SchemaYaml = serde_yaml::from_str(&content)?;
        Ok(Some(wire.into_schema()))
    }

    /// Starts from an empty schema, optionally folds a pre-existing legacy
    /// schema shape, then folds every migration in `repo` in ascending
    /// version order. `schema_version` becomes the highest folded version,
    /// or empty if none were folded.
    pub fn generate(repo: &MigrationRepository, legacy: Option<LegacySchema>) -> Result<Schema> {
        let mut schema = Schema::empty();
        if let Some(legacy) = legacy {
            legacy.fold_into(&mut schema);
        }

        let mut highest_version = None;
        for (version, migration) in repo.iter_in_order() {
            migration.apply_to_schema(&mut schema, repo, false)?;
            highest_version = Some(version.clone());
        }
        schema.schema_version = highest_version.unwrap_or_default();
        schema.canonicalize();
        Ok(schema)
    }

    /// Sorts resources, marshals, and writes to `schema_path` via a
    /// write-to-temp-then-rename so a crash mid-write never leaves a
    /// partially written schema on disk.
    pub fn write(&self, schema_path: &Path) -> Result<()> {
        let mut canonical = self.clone();
        canonical.canonicalize();
        let wire = SchemaYaml::from_schema(&canonical);
        let content = serde_yaml::to_string(&wire)?;
        if let Some(parent) = schema_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = schema_path.with_extension("yml.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, schema_path)?;
        Ok(())
    }

    /// Publishes a symlink to `schema_path` under
    /// `<config_dir>/schemas/<basename>.yml`.
    pub fn link(schema_path: &Path, schemas_link_dir: &Path, basename: &str, force: bool) -> Result<()> {
        std::fs::create_dir_all(schemas_link_dir)?;
        let link_path = schemas_link_dir.join(format!("{basename}.yml"));
        if link_path.exists() || link_path.symlink_metadata().is_ok() {
            if !force {
                return Ok(());
            }
            std::fs::remove_file(&link_path)?;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(schema_path, &link_path)?;
        #[cfg(not(unix))]
        std::fs::copy(schema_path, &link_path).map(|_| ())?;
        Ok(())
    }

    /// Collects every `*.yml` in `schemas_link_dir`, dereferencing symlinks
    /// and silently skipping unreadable ones (a linked app may have been
    /// uninstalled), and concatenates their resources into one virtual
    /// schema used by the local service.
    pub fn read_merged(schemas_link_dir: &Path) -> Result<Schema> {
        let mut merged = Schema::empty();
        let Ok(entries) = std::fs::read_dir(schemas_link_dir) else {
            return Ok(merged);
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("yml"))
            .collect();
        paths.sort();

        for path in paths {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let Ok(wire) = serde_yaml::from_str::<SchemaYaml>(&content) else {
                continue;
            };
            let schema = wire.into_schema();
            merged.splits.extend(schema.splits);
            merged.identifier_types.extend(schema.identifier_types);
            merged.remote_kills.extend(schema.remote_kills);
            merged.feature_completions.extend(schema.feature_completions);
        }
        Ok(merged)
    }
}

/// A pre-2.0-serializer schema shape: `identifier_types` as a bare name
/// list, and splits as a mapping from name straight to weights (no owner,
/// no decided flag). Folded in before any migrations when present.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacySchema {
    #[serde(default)]
    pub identifier_types: Vec<String>,
    #[serde(default)]
    pub splits: BTreeMap<String, Weights>,
}

impl LegacySchema {
    fn fold_into(self, schema: &mut Schema) {
        for name in self.identifier_types {
            schema.identifier_types.push(IdentifierType { name });
        }
        for (name, weights) in self.splits {
            schema.splits.push(Split {
                name,
                weights,
                owner: None,
                decided: false,
            });
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaYaml {
    serializer_version: u32,
    schema_version: String,
    splits: Vec<SchemaSplitYaml>,
    identifier_types: Vec<String>,
    #[serde(default)]
    remote_kills: Vec<SchemaRemoteKillYaml>,
    #[serde(default)]
    feature_completions: Vec<SchemaFeatureCompletionYaml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaSplitYaml {
    name: String,
    weights: Weights,
    decided: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaRemoteKillYaml {
    split: String,
    reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    override_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    first_bad_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fixed_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaFeatureCompletionYaml {
    feature_gate: String,
    app_version: String,
}

impl SchemaYaml {
    fn from_schema(schema: &Schema) -> Self {
        Self {
            serializer_version: schema.serializer_version,
            schema_version: schema.schema_version.clone(),
            splits: schema
                .splits
                .iter()
                .map(|s| SchemaSplitYaml {
                    name: s.name.clone(),
                    weights: s.weights.clone(),
                    decided: s.decided,
                    owner: s.owner.clone(),
                })
                .collect(),
            identifier_types: schema.identifier_types.iter().map(|t| t.name.clone()).collect(),
            remote_kills: schema
                .remote_kills
                .iter()
                .map(|k| SchemaRemoteKillYaml {
                    split: k.split.clone(),
                    reason: k.reason.clone(),
                    override_to: k.override_to.clone(),
                    first_bad_version: k.first_bad_version.clone(),
                    fixed_version: k.fixed_version.clone(),
                })
                .collect(),
            feature_completions: schema
                .feature_completions
                .iter()
                .map(|f| SchemaFeatureCompletionYaml {
                    feature_gate: f.feature_gate.clone(),
                    app_version: f.app_version.clone(),
                })
                .collect(),
        }
    }

    fn into_schema(self) -> Schema {
        let mut schema = Schema {
            serializer_version: self.serializer_version,
            schema_version: self.schema_version,
            splits: self
                .splits
                .into_iter()
                .map(|s| Split {
                    name: s.name,
                    weights: s.weights,
                    decided: s.decided,
                    owner: s.owner,
                })
                .collect(),
            identifier_types: self.identifier_types.into_iter().map(|name| IdentifierType { name }).collect(),
            remote_kills: self
                .remote_kills
                .into_iter()
                .map(|k| RemoteKill {
                    split: k.split,
                    reason: k.reason,
                    override_to: k.override_to,
                    first_bad_version: k.first_bad_version,
                    fixed_version: k.fixed_version,
                })
                .collect(),
            feature_completions: self
                .feature_completions
                .into_iter()
                .map(|f| FeatureCompletion {
                    feature_gate: f.feature_gate,
                    app_version: f.app_version,
                })
                .collect(),
        };
        schema.canonicalize();
        schema
    }
}
