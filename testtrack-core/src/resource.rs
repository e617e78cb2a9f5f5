//! The six migration variants. Modeled as a tagged sum with an exhaustive
//! match rather than dynamic dispatch — the operation set is fixed by the
//! file format, so a trait-object hierarchy would buy nothing but
//! indirection (see design notes on polymorphism over migration variants).

use serde::{Deserialize, Serialize};

use crate::error::{Result, TestTrackError};
use crate::repository::MigrationRepository;
use crate::schema::Schema;
use crate::validators;
use crate::weights::Weights;

pub const SERIALIZER_VERSION: u32 = 1;

/// The natural key used by `same_resource_as` to find the preceding
/// operation on the same resource during undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKey {
    Split(String),
    FeatureCompletion(String),
    RemoteKill(String, String),
    IdentifierType(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub name: String,
    pub weights: Weights,
    pub owner: Option<String>,
    pub decided: bool,
}

impl Split {
    pub fn feature_gate(&self) -> bool {
        self.name.ends_with("_enabled")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureCompletion {
    pub feature_gate: String,
    pub app_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteKill {
    pub split: String,
    pub reason: String,
    pub override_to: Option<String>,
    pub first_bad_version: Option<String>,
    pub fixed_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierType {
    pub name: String,
}

/// One of the six resource operations, plus the version it was assigned
/// (nullable for synthetic operations the schema loader builds in-memory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Migration {
    Split {
        migration_version: Option<String>,
        name: String,
        weights: Weights,
        owner: Option<String>,
    },
    SplitDecision {
        migration_version: Option<String>,
        split: String,
        variant: String,
    },
    SplitRetirement {
        migration_version: Option<String>,
        split: String,
        decision: String,
    },
    FeatureCompletion {
        migration_version: Option<String>,
        feature_gate: String,
        app_version: Option<String>,
    },
    RemoteKill {
        migration_version: Option<String>,
        split: String,
        reason: String,
        override_to: Option<String>,
        first_bad_version: Option<String>,
        fixed_version: Option<String>,
    },
    IdentifierType {
        migration_version: Option<String>,
        name: String,
    },
}

impl Migration {
    pub fn migration_version(&self) -> Option<&str> {
        match self {
            Migration::Split { migration_version, .. }
            | Migration::SplitDecision { migration_version, .. }
            | Migration::SplitRetirement { migration_version, .. }
            | Migration::FeatureCompletion { migration_version, .. }
            | Migration::RemoteKill { migration_version, .. }
            | Migration::IdentifierType { migration_version, .. } => migration_version.as_deref(),
        }
    }

    pub fn resource_key(&self) -> ResourceKey {
        match self {
            Migration::Split { name, .. }
            | Migration::SplitDecision { split: name, .. }
            | Migration::SplitRetirement { split: name, .. } => ResourceKey::Split(name.clone()),
            Migration::FeatureCompletion { feature_gate, .. } => {
                ResourceKey::FeatureCompletion(feature_gate.clone())
            }
            Migration::RemoteKill { split, reason, .. } => {
                ResourceKey::RemoteKill(split.clone(), reason.clone())
            }
            Migration::IdentifierType { name, .. } => ResourceKey::IdentifierType(name.clone()),
        }
    }

    pub fn same_resource_as(&self, other: &Migration) -> bool {
        self.resource_key() == other.resource_key()
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Migration::Split { name, .. } => validators::split_name("name", name),
            Migration::SplitDecision { split, .. } => validators::split_name("split", split),
            Migration::SplitRetirement { split, .. } => validators::split_name("split", split),
            Migration::FeatureCompletion { feature_gate, app_version, .. } => {
                validators::feature_gate_name("feature_gate", feature_gate)?;
                validators::optional_app_version("app_version", app_version.as_deref())
            }
            Migration::RemoteKill { split, reason, first_bad_version, fixed_version, .. } => {
                validators::split_name("split", split)?;
                validators::presence("reason", reason)?;
                validators::optional_app_version("first_bad_version", first_bad_version.as_deref())?;
                validators::optional_app_version("fixed_version", fixed_version.as_deref())
            }
            Migration::IdentifierType { name, .. } => validators::snake_case("name", name),
        }
    }

    pub fn filename(&self) -> String {
        let v = self.migration_version().unwrap_or_default();
        match self {
            Migration::Split { name, .. } => format!("{v}_create_split_{name}.yml"),
            Migration::SplitDecision { split, .. } => format!("{v}_create_split_decision_{split}.yml"),
            Migration::SplitRetirement { split, .. } => format!("{v}_create_split_retirement_{split}.yml"),
            Migration::FeatureCompletion { feature_gate, app_version, .. } => {
                let verb = if app_version.is_some() { "create" } else { "destroy" };
                format!("{v}_{verb}_feature_completion_{feature_gate}.yml")
            }
            Migration::RemoteKill { split, first_bad_version, .. } => {
                let verb = if first_bad_version.is_some() { "set" } else { "unset" };
                format!("{v}_{verb}_remote_kill_{split}.yml")
            }
            Migration::IdentifierType { name, .. } => format!("{v}_create_identifier_type_{name}.yml"),
        }
    }

    pub fn sync_path(&self) -> &'static str {
        match self {
            Migration::Split { .. } => "api/v2/migrations/split",
            Migration::SplitDecision { .. } => "api/v2/migrations/split_decision",
            Migration::SplitRetirement { .. } => "api/v2/migrations/split_retirement",
            Migration::FeatureCompletion { .. } => "api/v2/migrations/app_feature_completion",
            Migration::RemoteKill { .. } => "api/v2/migrations/app_remote_kill",
            Migration::IdentifierType { .. } => "api/v1/identifier_type",
        }
    }

    /// The wire shape used for the remote sync; also doubles as the
    /// on-disk `MigrationFile` resource slot.
    pub fn serializable(&self) -> serde_json::Value {
        match self {
            Migration::Split { name, weights, owner, .. } => serde_json::json!({
                "name": name,
                "weighting_registry": weights.as_map(),
                "owner": owner,
            }),
            Migration::SplitDecision { split, variant, .. } => serde_json::json!({
                "split": split,
                "variant": variant,
            }),
            Migration::SplitRetirement { split, decision, .. } => serde_json::json!({
                "split": split,
                "decision": decision,
            }),
            Migration::FeatureCompletion { feature_gate, app_version, .. } => serde_json::json!({
                "feature_gate": feature_gate,
                "app_version": app_version,
            }),
            Migration::RemoteKill { split, reason, override_to, first_bad_version, fixed_version, .. } => {
                serde_json::json!({
                    "split": split,
                    "reason": reason,
                    "override_to": override_to,
                    "first_bad_version": first_bad_version,
                    "fixed_version": fixed_version,
                })
            }
            Migration::IdentifierType { name, .. } => serde_json::json!({ "name": name }),
        }
    }

    /// The opposite operation, where one exists. `Split` create,
    /// `SplitDecision`, `SplitRetirement`, and `IdentifierType` create have
    /// no inverse and error with a variant-specific message, as described
    /// in §4.D.
    pub fn inverse(&self) -> Result<Migration> {
        match self {
            Migration::Split { name, .. } => Err(TestTrackError::UndoImpossible(format!(
                "can't invert split creation {name}"
            ))),
            Migration::SplitDecision { split, .. } => Err(TestTrackError::UndoImpossible(format!(
                "can't invert split decision {split}"
            ))),
            Migration::SplitRetirement { split, .. } => Err(TestTrackError::UndoImpossible(format!(
                "can't invert split retirement {split}"
            ))),
            Migration::IdentifierType { name, .. } => Err(TestTrackError::UndoImpossible(format!(
                "can't invert identifier type creation {name}"
            ))),
            Migration::FeatureCompletion { migration_version, feature_gate, app_version } => {
                if app_version.is_none() {
                    return Err(TestTrackError::UndoImpossible(format!(
                        "can't invert uncompletion of {feature_gate}"
                    )));
                }
                Ok(Migration::FeatureCompletion {
                    migration_version: migration_version.clone(),
                    feature_gate: feature_gate.clone(),
                    app_version: None,
                })
            }
            Migration::RemoteKill {
                migration_version,
                split,
                reason,
                override_to,
                first_bad_version,
                fixed_version: _,
            } => Ok(Migration::RemoteKill {
                migration_version: migration_version.clone(),
                split: split.clone(),
                reason: reason.clone(),
                override_to: override_to.clone(),
                first_bad_version: if first_bad_version.is_some() { None } else {
                    return Err(TestTrackError::UndoImpossible(format!(
                        "can't invert removal of remote kill {split}/{reason}"
                    )));
                },
                fixed_version: None,
            }),
        }
    }

    /// Projects the operation onto the in-memory schema. See §4.D for the
    /// per-variant rules; `idempotent` relaxes the "split must exist"
    /// requirement for retirement during a non-authoritative replay.
    pub fn apply_to_schema(
        &self,
        schema: &mut Schema,
        repo: &MigrationRepository,
        idempotent: bool,
    ) -> Result<()> {
        match self {
            Migration::Split { migration_version, name, weights, owner } => {
                apply_split(schema, repo, migration_version.as_deref(), name, weights, owner)
            }
            Migration::SplitDecision { split, variant, .. } => apply_split_decision(schema, repo, split, variant),
            Migration::SplitRetirement { split, decision, .. } => {
                apply_split_retirement(schema, split, decision, idempotent)
            }
            Migration::FeatureCompletion { feature_gate, app_version, .. } => {
                apply_feature_completion(schema, feature_gate, app_version.as_deref())
            }
            Migration::RemoteKill {
                split,
                reason,
                override_to,
                first_bad_version,
                fixed_version,
                ..
            } => apply_remote_kill(schema, split, reason, override_to, first_bad_version, fixed_version),
            Migration::IdentifierType { name, .. } => apply_identifier_type(schema, name),
        }
    }
}

fn apply_split(
    schema: &mut Schema,
    repo: &MigrationRepository,
    migration_version: Option<&str>,
    name: &str,
    weights: &Weights,
    owner: &Option<String>,
) -> Result<()> {
    if let Some(existing) = schema.splits.iter_mut().find(|s| s.name == name) {
        existing.decided = false;
        existing.weights = existing.weights.merge(weights);
        return Ok(());
    }

    if let Some(version) = migration_version {
        if let Some(prior) = most_recent_split_named(name, version, repo) {
            let revived = prior.weights.merge(weights);
            schema.splits.push(Split {
                name: name.to_string(),
                weights: revived,
                decided: false,
                owner: owner.clone(),
            });
            return Ok(());
        }
    }

    schema.splits.push(Split {
        name: name.to_string(),
        weights: weights.clone(),
        decided: false,
        owner: owner.clone(),
    });
    Ok(())
}

/// Walks the repository backward from `migration_version`'s own index for
/// the most recent prior `Split` with the same name — this is how a
/// replayed create after a retirement revives its old weights instead of
/// starting from scratch (see design note on back-references).
fn most_recent_split_named<'a>(
    name: &str,
    migration_version: &str,
    repo: &'a MigrationRepository,
) -> Option<Split> {
    let versions = repo.sorted_versions();
    let index = versions.iter().position(|v| v == migration_version)?;
    if index == 0 {
        return None;
    }
    for version in versions[..index].iter().rev() {
        if let Some(Migration::Split { name: candidate_name, weights, owner, .. }) = repo.get(version) {
            if candidate_name == name {
                return Some(Split {
                    name: candidate_name.clone(),
                    weights: weights.clone(),
                    decided: false,
                    owner: owner.clone(),
                });
            }
        }
    }
    None
}

fn apply_split_decision(
    schema: &mut Schema,
    repo: &MigrationRepository,
    split: &str,
    variant: &str,
) -> Result<()> {
    if let Some(existing) = schema.splits.iter_mut().find(|s| s.name == split) {
        existing.weights = existing.weights.reweight_to_decision(variant).map_err(|_| {
            TestTrackError::NotFoundInSchema {
                name: format!("{split}:{variant}"),
            }
        })?;
        existing.decided = true;
        return Ok(());
    }

    // Open question: SplitDecision revival semantics (see DESIGN.md). A
    // decision on a split retired earlier in the repo resurrects it with
    // an all-zero-except-decided weighting rather than failing outright.
    if let Some(retired) = most_recently_retired_split(split, repo) {
        let mut weights = retired;
        weights = weights.reweight_to_decision(variant)?;
        schema.splits.push(Split {
            name: split.to_string(),
            weights,
            decided: true,
            owner: None,
        });
        return Ok(());
    }

    Err(TestTrackError::NotFoundInSchema {
        name: split.to_string(),
    })
}

fn most_recently_retired_split(name: &str, repo: &MigrationRepository) -> Option<Weights> {
    for version in repo.sorted_versions().iter().rev() {
        if let Some(Migration::Split { name: candidate, weights, .. }) = repo.get(version) {
            if candidate == name {
                return Some(weights.clone());
            }
        }
    }
    None
}

fn apply_split_retirement(schema: &mut Schema, split: &str, decision: &str, idempotent: bool) -> Result<()> {
    let index = schema.splits.iter().position(|s| s.name == split);
    let Some(index) = index else {
        if idempotent {
            return Ok(());
        }
        return Err(TestTrackError::NotFoundInSchema {
            name: split.to_string(),
        });
    };
    schema.splits[index]
        .weights
        .reweight_to_decision(decision)
        .map_err(|_| TestTrackError::NotFoundInSchema {
            name: format!("{split}:{decision}"),
        })?;
    schema.splits.remove(index);
    Ok(())
}

fn apply_feature_completion(schema: &mut Schema, feature_gate: &str, app_version: Option<&str>) -> Result<()> {
    let index = schema.feature_completions.iter().position(|f| f.feature_gate == feature_gate);
    match app_version {
        None => {
            let Some(index) = index else {
                return Err(TestTrackError::NotFoundInSchema {
                    name: feature_gate.to_string(),
                });
            };
            schema.feature_completions.remove(index);
            Ok(())
        }
        Some(version) => {
            let record = FeatureCompletion {
                feature_gate: feature_gate.to_string(),
                app_version: version.to_string(),
            };
            match index {
                Some(i) => schema.feature_completions[i] = record,
                None => schema.feature_completions.push(record),
            }
            Ok(())
        }
    }
}

fn apply_remote_kill(
    schema: &mut Schema,
    split: &str,
    reason: &str,
    override_to: &Option<String>,
    first_bad_version: &Option<String>,
    fixed_version: &Option<String>,
) -> Result<()> {
    let index = schema
        .remote_kills
        .iter()
        .position(|k| k.split == split && k.reason == reason);
    match first_bad_version {
        None => {
            let Some(index) = index else {
                return Err(TestTrackError::NotFoundInSchema {
                    name: format!("{split}/{reason}"),
                });
            };
            schema.remote_kills.remove(index);
            Ok(())
        }
        Some(_) => {
            let record = RemoteKill {
                split: split.to_string(),
                reason: reason.to_string(),
                override_to: override_to.clone(),
                first_bad_version: first_bad_version.clone(),
                fixed_version: fixed_version.clone(),
            };
            match index {
                Some(i) => schema.remote_kills[i] = record,
                None => schema.remote_kills.push(record),
            }
            Ok(())
        }
    }
}

fn apply_identifier_type(schema: &mut Schema, name: &str) -> Result<()> {
    if schema.identifier_types.iter().any(|t| t.name == name) {
        return Err(TestTrackError::InvalidInput(format!(
            "identifier type '{name}' already exists"
        )));
    }
    schema.identifier_types.push(IdentifierType { name: name.to_string() });
    Ok(())
}

/// On-disk shape of a migration file: exactly one resource slot is
/// populated, tagged by which YAML key is present, plus the serializer
/// version. Mirrors `serializers.MigrationFile` from the source tooling.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MigrationFileYaml {
    pub serializer_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<SplitYaml>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "split_decision")]
    pub split_decision: Option<SplitDecisionYaml>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "split_retirement")]
    pub split_retirement: Option<SplitRetirementYaml>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "feature_completion")]
    pub feature_completion: Option<FeatureCompletionYaml>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "remote_kill")]
    pub remote_kill: Option<RemoteKillYaml>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "identifier_type")]
    pub identifier_type: Option<IdentifierTypeYaml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitYaml {
    pub name: String,
    pub weights: Weights,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitDecisionYaml {
    pub split: String,
    pub variant: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRetirementYaml {
    pub split: String,
    pub decision: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCompletionYaml {
    pub feature_gate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteKillYaml {
    pub split: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_bad_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierTypeYaml {
    pub name: String,
}

impl Migration {
    /// Renders this migration into its on-disk `MigrationFile` shape.
    pub fn to_file(&self) -> MigrationFileYaml {
        let mut file = MigrationFileYaml {
            serializer_version: SERIALIZER_VERSION,
            ..Default::default()
        };
        match self {
            Migration::Split { name, weights, owner, .. } => {
                file.split = Some(SplitYaml {
                    name: name.clone(),
                    weights: weights.clone(),
                    owner: owner.clone(),
                });
            }
            Migration::SplitDecision { split, variant, .. } => {
                file.split_decision = Some(SplitDecisionYaml {
                    split: split.clone(),
                    variant: variant.clone(),
                });
            }
            Migration::SplitRetirement { split, decision, .. } => {
                file.split_retirement = Some(SplitRetirementYaml {
                    split: split.clone(),
                    decision: decision.clone(),
                });
            }
            Migration::FeatureCompletion { feature_gate, app_version, .. } => {
                file.feature_completion = Some(FeatureCompletionYaml {
                    feature_gate: feature_gate.clone(),
                    app_version: app_version.clone(),
                });
            }
            Migration::RemoteKill { split, reason, override_to, first_bad_version, fixed_version, .. } => {
                file.remote_kill = Some(RemoteKillYaml {
                    split: split.clone(),
                    reason: reason.clone(),
                    override_to: override_to.clone(),
                    first_bad_version: first_bad_version.clone(),
                    fixed_version: fixed_version.clone(),
                });
            }
            Migration::IdentifierType { name, .. } => {
                file.identifier_type = Some(IdentifierTypeYaml { name: name.clone() });
            }
        }
        file
    }

    /// Reifies a migration from its on-disk `MigrationFile` shape.
    /// Exactly one resource slot must be populated, or the load fails with
    /// a "didn't match a known migration type" error.
    pub fn from_file(migration_version: Option<String>, file: MigrationFileYaml) -> Result<Migration> {
        if let Some(s) = file.split {
            return Ok(Migration::Split {
                migration_version,
                name: s.name,
                weights: s.weights,
                owner: s.owner,
            });
        }
        if let Some(s) = file.split_decision {
            return Ok(Migration::SplitDecision {
                migration_version,
                split: s.split,
                variant: s.variant,
            });
        }
        if let Some(s) = file.split_retirement {
            return Ok(Migration::SplitRetirement {
                migration_version,
                split: s.split,
                decision: s.decision,
            });
        }
        if let Some(s) = file.feature_completion {
            return Ok(Migration::FeatureCompletion {
                migration_version,
                feature_gate: s.feature_gate,
                app_version: s.app_version,
            });
        }
        if let Some(s) = file.remote_kill {
            return Ok(Migration::RemoteKill {
                migration_version,
                split: s.split,
                reason: s.reason,
                override_to: s.override_to,
                first_bad_version: s.first_bad_version,
                fixed_version: s.fixed_version,
            });
        }
        if let Some(s) = file.identifier_type {
            return Ok(Migration::IdentifierType {
                migration_version,
                name: s.name,
            });
        }
        Err(TestTrackError::FilesystemError(
            "migration file didn't match a known migration type".to_string(),
        ))
    }
}
