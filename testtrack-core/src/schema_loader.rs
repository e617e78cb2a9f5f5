//! Idempotently projects an existing schema back into the remote service
//! ("schema load" bootstrapping), then replays recorded versions so the
//! remote's applied-versions set matches `schema_version`.

use crate::error::{Result, TestTrackError};
use crate::remote::{RemoteClient, SyncOutcome};
use crate::repository::MigrationRepository;
use crate::resource::Migration;
use crate::schema::Schema;

/// Outcome of a schema load: which migrations were recorded against the
/// remote's applied-versions set, and which migrations in the repository
/// are newer than `schema_version` and therefore weren't.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub recorded_versions: Vec<String>,
    pub newer_than_schema: Vec<String>,
}

/// Builds the synthetic, version-less migration stream a schema implies:
/// identifier types, then splits (a create, plus a decision for any
/// already-decided split), then remote kills, then feature completions.
fn synthetic_migrations(schema: &Schema) -> Vec<Migration> {
    let mut migrations = Vec::new();

    for identifier_type in &schema.identifier_types {
        migrations.push(Migration::IdentifierType {
            migration_version: None,
            name: identifier_type.name.clone(),
        });
    }

    for split in &schema.splits {
        migrations.push(Migration::Split {
            migration_version: None,
            name: split.name.clone(),
            weights: split.weights.clone(),
            owner: split.owner.clone(),
        });
        if split.decided {
            if let Some((variant, _)) = split.weights.iter().find(|(_, w)| *w == 100) {
                migrations.push(Migration::SplitDecision {
                    migration_version: None,
                    split: split.name.clone(),
                    variant: variant.to_string(),
                });
            }
        }
    }

    for kill in &schema.remote_kills {
        migrations.push(Migration::RemoteKill {
            migration_version: None,
            split: kill.split.clone(),
            reason: kill.reason.clone(),
            override_to: kill.override_to.clone(),
            first_bad_version: kill.first_bad_version.clone(),
            fixed_version: kill.fixed_version.clone(),
        });
    }

    for completion in &schema.feature_completions {
        migrations.push(Migration::FeatureCompletion {
            migration_version: None,
            feature_gate: completion.feature_gate.clone(),
            app_version: Some(completion.app_version.clone()),
        });
    }

    migrations
}

/// Rebuilds a schema from scratch by folding the synthetic migration
/// stream through an empty `MigrationRepository` (the back-reference walk
/// never triggers, since nothing here was ever retired).
fn replay_synthetic(migrations: &[Migration]) -> Result<Schema> {
    let mut schema = Schema::empty();
    let empty_repo = MigrationRepository::empty();
    for migration in migrations {
        migration.apply_to_schema(&mut schema, &empty_repo, false)?;
    }
    schema.canonicalize();
    Ok(schema)
}

fn schema_diff(expected: &Schema, actual: &Schema) -> String {
    let mut diff = String::new();
    if expected.splits != actual.splits {
        diff.push_str(&format!("splits: {:?}\n   vs: {:?}\n", expected.splits, actual.splits));
    }
    if expected.identifier_types != actual.identifier_types {
        diff.push_str(&format!(
            "identifier_types: {:?}\n            vs: {:?}\n",
            expected.identifier_types, actual.identifier_types
        ));
    }
    if expected.remote_kills != actual.remote_kills {
        diff.push_str(&format!("remote_kills: {:?}\n        vs: {:?}\n", expected.remote_kills, actual.remote_kills));
    }
    if expected.feature_completions != actual.feature_completions {
        diff.push_str(&format!(
            "feature_completions: {:?}\n               vs: {:?}\n",
            expected.feature_completions, actual.feature_completions
        ));
    }
    diff
}

/// Projects `schema` into the remote, verifies the projection is
/// consistent by replaying it locally, then replays `SyncVersion` for
/// every real migration in `repo` up to and including `schema_version`.
pub async fn load<C: RemoteClient>(remote: &C, schema: &Schema, repo: &MigrationRepository) -> Result<LoadReport> {
    let synthetic = synthetic_migrations(schema);

    for migration in &synthetic {
        match remote.sync_resource(migration.sync_path(), &migration.serializable()).await? {
            SyncOutcome::Accepted => {}
            SyncOutcome::Rejected { reason } => {
                return Err(TestTrackError::RemoteUnaccepted {
                    version: "schema-load".to_string(),
                    reason,
                });
            }
        }
    }

    let mut replayed = replay_synthetic(&synthetic)?;
    let mut expected = schema.clone();
    expected.canonicalize();
    replayed.schema_version = expected.schema_version.clone();
    if !expected.eq_after_canonical_sort(&replayed) {
        return Err(TestTrackError::InconsistentSchema {
            diff: schema_diff(&expected, &replayed),
        });
    }

    let mut report = LoadReport::default();
    for version in repo.sorted_versions() {
        if schema.schema_version.is_empty() || version > schema.schema_version {
            report.newer_than_schema.push(version);
            continue;
        }
        remote.record_applied_version(&version).await?;
        report.recorded_versions.push(version);
    }

    tracing::info!(
        recorded = report.recorded_versions.len(),
        newer = report.newer_than_schema.len(),
        "loaded schema into remote"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::NullRemoteClient;
    use crate::resource::Split;
    use crate::weights::Weights;
    use std::collections::BTreeMap;

    fn weights(pairs: &[(&str, u32)]) -> Weights {
        let map: BTreeMap<String, u32> = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Weights::from_map(map).unwrap()
    }

    #[tokio::test]
    async fn load_is_consistent_for_undecided_split() {
        let mut schema = Schema::empty();
        schema.splits.push(Split {
            name: "foo_experiment".to_string(),
            weights: weights(&[("a", 50), ("b", 50)]),
            decided: false,
            owner: None,
        });
        schema.canonicalize();

        let repo = MigrationRepository::empty();
        let null = NullRemoteClient;
        let report = load(&null, &schema, &repo).await.unwrap();
        assert!(report.recorded_versions.is_empty());
    }

    #[tokio::test]
    async fn load_reconstructs_decided_split_via_create_plus_decision() {
        let mut schema = Schema::empty();
        schema.splits.push(Split {
            name: "foo_experiment".to_string(),
            weights: weights(&[("a", 0), ("b", 100)]),
            decided: true,
            owner: None,
        });
        schema.canonicalize();

        let repo = MigrationRepository::empty();
        let null = NullRemoteClient;
        assert!(load(&null, &schema, &repo).await.is_ok());
    }

    #[tokio::test]
    async fn load_reports_migrations_newer_than_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let migration = Migration::Split {
            migration_version: Some("1000000000005".to_string()),
            name: "foo_experiment".to_string(),
            weights: weights(&[("a", 100)]),
            owner: None,
        };
        let file = migration.to_file();
        std::fs::write(
            dir.path().join("1000000000005_create_split_foo_experiment.yml"),
            serde_yaml::to_string(&file).unwrap(),
        )
        .unwrap();
        let repo = MigrationRepository::load(dir.path()).unwrap();

        let mut schema = Schema::empty();
        schema.schema_version = "1000000000001".to_string();

        let null = NullRemoteClient;
        let report = load(&null, &schema, &repo).await.unwrap();
        assert_eq!(report.newer_than_schema, vec!["1000000000005".to_string()]);
        assert!(report.recorded_versions.is_empty());
    }
}
