//! The `sync` command: pulls the remote's authoritative split registry and
//! overwrites local weights for whatever splits it also names, leaving
//! local-only splits and every other resource kind untouched.

use std::path::Path;

use crate::error::Result;
use crate::remote::RemoteClient;
use crate::repository::MigrationRepository;
use crate::schema::Schema;
use crate::weights::Weights;
use std::collections::BTreeMap;

/// Overwrites `schema`'s split weights in place for every split name also
/// present in `registry`. Splits the registry doesn't mention, and
/// resources other than splits, are left alone.
pub fn merge_registry_weights(schema: &mut Schema, registry: &BTreeMap<String, Weights>) {
    for split in schema.splits.iter_mut() {
        if let Some(remote_weights) = registry.get(&split.name) {
            split.weights = remote_weights.clone();
        }
    }
}

/// Reads (or generates) the local schema at `schema_path`, fetches the
/// remote's split registry, overwrites matching weights, and writes the
/// merged schema back.
pub async fn sync<C: RemoteClient>(remote: &C, schema_path: &Path, repo: &MigrationRepository) -> Result<Schema> {
    let mut schema = Schema::read(schema_path, repo)?;
    let registry = remote.fetch_split_registry().await?;
    merge_registry_weights(&mut schema, &registry);
    schema.canonicalize();
    schema.write(schema_path)?;
    tracing::info!(splits = schema.splits.len(), "synced split registry");
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{NullRemoteClient, SyncOutcome};
    use crate::resource::Split;
    use async_trait::async_trait;
    use std::collections::BTreeMap as StdMap;

    fn weights(pairs: &[(&str, u32)]) -> Weights {
        let map: StdMap<String, u32> = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Weights::from_map(map).unwrap()
    }

    #[test]
    fn merge_overwrites_only_splits_present_in_both() {
        let mut schema = Schema::empty();
        schema.splits.push(Split {
            name: "foo_experiment".to_string(),
            weights: weights(&[("a", 50), ("b", 50)]),
            decided: false,
            owner: None,
        });
        schema.splits.push(Split {
            name: "local_only".to_string(),
            weights: weights(&[("a", 100)]),
            decided: false,
            owner: None,
        });

        let mut registry = BTreeMap::new();
        registry.insert("foo_experiment".to_string(), weights(&[("a", 10), ("b", 90)]));
        registry.insert("remote_only".to_string(), weights(&[("a", 100)]));

        merge_registry_weights(&mut schema, &registry);

        let foo = schema.splits.iter().find(|s| s.name == "foo_experiment").unwrap();
        assert_eq!(foo.weights.as_map()["a"], 10);
        let local = schema.splits.iter().find(|s| s.name == "local_only").unwrap();
        assert_eq!(local.weights.as_map()["a"], 100);
    }

    struct FixedRegistryClient {
        registry: BTreeMap<String, Weights>,
    }

    #[async_trait]
    impl RemoteClient for FixedRegistryClient {
        async fn list_applied_versions(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn record_applied_version(&self, _version: &str) -> Result<()> {
            Ok(())
        }

        async fn delete_applied_version(&self, _version: &str) -> Result<()> {
            Ok(())
        }

        async fn sync_resource(&self, _sync_path: &str, _body: &serde_json::Value) -> Result<SyncOutcome> {
            Ok(SyncOutcome::Accepted)
        }

        async fn fetch_split_registry(&self) -> Result<BTreeMap<String, Weights>> {
            Ok(self.registry.clone())
        }
    }

    #[tokio::test]
    async fn sync_writes_merged_schema_back_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("schema.yml");
        let mut schema = Schema::empty();
        schema.splits.push(Split {
            name: "foo_experiment".to_string(),
            weights: weights(&[("a", 50), ("b", 50)]),
            decided: false,
            owner: None,
        });
        schema.write(&schema_path).unwrap();

        let mut registry = BTreeMap::new();
        registry.insert("foo_experiment".to_string(), weights(&[("a", 0), ("b", 100)]));
        let client = FixedRegistryClient { registry };
        let repo = MigrationRepository::empty();

        let synced = sync(&client, &schema_path, &repo).await.unwrap();
        assert_eq!(synced.splits[0].weights.as_map()["b"], 100);

        let reloaded = Schema::read(&schema_path, &repo).unwrap();
        assert_eq!(reloaded.splits[0].weights.as_map()["b"], 100);
    }

    #[tokio::test]
    async fn sync_with_null_client_leaves_weights_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("schema.yml");
        let mut schema = Schema::empty();
        schema.splits.push(Split {
            name: "foo_experiment".to_string(),
            weights: weights(&[("a", 50), ("b", 50)]),
            decided: false,
            owner: None,
        });
        schema.write(&schema_path).unwrap();

        let client = NullRemoteClient;
        let repo = MigrationRepository::empty();
        let synced = sync(&client, &schema_path, &repo).await.unwrap();
        assert_eq!(synced.splits[0].weights.as_map()["a"], 50);
    }
}
