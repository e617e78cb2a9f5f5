//! Minimal POST/GET/DELETE client to the upstream TestTrack service. The
//! manager and runner are generic over [`RemoteClient`] so they never
//! depend on a live network endpoint to be unit-testable; filesystem-only
//! operation uses [`NullRemoteClient`].

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{Result, TestTrackError};
use crate::weights::Weights;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Accepted,
    Rejected { reason: String },
}

#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// `GET api/v2/migrations` -> the set of already-applied versions.
    async fn list_applied_versions(&self) -> Result<Vec<String>>;

    /// `POST api/v2/migrations` with `{version}`; 204 expected.
    async fn record_applied_version(&self, version: &str) -> Result<()>;

    /// `DELETE api/v2/migrations/<version>`.
    async fn delete_applied_version(&self, version: &str) -> Result<()>;

    /// `POST <sync_path>` with the migration's serializable body. 204 is
    /// accepted, 422 is a typed rejection, anything else is a protocol
    /// error.
    async fn sync_resource(&self, sync_path: &str, body: &serde_json::Value) -> Result<SyncOutcome>;

    /// `GET api/v1/split_registry` -> the remote's authoritative weights by
    /// split name, the same shape the local service hands local clients.
    /// Backs the `sync` command, which overwrites local weights for
    /// whatever splits this registry also names.
    async fn fetch_split_registry(&self) -> Result<BTreeMap<String, Weights>>;
}

/// Talks to `TESTTRACK_CLI_URL` over HTTP.
pub struct HttpRemoteClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemoteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn list_applied_versions(&self) -> Result<Vec<String>> {
        #[derive(serde::Deserialize)]
        struct Entry {
            version: String,
        }
        let resp = self.client.get(self.url("api/v2/migrations")).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TestTrackError::RemoteProtocolError {
                status: status.as_u16(),
                path: "api/v2/migrations".to_string(),
            });
        }
        let entries: Vec<Entry> = resp.json().await?;
        Ok(entries.into_iter().map(|e| e.version).collect())
    }

    async fn record_applied_version(&self, version: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.url("api/v2/migrations"))
            .json(&serde_json::json!({ "version": version }))
            .send()
            .await?;
        match resp.status().as_u16() {
            204 => Ok(()),
            422 => Err(TestTrackError::RemoteUnaccepted {
                version: version.to_string(),
                reason: "remote rejected version record".to_string(),
            }),
            status => Err(TestTrackError::RemoteProtocolError {
                status,
                path: "api/v2/migrations".to_string(),
            }),
        }
    }

    async fn delete_applied_version(&self, version: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("api/v2/migrations/{version}")))
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TestTrackError::RemoteProtocolError {
                status: resp.status().as_u16(),
                path: format!("api/v2/migrations/{version}"),
            })
        }
    }

    async fn sync_resource(&self, sync_path: &str, body: &serde_json::Value) -> Result<SyncOutcome> {
        let resp = self.client.post(self.url(sync_path)).json(body).send().await?;
        match resp.status().as_u16() {
            204 => Ok(SyncOutcome::Accepted),
            422 => {
                let reason = resp.text().await.unwrap_or_default();
                Ok(SyncOutcome::Rejected { reason })
            }
            status => Err(TestTrackError::RemoteProtocolError {
                status,
                path: sync_path.to_string(),
            }),
        }
    }

    async fn fetch_split_registry(&self) -> Result<BTreeMap<String, Weights>> {
        let resp = self.client.get(self.url("api/v1/split_registry")).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TestTrackError::RemoteProtocolError {
                status: status.as_u16(),
                path: "api/v1/split_registry".to_string(),
            });
        }
        let wire: BTreeMap<String, BTreeMap<String, u32>> = resp.json().await?;
        wire.into_iter().map(|(name, weights)| Ok((name, Weights::from_map(weights)?))).collect()
    }
}

/// Treats every sync as already-accepted and every applied-versions query
/// as empty. Used for filesystem-only operation: schema regeneration,
/// local serving, and tests that don't want a live network endpoint.
#[derive(Debug, Default)]
pub struct NullRemoteClient;

#[async_trait]
impl RemoteClient for NullRemoteClient {
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
        Ok(BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_client_accepts_everything() {
        let client = NullRemoteClient;
        assert_eq!(client.list_applied_versions().await.unwrap(), Vec::<String>::new());
        assert_eq!(
            client.sync_resource("api/v2/migrations/split", &serde_json::json!({})).await.unwrap(),
            SyncOutcome::Accepted
        );
        assert!(client.record_applied_version("v1").await.is_ok());
        assert!(client.delete_applied_version("v1").await.is_ok());
        assert!(client.fetch_split_registry().await.unwrap().is_empty());
    }
}
