// state_service.rs — client for the remote state-snapshot service.
//
// GET    {state_url}/net-state — full snapshot of entity records, consumed
//                                once at startup by the snapshot replay
// DELETE {state_url}/net-state — administrative reset of the remote store
//
// The snapshot records share the live-event wire shape (both carry `cmd`),
// so the replay feeds them through the reconciler unchanged.

use anyhow::{Context as _, Result};
use tracing::debug;

use crate::topology::model::EventRecord;

pub struct StateServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl StateServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch the full snapshot. Called once at startup; a failure here is
    /// surfaced to the caller, which starts from an empty model instead.
    pub async fn fetch_all(&self) -> Result<Vec<EventRecord>> {
        let url = format!("{}/net-state", self.base_url);
        debug!(url = %url, "fetching state snapshot");

        let records = self
            .http
            .get(&url)
            .send()
            .await
            .context("snapshot fetch failed")?
            .error_for_status()
            .context("snapshot fetch rejected")?
            .json::<Vec<EventRecord>>()
            .await
            .context("snapshot decode failed")?;

        Ok(records)
    }

    /// Clear the remote store. The caller is responsible for resetting the
    /// local model afterwards — the remote service knows nothing about it.
    pub async fn delete_all(&self) -> Result<()> {
        let url = format!("{}/net-state", self.base_url);
        self.http
            .delete(&url)
            .send()
            .await
            .context("state reset failed")?
            .error_for_status()
            .context("state reset rejected")?;
        Ok(())
    }
}
