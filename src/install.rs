// install.rs — module provisioning against a runtime's management endpoint.
//
// POST   http://{address}:{port}/cwasm/v1/modules          {"name": ..., "wasm_file": ...}
// DELETE http://{address}:{port}/cwasm/v1/modules/{name}
//
// Success or failure is reported to the caller only. The topology model is
// never touched from here — it updates when the runtime announces the
// resulting lifecycle event over the broker.

use anyhow::{bail, Context as _, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::topology::model::Entity;

/// Body of a module install request, forwarded to the runtime verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallRequest {
    pub name: String,
    pub wasm_file: String,
}

/// Resolve a runtime entity's management endpoint from its opaque attrs.
/// Runtimes announce `address` and `port` on start; the engine stores them
/// without interpreting them — this is the one consumer.
pub fn management_endpoint(entity: &Entity) -> Result<(String, u16)> {
    let Some(address) = entity.attr_str("address") else {
        bail!("runtime `{}` has no address attribute", entity.id);
    };
    let port = match entity.attrs.get("port") {
        Some(value) => value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .and_then(|p| u16::try_from(p).ok()),
        None => None,
    };
    let Some(port) = port else {
        bail!("runtime `{}` has no usable port attribute", entity.id);
    };
    Ok((address.to_string(), port))
}

pub struct RuntimeInstaller {
    http: reqwest::Client,
}

impl Default for RuntimeInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeInstaller {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Forward a module install request to the runtime.
    pub async fn install(&self, address: &str, port: u16, request: &InstallRequest) -> Result<()> {
        let url = format!("http://{address}:{port}/cwasm/v1/modules");
        let request_id = Uuid::new_v4().to_string();
        info!(url = %url, module = %request.name, request_id = %request_id, "install request");

        self.http
            .post(&url)
            .header("x-request-id", &request_id)
            .json(request)
            .send()
            .await
            .context("install request failed")?
            .error_for_status()
            .context("install request rejected")?;
        Ok(())
    }

    /// Forward a module uninstall request to the runtime.
    pub async fn uninstall(&self, address: &str, port: u16, name: &str) -> Result<()> {
        let url = format!("http://{address}:{port}/cwasm/v1/modules/{name}");
        let request_id = Uuid::new_v4().to_string();
        info!(url = %url, module = %name, request_id = %request_id, "uninstall request");

        self.http
            .delete(&url)
            .header("x-request-id", &request_id)
            .send()
            .await
            .context("uninstall request failed")?
            .error_for_status()
            .context("uninstall request rejected")?;
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
