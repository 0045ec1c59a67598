use tracing::info;

use super::Reconciler;
use crate::api::{IntegrationInfo, RelytApi};
use crate::convergence::retry;
use crate::error::{RelytError, Result};
use crate::state::StateStore;

const KIND: &str = "integration";

impl<C: RelytApi, S: StateStore> Reconciler<C, S> {
    /// Integration settings of `dwsu_id`, or `None` when the DWSU is gone.
    pub async fn read_integration(&self, dwsu_id: &str) -> Result<Option<IntegrationInfo>> {
        let Some(uri) = self.region_uri_if_present(dwsu_id).await? else {
            return Ok(None);
        };
        let uri = uri.as_str();
        let client = &self.client;
        Ok(retry(&self.settings.retry, || client.get_integration(uri, dwsu_id)).await?)
    }

    /// Set the external id the DWSU presents when assuming roles in the
    /// customer's account. The backend applies it synchronously, so the
    /// result is read back once instead of polled.
    pub async fn apply_integration(
        &self,
        dwsu_id: &str,
        external_id: &str,
    ) -> Result<IntegrationInfo> {
        if external_id.is_empty() {
            return Err(RelytError::Invalid("integration external id must not be empty".into()));
        }
        let uri = self.region_uri(dwsu_id).await?;
        let uri = uri.as_str();
        let client = &self.client;
        let policy = &self.settings.retry;
        let missing = || RelytError::NotFound {
            kind: KIND,
            id: dwsu_id.to_string(),
        };

        let current = retry(policy, || client.get_integration(uri, dwsu_id))
            .await?
            .ok_or_else(missing)?;
        if current.external_id == external_id {
            return Ok(current);
        }

        let desired = IntegrationInfo {
            external_id: external_id.to_string(),
            ..current
        };
        retry(policy, || client.patch_integration(uri, dwsu_id, &desired)).await?;
        info!(dwsu_id, "integration external id updated");

        retry(policy, || client.get_integration(uri, dwsu_id))
            .await?
            .ok_or_else(missing)
    }
}
