use tracing::info;

use super::{Deletion, Reconciler, child_key};
use crate::api::{Dps, RelytApi};
use crate::convergence::{PartialListing, retry, scroll_all};
use crate::error::{RelytError, Result};
use crate::state::{ResourceKind, StateStore};

const KIND: ResourceKind = ResourceKind::Dps;

impl<C: RelytApi, S: StateStore> Reconciler<C, S> {
    /// Create a DPS inside `dwsu_id` and wait until it is READY.
    pub async fn create_dps(&self, dwsu_id: &str, desired: &Dps) -> Result<Dps> {
        if desired.name.is_empty() || desired.engine.is_empty() {
            return Err(RelytError::Invalid("dps needs a name and an engine".into()));
        }
        if desired.size().is_none() {
            return Err(RelytError::Invalid(format!("dps {} has no size", desired.name)));
        }
        let key = child_key(dwsu_id, &desired.name);
        let uri = self.region_uri(dwsu_id).await?;
        let uri = uri.as_str();
        let client = &self.client;

        let recalled = match self.recall(KIND, &key)? {
            Some(id) => {
                let live = self
                    .still_exists(KIND, &key, &id, || client.get_dps(uri, dwsu_id, &id))
                    .await?;
                live.then_some(id)
            }
            None => None,
        };
        let id = match recalled {
            Some(id) => {
                info!(key, id, "dps already created, resuming wait");
                id
            }
            None => {
                let id = retry(&self.settings.retry, || client.create_dps(uri, dwsu_id, desired))
                    .await?;
                self.remember(KIND, &key, &id, Some(dwsu_id))?;
                id
            }
        };

        let id = id.as_str();
        let dps = self
            .await_ready(&self.settings.dps_poll, KIND, id, || client.get_dps(uri, dwsu_id, id))
            .await?;
        self.remember_status(KIND, &key, dps.status.as_ref())?;
        Ok(dps)
    }

    pub async fn read_dps(&self, dwsu_id: &str, dps_id: &str) -> Result<Option<Dps>> {
        let Some(uri) = self.region_uri_if_present(dwsu_id).await? else {
            self.forget_by_id(KIND, dps_id)?;
            return Ok(None);
        };
        let client = &self.client;
        let uri = uri.as_str();
        let found = retry(&self.settings.retry, || client.get_dps(uri, dwsu_id, dps_id)).await?;
        if found.is_none() {
            self.forget_by_id(KIND, dps_id)?;
        }
        Ok(found)
    }

    /// Size and description can change; name and engine cannot.
    pub async fn update_dps(&self, dwsu_id: &str, dps_id: &str, desired: &Dps) -> Result<Dps> {
        let uri = self.region_uri(dwsu_id).await?;
        let uri = uri.as_str();
        let client = &self.client;
        let current = retry(&self.settings.retry, || client.get_dps(uri, dwsu_id, dps_id))
            .await?
            .ok_or_else(|| RelytError::NotFound {
                kind: KIND.as_str(),
                id: dps_id.to_string(),
            })?;

        if !desired.name.is_empty() && desired.name != current.name {
            return Err(RelytError::Unsupported("dps name cannot be changed in place".into()));
        }
        if !desired.engine.is_empty() && desired.engine != current.engine {
            return Err(RelytError::Unsupported("dps engine cannot be changed in place".into()));
        }

        let mut patch = Dps::default();
        if desired.size().is_some() && desired.size() != current.size() {
            patch.spec = desired.spec.clone();
        }
        if desired.description.is_some() && desired.description != current.description {
            patch.description = desired.description.clone();
        }
        if patch.spec.is_none() && patch.description.is_none() {
            return Ok(current);
        }

        info!(dwsu_id, dps_id, size = ?patch.size(), "patching dps");
        retry(&self.settings.retry, || client.patch_dps(uri, dwsu_id, dps_id, &patch)).await?;
        self.await_ready(&self.settings.dps_poll, KIND, dps_id, || {
            client.get_dps(uri, dwsu_id, dps_id)
        })
            .await
    }

    /// Drop a DPS and wait until it is gone. The default DPS goes away with
    /// its DWSU and cannot be dropped on its own.
    pub async fn delete_dps(&self, dwsu_id: &str, dps_id: &str) -> Result<Deletion> {
        if dps_id == dwsu_id {
            return Err(RelytError::Unsupported(
                "the default dps is removed together with its dwsu".into(),
            ));
        }
        let Some(uri) = self.region_uri_if_present(dwsu_id).await? else {
            self.forget_by_id(KIND, dps_id)?;
            return Ok(Deletion::AlreadyAbsent);
        };
        let uri = uri.as_str();
        let client = &self.client;
        let policy = &self.settings.retry;

        if retry(policy, || client.get_dps(uri, dwsu_id, dps_id)).await?.is_none() {
            info!(dwsu_id, dps_id, "dps already absent");
            self.forget_by_id(KIND, dps_id)?;
            return Ok(Deletion::AlreadyAbsent);
        }

        retry(policy, || client.drop_dps(uri, dwsu_id, dps_id)).await?;
        self.await_gone(&self.settings.dps_poll, KIND, dps_id, || {
            client.get_dps(uri, dwsu_id, dps_id)
        })
            .await?;
        self.forget_by_id(KIND, dps_id)?;
        Ok(Deletion::Deleted)
    }

    /// Every DPS of `dwsu_id`, the default one included.
    pub async fn list_dps(
        &self,
        dwsu_id: &str,
    ) -> std::result::Result<Vec<Dps>, PartialListing<Dps, RelytError>> {
        let uri = self.region_uri(dwsu_id).await.map_err(|error| PartialListing {
            records: Vec::new(),
            error,
        })?;
        let uri = uri.as_str();
        let client = &self.client;
        let policy = &self.settings.retry;
        scroll_all(move |size, number| async move {
            retry(policy, || client.list_dps(uri, dwsu_id, size, number))
                .await
                .map_err(RelytError::from)
        })
        .await
    }
}
