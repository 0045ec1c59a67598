use tracing::{info, warn};

use super::{Applied, Deletion, Reconciler};
use crate::api::{Dps, Dwsu, RelytApi, Spec};
use crate::convergence::{PartialListing, retry, scroll_all};
use crate::error::{RelytError, Result};
use crate::state::{ResourceKind, StateStore};

const KIND: ResourceKind = ResourceKind::Dwsu;

impl<C: RelytApi, S: StateStore> Reconciler<C, S> {
    /// Create a DWSU and wait until it is READY.
    ///
    /// The id is recorded under the domain as soon as the backend returns
    /// it. A recorded id short-circuits the create call, so re-running after
    /// a timeout resumes the wait, unless the recorded DWSU has since
    /// disappeared. Reading the default DPS back is a
    /// secondary step.
    pub async fn create_dwsu(&self, desired: &Dwsu) -> Result<Applied<Dwsu>> {
        if desired.domain.is_empty() {
            return Err(RelytError::Invalid("dwsu domain must not be empty".into()));
        }
        let key = desired.domain.as_str();
        let client = &self.client;

        let recalled = match self.recall(KIND, key)? {
            Some(id) => {
                let live = self.still_exists(KIND, key, &id, || client.get_dwsu(&id)).await?;
                live.then_some(id)
            }
            None => None,
        };
        let id = match recalled {
            Some(id) => {
                info!(domain = key, id, "dwsu already created, resuming wait");
                id
            }
            None => {
                let id = retry(&self.settings.retry, || client.create_dwsu(desired)).await?;
                self.remember(KIND, key, &id, None)?;
                id
            }
        };

        let id = id.as_str();
        let mut dwsu = self
            .await_ready(&self.settings.dwsu_poll, KIND, id, || client.get_dwsu(id))
            .await?;
        self.remember_status(KIND, key, dwsu.status.as_ref())?;

        let mut applied = Applied::new(dwsu.clone());
        match self.default_dps(id).await {
            Ok(Some(dps)) => dwsu.default_dps = Some(dps),
            Ok(None) => warn!(id, "dwsu has no default dps"),
            Err(err) => {
                warn!(id, error = %err, "could not read default dps");
                applied.secondary_failures.push(format!("default dps: {err}"));
            }
        }
        applied.resource = dwsu;
        Ok(applied)
    }

    /// Retried read. `None` means the DWSU no longer exists; its local
    /// record is dropped.
    pub async fn read_dwsu(&self, dwsu_id: &str) -> Result<Option<Dwsu>> {
        let client = &self.client;
        let found = retry(&self.settings.retry, || client.get_dwsu(dwsu_id)).await?;
        if found.is_none() {
            self.forget_by_id(KIND, dwsu_id)?;
        }
        Ok(found)
    }

    /// Only the default DPS size can change in place. Other differences in
    /// the fields `desired` sets are rejected before any call is made.
    pub async fn update_dwsu(&self, dwsu_id: &str, desired: &Dwsu) -> Result<Dwsu> {
        let client = &self.client;
        let current = retry(&self.settings.retry, || client.get_dwsu(dwsu_id))
            .await?
            .ok_or_else(|| RelytError::NotFound {
                kind: KIND.as_str(),
                id: dwsu_id.to_string(),
            })?;
        check_immutable(&current, desired)?;

        let wanted_size = desired.default_dps.as_ref().and_then(Dps::size);
        let Some(wanted_size) = wanted_size else {
            return Ok(current);
        };

        let uri = self.region_uri(dwsu_id).await?;
        let uri = uri.as_str();
        let default_dps = retry(&self.settings.retry, || client.get_dps(uri, dwsu_id, dwsu_id))
            .await?
            .ok_or_else(|| RelytError::NotFound {
                kind: "default dps",
                id: dwsu_id.to_string(),
            })?;
        if default_dps.size() == Some(wanted_size) {
            return Ok(current);
        }

        info!(dwsu_id, from = ?default_dps.size(), to = wanted_size, "resizing default dps");
        let patch = Dps {
            spec: Some(Spec {
                id: None,
                name: wanted_size.to_string(),
            }),
            ..Default::default()
        };
        retry(&self.settings.retry, || client.patch_dps(uri, dwsu_id, dwsu_id, &patch)).await?;
        let resized = self
            .await_ready(&self.settings.dps_poll, ResourceKind::Dps, dwsu_id, || {
                client.get_dps(uri, dwsu_id, dwsu_id)
            })
            .await?;

        let mut dwsu = self
            .await_ready(&self.settings.dwsu_poll, KIND, dwsu_id, || client.get_dwsu(dwsu_id))
            .await?;
        dwsu.default_dps = Some(resized);
        Ok(dwsu)
    }

    /// Drop a DWSU and wait until it is gone. An absent DWSU is not an error
    /// and no drop call is issued for it.
    pub async fn delete_dwsu(&self, dwsu_id: &str) -> Result<Deletion> {
        let client = &self.client;
        let policy = &self.settings.retry;
        if retry(policy, || client.get_dwsu(dwsu_id)).await?.is_none() {
            info!(dwsu_id, "dwsu already absent");
            self.forget_by_id(KIND, dwsu_id)?;
            return Ok(Deletion::AlreadyAbsent);
        }

        retry(policy, || client.drop_dwsu(dwsu_id)).await?;
        self.await_gone(&self.settings.dwsu_poll, KIND, dwsu_id, || client.get_dwsu(dwsu_id))
            .await?;
        self.forget_by_id(KIND, dwsu_id)?;
        Ok(Deletion::Deleted)
    }

    /// Every DWSU visible to the configured role, page by page.
    pub async fn list_dwsu(
        &self,
    ) -> std::result::Result<Vec<Dwsu>, PartialListing<Dwsu, RelytError>> {
        let client = &self.client;
        let policy = &self.settings.retry;
        scroll_all(move |size, number| async move {
            retry(policy, || client.list_dwsu(size, number))
                .await
                .map_err(RelytError::from)
        })
        .await
    }

    async fn default_dps(&self, dwsu_id: &str) -> Result<Option<Dps>> {
        let uri = self.region_uri(dwsu_id).await?;
        let client = &self.client;
        let uri = uri.as_str();
        // The default DPS shares the DWSU id.
        Ok(retry(&self.settings.retry, || client.get_dps(uri, dwsu_id, dwsu_id)).await?)
    }
}

fn changed(field: &str) -> Result<()> {
    Err(RelytError::Unsupported(format!("dwsu {field} cannot be changed in place")))
}

fn check_immutable(current: &Dwsu, desired: &Dwsu) -> Result<()> {
    if !desired.domain.is_empty() && desired.domain != current.domain {
        return changed("domain");
    }
    if desired.alias.is_some() && desired.alias != current.alias {
        return changed("alias");
    }
    if desired.placement().is_some() && desired.placement() != current.placement() {
        return changed("region");
    }
    let id_of = |r: &Option<crate::api::IdRef>| r.as_ref().map(|r| r.id.clone());
    if desired.edition.is_some() && id_of(&desired.edition) != id_of(&current.edition) {
        return changed("edition");
    }
    if desired.variant.is_some() && id_of(&desired.variant) != id_of(&current.variant) {
        return changed("variant");
    }
    let engine = |d: &Dwsu| {
        d.default_dps
            .as_ref()
            .map(|p| p.engine.clone())
            .filter(|e| !e.is_empty())
    };
    if engine(desired).is_some()
        && current.default_dps.is_some()
        && engine(desired) != engine(current)
    {
        return changed("default dps engine");
    }
    Ok(())
}
