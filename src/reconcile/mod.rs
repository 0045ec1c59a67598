//! Per-resource create/read/update/delete flows.
//!
//! Every flow is a single sequential composition of the convergence
//! primitives: resolve the regional endpoint, issue the mutation under
//! [`retry`], then [`poll_until`] a condition that re-reads the resource
//! under [`retry`] again.

mod account;
mod dps;
mod dwsu;
mod integration;
mod private_link;
#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{Account, ApiError, Dps, Dwsu, Endpoint, PrivateLinkService, RelytApi, Status};
use crate::convergence::{CancellationToken, PollSpec, RetryPolicy, poll_until, retry};
use crate::error::{RelytError, Result};
use crate::resolver::EndpointResolver;
use crate::state::{ResourceKind, ResourceRecord, StateStore};

pub use account::{AccountRequest, AccountState};

/// Retry and wait budgets for one run.
#[derive(Debug, Clone, Default)]
pub struct ReconcileSettings {
    pub retry: RetryPolicy,
    pub dwsu_poll: PollSpec,
    pub dps_poll: PollSpec,
    pub private_link_poll: PollSpec,
}

/// Result of a create or update whose primary step succeeded.
///
/// `secondary_failures` lists follow-up steps that failed after the primary
/// resource was in place. They are not rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct Applied<T> {
    pub resource: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secondary_failures: Vec<String>,
}

impl<T> Applied<T> {
    pub fn new(resource: T) -> Self {
        Self {
            resource,
            secondary_failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.secondary_failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Deletion {
    Deleted,
    AlreadyAbsent,
}

/// Remote records that report a lifecycle status.
pub trait Observed {
    fn status(&self) -> Option<&Status>;
}

impl Observed for Dwsu {
    fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }
}

impl Observed for Dps {
    fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }
}

impl Observed for PrivateLinkService {
    fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }
}

// Accounts carry no lifecycle; existing is enough.
impl Observed for Account {
    fn status(&self) -> Option<&Status> {
        None
    }
}

fn status_label(status: Option<&Status>) -> String {
    status.map_or_else(|| "unreported".to_string(), |s| s.to_string())
}

pub struct Reconciler<C, S> {
    client: C,
    store: S,
    settings: ReconcileSettings,
    cancel: CancellationToken,
}

impl<C: RelytApi, S: StateStore> Reconciler<C, S> {
    pub fn new(
        client: C,
        store: S,
        settings: ReconcileSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            store,
            settings,
            cancel,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    fn resolver(&self) -> EndpointResolver<'_, C> {
        EndpointResolver::new(&self.client, &self.settings.retry)
    }

    pub async fn resolve_endpoint(&self, dwsu_id: &str) -> Result<Endpoint> {
        self.resolver().resolve(dwsu_id).await
    }

    /// Regional API root for `dwsu_id`.
    async fn region_uri(&self, dwsu_id: &str) -> Result<String> {
        Ok(self.resolver().resolve(dwsu_id).await?.uri)
    }

    /// Like [`Self::region_uri`], but a missing DWSU yields `None`: nothing
    /// can live under a DWSU that does not exist.
    async fn region_uri_if_present(&self, dwsu_id: &str) -> Result<Option<String>> {
        match self.region_uri(dwsu_id).await {
            Ok(uri) => Ok(Some(uri)),
            Err(RelytError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Id recorded for `key` by an earlier, possibly interrupted, create.
    fn recall(&self, kind: ResourceKind, key: &str) -> Result<Option<String>> {
        Ok(self.store.get(kind, key)?.map(|record| record.id))
    }

    /// Checks that a recalled id still names a live resource. When the
    /// backend reports it absent or DROPPED the record is forgotten and
    /// `false` is returned, so the caller creates the resource again.
    async fn still_exists<T, F, Fut>(
        &self,
        kind: ResourceKind,
        key: &str,
        id: &str,
        fetch: F,
    ) -> Result<bool>
    where
        T: Observed,
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, ApiError>>,
    {
        let live = match retry(&self.settings.retry, &fetch).await? {
            Some(resource) => resource.status() != Some(&Status::Dropped),
            None => false,
        };
        if !live {
            warn!(%kind, key, id, "recorded resource is gone, creating it again");
            self.forget(kind, key)?;
        }
        Ok(live)
    }

    fn remember(
        &self,
        kind: ResourceKind,
        key: &str,
        id: &str,
        parent: Option<&str>,
    ) -> Result<()> {
        let mut record = ResourceRecord::new(kind, key, id);
        if let Some(parent) = parent {
            record = record.with_parent(parent);
        }
        self.store.put(record)?;
        info!(%kind, key, id, "recorded remote id");
        Ok(())
    }

    fn remember_status(
        &self,
        kind: ResourceKind,
        key: &str,
        status: Option<&Status>,
    ) -> Result<()> {
        let Some(mut record) = self.store.get(kind, key)? else {
            return Ok(());
        };
        record.observe(status_label(status));
        self.store.put(record)
    }

    fn forget(&self, kind: ResourceKind, key: &str) -> Result<()> {
        self.store.remove(kind, key)
    }

    /// Drop the local record whose backend id is `id`, if any.
    fn forget_by_id(&self, kind: ResourceKind, id: &str) -> Result<()> {
        let stale = self
            .store
            .list()?
            .into_iter()
            .filter(|r| r.kind == kind && r.id == id);
        for record in stale {
            self.forget(kind, &record.key)?;
        }
        Ok(())
    }

    /// Poll `fetch` until the resource reports READY.
    async fn await_ready<T, F, Fut>(
        &self,
        spec: &PollSpec,
        kind: ResourceKind,
        id: &str,
        fetch: F,
    ) -> Result<T>
    where
        T: Observed,
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, ApiError>>,
    {
        let policy = &self.settings.retry;
        let fetch = &fetch;
        debug!(%kind, id, timeout_s = spec.timeout.as_secs(), "waiting for READY");
        let ready = poll_until(spec, &self.cancel, move || async move {
            match retry(policy, fetch).await? {
                Some(resource) if resource.status() == Some(&Status::Ready) => Ok(resource),
                Some(resource) => Err(RelytError::NotConverged {
                    kind: kind.as_str(),
                    status: status_label(resource.status()),
                    wanted: "READY",
                }),
                None => Err(RelytError::NotFound {
                    kind: kind.as_str(),
                    id: id.to_string(),
                }),
            }
        })
        .await?;
        info!(%kind, id, "resource is READY");
        Ok(ready)
    }

    /// Poll `fetch` until the resource is absent or reports DROPPED.
    async fn await_gone<T, F, Fut>(
        &self,
        spec: &PollSpec,
        kind: ResourceKind,
        id: &str,
        fetch: F,
    ) -> Result<()>
    where
        T: Observed,
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, ApiError>>,
    {
        let policy = &self.settings.retry;
        let fetch = &fetch;
        debug!(%kind, id, timeout_s = spec.timeout.as_secs(), "waiting for removal");
        poll_until(spec, &self.cancel, move || async move {
            match retry(policy, fetch).await? {
                None => Ok(()),
                Some(resource) if resource.status() == Some(&Status::Dropped) => Ok(()),
                Some(resource) => Err(RelytError::NotConverged {
                    kind: kind.as_str(),
                    status: status_label(resource.status()),
                    wanted: "DROPPED",
                }),
            }
        })
        .await?;
        info!(%kind, id, "resource is gone");
        Ok(())
    }
}

fn child_key(dwsu_id: &str, name: &str) -> String {
    format!("{dwsu_id}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applied_reports_completeness() {
        let mut applied = Applied::new("x");
        assert!(applied.is_complete());
        applied.secondary_failures.push("lake formation: boom".into());
        assert!(!applied.is_complete());
    }

    #[test]
    fn applied_serializes_without_empty_failures() {
        let json = serde_json::to_value(Applied::new(1)).unwrap();
        assert_eq!(json, serde_json::json!({"resource": 1}));
    }

    #[test]
    fn deletion_serializes_snake_case() {
        assert_eq!(serde_json::to_value(Deletion::AlreadyAbsent).unwrap(), "already_absent");
    }

    #[test]
    fn child_keys_are_scoped_by_dwsu() {
        assert_eq!(child_key("dw-1", "etl"), "dw-1/etl");
    }
}
