use tracing::info;

use super::{Deletion, Reconciler, child_key};
use crate::api::{PrivateLinkService, RelytApi};
use crate::convergence::retry;
use crate::error::{RelytError, Result};
use crate::state::{ResourceKind, StateStore};

const KIND: ResourceKind = ResourceKind::PrivateLink;

fn service_type(link: &PrivateLinkService) -> Result<&str> {
    link.service_type
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RelytError::Invalid("private link needs a service type".into()))
}

impl<C: RelytApi, S: StateStore> Reconciler<C, S> {
    /// Open a private link service on `dwsu_id` and wait until it is READY.
    /// A DWSU has at most one link per service type; the type is its id.
    pub async fn create_private_link(
        &self,
        dwsu_id: &str,
        desired: &PrivateLinkService,
    ) -> Result<PrivateLinkService> {
        let service_type = service_type(desired)?;
        let key = child_key(dwsu_id, service_type);
        let uri = self.region_uri(dwsu_id).await?;
        let uri = uri.as_str();
        let client = &self.client;

        let recalled = match self.recall(KIND, &key)? {
            Some(_) => {
                self.still_exists(KIND, &key, service_type, || {
                    client.get_private_link(uri, dwsu_id, service_type)
                })
                .await?
            }
            None => false,
        };
        if recalled {
            info!(key, "private link already requested, resuming wait");
        } else {
            let created = retry(&self.settings.retry, || {
                client.create_private_link(uri, dwsu_id, desired)
            })
            .await?;
            self.remember(KIND, &key, service_type, Some(dwsu_id))?;
            info!(key, service_name = ?created.service_name, "private link requested");
        }

        let link = self
            .await_ready(&self.settings.private_link_poll, KIND, service_type, || {
                client.get_private_link(uri, dwsu_id, service_type)
            })
            .await?;
        self.remember_status(KIND, &key, link.status.as_ref())?;
        Ok(link)
    }

    pub async fn read_private_link(
        &self,
        dwsu_id: &str,
        service_type: &str,
    ) -> Result<Option<PrivateLinkService>> {
        let key = child_key(dwsu_id, service_type);
        let Some(uri) = self.region_uri_if_present(dwsu_id).await? else {
            self.forget(KIND, &key)?;
            return Ok(None);
        };
        let uri = uri.as_str();
        let client = &self.client;
        let found = retry(&self.settings.retry, || {
            client.get_private_link(uri, dwsu_id, service_type)
        })
        .await?;
        if found.is_none() {
            self.forget(KIND, &key)?;
        }
        Ok(found)
    }

    /// Only the allowed principals can change.
    pub async fn update_private_link(
        &self,
        dwsu_id: &str,
        service_type: &str,
        desired: &PrivateLinkService,
    ) -> Result<PrivateLinkService> {
        if desired.service_type.as_deref().is_some_and(|t| t != service_type) {
            return Err(RelytError::Unsupported(
                "private link service type cannot be changed in place".into(),
            ));
        }
        let uri = self.region_uri(dwsu_id).await?;
        let uri = uri.as_str();
        let client = &self.client;
        let policy = &self.settings.retry;

        let current = retry(policy, || client.get_private_link(uri, dwsu_id, service_type))
            .await?
            .ok_or_else(|| RelytError::NotFound {
                kind: KIND.as_str(),
                id: child_key(dwsu_id, service_type),
            })?;
        if desired.allowed_principals == current.allowed_principals {
            return Ok(current);
        }

        retry(policy, || client.patch_private_link(uri, dwsu_id, service_type, desired)).await?;
        self.await_ready(&self.settings.private_link_poll, KIND, service_type, || {
            client.get_private_link(uri, dwsu_id, service_type)
        })
        .await
    }

    pub async fn delete_private_link(&self, dwsu_id: &str, service_type: &str) -> Result<Deletion> {
        let key = child_key(dwsu_id, service_type);
        let Some(uri) = self.region_uri_if_present(dwsu_id).await? else {
            self.forget(KIND, &key)?;
            return Ok(Deletion::AlreadyAbsent);
        };
        let uri = uri.as_str();
        let client = &self.client;
        let policy = &self.settings.retry;

        if retry(policy, || client.get_private_link(uri, dwsu_id, service_type))
            .await?
            .is_none()
        {
            info!(dwsu_id, service_type, "private link already absent");
            self.forget(KIND, &key)?;
            return Ok(Deletion::AlreadyAbsent);
        }

        retry(policy, || client.delete_private_link(uri, dwsu_id, service_type)).await?;
        self.await_gone(&self.settings.private_link_poll, KIND, service_type, || {
            client.get_private_link(uri, dwsu_id, service_type)
        })
        .await?;
        self.forget(KIND, &key)?;
        Ok(Deletion::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Status;
    use crate::convergence::{CancellationToken, PollSpec, RetryPolicy};
    use crate::reconcile::ReconcileSettings;
    use crate::reconcile::testing::FakeApi;
    use crate::state::MemoryStateStore;
    use std::time::Duration;

    fn reconciler() -> Reconciler<FakeApi, MemoryStateStore> {
        let poll = PollSpec::new(Duration::from_secs(5), Duration::from_millis(100)).unwrap();
        let settings = ReconcileSettings {
            retry: RetryPolicy::new(3, Duration::from_millis(1), 1.0).unwrap(),
            private_link_poll: poll,
            ..Default::default()
        };
        let api = FakeApi::new();
        api.insert_dwsu("dw-1", &[]);
        Reconciler::new(api, MemoryStateStore::new(), settings, CancellationToken::new())
    }

    fn link(principals: &[&str]) -> PrivateLinkService {
        PrivateLinkService {
            service_type: Some("database".into()),
            allowed_principals: Some(principals.iter().map(|p| p.to_string()).collect()),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_for_ready() {
        let rec = reconciler();
        rec.client().script_creates(&[Status::Creating, Status::Creating, Status::Ready]);

        let created = rec.create_private_link("dw-1", &link(&["arn:1"])).await.unwrap();
        assert_eq!(created.status, Some(Status::Ready));
        assert_eq!(created.service_name.as_deref(), Some("com.relyt.database"));
        assert_eq!(rec.client().calls("get_private_link"), 3);

        let record = rec.store().get(KIND, "dw-1/database").unwrap().unwrap();
        assert_eq!(record.id, "database");
        assert_eq!(record.status.as_deref(), Some("READY"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_record_does_not_block_create() {
        let rec = reconciler();
        rec.store()
            .put(
                crate::state::ResourceRecord::new(KIND, "dw-1/database", "database")
                    .with_parent("dw-1"),
            )
            .unwrap();

        let created = rec.create_private_link("dw-1", &link(&["arn:1"])).await.unwrap();
        assert_eq!(created.status, Some(Status::Ready));
        assert_eq!(rec.client().calls("create_private_link"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn create_without_type_is_invalid() {
        let rec = reconciler();
        let mut request = link(&[]);
        request.service_type = None;
        assert!(matches!(
            rec.create_private_link("dw-1", &request).await,
            Err(RelytError::Invalid(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn update_patches_principals() {
        let rec = reconciler();
        rec.client().insert_private_link("dw-1", link(&["arn:1"]), &[]);
        rec.client().script_updates(&[Status::Updating, Status::Ready]);

        let updated = rec
            .update_private_link("dw-1", "database", &link(&["arn:1", "arn:2"]))
            .await
            .unwrap();
        assert_eq!(updated.allowed_principals.unwrap().len(), 2);
        assert_eq!(rec.client().calls("patch_private_link"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn update_with_same_principals_is_a_no_op() {
        let rec = reconciler();
        rec.client().insert_private_link("dw-1", link(&["arn:1"]), &[]);
        rec.update_private_link("dw-1", "database", &link(&["arn:1"])).await.unwrap();
        assert_eq!(rec.client().calls("patch_private_link"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waits_until_absent() {
        let rec = reconciler();
        rec.client().insert_private_link("dw-1", link(&["arn:1"]), &[]);

        assert_eq!(rec.delete_private_link("dw-1", "database").await.unwrap(), Deletion::Deleted);
        assert!(rec.read_private_link("dw-1", "database").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_of_missing_link_makes_no_call() {
        let rec = reconciler();
        assert_eq!(
            rec.delete_private_link("dw-1", "database").await.unwrap(),
            Deletion::AlreadyAbsent
        );
        assert_eq!(rec.client().calls("delete_private_link"), 0);
    }
}
