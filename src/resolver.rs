//! Two-hop lookup from a DWSU id to the regional open-API endpoint serving it.

use tracing::debug;

use crate::api::{Endpoint, RelytApi};
use crate::convergence::{RetryPolicy, retry};
use crate::error::{RelytError, Result};

pub struct EndpointResolver<'a, C> {
    client: &'a C,
    retry: &'a RetryPolicy,
}

impl<'a, C: RelytApi> EndpointResolver<'a, C> {
    pub fn new(client: &'a C, retry: &'a RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Resolve the endpoint for `dwsu_id`. Each hop is retried on its own.
    ///
    /// Fails with [`RelytError::NotFound`] when the DWSU does not exist and
    /// with [`RelytError::Placement`] when its placement does not map to
    /// exactly one endpoint.
    pub async fn resolve(&self, dwsu_id: &str) -> Result<Endpoint> {
        let client = self.client;
        let dwsu = retry(self.retry, || client.get_dwsu(dwsu_id))
            .await?
            .ok_or_else(|| RelytError::NotFound {
                kind: "dwsu",
                id: dwsu_id.to_string(),
            })?;

        let (cloud, region) = dwsu.placement().ok_or_else(|| {
            RelytError::Placement(format!("dwsu {dwsu_id} has no cloud/region placement"))
        })?;

        let mut endpoints = retry(self.retry, || client.list_endpoints(cloud, region)).await?;
        if endpoints.len() != 1 {
            return Err(RelytError::Placement(format!(
                "expected one endpoint for {cloud}/{region}, found {}",
                endpoints.len()
            )));
        }
        let endpoint = endpoints.remove(0);
        if endpoint.uri.is_empty() {
            return Err(RelytError::Placement(format!(
                "endpoint for {cloud}/{region} has no uri"
            )));
        }
        debug!(dwsu_id, cloud, region, uri = %endpoint.uri, "resolved endpoint");
        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::testing::FakeApi;
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), 1.0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_through_placement() {
        let api = FakeApi::new();
        api.insert_dwsu("dw-1", &[]);
        let policy = fast_retry();

        let endpoint = EndpointResolver::new(&api, &policy).resolve("dw-1").await.unwrap();
        assert_eq!(endpoint.uri, FakeApi::REGION_URI);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_dwsu_is_not_found() {
        let api = FakeApi::new();
        let policy = fast_retry();

        let err = EndpointResolver::new(&api, &policy).resolve("nope").await.unwrap_err();
        assert!(matches!(err, RelytError::NotFound { kind: "dwsu", ref id } if id == "nope"));
    }

    #[tokio::test(start_paused = true)]
    async fn ambiguous_placement_is_rejected() {
        let api = FakeApi::new();
        api.insert_dwsu("dw-1", &[]);
        api.set_endpoint_count(2);
        let policy = fast_retry();

        let err = EndpointResolver::new(&api, &policy).resolve("dw-1").await.unwrap_err();
        assert!(matches!(err, RelytError::Placement(ref msg) if msg.contains("found 2")));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_lookup_failures_are_retried() {
        let api = FakeApi::new();
        api.insert_dwsu("dw-1", &[]);
        api.fail_next_gets(2);
        let policy = fast_retry();

        EndpointResolver::new(&api, &policy).resolve("dw-1").await.unwrap();
        assert_eq!(api.calls("get_dwsu"), 3);
    }
}
