use serde::Serialize;
use tracing::{info, warn};

use super::{Applied, Deletion, Reconciler, child_key};
use crate::api::{Account, AsyncResult, Boto3AccessInfo, LakeFormation, RelytApi};
use crate::convergence::retry;
use crate::error::{RelytError, Result};
use crate::state::{ResourceKind, StateStore};

const KIND: ResourceKind = ResourceKind::Account;

/// Desired state of a database account.
#[derive(Debug, Clone, Default)]
pub struct AccountRequest {
    pub name: String,
    /// Required on create; on update, `Some` resets the password.
    pub password: Option<String>,
    pub async_result_arn: Option<String>,
    pub async_result_prefix: Option<String>,
    pub lake_formation_role: Option<String>,
}

impl AccountRequest {
    /// Async-result location, if configured. The ARN and the prefix only
    /// make sense together.
    pub fn async_result(&self) -> Result<Option<AsyncResult>> {
        match (&self.async_result_arn, &self.async_result_prefix) {
            (Some(arn), Some(prefix)) => Ok(Some(AsyncResult {
                aws_iam_arn: arn.clone(),
                s3_location_prefix: prefix.clone(),
            })),
            (None, None) => Ok(None),
            _ => Err(RelytError::Invalid(
                "async result role ARN and location prefix must be set together".into(),
            )),
        }
    }

    pub fn lake_formation(&self) -> Option<LakeFormation> {
        self.lake_formation_role.as_ref().map(|role| LakeFormation {
            iam_role: role.clone(),
        })
    }
}

/// Observed account, without the password.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountState {
    pub dwsu_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_result: Option<AsyncResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lake_formation: Option<LakeFormation>,
}

impl<C: RelytApi, S: StateStore> Reconciler<C, S> {
    /// Create an account, then apply its secondary configuration.
    ///
    /// Accounts are usable as soon as the create call returns. A failed
    /// secondary step is reported in the result and leaves the account in
    /// place.
    pub async fn create_account(
        &self,
        dwsu_id: &str,
        request: &AccountRequest,
    ) -> Result<Applied<AccountState>> {
        if request.name.is_empty() {
            return Err(RelytError::Invalid("account name must not be empty".into()));
        }
        let Some(password) = request.password.clone() else {
            return Err(RelytError::Invalid(format!("account {} needs a password", request.name)));
        };
        let async_result = request.async_result()?;

        let key = child_key(dwsu_id, &request.name);
        let uri = self.region_uri(dwsu_id).await?;
        let uri = uri.as_str();
        let client = &self.client;

        let name = request.name.as_str();
        let recalled = match self.recall(KIND, &key)? {
            Some(_) => {
                self.still_exists(KIND, &key, name, || client.get_account(uri, dwsu_id, name))
                    .await?
            }
            None => false,
        };
        if recalled {
            info!(key, "account already created, re-applying configuration");
        } else {
            let account = Account {
                name: request.name.clone(),
                init_password: Some(password),
            };
            retry(&self.settings.retry, || client.create_account(uri, dwsu_id, &account)).await?;
            // The account name is its id.
            self.remember(KIND, &key, &request.name, Some(dwsu_id))?;
        }

        let secondary_failures = self
            .apply_account_config(
                uri,
                dwsu_id,
                &request.name,
                async_result.as_ref(),
                request.lake_formation().as_ref(),
            )
            .await;
        Ok(Applied {
            resource: AccountState {
                dwsu_id: dwsu_id.to_string(),
                name: request.name.clone(),
                async_result,
                lake_formation: request.lake_formation(),
            },
            secondary_failures,
        })
    }

    pub async fn read_account(&self, dwsu_id: &str, name: &str) -> Result<Option<AccountState>> {
        let key = child_key(dwsu_id, name);
        let Some(uri) = self.region_uri_if_present(dwsu_id).await? else {
            self.forget(KIND, &key)?;
            return Ok(None);
        };
        let uri = uri.as_str();
        let client = &self.client;
        let policy = &self.settings.retry;

        if retry(policy, || client.get_account(uri, dwsu_id, name)).await?.is_none() {
            self.forget(KIND, &key)?;
            return Ok(None);
        }
        let async_result = retry(policy, || client.get_async_result(uri, dwsu_id, name))
            .await?
            .filter(|c| !c.aws_iam_arn.is_empty() || !c.s3_location_prefix.is_empty());
        let lake_formation = retry(policy, || client.get_lake_formation(uri, dwsu_id, name))
            .await?
            .filter(|c| !c.iam_role.is_empty());

        Ok(Some(AccountState {
            dwsu_id: dwsu_id.to_string(),
            name: name.to_string(),
            async_result,
            lake_formation,
        }))
    }

    /// Reset the password if one is given and re-apply both configurations:
    /// a configuration absent from `request` is removed from the backend.
    pub async fn update_account(
        &self,
        dwsu_id: &str,
        name: &str,
        request: &AccountRequest,
    ) -> Result<Applied<AccountState>> {
        if !request.name.is_empty() && request.name != name {
            return Err(RelytError::Unsupported("account name cannot be changed in place".into()));
        }
        let async_result = request.async_result()?;
        let uri = self.region_uri(dwsu_id).await?;
        let uri = uri.as_str();
        let client = &self.client;
        let policy = &self.settings.retry;

        if retry(policy, || client.get_account(uri, dwsu_id, name)).await?.is_none() {
            return Err(RelytError::NotFound {
                kind: KIND.as_str(),
                id: child_key(dwsu_id, name),
            });
        }
        if let Some(password) = request.password.as_deref() {
            retry(policy, || client.patch_account_password(uri, dwsu_id, name, password)).await?;
            info!(dwsu_id, name, "account password reset");
        }

        let lake_formation = request.lake_formation();
        let secondary_failures = self
            .apply_account_config(
                uri,
                dwsu_id,
                name,
                async_result.as_ref(),
                lake_formation.as_ref(),
            )
            .await;
        Ok(Applied {
            resource: AccountState {
                dwsu_id: dwsu_id.to_string(),
                name: name.to_string(),
                async_result,
                lake_formation,
            },
            secondary_failures,
        })
    }

    pub async fn delete_account(&self, dwsu_id: &str, name: &str) -> Result<Deletion> {
        let key = child_key(dwsu_id, name);
        let Some(uri) = self.region_uri_if_present(dwsu_id).await? else {
            self.forget(KIND, &key)?;
            return Ok(Deletion::AlreadyAbsent);
        };
        let uri = uri.as_str();
        let client = &self.client;
        let policy = &self.settings.retry;

        if retry(policy, || client.get_account(uri, dwsu_id, name)).await?.is_none() {
            info!(dwsu_id, name, "account already absent");
            self.forget(KIND, &key)?;
            return Ok(Deletion::AlreadyAbsent);
        }
        retry(policy, || client.drop_account(uri, dwsu_id, name)).await?;
        self.forget(KIND, &key)?;
        Ok(Deletion::Deleted)
    }

    /// Access keys the account uses from boto3 clients. Read-only.
    pub async fn boto3_access_info(
        &self,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Vec<Boto3AccessInfo>> {
        let uri = self.region_uri(dwsu_id).await?;
        let uri = uri.as_str();
        let client = &self.client;
        retry(&self.settings.retry, || client.get_boto3_access_info(uri, dwsu_id, name))
            .await?
            .ok_or_else(|| RelytError::NotFound {
                kind: KIND.as_str(),
                id: child_key(dwsu_id, name),
            })
    }

    /// Put or delete each configuration independently. Returns one message
    /// per failed step.
    async fn apply_account_config(
        &self,
        uri: &str,
        dwsu_id: &str,
        name: &str,
        async_result: Option<&AsyncResult>,
        lake_formation: Option<&LakeFormation>,
    ) -> Vec<String> {
        let client = &self.client;
        let policy = &self.settings.retry;
        let mut failures = Vec::new();

        let outcome = match async_result {
            Some(config) => {
                retry(policy, || client.put_async_result(uri, dwsu_id, name, config)).await
            }
            None => retry(policy, || client.delete_async_result(uri, dwsu_id, name)).await,
        };
        if let Err(err) = outcome {
            warn!(dwsu_id, name, error = %err, "async result configuration failed");
            failures.push(format!("async result: {err}"));
        }

        let outcome = match lake_formation {
            Some(config) => {
                retry(policy, || client.put_lake_formation(uri, dwsu_id, name, config)).await
            }
            None => retry(policy, || client.delete_lake_formation(uri, dwsu_id, name)).await,
        };
        if let Err(err) = outcome {
            warn!(dwsu_id, name, error = %err, "lake formation configuration failed");
            failures.push(format!("lake formation: {err}"));
        }

        failures
    }
}
