//! Scripted in-memory backend for reconciler and resolver tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::api::{
    Account, ApiError, AsyncResult, Boto3AccessInfo, Cloud, Dps, Dwsu, Endpoint, IntegrationInfo,
    LakeFormation, PrivateLinkService, RelytApi, Region, Status,
};

/// A remote record whose status advances one step per read.
struct Scripted<T> {
    value: T,
    script: VecDeque<Status>,
}

impl<T: Clone> Scripted<T> {
    fn new(value: T, script: &[Status]) -> Self {
        let mut script: VecDeque<Status> = script.iter().cloned().collect();
        if script.is_empty() {
            script.push_back(Status::Ready);
        }
        Self { value, script }
    }

    /// Current status; the last scripted status sticks.
    fn advance(&mut self) -> Status {
        if self.script.len() > 1 {
            self.script.pop_front().unwrap_or(Status::Ready)
        } else {
            self.script.front().cloned().unwrap_or(Status::Ready)
        }
    }

    fn rescript(&mut self, script: &[Status]) {
        self.script = script.iter().cloned().collect();
    }
}

#[derive(Default)]
struct Backend {
    dwsus: BTreeMap<String, Scripted<Dwsu>>,
    dps: BTreeMap<(String, String), Scripted<Dps>>,
    accounts: BTreeMap<(String, String), Account>,
    async_results: BTreeMap<(String, String), AsyncResult>,
    lake_formations: BTreeMap<(String, String), LakeFormation>,
    links: BTreeMap<(String, String), Scripted<PrivateLinkService>>,
    external_ids: BTreeMap<String, String>,
    access_keys: BTreeMap<(String, String), Vec<Boto3AccessInfo>>,
    create_script: Vec<Status>,
    update_script: Vec<Status>,
    endpoint_count: usize,
    failing_page: Option<usize>,
    failures: BTreeMap<&'static str, usize>,
    calls: BTreeMap<&'static str, usize>,
    next_id: usize,
}

pub struct FakeApi {
    backend: Mutex<Backend>,
}

impl FakeApi {
    pub const REGION_URI: &'static str = "https://us-east-1.fake.relyt";
    pub const RELYT_PRINCIPAL: &'static str = "arn:aws:iam::000000000000:root";

    pub fn new() -> Self {
        Self {
            backend: Mutex::new(Backend {
                endpoint_count: 1,
                ..Default::default()
            }),
        }
    }

    fn backend(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }

    /// Count the call and fail it if a failure was injected for `name`.
    fn enter(&self, name: &'static str) -> Result<MutexGuard<'_, Backend>, ApiError> {
        let mut backend = self.backend();
        *backend.calls.entry(name).or_default() += 1;
        if let Some(left) = backend.failures.get_mut(name) {
            if *left > 0 {
                *left -= 1;
                return Err(ApiError::Status {
                    status: 503,
                    body: format!("injected {name} failure"),
                });
            }
        }
        Ok(backend)
    }

    fn check_region(region_uri: &str) {
        assert_eq!(region_uri, Self::REGION_URI, "call sent to the wrong endpoint");
    }

    pub fn calls(&self, name: &str) -> usize {
        self.backend().calls.get(name).copied().unwrap_or(0)
    }

    /// Fail the next `count` calls of `name` with a 503.
    pub fn fail_next(&self, name: &'static str, count: usize) {
        self.backend().failures.insert(name, count);
    }

    pub fn fail_next_gets(&self, count: usize) {
        self.fail_next("get_dwsu", count);
    }

    /// Every `list_dwsu` call for `page_number` or later fails.
    pub fn fail_pages_from(&self, page_number: usize) {
        self.backend().failing_page = Some(page_number);
    }

    pub fn set_endpoint_count(&self, count: usize) {
        self.backend().endpoint_count = count;
    }

    /// Statuses reported by resources created from now on, one per read.
    pub fn script_creates(&self, script: &[Status]) {
        self.backend().create_script = script.to_vec();
    }

    /// Statuses reported after a patch, one per read.
    pub fn script_updates(&self, script: &[Status]) {
        self.backend().update_script = script.to_vec();
    }

    pub fn insert_dwsu(&self, id: &str, script: &[Status]) {
        let dwsu = Dwsu {
            id: Some(id.to_string()),
            domain: format!("domain-{id}"),
            region: Some(placement()),
            ..Default::default()
        };
        let default_dps = Dps {
            id: Some(id.to_string()),
            name: "default".into(),
            engine: "hybrid".into(),
            spec: Some(crate::api::Spec {
                id: None,
                name: "S".into(),
            }),
            ..Default::default()
        };
        let mut backend = self.backend();
        backend.dwsus.insert(id.to_string(), Scripted::new(dwsu, script));
        backend
            .dps
            .insert((id.to_string(), id.to_string()), Scripted::new(default_dps, &[]));
    }

    pub fn insert_dps(&self, dwsu_id: &str, dps: Dps, script: &[Status]) {
        let key = (dwsu_id.to_string(), dps.id.clone().unwrap_or_default());
        self.backend().dps.insert(key, Scripted::new(dps, script));
    }

    pub fn insert_account(&self, dwsu_id: &str, name: &str) {
        let account = Account {
            name: name.to_string(),
            init_password: None,
        };
        self.backend()
            .accounts
            .insert((dwsu_id.to_string(), name.to_string()), account);
    }

    pub fn insert_private_link(&self, dwsu_id: &str, link: PrivateLinkService, script: &[Status]) {
        let key = (dwsu_id.to_string(), link.service_type.clone().unwrap_or_default());
        self.backend().links.insert(key, Scripted::new(link, script));
    }

    pub fn dps_record(&self, dwsu_id: &str, dps_id: &str) -> Option<Dps> {
        self.backend()
            .dps
            .get(&(dwsu_id.to_string(), dps_id.to_string()))
            .map(|s| s.value.clone())
    }

    pub fn async_result(&self, dwsu_id: &str, name: &str) -> Option<AsyncResult> {
        self.backend()
            .async_results
            .get(&(dwsu_id.to_string(), name.to_string()))
            .cloned()
    }

    pub fn lake_formation(&self, dwsu_id: &str, name: &str) -> Option<LakeFormation> {
        self.backend()
            .lake_formations
            .get(&(dwsu_id.to_string(), name.to_string()))
            .cloned()
    }

    pub fn insert_access_key(&self, dwsu_id: &str, name: &str, access_key: &str) {
        let info = Boto3AccessInfo {
            access_key_id: format!("{name}-{access_key}"),
            access_key: access_key.to_string(),
            secret_key: format!("secret-{access_key}"),
        };
        self.backend()
            .access_keys
            .entry((dwsu_id.to_string(), name.to_string()))
            .or_default()
            .push(info);
    }

    pub fn external_id(&self, dwsu_id: &str) -> Option<String> {
        self.backend().external_ids.get(dwsu_id).cloned()
    }

    pub fn account_password(&self, dwsu_id: &str, name: &str) -> Option<String> {
        self.backend()
            .accounts
            .get(&(dwsu_id.to_string(), name.to_string()))
            .and_then(|a| a.init_password.clone())
    }
}

fn placement() -> Region {
    Region {
        id: "us-east-1".into(),
        name: None,
        cloud: Some(Cloud {
            id: "aws".into(),
            name: None,
        }),
    }
}

fn observe<T: Clone>(entry: &mut Scripted<T>, set: impl Fn(&mut T, Status)) -> T {
    let status = entry.advance();
    set(&mut entry.value, status);
    entry.value.clone()
}

impl RelytApi for FakeApi {
    async fn list_dwsu(&self, page_size: usize, page_number: usize) -> Result<Vec<Dwsu>, ApiError> {
        let backend = self.enter("list_dwsu")?;
        if backend.failing_page.is_some_and(|p| page_number >= p) {
            return Err(ApiError::Status {
                status: 502,
                body: format!("page {page_number} unavailable"),
            });
        }
        Ok(backend
            .dwsus
            .values()
            .skip(page_size * (page_number - 1))
            .take(page_size)
            .map(|s| s.value.clone())
            .collect())
    }

    async fn create_dwsu(&self, dwsu: &Dwsu) -> Result<String, ApiError> {
        let mut backend = self.enter("create_dwsu")?;
        backend.next_id += 1;
        let id = format!("dw-{}", backend.next_id);
        let script = backend.create_script.clone();
        let mut created = dwsu.clone();
        created.id = Some(id.clone());
        created.region.get_or_insert_with(placement);
        let mut default_dps = dwsu.default_dps.clone().unwrap_or_default();
        default_dps.id = Some(id.clone());
        backend
            .dps
            .insert((id.clone(), id.clone()), Scripted::new(default_dps, &[]));
        backend.dwsus.insert(id.clone(), Scripted::new(created, &script));
        Ok(id)
    }

    async fn get_dwsu(&self, dwsu_id: &str) -> Result<Option<Dwsu>, ApiError> {
        let mut backend = self.enter("get_dwsu")?;
        Ok(backend
            .dwsus
            .get_mut(dwsu_id)
            .map(|entry| observe(entry, |d, s| d.status = Some(s))))
    }

    async fn drop_dwsu(&self, dwsu_id: &str) -> Result<(), ApiError> {
        let mut backend = self.enter("drop_dwsu")?;
        if let Some(entry) = backend.dwsus.get_mut(dwsu_id) {
            entry.rescript(&[Status::Deleting, Status::Dropped]);
        }
        Ok(())
    }

    async fn list_endpoints(&self, cloud: &str, region: &str) -> Result<Vec<Endpoint>, ApiError> {
        let backend = self.enter("list_endpoints")?;
        assert_eq!((cloud, region), ("aws", "us-east-1"));
        Ok((0..backend.endpoint_count)
            .map(|i| Endpoint {
                id: format!("ep-{i}"),
                endpoint_type: "openapi".into(),
                uri: Self::REGION_URI.into(),
                ..Default::default()
            })
            .collect())
    }

    async fn list_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        page_size: usize,
        page_number: usize,
    ) -> Result<Vec<Dps>, ApiError> {
        Self::check_region(region_uri);
        let backend = self.enter("list_dps")?;
        Ok(backend
            .dps
            .iter()
            .filter(|((dw, _), _)| dw == dwsu_id)
            .skip(page_size * (page_number - 1))
            .take(page_size)
            .map(|(_, s)| s.value.clone())
            .collect())
    }

    async fn create_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        dps: &Dps,
    ) -> Result<String, ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("create_dps")?;
        backend.next_id += 1;
        let id = format!("dps-{}", backend.next_id);
        let script = backend.create_script.clone();
        let mut created = dps.clone();
        created.id = Some(id.clone());
        backend
            .dps
            .insert((dwsu_id.to_string(), id.clone()), Scripted::new(created, &script));
        Ok(id)
    }

    async fn get_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        dps_id: &str,
    ) -> Result<Option<Dps>, ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("get_dps")?;
        Ok(backend
            .dps
            .get_mut(&(dwsu_id.to_string(), dps_id.to_string()))
            .map(|entry| observe(entry, |d, s| d.status = Some(s))))
    }

    async fn patch_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        dps_id: &str,
        dps: &Dps,
    ) -> Result<(), ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("patch_dps")?;
        let script = backend.update_script.clone();
        let entry = backend
            .dps
            .get_mut(&(dwsu_id.to_string(), dps_id.to_string()))
            .ok_or(ApiError::Code {
                code: 137073,
                msg: "dps not found".into(),
            })?;
        if dps.spec.is_some() {
            entry.value.spec = dps.spec.clone();
        }
        if dps.description.is_some() {
            entry.value.description = dps.description.clone();
        }
        if !script.is_empty() {
            entry.rescript(&script);
        }
        Ok(())
    }

    async fn drop_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        dps_id: &str,
    ) -> Result<(), ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("drop_dps")?;
        backend.dps.remove(&(dwsu_id.to_string(), dps_id.to_string()));
        Ok(())
    }

    async fn create_account(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        account: &Account,
    ) -> Result<(), ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("create_account")?;
        backend
            .accounts
            .insert((dwsu_id.to_string(), account.name.clone()), account.clone());
        Ok(())
    }

    async fn get_account(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Option<Account>, ApiError> {
        Self::check_region(region_uri);
        let backend = self.enter("get_account")?;
        Ok(backend
            .accounts
            .get(&(dwsu_id.to_string(), name.to_string()))
            .map(|a| Account {
                name: a.name.clone(),
                init_password: None,
            }))
    }

    async fn patch_account_password(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("patch_account_password")?;
        if let Some(account) = backend.accounts.get_mut(&(dwsu_id.to_string(), name.to_string())) {
            account.init_password = Some(password.to_string());
        }
        Ok(())
    }

    async fn drop_account(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("drop_account")?;
        let key = (dwsu_id.to_string(), name.to_string());
        backend.accounts.remove(&key);
        backend.async_results.remove(&key);
        backend.lake_formations.remove(&key);
        Ok(())
    }

    async fn put_async_result(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
        config: &AsyncResult,
    ) -> Result<(), ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("put_async_result")?;
        backend
            .async_results
            .insert((dwsu_id.to_string(), name.to_string()), config.clone());
        Ok(())
    }

    async fn get_async_result(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Option<AsyncResult>, ApiError> {
        Self::check_region(region_uri);
        let backend = self.enter("get_async_result")?;
        Ok(backend
            .async_results
            .get(&(dwsu_id.to_string(), name.to_string()))
            .cloned())
    }

    async fn delete_async_result(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("delete_async_result")?;
        backend
            .async_results
            .remove(&(dwsu_id.to_string(), name.to_string()));
        Ok(())
    }

    async fn put_lake_formation(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
        config: &LakeFormation,
    ) -> Result<(), ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("put_lake_formation")?;
        backend
            .lake_formations
            .insert((dwsu_id.to_string(), name.to_string()), config.clone());
        Ok(())
    }

    async fn get_lake_formation(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Option<LakeFormation>, ApiError> {
        Self::check_region(region_uri);
        let backend = self.enter("get_lake_formation")?;
        Ok(backend
            .lake_formations
            .get(&(dwsu_id.to_string(), name.to_string()))
            .cloned())
    }

    async fn delete_lake_formation(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("delete_lake_formation")?;
        backend
            .lake_formations
            .remove(&(dwsu_id.to_string(), name.to_string()));
        Ok(())
    }

    async fn create_private_link(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        link: &PrivateLinkService,
    ) -> Result<PrivateLinkService, ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("create_private_link")?;
        let script = backend.create_script.clone();
        let service_type = link.service_type.clone().unwrap_or_default();
        let created = PrivateLinkService {
            service_name: Some(format!("com.relyt.{service_type}")),
            status: script.first().cloned().or(Some(Status::Ready)),
            ..link.clone()
        };
        backend.links.insert(
            (dwsu_id.to_string(), service_type),
            Scripted::new(created.clone(), &script),
        );
        Ok(created)
    }

    async fn get_private_link(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        service_type: &str,
    ) -> Result<Option<PrivateLinkService>, ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("get_private_link")?;
        Ok(backend
            .links
            .get_mut(&(dwsu_id.to_string(), service_type.to_string()))
            .map(|entry| observe(entry, |l, s| l.status = Some(s))))
    }

    async fn patch_private_link(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        service_type: &str,
        link: &PrivateLinkService,
    ) -> Result<(), ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("patch_private_link")?;
        let script = backend.update_script.clone();
        if let Some(entry) = backend
            .links
            .get_mut(&(dwsu_id.to_string(), service_type.to_string()))
        {
            entry.value.allowed_principals = link.allowed_principals.clone();
            if !script.is_empty() {
                entry.rescript(&script);
            }
        }
        Ok(())
    }

    async fn delete_private_link(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        service_type: &str,
    ) -> Result<(), ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("delete_private_link")?;
        backend
            .links
            .remove(&(dwsu_id.to_string(), service_type.to_string()));
        Ok(())
    }

    async fn get_integration(
        &self,
        region_uri: &str,
        dwsu_id: &str,
    ) -> Result<Option<IntegrationInfo>, ApiError> {
        Self::check_region(region_uri);
        let backend = self.enter("get_integration")?;
        if !backend.dwsus.contains_key(dwsu_id) {
            return Ok(None);
        }
        Ok(Some(IntegrationInfo {
            external_id: backend.external_ids.get(dwsu_id).cloned().unwrap_or_default(),
            relyt_principal: Self::RELYT_PRINCIPAL.to_string(),
            relyt_vpc: format!("vpc-{dwsu_id}"),
        }))
    }

    async fn patch_integration(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        info: &IntegrationInfo,
    ) -> Result<(), ApiError> {
        Self::check_region(region_uri);
        let mut backend = self.enter("patch_integration")?;
        backend
            .external_ids
            .insert(dwsu_id.to_string(), info.external_id.clone());
        Ok(())
    }

    async fn get_boto3_access_info(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Option<Vec<Boto3AccessInfo>>, ApiError> {
        Self::check_region(region_uri);
        let backend = self.enter("get_boto3_access_info")?;
        let key = (dwsu_id.to_string(), name.to_string());
        if !backend.accounts.contains_key(&key) {
            return Ok(None);
        }
        Ok(Some(backend.access_keys.get(&key).cloned().unwrap_or_default()))
    }
}
