pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientSettings, RelytClient};
pub use error::ApiError;
pub use types::{
    Account, AsyncResult, Boto3AccessInfo, Cloud, Dps, Dwsu, Endpoint, IdRef, IntegrationInfo,
    LakeFormation, Page, PrivateLinkService, Region, Spec, Status,
};

/// Remote operations the reconcilers depend on.
///
/// Calls that take a `region_uri` must be sent to the regional endpoint
/// returned by the endpoint resolver; the others go to the global API host.
/// Absence is returned as `None` (or `Ok(())` for drops), never as an error.
#[allow(async_fn_in_trait)]
pub trait RelytApi {
    async fn list_dwsu(&self, page_size: usize, page_number: usize) -> Result<Vec<Dwsu>, ApiError>;
    /// Returns the id assigned by the backend.
    async fn create_dwsu(&self, dwsu: &Dwsu) -> Result<String, ApiError>;
    async fn get_dwsu(&self, dwsu_id: &str) -> Result<Option<Dwsu>, ApiError>;
    async fn drop_dwsu(&self, dwsu_id: &str) -> Result<(), ApiError>;

    /// Open-API endpoints serving a `(cloud, region)` placement.
    async fn list_endpoints(&self, cloud: &str, region: &str) -> Result<Vec<Endpoint>, ApiError>;

    async fn list_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        page_size: usize,
        page_number: usize,
    ) -> Result<Vec<Dps>, ApiError>;
    async fn create_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        dps: &Dps,
    ) -> Result<String, ApiError>;
    async fn get_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        dps_id: &str,
    ) -> Result<Option<Dps>, ApiError>;
    async fn patch_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        dps_id: &str,
        dps: &Dps,
    ) -> Result<(), ApiError>;
    async fn drop_dps(&self, region_uri: &str, dwsu_id: &str, dps_id: &str) -> Result<(), ApiError>;

    async fn create_account(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        account: &Account,
    ) -> Result<(), ApiError>;
    async fn get_account(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Option<Account>, ApiError>;
    async fn patch_account_password(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
        password: &str,
    ) -> Result<(), ApiError>;
    async fn drop_account(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<(), ApiError>;

    async fn put_async_result(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
        config: &AsyncResult,
    ) -> Result<(), ApiError>;
    async fn get_async_result(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Option<AsyncResult>, ApiError>;
    async fn delete_async_result(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<(), ApiError>;

    async fn put_lake_formation(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
        config: &LakeFormation,
    ) -> Result<(), ApiError>;
    async fn get_lake_formation(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Option<LakeFormation>, ApiError>;
    async fn delete_lake_formation(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<(), ApiError>;

    async fn create_private_link(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        link: &PrivateLinkService,
    ) -> Result<PrivateLinkService, ApiError>;
    async fn get_private_link(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        service_type: &str,
    ) -> Result<Option<PrivateLinkService>, ApiError>;
    async fn patch_private_link(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        service_type: &str,
        link: &PrivateLinkService,
    ) -> Result<(), ApiError>;
    async fn delete_private_link(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        service_type: &str,
    ) -> Result<(), ApiError>;

    async fn get_integration(
        &self,
        region_uri: &str,
        dwsu_id: &str,
    ) -> Result<Option<IntegrationInfo>, ApiError>;
    /// Sends only the writable fields of `info`.
    async fn patch_integration(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        info: &IntegrationInfo,
    ) -> Result<(), ApiError>;

    /// `None` when the account does not exist.
    async fn get_boto3_access_info(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Option<Vec<Boto3AccessInfo>>, ApiError>;
}
