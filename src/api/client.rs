use std::time::Duration;

use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use uuid::Uuid;

use super::RelytApi;
use super::error::ApiError;
use super::types::{
    Account, AsyncResult, Boto3AccessInfo, CODE_DPS_NOT_FOUND, CODE_DWSU_NOT_FOUND, CODE_SUCCESS,
    CODE_USER_NOT_FOUND, Dps, Dwsu, Endpoint, Envelope, IntegrationInfo, LakeFormation, Page,
    PrivateLinkService,
};

pub const DEFAULT_API_HOST: &str = "https://api.data.cloud";

/// Connection parameters for [`RelytClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_host: String,
    pub auth_key: String,
    pub role: String,
    pub timeout: Duration,
}

/// HTTP client for the Relyt open API.
pub struct RelytClient {
    http: Client,
    api_host: String,
    auth_key: String,
    role: String,
}

/// One request, before it is turned into a `reqwest` call.
struct Call<'a> {
    method: Method,
    host: Option<&'a str>,
    segments: Vec<&'a str>,
    query: Vec<(&'static str, String)>,
    headers: Vec<(&'static str, &'static str)>,
    body: Option<serde_json::Value>,
    not_found: Option<i64>,
}

impl<'a> Call<'a> {
    fn new(method: Method, segments: &[&'a str]) -> Self {
        Self {
            method,
            host: None,
            segments: segments.to_vec(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            not_found: None,
        }
    }

    fn get(segments: &[&'a str]) -> Self {
        Self::new(Method::GET, segments)
    }

    fn regional(mut self, region_uri: &'a str) -> Self {
        self.host = Some(region_uri);
        self
    }

    fn page(mut self, page_size: usize, page_number: usize) -> Self {
        self.query.push(("pageSize", page_size.to_string()));
        self.query.push(("pageNumber", page_number.to_string()));
        self
    }

    fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    fn json(mut self, body: &impl Serialize) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Business code that means "no such resource"; such responses decode as `None`.
    fn absent_on(mut self, code: i64) -> Self {
        self.not_found = Some(code);
        self
    }
}

impl RelytClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let http = Client::builder()
            .connect_timeout(settings.timeout.min(Duration::from_secs(10)))
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            http,
            api_host: settings.api_host,
            auth_key: settings.auth_key,
            role: settings.role,
        })
    }

    fn url(&self, host: Option<&str>, segments: &[&str]) -> Result<Url, ApiError> {
        let host = host.unwrap_or(&self.api_host);
        let mut url = Url::parse(host).map_err(|e| ApiError::InvalidUrl(format!("{host}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("{host} cannot carry a path")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(&self, call: Call<'_>) -> Result<Option<T>, ApiError> {
        let request_id = Uuid::new_v4();
        let url = self.url(call.host, &call.segments)?;
        debug!(%request_id, method = %call.method, %url, "sending request");

        let mut builder = self
            .http
            .request(call.method.clone(), url)
            .header("x-maxone-api-key", &self.auth_key)
            .header("x-maxone-role-id", &self.role);
        if !call.query.is_empty() {
            builder = builder.query(&call.query);
        }
        for (name, value) in &call.headers {
            builder = builder.header(*name, *value);
        }
        if let Some(body) = &call.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.inspect_err(|e| {
            error!(%request_id, error = %e, "request failed");
        })?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%request_id, status = status.as_u16(), "received response");

        if status != StatusCode::OK {
            error!(%request_id, status = status.as_u16(), %body, "unexpected HTTP status");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        if envelope.code == CODE_SUCCESS {
            return Ok(envelope.data);
        }
        if call.not_found == Some(envelope.code) {
            debug!(%request_id, code = envelope.code, "resource absent");
            return Ok(None);
        }
        Err(ApiError::Code {
            code: envelope.code,
            msg: envelope.msg.unwrap_or(body),
        })
    }

    /// For calls whose response data carries nothing the caller needs.
    async fn execute_unit(&self, call: Call<'_>) -> Result<(), ApiError> {
        self.execute::<serde_json::Value>(call).await.map(|_| ())
    }
}

impl RelytApi for RelytClient {
    async fn list_dwsu(&self, page_size: usize, page_number: usize) -> Result<Vec<Dwsu>, ApiError> {
        let page: Option<Page<Dwsu>> = self
            .execute(Call::get(&["dwsu"]).page(page_size, page_number))
            .await?;
        Ok(page.map(|p| p.records).unwrap_or_default())
    }

    async fn create_dwsu(&self, dwsu: &Dwsu) -> Result<String, ApiError> {
        self.execute(Call::new(Method::POST, &["dwsu"]).json(dwsu)?)
            .await?
            .ok_or(ApiError::MissingData("create dwsu"))
    }

    async fn get_dwsu(&self, dwsu_id: &str) -> Result<Option<Dwsu>, ApiError> {
        self.execute(Call::get(&["dwsu", dwsu_id]).absent_on(CODE_DWSU_NOT_FOUND))
            .await
    }

    async fn drop_dwsu(&self, dwsu_id: &str) -> Result<(), ApiError> {
        self.execute_unit(
            Call::new(Method::DELETE, &["dwsu", dwsu_id]).absent_on(CODE_DWSU_NOT_FOUND),
        )
            .await
    }

    async fn list_endpoints(&self, cloud: &str, region: &str) -> Result<Vec<Endpoint>, ApiError> {
        let endpoints: Option<Vec<Endpoint>> = self
            .execute(Call::get(&["infra", cloud, region, "endpoint"]))
            .await?;
        Ok(endpoints.unwrap_or_default())
    }

    async fn list_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        page_size: usize,
        page_number: usize,
    ) -> Result<Vec<Dps>, ApiError> {
        let page: Option<Page<Dps>> = self
            .execute(
                Call::get(&["dwsu", dwsu_id, "dps"])
                    .regional(region_uri)
                    .page(page_size, page_number),
            )
            .await?;
        Ok(page.map(|p| p.records).unwrap_or_default())
    }

    async fn create_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        dps: &Dps,
    ) -> Result<String, ApiError> {
        self.execute(
            Call::new(Method::POST, &["dwsu", dwsu_id, "dps"])
                .regional(region_uri)
                .json(dps)?,
        )
        .await?
        .ok_or(ApiError::MissingData("create dps"))
    }

    async fn get_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        dps_id: &str,
    ) -> Result<Option<Dps>, ApiError> {
        self.execute(
            Call::get(&["dwsu", dwsu_id, "dps", dps_id])
                .regional(region_uri)
                .absent_on(CODE_DPS_NOT_FOUND),
        )
        .await
    }

    async fn patch_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        dps_id: &str,
        dps: &Dps,
    ) -> Result<(), ApiError> {
        self.execute_unit(
            Call::new(Method::PATCH, &["dwsu", dwsu_id, "dps", dps_id])
                .regional(region_uri)
                .json(dps)?,
        )
        .await
    }

    async fn drop_dps(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        dps_id: &str,
    ) -> Result<(), ApiError> {
        self.execute_unit(
            Call::new(Method::DELETE, &["dwsu", dwsu_id, "dps", dps_id])
                .regional(region_uri)
                .absent_on(CODE_DPS_NOT_FOUND),
        )
        .await
    }

    async fn create_account(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        account: &Account,
    ) -> Result<(), ApiError> {
        self.execute_unit(
            Call::new(Method::POST, &["dwsu", dwsu_id, "account"])
                .regional(region_uri)
                .json(account)?,
        )
        .await
    }

    async fn get_account(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Option<Account>, ApiError> {
        self.execute(
            Call::get(&["dwsu", dwsu_id, "user", name])
                .regional(region_uri)
                .absent_on(CODE_USER_NOT_FOUND),
        )
        .await
    }

    async fn patch_account_password(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        let account = Account {
            name: name.to_string(),
            init_password: Some(password.to_string()),
        };
        self.execute_unit(
            Call::new(Method::PATCH, &["dwsu", dwsu_id, "user", name])
                .regional(region_uri)
                .json(&account)?,
        )
        .await
    }

    async fn drop_account(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        self.execute_unit(
            Call::new(Method::DELETE, &["dwsu", dwsu_id, "user", name])
                .regional(region_uri)
                .absent_on(CODE_USER_NOT_FOUND),
        )
        .await
    }

    async fn put_async_result(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
        config: &AsyncResult,
    ) -> Result<(), ApiError> {
        self.execute_unit(
            Call::new(Method::PUT, &["dwsu", dwsu_id, "user", name, "asyncresult"])
                .regional(region_uri)
                .json(config)?,
        )
        .await
    }

    async fn get_async_result(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Option<AsyncResult>, ApiError> {
        self.execute(
            Call::get(&["dwsu", dwsu_id, "user", name, "asyncresult"]).regional(region_uri),
        )
            .await
    }

    async fn delete_async_result(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        self.execute_unit(
            Call::new(Method::DELETE, &["dwsu", dwsu_id, "user", name, "asyncresult"])
                .regional(region_uri),
        )
        .await
    }

    async fn put_lake_formation(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
        config: &LakeFormation,
    ) -> Result<(), ApiError> {
        self.execute_unit(
            Call::new(Method::PUT, &["dwsu", dwsu_id, "user", name, "lakeformation"])
                .regional(region_uri)
                .json(config)?,
        )
        .await
    }

    async fn get_lake_formation(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Option<LakeFormation>, ApiError> {
        self.execute(
            Call::get(&["dwsu", dwsu_id, "user", name, "lakeformation"]).regional(region_uri),
        )
            .await
    }

    async fn delete_lake_formation(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        self.execute_unit(
            Call::new(Method::DELETE, &["dwsu", dwsu_id, "user", name, "lakeformation"])
                .regional(region_uri),
        )
        .await
    }

    async fn create_private_link(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        link: &PrivateLinkService,
    ) -> Result<PrivateLinkService, ApiError> {
        // Name and status are assigned by the backend.
        let request = PrivateLinkService {
            service_name: None,
            status: None,
            ..link.clone()
        };
        self.execute(
            Call::new(Method::PUT, &["dwsu", dwsu_id, "private-link-services"])
                .regional(region_uri)
                .header("x-maxone-idempotent", "false")
                .json(&request)?,
        )
        .await?
        .ok_or(ApiError::MissingData("create private link"))
    }

    async fn get_private_link(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        service_type: &str,
    ) -> Result<Option<PrivateLinkService>, ApiError> {
        self.execute(
            Call::get(&["dwsu", dwsu_id, "private-link-services", service_type])
                .regional(region_uri),
        )
            .await
    }

    async fn patch_private_link(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        service_type: &str,
        link: &PrivateLinkService,
    ) -> Result<(), ApiError> {
        // Only the principal list is patchable; the type travels in the path.
        let request = PrivateLinkService {
            allowed_principals: link.allowed_principals.clone(),
            ..Default::default()
        };
        self.execute_unit(
            Call::new(Method::PATCH, &["dwsu", dwsu_id, "private-link-services", service_type])
                .regional(region_uri)
                .json(&request)?,
        )
        .await
    }

    async fn delete_private_link(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        service_type: &str,
    ) -> Result<(), ApiError> {
        self.execute_unit(
            Call::new(Method::DELETE, &["dwsu", dwsu_id, "private-link-services", service_type])
                .regional(region_uri),
        )
        .await
    }

    async fn get_integration(
        &self,
        region_uri: &str,
        dwsu_id: &str,
    ) -> Result<Option<IntegrationInfo>, ApiError> {
        self.execute(
            Call::get(&["dwsu", dwsu_id, "integration"])
                .regional(region_uri)
                .absent_on(CODE_DWSU_NOT_FOUND),
        )
        .await
    }

    async fn patch_integration(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        info: &IntegrationInfo,
    ) -> Result<(), ApiError> {
        // The Relyt VPC and principal are read-only.
        let request = IntegrationInfo {
            external_id: info.external_id.clone(),
            ..Default::default()
        };
        self.execute_unit(
            Call::new(Method::PATCH, &["dwsu", dwsu_id, "integration"])
                .regional(region_uri)
                .json(&request)?,
        )
        .await
    }

    async fn get_boto3_access_info(
        &self,
        region_uri: &str,
        dwsu_id: &str,
        name: &str,
    ) -> Result<Option<Vec<Boto3AccessInfo>>, ApiError> {
        self.execute(
            Call::get(&["dwsu", dwsu_id, "user", name, "ak"])
                .regional(region_uri)
                .absent_on(CODE_USER_NOT_FOUND),
        )
        .await
    }
}
