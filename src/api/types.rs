//! Wire records exchanged with the Relyt API.
//!
//! Every response is wrapped in an [`Envelope`]; list endpoints wrap their
//! records once more in a [`Page`]. Fields the backend may omit are `Option`
//! so absent values survive a round trip untouched.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const CODE_SUCCESS: i64 = 200;
pub const CODE_DWSU_NOT_FOUND: i64 = 65544;
pub const CODE_DPS_NOT_FOUND: i64 = 137073;
pub const CODE_USER_NOT_FOUND: i64 = 134084;

/// Common `{code, msg, data}` response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    pub data: Option<T>,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub page_number: usize,
    #[serde(default)]
    pub page_size: usize,
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
    #[serde(default)]
    pub total: usize,
}

/// Lifecycle status reported by the backend. Unknown values are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Creating,
    Ready,
    Updating,
    Deleting,
    Dropped,
    Unknown,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Creating => "CREATING",
            Status::Ready => "READY",
            Status::Updating => "UPDATING",
            Status::Deleting => "DELETING",
            Status::Dropped => "DROPPED",
            Status::Unknown => "UNKNOWN",
            Status::Other(s) => s,
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.as_str() {
            "CREATING" => Status::Creating,
            "READY" => Status::Ready,
            "UPDATING" => Status::Updating,
            "DELETING" => Status::Deleting,
            "DROPPED" => Status::Dropped,
            "UNKNOWN" => Status::Unknown,
            _ => Status::Other(s),
        }
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cloud {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<Cloud>,
}

/// Reference to a catalogue entry (edition, variant) by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// Compute size of a DPS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
}

/// A network endpoint exposed by the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub endpoint_type: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeMap<String, String>>,
}

/// Data processing service: a compute pool inside a DWSU.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Spec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<i64>,
}

impl Dps {
    pub fn size(&self) -> Option<&str> {
        self.spec.as_ref().map(|s| s.name.as_str())
    }
}

/// Data-warehouse service unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dwsu {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_dps: Option<Dps>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_timestamp: Option<i64>,
}

impl Dwsu {
    /// `(cloud, region)` placement, when the record carries it.
    pub fn placement(&self) -> Option<(&str, &str)> {
        let region = self.region.as_ref()?;
        let cloud = region.cloud.as_ref()?;
        if cloud.id.is_empty() || region.id.is_empty() {
            return None;
        }
        Some((cloud.id.as_str(), region.id.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_password: Option<String>,
}

/// Where asynchronous query results of an account are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncResult {
    #[serde(default)]
    pub aws_iam_arn: String,
    #[serde(default)]
    pub s3_location_prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LakeFormation {
    #[serde(default)]
    pub iam_role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateLinkService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_principals: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

/// Cross-account integration settings of a DWSU.
///
/// Only `external_id` is writable; the Relyt-side VPC and principal are
/// reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relyt_principal: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relyt_vpc: String,
}

/// Access keys an account uses from boto3 clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boto3AccessInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_key_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dwsu_deserializes_from_api_format() {
        let json = r#"{
            "code": 200,
            "msg": "ok",
            "data": {
                "id": "dwsu-1",
                "domain": "analytics",
                "status": "CREATING",
                "region": {"id": "us-east-1", "cloud": {"id": "aws"}},
                "edition": {"id": "standard"},
                "endpoints": [{"id": "e1", "type": "openapi", "protocol": "HTTPS",
                               "uri": "https://x", "host": "x", "port": 443, "open": true}],
                "defaultDps": {"name": "hybrid", "engine": "hybrid", "spec": {"name": "S"}}
            }
        }"#;
        let env: Envelope<Dwsu> = serde_json::from_str(json).unwrap();
        assert_eq!(env.code, CODE_SUCCESS);
        let dwsu = env.data.unwrap();
        assert_eq!(dwsu.status, Some(Status::Creating));
        assert_eq!(dwsu.placement(), Some(("aws", "us-east-1")));
        assert_eq!(dwsu.endpoints[0].endpoint_type, "openapi");
        assert_eq!(dwsu.default_dps.unwrap().size(), Some("S"));
    }

    #[test]
    fn envelope_without_data() {
        let env: Envelope<Dwsu> =
            serde_json::from_str(r#"{"code": 65544, "msg": "not found"}"#).unwrap();
        assert_eq!(env.code, CODE_DWSU_NOT_FOUND);
        assert!(env.data.is_none());
    }

    #[test]
    fn unknown_status_is_preserved() {
        let s: Status = serde_json::from_str(r#""SUSPENDED""#).unwrap();
        assert_eq!(s, Status::Other("SUSPENDED".into()));
        assert_eq!(serde_json::to_string(&s).unwrap(), r#""SUSPENDED""#);
    }

    #[test]
    fn placement_requires_cloud() {
        let dwsu = Dwsu {
            region: Some(Region {
                id: "r".into(),
                name: None,
                cloud: None,
            }),
            ..Default::default()
        };
        assert_eq!(dwsu.placement(), None);
    }

    #[test]
    fn create_request_omits_unset_fields() {
        let dps = Dps {
            name: "etl".into(),
            engine: "extreme".into(),
            spec: Some(Spec {
                id: None,
                name: "XL".into(),
            }),
            ..Default::default()
        };
        let json = serde_json::to_string(&dps).unwrap();
        assert_eq!(json, r#"{"name":"etl","engine":"extreme","spec":{"name":"XL"}}"#);
    }

    #[test]
    fn patch_body_carries_only_changed_fields() {
        let patch = Dps {
            description: Some("nightly".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"description":"nightly"}"#);
    }

    #[test]
    fn page_defaults_missing_records() {
        let page: Page<Dps> = serde_json::from_str(r#"{"pageNumber": 3, "total": 0}"#).unwrap();
        assert_eq!(page.page_number, 3);
        assert!(page.records.is_empty());
    }
}
