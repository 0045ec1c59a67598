use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Dwsu,
    Dps,
    Account,
    PrivateLink,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Dwsu => "dwsu",
            ResourceKind::Dps => "dps",
            ResourceKind::Account => "account",
            ResourceKind::PrivateLink => "private link",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote resource known to this machine.
///
/// `key` is the operator-facing identity (a DWSU domain, `dwsu_id/name` for
/// children); `id` is whatever the backend assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub key: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn new(kind: ResourceKind, key: impl Into<String>, id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            kind,
            key: key.into(),
            id: id.into(),
            parent: None,
            status: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Record the last status observed for the resource.
    pub fn observe(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
        self.updated_at = Utc::now();
    }
}
