//! Configuration loaded from `relyt.toml`.
//!
//! [`RelytConfig`] holds every tunable. Keys missing from the file use the
//! defaults below. `RELYT_API_HOST` and `RELYT_AUTH_KEY` take precedence
//! over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::api::ClientSettings;
use crate::api::client::DEFAULT_API_HOST;
use crate::convergence::{PollSettings, PollSpec, RetryPolicy};
use crate::error::{RelytError, Result};
use crate::reconcile::ReconcileSettings;
use crate::state::ResourceKind;

pub const DEFAULT_CONFIG_FILE: &str = "relyt.toml";
pub const API_HOST_ENV: &str = "RELYT_API_HOST";
pub const AUTH_KEY_ENV: &str = "RELYT_AUTH_KEY";

const MIN_CHECK_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelytConfig {
    #[serde(default = "default_api_host")]
    pub api_host: String,

    #[serde(default)]
    pub auth_key: String,

    #[serde(default)]
    pub role: String,

    /// Seconds to wait for a resource to converge.
    #[serde(default = "default_check_timeout")]
    pub resource_check_timeout: u64,

    /// Seconds between two status checks.
    #[serde(default = "default_check_interval")]
    pub resource_check_interval: u64,

    /// Seconds allowed for a single HTTP request.
    #[serde(default = "default_client_timeout")]
    pub client_timeout: u64,

    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub poll: PollOverrides,
}

/// Per-kind `[poll.<kind>]` tables.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollOverrides {
    #[serde(default)]
    pub dwsu: Option<PollSettings>,
    #[serde(default)]
    pub dps: Option<PollSettings>,
    #[serde(default)]
    pub private_link: Option<PollSettings>,
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}

fn default_check_timeout() -> u64 {
    1800
}

fn default_check_interval() -> u64 {
    MIN_CHECK_INTERVAL_SECS
}

fn default_client_timeout() -> u64 {
    10
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".relyt-state.json")
}

impl Default for RelytConfig {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            auth_key: String::new(),
            role: String::new(),
            resource_check_timeout: default_check_timeout(),
            resource_check_interval: default_check_interval(),
            client_timeout: default_client_timeout(),
            state_file: default_state_file(),
            retry: RetryPolicy::default(),
            poll: PollOverrides::default(),
        }
    }
}

impl RelytConfig {
    /// Load from `path`, or from `relyt.toml` in the working directory.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        if let Some(host) = env(API_HOST_ENV).filter(|v| !v.is_empty()) {
            config.api_host = host;
        }
        if let Some(key) = env(AUTH_KEY_ENV).filter(|v| !v.is_empty()) {
            config.auth_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RelytError::Config(format!("cannot read {}: {e}", path.display())))?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_host.is_empty() {
            return Err(RelytError::Config("api_host must not be empty".into()));
        }
        if self.resource_check_timeout == 0 {
            return Err(RelytError::Config("resource_check_timeout must be positive".into()));
        }
        if self.resource_check_interval < MIN_CHECK_INTERVAL_SECS {
            return Err(RelytError::Config(format!(
                "resource_check_interval must be at least {MIN_CHECK_INTERVAL_SECS}s, got {}",
                self.resource_check_interval
            )));
        }
        if self.client_timeout <= 1 {
            return Err(RelytError::Config(format!(
                "client_timeout must be greater than 1s, got {}",
                self.client_timeout
            )));
        }
        self.retry.validate()?;
        for kind in [ResourceKind::Dwsu, ResourceKind::Dps, ResourceKind::PrivateLink] {
            self.poll_spec(kind)?;
        }
        Ok(())
    }

    /// Spec built from `resource_check_timeout` and `resource_check_interval`.
    pub fn base_poll(&self) -> Result<PollSpec> {
        PollSpec::new(
            Duration::from_secs(self.resource_check_timeout),
            Duration::from_secs(self.resource_check_interval),
        )
    }

    /// Base spec with the `[poll.<kind>]` override applied.
    pub fn poll_spec(&self, kind: ResourceKind) -> Result<PollSpec> {
        let base = self.base_poll()?;
        let overrides = match kind {
            ResourceKind::Dwsu => self.poll.dwsu,
            ResourceKind::Dps => self.poll.dps,
            ResourceKind::PrivateLink => self.poll.private_link,
            ResourceKind::Account => None,
        };
        match overrides {
            Some(settings) => settings.to_spec(base),
            None => Ok(base),
        }
    }

    pub fn reconcile_settings(&self) -> Result<ReconcileSettings> {
        Ok(ReconcileSettings {
            retry: self.retry.clone(),
            dwsu_poll: self.poll_spec(ResourceKind::Dwsu)?,
            dps_poll: self.poll_spec(ResourceKind::Dps)?,
            private_link_poll: self.poll_spec(ResourceKind::PrivateLink)?,
        })
    }

    /// Connection settings for the API client. Fails without an auth key.
    pub fn client_settings(&self) -> Result<ClientSettings> {
        if self.auth_key.is_empty() {
            return Err(RelytError::Config(format!(
                "missing auth key: set auth_key in {DEFAULT_CONFIG_FILE} \
                 or the {AUTH_KEY_ENV} environment variable"
            )));
        }
        Ok(ClientSettings {
            api_host: self.api_host.clone(),
            auth_key: self.auth_key.clone(),
            role: self.role.clone(),
            timeout: Duration::from_secs(self.client_timeout),
        })
    }
}
