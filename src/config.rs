//! Client configuration
//!
//! Loaded from TOML or from `DYNAMICS_*` environment variables (a `.env`
//! file is honoured when present).

use crate::api::constants::{DEFAULT_API_SUFFIX, DEFAULT_AUTHORITY};
use crate::api::error::{ApiError, ApiResult};
use crate::api::logging::LogConfig;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

const REDACTED: &str = "[REDACTED]";

/// How the client authenticates
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthSettings {
    ClientCredentials {
        tenant_id: String,
        client_id: String,
        client_secret: String,
        /// Defaults to `<base_url>/.default`
        #[serde(default)]
        scope: Option<String>,
        #[serde(default = "default_authority")]
        authority: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientCredentials {
                tenant_id,
                client_id,
                scope,
                authority,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &REDACTED)
                .field("scope", scope)
                .field("authority", authority)
                .finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &REDACTED)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Organisation root, e.g. `https://contoso.crm4.dynamics.com/`
    pub base_url: String,
    #[serde(default = "default_api_suffix")]
    pub api_suffix: String,
    /// `odata.maxpagesize` used by paged reads when the caller gives none
    #[serde(default)]
    pub max_page_size: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    pub auth: AuthSettings,
    #[serde(default)]
    pub logging: LogConfig,
}

fn default_api_suffix() -> String {
    DEFAULT_API_SUFFIX.to_string()
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("dynamics-odata/{}", env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, auth: AuthSettings) -> Self {
        Self {
            base_url: base_url.into(),
            api_suffix: default_api_suffix(),
            max_page_size: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
            auth,
            logging: LogConfig::default(),
        }
    }

    /// Default location of the config file
    pub fn default_path() -> ApiResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ApiError::Config("Failed to get config directory".to_string()))?;
        Ok(config_dir.join("dynamics-odata").join("config.toml"))
    }

    pub fn load(path: &Path) -> ApiResult<Self> {
        log::debug!("Loading client config from {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| ApiError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ApiResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ApiError::Config(format!("Invalid client config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Build the config from `DYNAMICS_*` environment variables
    pub fn from_env() -> ApiResult<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        let require = |name: &str| {
            lookup(name).ok_or_else(|| {
                ApiError::Config(format!("Environment variable {} is not set", name))
            })
        };

        let host = require("DYNAMICS_HOST")?;

        let auth = if lookup("DYNAMICS_CLIENT_ID").is_some() {
            AuthSettings::ClientCredentials {
                tenant_id: require("DYNAMICS_TENANT_ID")?,
                client_id: require("DYNAMICS_CLIENT_ID")?,
                client_secret: require("DYNAMICS_CLIENT_SECRET")?,
                scope: lookup("DYNAMICS_SCOPE"),
                authority: lookup("DYNAMICS_AUTHORITY").unwrap_or_else(default_authority),
            }
        } else if lookup("DYNAMICS_USERNAME").is_some() {
            AuthSettings::Basic {
                username: require("DYNAMICS_USERNAME")?,
                password: require("DYNAMICS_PASSWORD")?,
            }
        } else {
            return Err(ApiError::Config(
                "Neither DYNAMICS_CLIENT_ID nor DYNAMICS_USERNAME is set".to_string(),
            ));
        };

        let mut config = Self::new(host, auth);
        if let Some(suffix) = lookup("DYNAMICS_API_SUFFIX") {
            config.api_suffix = suffix;
        }
        if let Some(page_size) = lookup("DYNAMICS_MAX_PAGE_SIZE") {
            let page_size = page_size
                .parse()
                .map_err(|_| {
                    ApiError::Config(format!(
                        "DYNAMICS_MAX_PAGE_SIZE is not a number: {}",
                        page_size
                    ))
                })?;
            config.max_page_size = Some(page_size);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ApiResult<()> {
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(ApiError::Config(format!("Base URL must be absolute: {}", self.base_url)));
        }
        if self.max_page_size == Some(0) {
            return Err(ApiError::Config("max_page_size must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Scope requested from the identity provider
    pub fn scope(&self) -> Option<String> {
        match &self.auth {
            AuthSettings::ClientCredentials { scope, .. } => Some(
                scope
                    .clone()
                    .unwrap_or_else(|| format!("{}/.default", self.base_url.trim_end_matches('/'))),
            ),
            AuthSettings::Basic { .. } => None,
        }
    }
}
