// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Client configuration
//!
//! Loaded from a TOML file (see [`ClientConfig::default_path`]) and overlaid
//! with `MCP_RUN_*` environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use servlet_core::{IntoScope, Scope};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the registry session id
pub const SESSION_ID_ENV: &str = "MCP_RUN_SESSION_ID";
/// Environment variable overriding the registry base URL
pub const BASE_URL_ENV: &str = "MCP_RUN_BASE_URL";
/// Environment variable overriding the active profile
pub const PROFILE_ENV: &str = "MCP_RUN_PROFILE";

/// Servlet client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Registry base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Active profile (`owner/name`, or a bare name for the current user)
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Registry session id
    #[serde(default)]
    pub session_id: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Default `tracing` filter when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Lifetime of a cached plugin instance in seconds.
    ///
    /// OAuth tokens are injected at build time, so this also bounds how old
    /// the token inside a cached instance can get.
    #[serde(default = "default_plugin_ttl")]
    pub plugin_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            plugin_ttl_secs: default_plugin_ttl(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.mcp.run".to_string()
}

fn default_profile() -> String {
    "~/default".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_filter() -> String {
    "servlet_client=info".to_string()
}

fn default_plugin_ttl() -> u64 {
    crate::DEFAULT_PLUGIN_TTL.as_secs()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            profile: default_profile(),
            session_id: None,
            request_timeout_secs: default_request_timeout(),
            log_filter: default_log_filter(),
            cache: CacheConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("servlet-client").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Default file (if present) plus environment overrides
    pub fn load() -> Result<Self> {
        let config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `MCP_RUN_*` environment variables
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(session_id) = lookup(SESSION_ID_ENV).filter(|v| !v.is_empty()) {
            self.session_id = Some(session_id);
        }
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.base_url = base_url;
        }
        if let Some(profile) = lookup(PROFILE_ENV).filter(|v| !v.is_empty()) {
            self.profile = profile;
        }
        self
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("base_url must be an http(s) URL, got {:?}", self.base_url);
        }
        if self.cache.plugin_ttl_secs == 0 {
            anyhow::bail!("cache.plugin_ttl_secs must be greater than zero");
        }
        self.scope()
            .map_err(|e| anyhow::anyhow!("invalid profile {:?}: {}", self.profile, e))?;
        Ok(())
    }

    /// Active profile as a scope
    pub fn scope(&self) -> servlet_core::CoreResult<Scope> {
        self.profile.as_str().into_scope()
    }

    pub fn plugin_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.plugin_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Install the global `tracing` subscriber using `log_filter` as the
    /// default filter
    pub fn init_tracing(&self) -> Result<()> {
        crate::logging::init_tracing(&self.log_filter)
    }
}
