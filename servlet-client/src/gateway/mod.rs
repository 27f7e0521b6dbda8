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


//! Registry gateway
//!
//! Narrow I/O boundary to the remote registry. Implementations perform no
//! caching and no retries; both concerns live above this trait.

pub mod http;

use async_trait::async_trait;
use servlet_core::{InstallRequest, InstallWire, OAuthInfo, Scope};
use std::fmt;
use thiserror::Error;

pub use http::HttpRegistryGateway;

/// Server-issued freshness marker for an install list
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RevalidationToken(String);

impl RevalidationToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RevalidationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RevalidationToken({:?})", self.0)
    }
}

/// Outcome of a conditional install list request
#[derive(Debug, Clone)]
pub enum InstallListing {
    /// Nothing changed since the presented token
    NotModified,
    /// Full snapshot of the scope's installs
    Modified {
        installs: Vec<InstallWire>,
        token: Option<RevalidationToken>,
    },
}

/// Transport-level failures
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Undecodable response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("No session id configured")]
    MissingSession,
}

/// Access to the remote registry
#[async_trait]
pub trait RegistryGateway: Send + Sync {
    /// List the installs of a scope, conditionally on `token`
    async fn list_installs(
        &self,
        scope: &Scope,
        token: Option<&RevalidationToken>,
    ) -> Result<InstallListing, GatewayError>;

    /// Fetch WASM bytes by content address
    async fn fetch_content(&self, address: &str) -> Result<Vec<u8>, GatewayError>;

    /// Fetch current OAuth credentials for a servlet
    async fn fetch_oauth(&self, scope: &Scope, servlet: &str) -> Result<OAuthInfo, GatewayError>;

    /// Install a servlet into a scope
    async fn install(&self, scope: &Scope, request: &InstallRequest) -> Result<(), GatewayError>;

    /// Remove a servlet from a scope
    async fn uninstall(&self, scope: &Scope, servlet: &str) -> Result<(), GatewayError>;
}
