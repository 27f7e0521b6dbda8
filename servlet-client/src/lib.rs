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


//! Servlet Client
//!
//! Runtime cache and plugin lifecycle for servlets installed from a remote
//! registry.
//!
//! ## Caches
//!
//! - **Install cache**: the install list of each scope, revalidated with a
//!   token so unchanged lists cost one cheap request
//! - **Plugin cache**: live plugin instances per scope and servlet, expiring
//!   after [`DEFAULT_PLUGIN_TTL`] unless configured otherwise
//!
//! Replacing a servlet's record always evicts its plugin instance, and WASM
//! content is fetched once per record.
//!
//! ## Example
//!
//! ```rust,ignore
//! use servlet_client::{ClientConfig, ObtainOptions, ServletClient};
//!
//! let client = ServletClient::from_config(ClientConfig::load()?, runtime)?;
//! let result = client
//!     .call_tool("compress", Some(json!({"quality": 80})), &ObtainOptions::default())
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod install_cache;
pub mod logging;
pub mod manifest;
pub mod plugin_cache;
pub mod resolver;
pub mod runtime;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{CacheStats, ServletClient};
pub use config::{CacheConfig, ClientConfig};
pub use engine::{InstantiationEngine, ObtainOptions};
pub use error::{ClientError, ClientResult};
pub use gateway::http::HttpRegistryGateway;
pub use gateway::{GatewayError, InstallListing, RegistryGateway, RevalidationToken};
pub use install_cache::{InstallCache, InstallSnapshot};
pub use logging::init_tracing;
pub use manifest::{PluginManifest, WasmModule, WasmSource};
pub use plugin_cache::{PluginCache, PluginKey};
pub use resolver::{ToolInvoker, ToolRef};
pub use runtime::{HostFunction, PluginInstance, PluginRuntime, RuntimeError, RuntimeFactory};
pub use sync::InstallSynchronizer;

pub use servlet_core::{
    CallResult, ContentBlock, InstallRequest, IntoScope, OAuthInfo, Scope, ServletRecord, Slug,
    ToolDescriptor,
};

/// Default lifetime of a cached plugin instance
pub const DEFAULT_PLUGIN_TTL: std::time::Duration = std::time::Duration::from_secs(4 * 60 + 30);
