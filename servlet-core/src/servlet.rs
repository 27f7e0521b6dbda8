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


//! Installed servlets and their tools

use crate::error::{CoreError, CoreResult};
use crate::scope::{Scope, Slug};
use crate::wire::InstallWire;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::sync::OnceCell;

/// Per-install settings chosen by the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServletSettings {
    #[serde(default)]
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub filesystem: Option<FilesystemPermissions>,
    #[serde(default)]
    pub network: Option<NetworkPermissions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilesystemPermissions {
    /// Host path -> guest path
    #[serde(default)]
    pub volumes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkPermissions {
    #[serde(default)]
    pub domains: Vec<String>,
}

/// Permission block with both sections present
#[derive(Debug, Clone, Copy)]
pub struct RequiredPermissions<'a> {
    pub filesystem: &'a FilesystemPermissions,
    pub network: &'a NetworkPermissions,
}

impl ServletSettings {
    /// Installed servlets always carry a full permission block; a missing
    /// section is reported instead of defaulted.
    pub fn require_permissions(&self, servlet: &str) -> CoreResult<RequiredPermissions<'_>> {
        let missing = |section: &str| CoreError::Configuration {
            servlet: servlet.to_string(),
            reason: format!("settings.{} is missing", section),
        };
        let permissions = self
            .permissions
            .as_ref()
            .ok_or_else(|| missing("permissions"))?;
        let filesystem = permissions
            .filesystem
            .as_ref()
            .ok_or_else(|| missing("permissions.filesystem"))?;
        let network = permissions
            .network
            .as_ref()
            .ok_or_else(|| missing("permissions.network"))?;
        Ok(RequiredPermissions {
            filesystem,
            network,
        })
    }
}

/// A tool exposed by an installed servlet
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub servlet_name: String,
    servlet: Weak<ServletRecord>,
}

impl ToolDescriptor {
    /// Owning servlet, if its record is still alive
    pub fn servlet(&self) -> Option<Arc<ServletRecord>> {
        self.servlet.upgrade()
    }
}

/// A servlet installed into a scope
///
/// Records are immutable snapshots of one install list response. The WASM
/// content is the only lazily populated field: it is content-addressed, so it
/// is fetched once and kept for the life of the record.
pub struct ServletRecord {
    pub name: String,
    pub slug: Slug,
    pub content_address: String,
    pub binding_id: String,
    pub scope: Scope,
    pub settings: ServletSettings,
    pub has_oauth: bool,
    tools: BTreeMap<String, ToolDescriptor>,
    content: OnceCell<Arc<[u8]>>,
}

impl ServletRecord {
    /// Build a record from its wire form
    pub fn from_wire(scope: Scope, wire: InstallWire) -> CoreResult<Arc<Self>> {
        let slug = Slug::parse(&wire.servlet.slug)?;
        let tool_wires = wire
            .servlet
            .meta
            .schema
            .map(|schema| schema.into_tools())
            .unwrap_or_default();
        let name = wire.name;

        Ok(Arc::new_cyclic(|this: &Weak<ServletRecord>| {
            let tools = tool_wires
                .into_iter()
                .map(|tool| {
                    let descriptor = ToolDescriptor {
                        name: tool.name.clone(),
                        description: tool.description,
                        input_schema: tool.input_schema,
                        servlet_name: name.clone(),
                        servlet: this.clone(),
                    };
                    (tool.name, descriptor)
                })
                .collect();

            ServletRecord {
                name,
                slug,
                content_address: wire.binding.content_address,
                binding_id: wire.binding.id,
                scope,
                settings: wire.settings,
                has_oauth: wire.servlet.has_client,
                tools,
                content: OnceCell::new(),
            }
        }))
    }

    /// Tools by name
    pub fn tools(&self) -> &BTreeMap<String, ToolDescriptor> {
        &self.tools
    }

    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Content if it has been fetched already
    pub fn content(&self) -> Option<Arc<[u8]>> {
        self.content.get().cloned()
    }

    /// Return the content, fetching it with `fetch` on first use.
    ///
    /// Concurrent callers share a single fetch. A failed fetch leaves the
    /// field empty so the next caller retries.
    pub async fn content_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<Arc<[u8]>, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Vec<u8>, E>>,
    {
        let address = self.content_address.clone();
        self.content
            .get_or_try_init(|| async move { fetch(address).await.map(Arc::from) })
            .await
            .cloned()
    }
}

impl fmt::Debug for ServletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServletRecord")
            .field("name", &self.name)
            .field("slug", &self.slug)
            .field("scope", &self.scope)
            .field("binding_id", &self.binding_id)
            .field("content_address", &self.content_address)
            .field("has_oauth", &self.has_oauth)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("content_len", &self.content.get().map(|c| c.len()))
            .finish()
    }
}
