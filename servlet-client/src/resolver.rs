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


//! Tool resolution and invocation

use crate::engine::{InstantiationEngine, ObtainOptions};
use crate::error::{ClientError, ClientResult};
use crate::sync::InstallSynchronizer;
use servlet_core::{CallResult, Scope, ServletRecord, ToolDescriptor};
use std::sync::Arc;

/// A tool given by name or by descriptor
#[derive(Debug, Clone)]
pub enum ToolRef {
    Name(String),
    Descriptor(ToolDescriptor),
}

impl ToolRef {
    pub fn name(&self) -> &str {
        match self {
            ToolRef::Name(name) => name,
            ToolRef::Descriptor(tool) => &tool.name,
        }
    }
}

impl From<&str> for ToolRef {
    fn from(name: &str) -> Self {
        ToolRef::Name(name.to_string())
    }
}

impl From<String> for ToolRef {
    fn from(name: String) -> Self {
        ToolRef::Name(name)
    }
}

impl From<ToolDescriptor> for ToolRef {
    fn from(tool: ToolDescriptor) -> Self {
        ToolRef::Descriptor(tool)
    }
}

impl From<&ToolDescriptor> for ToolRef {
    fn from(tool: &ToolDescriptor) -> Self {
        ToolRef::Descriptor(tool.clone())
    }
}

/// Resolves tools to servlets and calls them
pub struct ToolInvoker {
    sync: Arc<InstallSynchronizer>,
    engine: Arc<InstantiationEngine>,
}

impl ToolInvoker {
    pub fn new(sync: Arc<InstallSynchronizer>, engine: Arc<InstantiationEngine>) -> Self {
        Self { sync, engine }
    }

    /// Find the servlet that owns `tool` in `scope`.
    ///
    /// A name lookup revalidates the scope first. When several servlets
    /// export the same name, the one listed first wins.
    pub async fn resolve(&self, scope: &Scope, tool: &ToolRef) -> ClientResult<Arc<ServletRecord>> {
        match tool {
            ToolRef::Descriptor(descriptor) => descriptor
                .servlet()
                .ok_or_else(|| ClientError::ToolNotFound(descriptor.name.clone())),
            ToolRef::Name(name) => {
                let snapshot = self.sync.refresh(scope).await?;
                let owners = snapshot.tool_owners(name);
                if owners.len() > 1 {
                    let servlets: Vec<&str> =
                        owners.iter().map(|t| t.servlet_name.as_str()).collect();
                    tracing::warn!(
                        %scope,
                        tool = %name,
                        ?servlets,
                        "Tool exported by several servlets, using the first"
                    );
                }
                owners
                    .first()
                    .and_then(|tool| snapshot.get(&tool.servlet_name).cloned())
                    .ok_or_else(|| ClientError::ToolNotFound(name.clone()))
            }
        }
    }

    /// Resolve and call `tool`; `params` default to an empty object
    pub async fn call(
        &self,
        scope: &Scope,
        tool: ToolRef,
        params: Option<serde_json::Value>,
        options: &ObtainOptions,
    ) -> ClientResult<CallResult> {
        let record = self.resolve(scope, &tool).await?;
        let plugin = self.engine.obtain(&record, options).await?;
        let input = params.unwrap_or_else(|| serde_json::json!({}));
        let result = plugin.call(tool.name(), input).await?;
        tracing::debug!(
            %scope,
            servlet = %record.name,
            tool = %tool.name(),
            status = ?result.status(),
            "Tool call finished"
        );
        Ok(result)
    }
}
