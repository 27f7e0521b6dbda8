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


//! Opaque plugin runtime
//!
//! The WASM engine sits behind [`RuntimeFactory`]: it receives a finished
//! [`PluginManifest`] and hands back something that can call tools. Building a
//! runtime is a pure function of the manifest and host functions.

use crate::manifest::PluginManifest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use servlet_core::{CallResult, ServletRecord};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

/// Errors raised by the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to instantiate plugin: {0}")]
    Instantiate(String),

    #[error("Call to tool {tool} failed: {message}")]
    Call { tool: String, message: String },
}

/// A live plugin that can execute tool calls
#[async_trait]
pub trait PluginRuntime: Send + Sync {
    async fn call(&self, tool: &str, input: serde_json::Value)
        -> Result<CallResult, RuntimeError>;
}

/// Builds runtimes from manifests
#[async_trait]
pub trait RuntimeFactory: Send + Sync {
    async fn instantiate(
        &self,
        manifest: &PluginManifest,
        functions: &[HostFunction],
        wasi: bool,
    ) -> Result<Box<dyn PluginRuntime>, RuntimeError>;
}

/// Handler invoked when the guest calls a host function
pub type HostFunctionHandler = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, String> + Send + Sync>;

/// Caller-supplied function exposed to the guest
#[derive(Clone)]
pub struct HostFunction {
    pub namespace: Option<String>,
    pub name: String,
    handler: HostFunctionHandler,
}

impl HostFunction {
    pub fn new(
        name: impl Into<String>,
        handler: impl Fn(&[u8]) -> Result<Vec<u8>, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            namespace: None,
            name: name.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn invoke(&self, input: &[u8]) -> Result<Vec<u8>, String> {
        (self.handler)(input)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .finish()
    }
}

struct InstanceInner {
    id: Uuid,
    record: Arc<ServletRecord>,
    manifest: PluginManifest,
    runtime: Box<dyn PluginRuntime>,
    created_at: Instant,
    loaded_at: DateTime<Utc>,
}

/// A runtime bound to the servlet record it was built from
///
/// Cloning is cheap; clones refer to the same instance.
#[derive(Clone)]
pub struct PluginInstance {
    inner: Arc<InstanceInner>,
}

impl PluginInstance {
    pub fn new(
        record: Arc<ServletRecord>,
        manifest: PluginManifest,
        runtime: Box<dyn PluginRuntime>,
    ) -> Self {
        Self {
            inner: Arc::new(InstanceInner {
                id: Uuid::new_v4(),
                record,
                manifest,
                runtime,
                created_at: Instant::now(),
                loaded_at: Utc::now(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn record(&self) -> &Arc<ServletRecord> {
        &self.inner.record
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.inner.manifest
    }

    pub fn created_at(&self) -> Instant {
        self.inner.created_at
    }

    /// Wall-clock time the instance was built
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.inner.loaded_at
    }

    pub fn age(&self) -> Duration {
        self.inner.created_at.elapsed()
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }

    /// Whether this instance was built from exactly `record`
    pub fn built_from(&self, record: &Arc<ServletRecord>) -> bool {
        Arc::ptr_eq(&self.inner.record, record)
    }

    /// Whether both handles refer to the same instance
    pub fn same_instance(&self, other: &PluginInstance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Call a tool exported by this plugin
    pub async fn call(
        &self,
        tool: &str,
        input: serde_json::Value,
    ) -> Result<CallResult, RuntimeError> {
        tracing::debug!(
            servlet = %self.inner.record.name,
            instance = %self.inner.id,
            %tool,
            "Calling tool"
        );
        self.inner.runtime.call(tool, input).await
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("id", &self.inner.id)
            .field("servlet", &self.inner.record.name)
            .field("scope", &self.inner.record.scope)
            .field("loaded_at", &self.inner.loaded_at)
            .finish()
    }
}
