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


//! Plugin instantiation
//!
//! Turns a servlet record into a live plugin instance, reusing a cached one
//! whenever the caller's options allow it.
//!
//! ## Build steps
//!
//! 1. Validate the record's permission settings (no I/O yet)
//! 2. Fetch OAuth credentials, if the servlet has a client
//! 3. Fetch the WASM content, once per record
//! 4. Assemble the manifest and instantiate the runtime
//! 5. Cache the instance if it is cacheable and the record is still current
//!
//! Builds for the same servlet are single-flight: concurrent callers wait for
//! the first build and then pick up its cached result.

use crate::error::ClientResult;
use crate::gateway::RegistryGateway;
use crate::install_cache::InstallCache;
use crate::manifest::{PluginManifest, WasmModule};
use crate::plugin_cache::{PluginCache, PluginKey};
use crate::runtime::{HostFunction, PluginInstance, RuntimeFactory};
use dashmap::DashMap;
use servlet_core::{Scope, ServletRecord};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Options for obtaining a plugin instance
#[derive(Debug, Clone)]
pub struct ObtainOptions {
    /// Allow reading and writing the plugin cache
    pub cache: bool,
    /// Give the guest a WASI environment
    pub wasi: bool,
    pub extra_modules: Vec<WasmModule>,
    pub extra_functions: Vec<HostFunction>,
}

impl Default for ObtainOptions {
    fn default() -> Self {
        Self {
            cache: true,
            wasi: true,
            extra_modules: Vec::new(),
            extra_functions: Vec::new(),
        }
    }
}

impl ObtainOptions {
    /// Options that never touch the plugin cache
    pub fn uncached() -> Self {
        Self {
            cache: false,
            ..Self::default()
        }
    }

    pub fn with_wasi(mut self, wasi: bool) -> Self {
        self.wasi = wasi;
        self
    }

    pub fn with_module(mut self, module: WasmModule) -> Self {
        self.extra_modules.push(module);
        self
    }

    pub fn with_function(mut self, function: HostFunction) -> Self {
        self.extra_functions.push(function);
        self
    }

    /// Only the default runtime shape is shared through the cache
    pub fn cacheable(&self) -> bool {
        self.cache && self.wasi && self.extra_modules.is_empty() && self.extra_functions.is_empty()
    }
}

/// Builds plugin instances and manages their cache entries
pub struct InstantiationEngine {
    gateway: Arc<dyn RegistryGateway>,
    factory: Arc<dyn RuntimeFactory>,
    installs: Arc<InstallCache>,
    plugins: Arc<PluginCache>,
    build_locks: DashMap<PluginKey, Arc<Mutex<()>>>,
}

impl InstantiationEngine {
    pub fn new(
        gateway: Arc<dyn RegistryGateway>,
        factory: Arc<dyn RuntimeFactory>,
        installs: Arc<InstallCache>,
        plugins: Arc<PluginCache>,
    ) -> Self {
        Self {
            gateway,
            factory,
            installs,
            plugins,
            build_locks: DashMap::new(),
        }
    }

    /// Return a plugin instance for `record`
    pub async fn obtain(
        &self,
        record: &Arc<ServletRecord>,
        options: &ObtainOptions,
    ) -> ClientResult<PluginInstance> {
        if !options.cacheable() {
            return self.build(record, options).await;
        }

        let key = PluginKey::new(&record.scope, record.name.clone());
        if let Some(instance) = self.cached(&key, record) {
            return Ok(instance);
        }

        let lock = self.build_lock(&key);
        let _guard = lock.lock().await;

        // Another caller may have finished the build while we waited.
        if let Some(instance) = self.cached(&key, record) {
            return Ok(instance);
        }

        let instance = self.build(record, options).await?;
        if self.installs.is_current(record) {
            self.plugins.insert(key, instance.clone());
        } else {
            tracing::debug!(
                scope = %record.scope,
                servlet = %record.name,
                "Record superseded during build, instance not cached"
            );
        }
        Ok(instance)
    }

    /// Cached instance built from exactly `record`. An instance built from a
    /// record that is no longer current is evicted.
    fn cached(&self, key: &PluginKey, record: &Arc<ServletRecord>) -> Option<PluginInstance> {
        let instance = self.plugins.get_fresh(key)?;
        if instance.built_from(record) {
            tracing::trace!(
                scope = %key.scope,
                servlet = %key.name,
                instance = %instance.id(),
                "Plugin cache hit"
            );
            return Some(instance);
        }
        if !self.installs.is_current(instance.record()) {
            tracing::debug!(
                scope = %key.scope,
                servlet = %key.name,
                instance = %instance.id(),
                "Evicting plugin built from a superseded record"
            );
            self.plugins.evict_instance(key, &instance);
        }
        None
    }

    async fn build(
        &self,
        record: &Arc<ServletRecord>,
        options: &ObtainOptions,
    ) -> ClientResult<PluginInstance> {
        record.settings.require_permissions(&record.name)?;

        let oauth = if record.has_oauth {
            Some(self.gateway.fetch_oauth(&record.scope, &record.name).await?)
        } else {
            None
        };

        let gateway = &self.gateway;
        let content = record
            .content_or_fetch(|address| async move { gateway.fetch_content(&address).await })
            .await?;

        let manifest =
            PluginManifest::for_record(record, content, &options.extra_modules, oauth.as_ref())?;
        let runtime = self
            .factory
            .instantiate(&manifest, &options.extra_functions, options.wasi)
            .await?;

        let instance = PluginInstance::new(record.clone(), manifest, runtime);
        tracing::info!(
            scope = %record.scope,
            servlet = %record.name,
            instance = %instance.id(),
            oauth = record.has_oauth,
            "Plugin instantiated"
        );
        Ok(instance)
    }

    fn build_lock(&self, key: &PluginKey) -> Arc<Mutex<()>> {
        self.build_locks.entry(key.clone()).or_default().clone()
    }

    /// Forget build locks of a scope that no build holds or awaits
    pub fn clear_scope(&self, scope: &Scope) {
        self.build_locks
            .retain(|key, lock| key.scope != *scope || Arc::strong_count(lock) > 1);
    }
}
