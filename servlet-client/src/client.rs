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


//! Servlet client - main entry point
//!
//! Owns the install cache, the plugin cache and everything that keeps them
//! consistent. Every public method takes its scope through [`IntoScope`], so
//! profiles can be given as strings, slugs or scopes.

use crate::config::ClientConfig;
use crate::engine::{InstantiationEngine, ObtainOptions};
use crate::error::ClientResult;
use crate::gateway::http::HttpRegistryGateway;
use crate::gateway::RegistryGateway;
use crate::install_cache::{InstallCache, InstallSnapshot};
use crate::plugin_cache::PluginCache;
use crate::resolver::{ToolInvoker, ToolRef};
use crate::runtime::{PluginInstance, RuntimeFactory};
use crate::sync::InstallSynchronizer;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use servlet_core::{CallResult, InstallRequest, IntoScope, Scope, ServletRecord, ToolDescriptor};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cache occupancy counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Scopes with a cached install list
    pub scopes: usize,
    /// Servlet records across all scopes
    pub servlets: usize,
    /// Live plugin instances
    pub plugins: usize,
    pub plugin_hits: u64,
    pub plugin_misses: u64,
}

/// Client for servlets installed from the registry
pub struct ServletClient {
    config: ClientConfig,
    gateway: Arc<dyn RegistryGateway>,
    active: RwLock<Scope>,
    installs: Arc<InstallCache>,
    plugins: Arc<PluginCache>,
    sync: Arc<InstallSynchronizer>,
    engine: Arc<InstantiationEngine>,
    invoker: ToolInvoker,
}

impl ServletClient {
    /// Create a client with explicit gateway and runtime
    pub fn new(
        config: ClientConfig,
        gateway: Arc<dyn RegistryGateway>,
        factory: Arc<dyn RuntimeFactory>,
    ) -> ClientResult<Self> {
        let active = config.scope()?;
        let installs = Arc::new(InstallCache::new());
        let plugins = Arc::new(PluginCache::new(config.plugin_ttl()));
        let sync = Arc::new(InstallSynchronizer::new(
            gateway.clone(),
            installs.clone(),
            plugins.clone(),
        ));
        let engine = Arc::new(InstantiationEngine::new(
            gateway.clone(),
            factory,
            installs.clone(),
            plugins.clone(),
        ));
        let invoker = ToolInvoker::new(sync.clone(), engine.clone());

        tracing::debug!(
            scope = %active,
            ttl_secs = config.cache.plugin_ttl_secs,
            "Servlet client created"
        );

        Ok(Self {
            config,
            gateway,
            active: RwLock::new(active),
            installs,
            plugins,
            sync,
            engine,
            invoker,
        })
    }

    /// Create a client talking to the registry over HTTP
    pub fn from_config(config: ClientConfig, factory: Arc<dyn RuntimeFactory>) -> ClientResult<Self> {
        let gateway = Arc::new(HttpRegistryGateway::from_config(&config)?);
        Self::new(config, gateway, factory)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Scope used when none is given
    pub fn active_scope(&self) -> Scope {
        self.active.read().clone()
    }

    /// Switch the active profile. Both the old and the new scope are cleared
    /// when the profile actually changes.
    pub fn set_profile(&self, profile: impl IntoScope) -> ClientResult<()> {
        let scope = profile.into_scope()?;
        let previous = {
            let mut active = self.active.write();
            if *active == scope {
                return Ok(());
            }
            std::mem::replace(&mut *active, scope.clone())
        };
        tracing::info!(from = %previous, to = %scope, "Active profile changed");
        self.clear_scope(&previous);
        self.clear_scope(&scope);
        Ok(())
    }

    /// Revalidate and return the install list of a scope
    pub async fn refresh_installs(&self, scope: impl IntoScope) -> ClientResult<Arc<InstallSnapshot>> {
        let scope = scope.into_scope()?;
        self.sync.refresh(&scope).await
    }

    /// Install list of the active scope
    pub async fn installs(&self) -> ClientResult<Arc<InstallSnapshot>> {
        let scope = self.active_scope();
        self.sync.refresh(&scope).await
    }

    /// All tools of a scope; on name collisions the first listed servlet wins
    pub async fn tools(&self, scope: impl IntoScope) -> ClientResult<BTreeMap<String, ToolDescriptor>> {
        Ok(self.refresh_installs(scope).await?.tools())
    }

    /// Look up a single tool
    pub async fn tool(&self, scope: impl IntoScope, name: &str) -> ClientResult<Option<ToolDescriptor>> {
        Ok(self.refresh_installs(scope).await?.tool(name).cloned())
    }

    /// Obtain a plugin instance for an installed servlet
    pub async fn obtain_plugin(
        &self,
        record: &Arc<ServletRecord>,
        options: &ObtainOptions,
    ) -> ClientResult<PluginInstance> {
        self.engine.obtain(record, options).await
    }

    /// Call a tool in the active scope
    pub async fn call_tool(
        &self,
        tool: impl Into<ToolRef>,
        params: Option<serde_json::Value>,
        options: &ObtainOptions,
    ) -> ClientResult<CallResult> {
        let scope = self.active_scope();
        self.invoker.call(&scope, tool.into(), params, options).await
    }

    /// Call a tool in a given scope
    pub async fn call_tool_in(
        &self,
        scope: impl IntoScope,
        tool: impl Into<ToolRef>,
        params: Option<serde_json::Value>,
        options: &ObtainOptions,
    ) -> ClientResult<CallResult> {
        let scope = scope.into_scope()?;
        self.invoker.call(&scope, tool.into(), params, options).await
    }

    /// Drop everything cached for a scope, including its revalidation token
    pub fn clear_cache(&self, scope: impl IntoScope) -> ClientResult<()> {
        let scope = scope.into_scope()?;
        self.clear_scope(&scope);
        Ok(())
    }

    fn clear_scope(&self, scope: &Scope) {
        let dropped = self.installs.clear(scope).map(|s| s.len()).unwrap_or(0);
        self.plugins.clear_scope(scope);
        self.sync.clear_scope(scope);
        self.engine.clear_scope(scope);
        tracing::debug!(%scope, servlets = dropped, "Scope cache cleared");
    }

    /// Install a servlet and invalidate the scope
    pub async fn install(&self, scope: impl IntoScope, request: &InstallRequest) -> ClientResult<()> {
        let scope = scope.into_scope()?;
        self.gateway.install(&scope, request).await?;
        tracing::info!(%scope, servlet = %request.servlet_slug, "Servlet installed");
        self.clear_scope(&scope);
        Ok(())
    }

    /// Uninstall a servlet and invalidate the scope
    pub async fn uninstall(&self, scope: impl IntoScope, name: &str) -> ClientResult<()> {
        let scope = scope.into_scope()?;
        self.gateway.uninstall(&scope, name).await?;
        tracing::info!(%scope, servlet = %name, "Servlet uninstalled");
        self.clear_scope(&scope);
        Ok(())
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            scopes: self.installs.scope_count(),
            servlets: self.installs.record_count(),
            plugins: self.plugins.len(),
            plugin_hits: self.plugins.hits(),
            plugin_misses: self.plugins.misses(),
        }
    }

    /// Release every cached install list and plugin instance
    pub fn teardown(self) {
        let stats = self.cache_stats();
        self.plugins.clear();
        self.installs.clear_all();
        tracing::info!(
            scopes = stats.scopes,
            plugins = stats.plugins,
            "Servlet client shut down"
        );
    }
}

impl std::fmt::Debug for ServletClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServletClient")
            .field("base_url", &self.config.base_url)
            .field("active", &*self.active.read())
            .field("stats", &self.cache_stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::testing::{client_with, install, install_with_settings, MockFactory, MockGateway};
    use serde_json::json;
    use std::time::Duration;

    fn img_install() -> servlet_core::InstallWire {
        install_with_settings(
            "img",
            &["compress"],
            false,
            json!({
                "permissions": {
                    "filesystem": {"volumes": {}},
                    "network": {"domains": ["cdn.example.com"]}
                }
            }),
        )
    }

    #[tokio::test]
    async fn test_unchanged_installs_issue_no_fetches() {
        let gateway = MockGateway::with_installs(vec![install("gdrive", &["list"], true)]);
        let client = client_with(gateway.clone(), MockFactory::new());

        let first = client.refresh_installs("~/default").await.unwrap();
        let second = client.refresh_installs(Scope::default()).await.unwrap();

        assert!(Arc::ptr_eq(first.get("gdrive").unwrap(), second.get("gdrive").unwrap()));
        assert_eq!(MockGateway::count(&gateway.content_fetches), 0);
        assert_eq!(MockGateway::count(&gateway.oauth_fetches), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_compress() {
        let gateway = MockGateway::with_installs(vec![img_install()]);
        let factory = MockFactory::new();
        let client = client_with(gateway.clone(), factory.clone());
        let options = ObtainOptions::default();

        let result = client
            .call_tool("compress", Some(json!({"quality": 80})), &options)
            .await
            .unwrap();

        assert_eq!(result.text(), r#"compress:{"quality":80}"#);
        assert_eq!(factory.builds(), 1);
        let manifest = factory.last_manifest().unwrap();
        assert_eq!(manifest.allowed_hosts, vec!["cdn.example.com".to_string()]);
        assert!(manifest.allowed_paths.is_empty());

        tokio::time::advance(Duration::from_secs(30)).await;
        client
            .call_tool("compress", Some(json!({"quality": 80})), &options)
            .await
            .unwrap();

        assert_eq!(factory.builds(), 1);
        assert_eq!(MockGateway::count(&gateway.content_fetches), 1);
    }

    #[tokio::test]
    async fn test_upstream_change_evicts_fresh_instance() {
        let gateway = MockGateway::with_installs(vec![img_install()]);
        let factory = MockFactory::new();
        let client = client_with(gateway.clone(), factory.clone());

        let snapshot = client.installs().await.unwrap();
        let first = client
            .obtain_plugin(snapshot.get("img").unwrap(), &ObtainOptions::default())
            .await
            .unwrap();
        assert_eq!(client.cache_stats().plugins, 1);

        gateway.touch();
        let snapshot = client.installs().await.unwrap();
        assert_eq!(client.cache_stats().plugins, 0);

        let second = client
            .obtain_plugin(snapshot.get("img").unwrap(), &ObtainOptions::default())
            .await
            .unwrap();
        assert!(!first.same_instance(&second));
        assert_eq!(factory.builds(), 2);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_unconditional_list() {
        let gateway = MockGateway::with_installs(vec![img_install()]);
        let client = client_with(gateway.clone(), MockFactory::new());

        client.installs().await.unwrap();
        client.clear_cache("~/default").unwrap();
        let snapshot = client.installs().await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(MockGateway::count(&gateway.list_calls), 2);
        assert_eq!(MockGateway::count(&gateway.conditional_list_calls), 0);
    }

    #[tokio::test]
    async fn test_set_profile_clears_scopes() {
        let gateway = MockGateway::with_installs(vec![img_install()]);
        let client = client_with(gateway.clone(), MockFactory::new());
        client.installs().await.unwrap();

        client.set_profile("~/default").unwrap();
        assert_eq!(client.cache_stats().scopes, 1);

        client.set_profile("acme/work").unwrap();
        assert_eq!(client.active_scope().to_string(), "acme/work");
        assert_eq!(client.cache_stats().scopes, 0);

        let err = client.set_profile("a/b/c").unwrap_err();
        assert!(matches!(err, ClientError::InvalidScope(_)));
    }

    #[tokio::test]
    async fn test_uninstall_invalidates_scope() {
        let gateway = MockGateway::with_installs(vec![img_install()]);
        let client = client_with(gateway.clone(), MockFactory::new());
        client.call_tool("compress", None, &ObtainOptions::default()).await.unwrap();

        gateway.set_installs(vec![]);
        client.uninstall(Scope::default(), "img").await.unwrap();

        assert_eq!(client.cache_stats().plugins, 0);
        assert_eq!(client.cache_stats().scopes, 0);
        assert!(client.tools(Scope::default()).await.unwrap().is_empty());
        assert_eq!(MockGateway::count(&gateway.uninstall_calls), 1);
    }

    #[tokio::test]
    async fn test_tools_lists_all_servlets() {
        let gateway = MockGateway::with_installs(vec![
            img_install(),
            install("fetch", &["fetch", "compress"], false),
        ]);
        let client = client_with(gateway, MockFactory::new());

        let tools = client.tools(Scope::default()).await.unwrap();

        assert_eq!(tools.keys().collect::<Vec<_>>(), vec!["compress", "fetch"]);
        assert_eq!(tools["compress"].servlet_name, "img");
        let fetch = client.tool(Scope::default(), "fetch").await.unwrap().unwrap();
        assert_eq!(fetch.servlet().unwrap().name, "fetch");
    }
}
