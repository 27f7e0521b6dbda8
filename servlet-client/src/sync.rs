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


//! Install list synchronization
//!
//! Keeps the install cache in step with the registry using conditional
//! requests. A "not modified" answer leaves every cached record untouched;
//! anything else replaces the scope's snapshot and evicts plugin instances of
//! every servlet that was, or now is, installed.

use crate::error::{ClientError, ClientResult};
use crate::gateway::{InstallListing, RegistryGateway, RevalidationToken};
use crate::install_cache::{InstallCache, InstallSnapshot};
use crate::plugin_cache::PluginCache;
use dashmap::DashMap;
use servlet_core::{InstallWire, Scope, ServletRecord};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Refreshes install snapshots, one scope at a time
pub struct InstallSynchronizer {
    gateway: Arc<dyn RegistryGateway>,
    installs: Arc<InstallCache>,
    plugins: Arc<PluginCache>,
    locks: DashMap<Scope, Arc<Mutex<()>>>,
}

impl InstallSynchronizer {
    pub fn new(
        gateway: Arc<dyn RegistryGateway>,
        installs: Arc<InstallCache>,
        plugins: Arc<PluginCache>,
    ) -> Self {
        Self {
            gateway,
            installs,
            plugins,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, scope: &Scope) -> Arc<Mutex<()>> {
        self.locks.entry(scope.clone()).or_default().clone()
    }

    /// Bring the scope's snapshot up to date with the registry
    pub async fn refresh(&self, scope: &Scope) -> ClientResult<Arc<InstallSnapshot>> {
        let lock = self.lock_for(scope);
        let _guard = lock.lock().await;

        let cached = self.installs.entry(scope);
        let token = cached.as_ref().and_then(|(_, token)| token.clone());

        let listing = self.gateway.list_installs(scope, token.as_ref()).await?;
        match (listing, cached) {
            (InstallListing::Modified { installs, token }, _) => {
                self.apply(scope, installs, token)
            }
            (InstallListing::NotModified, Some((snapshot, Some(_)))) => {
                tracing::debug!(%scope, servlets = snapshot.len(), "Install list not modified");
                Ok(snapshot)
            }
            (InstallListing::NotModified, _) => {
                tracing::warn!(
                    %scope,
                    "Registry reported no changes without a cached install list, forcing full refresh"
                );
                match self.gateway.list_installs(scope, None).await? {
                    InstallListing::Modified { installs, token } => {
                        self.apply(scope, installs, token)
                    }
                    InstallListing::NotModified => Err(ClientError::ProtocolInconsistency {
                        scope: scope.to_string(),
                        reason: "unconditional install list answered as not modified"
                            .to_string(),
                    }),
                }
            }
        }
    }

    fn apply(
        &self,
        scope: &Scope,
        installs: Vec<InstallWire>,
        token: Option<RevalidationToken>,
    ) -> ClientResult<Arc<InstallSnapshot>> {
        let records = installs
            .into_iter()
            .map(|wire| ServletRecord::from_wire(scope.clone(), wire))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ClientError::Wire(e.to_string()))?;
        let snapshot = Arc::new(InstallSnapshot::new(records));

        let previous = self.installs.replace(scope, snapshot.clone(), token);

        let mut stale: BTreeSet<&str> = snapshot.names().collect();
        if let Some(previous) = &previous {
            stale.extend(previous.names());
        }
        self.plugins.evict_names(scope, stale.iter().copied());

        tracing::info!(
            %scope,
            servlets = snapshot.len(),
            previous = previous.as_ref().map(|p| p.len()).unwrap_or(0),
            "Install list updated"
        );
        Ok(snapshot)
    }

    /// Forget the refresh lock of a scope unless a refresh holds or awaits it
    pub fn clear_scope(&self, scope: &Scope) {
        self.locks
            .remove_if(scope, |_, lock| Arc::strong_count(lock) == 1);
    }
}
