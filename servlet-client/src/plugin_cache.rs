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


//! Plugin cache
//!
//! Live plugin instances keyed by scope and servlet name. Entries expire a
//! fixed time after they were built; expiry is checked on read.
//!
//! ## Keying
//!
//! ```text
//! key = (scope, servlet name)
//! ```
//!
//! Each entry remembers the exact servlet record it was built from, so callers
//! can tell a stale instance from a fresh one without comparing contents.

use crate::runtime::PluginInstance;
use dashmap::DashMap;
use servlet_core::Scope;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Cache key for plugin instances
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginKey {
    pub scope: Scope,
    pub name: String,
}

impl PluginKey {
    pub fn new(scope: &Scope, name: impl Into<String>) -> Self {
        Self {
            scope: scope.clone(),
            name: name.into(),
        }
    }
}

/// Plugin instances with time-based expiry
pub struct PluginCache {
    entries: DashMap<PluginKey, PluginInstance>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PluginCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Unexpired instance for `key`; an expired one is evicted
    pub fn get_fresh(&self, key: &PluginKey) -> Option<PluginInstance> {
        let cached = self.entries.get(key).map(|e| e.value().clone());
        match cached {
            Some(instance) if !instance.is_expired(self.ttl) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(instance)
            }
            Some(instance) => {
                tracing::debug!(
                    scope = %key.scope,
                    servlet = %key.name,
                    instance = %instance.id(),
                    "Plugin instance expired"
                );
                self.evict_instance(key, &instance);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: PluginKey, instance: PluginInstance) {
        self.entries.insert(key, instance);
    }

    pub fn evict(&self, key: &PluginKey) -> Option<PluginInstance> {
        self.entries.remove(key).map(|(_, instance)| instance)
    }

    /// Remove `instance` only if it is still the one cached under `key`
    pub fn evict_instance(&self, key: &PluginKey, instance: &PluginInstance) -> bool {
        self.entries
            .remove_if(key, |_, cached| cached.same_instance(instance))
            .is_some()
    }

    /// Evict every listed servlet name within a scope
    pub fn evict_names<'a>(&self, scope: &Scope, names: impl IntoIterator<Item = &'a str>) {
        let names: HashSet<&str> = names.into_iter().collect();
        self.entries
            .retain(|key, _| key.scope != *scope || !names.contains(key.name.as_str()));
    }

    /// Evict every instance of a scope
    pub fn clear_scope(&self, scope: &Scope) {
        self.entries.retain(|key, _| key.scope != *scope);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PluginManifest;
    use crate::testing::{install, EchoRuntime};
    use servlet_core::ServletRecord;

    fn instance(scope: &Scope, name: &str) -> PluginInstance {
        let record = ServletRecord::from_wire(scope.clone(), install(name, &["t"], false)).unwrap();
        PluginInstance::new(record, PluginManifest::default(), Box::new(EchoRuntime))
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let scope = Scope::default();
        let cache = PluginCache::new(Duration::from_secs(270));
        let key = PluginKey::new(&scope, "fetch");
        cache.insert(key.clone(), instance(&scope, "fetch"));

        tokio::time::advance(Duration::from_secs(269)).await;
        assert!(cache.get_fresh(&key).is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get_fresh(&key).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[tokio::test]
    async fn test_evict_instance_ignores_replaced_entry() {
        let scope = Scope::default();
        let cache = PluginCache::new(Duration::from_secs(270));
        let key = PluginKey::new(&scope, "fetch");
        let old = instance(&scope, "fetch");
        let new = instance(&scope, "fetch");
        cache.insert(key.clone(), old.clone());
        cache.insert(key.clone(), new.clone());

        assert!(!cache.evict_instance(&key, &old));
        assert!(cache.get_fresh(&key).unwrap().same_instance(&new));
        assert!(cache.evict_instance(&key, &new));
    }

    #[tokio::test]
    async fn test_evict_names_is_scoped() {
        let a = Scope::default();
        let b: Scope = servlet_core::IntoScope::into_scope("acme/work").unwrap();
        let cache = PluginCache::new(Duration::from_secs(270));
        for scope in [&a, &b] {
            for name in ["fetch", "img"] {
                cache.insert(PluginKey::new(scope, name), instance(scope, name));
            }
        }

        cache.evict_names(&a, ["fetch"]);
        assert_eq!(cache.len(), 3);
        assert!(cache.get_fresh(&PluginKey::new(&b, "fetch")).is_some());

        cache.clear_scope(&b);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_fresh(&PluginKey::new(&a, "img")).is_some());
    }
}
