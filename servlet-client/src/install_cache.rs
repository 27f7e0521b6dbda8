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


//! Install cache
//!
//! Holds the last known install set of each scope together with the
//! revalidation token it was fetched with. A snapshot is immutable; a refresh
//! swaps in a whole new one.

use crate::gateway::RevalidationToken;
use parking_lot::RwLock;
use servlet_core::{Scope, ServletRecord, ToolDescriptor};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// The installs of one scope, in registry order
#[derive(Debug, Default)]
pub struct InstallSnapshot {
    records: Vec<Arc<ServletRecord>>,
    by_name: HashMap<String, usize>,
}

impl InstallSnapshot {
    /// Build a snapshot. A name listed twice keeps its last record.
    pub fn new(records: Vec<Arc<ServletRecord>>) -> Self {
        let mut last_index: HashMap<&str, usize> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            last_index.insert(record.name.as_str(), i);
        }
        let keep: HashSet<usize> = last_index.into_values().collect();

        let records: Vec<_> = records
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep.contains(i))
            .map(|(_, record)| record)
            .collect();
        let by_name = records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.name.clone(), i))
            .collect();

        Self { records, by_name }
    }

    pub fn records(&self) -> &[Arc<ServletRecord>] {
        &self.records
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ServletRecord>> {
        self.by_name.get(name).map(|&i| &self.records[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Servlets exposing a tool named `name`, in registry order
    pub fn tool_owners(&self, name: &str) -> Vec<&ToolDescriptor> {
        self.records.iter().filter_map(|r| r.tool(name)).collect()
    }

    /// First tool named `name` in registry order
    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.records.iter().find_map(|r| r.tool(name))
    }

    /// All tools by name; on collisions the servlet listed first wins
    pub fn tools(&self) -> BTreeMap<String, ToolDescriptor> {
        let mut tools = BTreeMap::new();
        for record in &self.records {
            for (name, tool) in record.tools() {
                tools.entry(name.clone()).or_insert_with(|| tool.clone());
            }
        }
        tools
    }
}

#[derive(Debug, Clone)]
struct ScopeEntry {
    snapshot: Arc<InstallSnapshot>,
    token: Option<RevalidationToken>,
}

/// Per-scope install snapshots and revalidation tokens
#[derive(Debug, Default)]
pub struct InstallCache {
    scopes: RwLock<HashMap<Scope, ScopeEntry>>,
}

impl InstallCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached snapshot for a scope
    pub fn snapshot(&self, scope: &Scope) -> Option<Arc<InstallSnapshot>> {
        self.scopes.read().get(scope).map(|e| e.snapshot.clone())
    }

    /// Revalidation token for a scope
    pub fn token(&self, scope: &Scope) -> Option<RevalidationToken> {
        self.scopes.read().get(scope).and_then(|e| e.token.clone())
    }

    /// Snapshot and token, read together
    pub fn entry(&self, scope: &Scope) -> Option<(Arc<InstallSnapshot>, Option<RevalidationToken>)> {
        self.scopes
            .read()
            .get(scope)
            .map(|e| (e.snapshot.clone(), e.token.clone()))
    }

    /// Replace a scope's snapshot and token, returning the previous snapshot
    pub fn replace(
        &self,
        scope: &Scope,
        snapshot: Arc<InstallSnapshot>,
        token: Option<RevalidationToken>,
    ) -> Option<Arc<InstallSnapshot>> {
        self.scopes
            .write()
            .insert(scope.clone(), ScopeEntry { snapshot, token })
            .map(|e| e.snapshot)
    }

    /// Whether `record` is the one currently held under its name
    pub fn is_current(&self, record: &Arc<ServletRecord>) -> bool {
        self.scopes
            .read()
            .get(&record.scope)
            .and_then(|e| e.snapshot.get(&record.name).cloned())
            .map(|current| Arc::ptr_eq(&current, record))
            .unwrap_or(false)
    }

    /// Drop a scope's snapshot and token
    pub fn clear(&self, scope: &Scope) -> Option<Arc<InstallSnapshot>> {
        self.scopes.write().remove(scope).map(|e| e.snapshot)
    }

    pub fn clear_all(&self) {
        self.scopes.write().clear();
    }

    /// Number of cached scopes
    pub fn scope_count(&self) -> usize {
        self.scopes.read().len()
    }

    /// Number of cached records across scopes
    pub fn record_count(&self) -> usize {
        self.scopes.read().values().map(|e| e.snapshot.len()).sum()
    }
}
