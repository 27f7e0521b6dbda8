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


//! Runtime manifests
//!
//! A manifest is everything the runtime needs to instantiate one servlet:
//! WASM modules, sandbox permissions and the config map the guest reads.

use servlet_core::{CoreResult, OAuthInfo, ServletRecord};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a WASM module comes from
#[derive(Clone)]
pub enum WasmSource {
    Data(Arc<[u8]>),
    Path(PathBuf),
    Url(String),
}

impl fmt::Debug for WasmSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WasmSource::Data(bytes) => write!(f, "Data({} bytes)", bytes.len()),
            WasmSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            WasmSource::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

/// A WASM module, optionally named so other modules can link against it
#[derive(Debug, Clone)]
pub struct WasmModule {
    pub source: WasmSource,
    pub name: Option<String>,
}

impl WasmModule {
    pub fn data(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            source: WasmSource::Data(bytes.into()),
            name: None,
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: WasmSource::Path(path.into()),
            name: None,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            source: WasmSource::Url(url.into()),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Description used to instantiate one runtime
#[derive(Clone, Default)]
pub struct PluginManifest {
    /// Primary module first, then any extra modules
    pub wasm: Vec<WasmModule>,
    /// Host path -> guest path
    pub allowed_paths: BTreeMap<String, String>,
    pub allowed_hosts: Vec<String>,
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl PluginManifest {
    /// Assemble the manifest for `record`.
    ///
    /// The OAuth access token, when given, overwrites any config key of the
    /// same name. The record's own settings are left untouched.
    pub fn for_record(
        record: &ServletRecord,
        content: Arc<[u8]>,
        extra_modules: &[WasmModule],
        oauth: Option<&OAuthInfo>,
    ) -> CoreResult<Self> {
        let permissions = record.settings.require_permissions(&record.name)?;

        let mut wasm = Vec::with_capacity(1 + extra_modules.len());
        wasm.push(WasmModule::data(content));
        wasm.extend(extra_modules.iter().cloned());

        let mut config = record.settings.config.clone();
        if let Some(oauth) = oauth {
            config.insert(
                oauth.config_name.clone(),
                serde_json::Value::String(oauth.access_token.clone()),
            );
        }

        Ok(Self {
            wasm,
            allowed_paths: permissions.filesystem.volumes.clone(),
            allowed_hosts: permissions.network.domains.clone(),
            config,
        })
    }

    /// String value of a config key
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }
}

impl fmt::Debug for PluginManifest {
    // Config may hold credentials; only keys are shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManifest")
            .field("wasm", &self.wasm)
            .field("allowed_paths", &self.allowed_paths)
            .field("allowed_hosts", &self.allowed_hosts)
            .field("config_keys", &self.config.keys().collect::<Vec<_>>())
            .finish()
    }
}
