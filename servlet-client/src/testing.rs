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


//! Test doubles for the gateway and runtime

use crate::client::ServletClient;
use crate::config::ClientConfig;
use crate::gateway::{GatewayError, InstallListing, RegistryGateway, RevalidationToken};
use crate::manifest::PluginManifest;
use crate::runtime::{HostFunction, PluginRuntime, RuntimeError, RuntimeFactory};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use servlet_core::{
    CallResult, ContentBlock, InstallRequest, InstallWire, OAuthInfo, Scope,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const OAUTH_CONFIG_NAME: &str = "API_TOKEN";

/// Wire install with an empty permission block
pub fn install(name: &str, tools: &[&str], has_oauth: bool) -> InstallWire {
    install_with_settings(
        name,
        tools,
        has_oauth,
        json!({"permissions": {"filesystem": {"volumes": {}}, "network": {"domains": []}}}),
    )
}

pub fn install_with_settings(
    name: &str,
    tools: &[&str],
    has_oauth: bool,
    settings: serde_json::Value,
) -> InstallWire {
    let tools: Vec<_> = tools
        .iter()
        .map(|t| json!({"name": t, "description": format!("{} tool", t), "inputSchema": {}}))
        .collect();
    serde_json::from_value(json!({
        "name": name,
        "binding": {"id": format!("binding-{}", name), "contentAddress": format!("addr-{}", name)},
        "servlet": {
            "slug": format!("acme/{}", name),
            "has_client": has_oauth,
            "meta": {"schema": {"tools": tools}}
        },
        "settings": settings
    }))
    .unwrap()
}

#[derive(Default)]
struct GatewayState {
    installs: Vec<InstallWire>,
    version: u64,
    forced_not_modified: usize,
    fail_oauth: bool,
    fail_list: bool,
}

/// In-memory registry that honors revalidation tokens
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<GatewayState>,
    pub list_calls: AtomicUsize,
    pub conditional_list_calls: AtomicUsize,
    pub content_fetches: AtomicUsize,
    pub oauth_fetches: AtomicUsize,
    pub install_calls: AtomicUsize,
    pub uninstall_calls: AtomicUsize,
}

impl MockGateway {
    pub fn with_installs(installs: Vec<InstallWire>) -> Arc<Self> {
        let gateway = Self::default();
        gateway.set_installs(installs);
        Arc::new(gateway)
    }

    /// Replace the server-side install set
    pub fn set_installs(&self, installs: Vec<InstallWire>) {
        let mut state = self.state.lock();
        state.installs = installs;
        state.version += 1;
    }

    /// Mark the install set as changed without altering it
    pub fn touch(&self) {
        self.state.lock().version += 1;
    }

    /// Answer the next `n` list requests with "not modified"
    pub fn force_not_modified(&self, n: usize) {
        self.state.lock().forced_not_modified = n;
    }

    pub fn fail_oauth(&self, fail: bool) {
        self.state.lock().fail_oauth = fail;
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.lock().fail_list = fail;
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryGateway for MockGateway {
    async fn list_installs(
        &self,
        _scope: &Scope,
        token: Option<&RevalidationToken>,
    ) -> Result<InstallListing, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if token.is_some() {
            self.conditional_list_calls.fetch_add(1, Ordering::SeqCst);
        }

        let mut state = self.state.lock();
        if state.fail_list {
            return Err(GatewayError::Status {
                status: 503,
                url: "mock://installations".to_string(),
            });
        }
        if state.forced_not_modified > 0 {
            state.forced_not_modified -= 1;
            return Ok(InstallListing::NotModified);
        }

        let current = RevalidationToken::new(format!("v{}", state.version));
        if token == Some(&current) {
            return Ok(InstallListing::NotModified);
        }
        Ok(InstallListing::Modified {
            installs: state.installs.clone(),
            token: Some(current),
        })
    }

    async fn fetch_content(&self, address: &str) -> Result<Vec<u8>, GatewayError> {
        self.content_fetches.fetch_add(1, Ordering::SeqCst);
        let mut bytes = b"\0asm".to_vec();
        bytes.extend_from_slice(address.as_bytes());
        Ok(bytes)
    }

    async fn fetch_oauth(&self, _scope: &Scope, servlet: &str) -> Result<OAuthInfo, GatewayError> {
        let n = self.oauth_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.state.lock().fail_oauth {
            return Err(GatewayError::Status {
                status: 500,
                url: format!("mock://oauth/{}", servlet),
            });
        }
        Ok(OAuthInfo {
            config_name: OAUTH_CONFIG_NAME.to_string(),
            access_token: format!("token-{}", n),
        })
    }

    async fn install(&self, _scope: &Scope, _request: &InstallRequest) -> Result<(), GatewayError> {
        self.install_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn uninstall(&self, _scope: &Scope, _servlet: &str) -> Result<(), GatewayError> {
        self.uninstall_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Runtime that echoes the tool name and input
pub struct EchoRuntime;

#[async_trait]
impl PluginRuntime for EchoRuntime {
    async fn call(
        &self,
        tool: &str,
        input: serde_json::Value,
    ) -> Result<CallResult, RuntimeError> {
        if tool == "explode" {
            return Err(RuntimeError::Call {
                tool: tool.to_string(),
                message: "guest trapped".to_string(),
            });
        }
        Ok(CallResult::success(vec![ContentBlock::text(format!(
            "{}:{}",
            tool, input
        ))]))
    }
}

/// Factory recording every manifest it instantiates
#[derive(Default)]
pub struct MockFactory {
    pub manifests: Mutex<Vec<PluginManifest>>,
    pub function_counts: Mutex<Vec<usize>>,
    pub build_delay: Option<Duration>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            build_delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn builds(&self) -> usize {
        self.manifests.lock().len()
    }

    pub fn last_manifest(&self) -> Option<PluginManifest> {
        self.manifests.lock().last().cloned()
    }
}

#[async_trait]
impl RuntimeFactory for MockFactory {
    async fn instantiate(
        &self,
        manifest: &PluginManifest,
        functions: &[HostFunction],
        _wasi: bool,
    ) -> Result<Box<dyn PluginRuntime>, RuntimeError> {
        if let Some(delay) = self.build_delay {
            tokio::time::sleep(delay).await;
        }
        self.manifests.lock().push(manifest.clone());
        self.function_counts.lock().push(functions.len());
        Ok(Box::new(EchoRuntime))
    }
}

/// Client wired to fresh mocks
pub fn client_with(
    gateway: Arc<MockGateway>,
    factory: Arc<MockFactory>,
) -> ServletClient {
    ServletClient::new(ClientConfig::default(), gateway, factory).unwrap()
}
