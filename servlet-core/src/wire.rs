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


//! Registry wire types
//!
//! Only the fields this client consumes are modeled; everything else in the
//! registry payloads is ignored.

use serde::{Deserialize, Serialize};

use crate::servlet::ServletSettings;

/// Body of an install list response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallListWire {
    pub installs: Vec<InstallWire>,
}

/// One installed servlet as reported by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallWire {
    pub binding: BindingWire,
    pub servlet: ServletWire,
    #[serde(default)]
    pub settings: ServletSettings,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingWire {
    pub id: String,
    #[serde(rename = "contentAddress")]
    pub content_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServletWire {
    pub slug: String,
    pub has_client: bool,
    #[serde(default)]
    pub meta: ServletMetaWire,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServletMetaWire {
    #[serde(default)]
    pub schema: Option<ToolSchemaWire>,
}

/// Either a list of tools or a single tool object
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolSchemaWire {
    Many { tools: Vec<ToolWire> },
    One(ToolWire),
}

impl ToolSchemaWire {
    pub fn into_tools(self) -> Vec<ToolWire> {
        match self {
            ToolSchemaWire::Many { tools } => tools,
            ToolSchemaWire::One(tool) => vec![tool],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolWire {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_object")]
    pub input_schema: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Short-lived OAuth credentials for a servlet
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthInfo {
    /// Config key the servlet reads its access token from
    pub config_name: String,
    pub access_token: String,
}

impl std::fmt::Debug for OAuthInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthInfo")
            .field("config_name", &self.config_name)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Envelope of the OAuth endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthEnvelope {
    pub oauth_info: OAuthInfo,
}

/// Request body for installing a servlet into a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallRequest {
    pub servlet_slug: String,
    pub settings: serde_json::Value,
    pub allow_update: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl InstallRequest {
    pub fn new(servlet_slug: impl Into<String>) -> Self {
        Self {
            servlet_slug: servlet_slug.into(),
            settings: empty_object(),
            allow_update: true,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_allow_update(mut self, allow_update: bool) -> Self {
        self.allow_update = allow_update;
        self
    }

    /// Set one settings section (`config`, `network` or `filesystem`)
    pub fn with_section(mut self, key: &str, value: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = &mut self.settings {
            map.insert(key.to_string(), value);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_with_tool_list() {
        let schema: ToolSchemaWire = serde_json::from_value(json!({
            "tools": [
                {"name": "a", "description": "first", "inputSchema": {"type": "object"}},
                {"name": "b"}
            ]
        }))
        .unwrap();
        let tools = schema.into_tools();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[1].description, "");
        assert_eq!(tools[1].input_schema, json!({}));
    }

    #[test]
    fn test_schema_with_single_tool() {
        let schema: ToolSchemaWire = serde_json::from_value(json!({
            "name": "fetch",
            "description": "fetch a url",
            "inputSchema": {"type": "object", "properties": {"url": {"type": "string"}}}
        }))
        .unwrap();
        let tools = schema.into_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "fetch");
    }

    #[test]
    fn test_install_list_parses_registry_payload() {
        let list: InstallListWire = serde_json::from_value(json!({
            "installs": [{
                "name": "img",
                "binding": {"id": "b1", "contentAddress": "abc123"},
                "servlet": {
                    "slug": "acme/img",
                    "has_client": true,
                    "meta": {"schema": {"name": "compress", "description": "", "inputSchema": {}}}
                },
                "settings": {
                    "permissions": {
                        "filesystem": {"volumes": {}},
                        "network": {"domains": ["cdn.example.com"]}
                    },
                    "config": {"level": "high"}
                }
            }]
        }))
        .unwrap();

        let install = &list.installs[0];
        assert_eq!(install.binding.content_address, "abc123");
        assert!(install.servlet.has_client);
        let perms = install.settings.permissions.as_ref().unwrap();
        assert_eq!(
            perms.network.as_ref().unwrap().domains,
            vec!["cdn.example.com".to_string()]
        );
    }

    #[test]
    fn test_install_list_requires_installs_key() {
        let result = serde_json::from_value::<InstallListWire>(json!({"error": "session expired"}));
        assert!(result.is_err());

        let empty: InstallListWire = serde_json::from_value(json!({"installs": []})).unwrap();
        assert!(empty.installs.is_empty());
    }

    #[test]
    fn test_servlet_requires_has_client() {
        let result = serde_json::from_value::<ServletWire>(json!({"slug": "acme/img", "meta": {}}));
        assert!(result.unwrap_err().to_string().contains("has_client"));
    }

    #[test]
    fn test_oauth_debug_hides_token() {
        let info = OAuthInfo {
            config_name: "token".to_string(),
            access_token: "s3cr3t".to_string(),
        };
        assert!(!format!("{:?}", info).contains("s3cr3t"));
    }

    #[test]
    fn test_install_request_sections() {
        let req = InstallRequest::new("acme/img")
            .with_name("img")
            .with_section("network", json!({"domains": ["cdn.example.com"]}));
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["name"], "img");
        assert_eq!(body["settings"]["network"]["domains"][0], "cdn.example.com");
        assert_eq!(body["allow_update"], true);
    }
}
