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


//! HTTP implementation of the registry gateway

use super::{GatewayError, InstallListing, RegistryGateway, RevalidationToken};
use crate::config::ClientConfig;
use async_trait::async_trait;
use reqwest::header::{COOKIE, DATE, IF_MODIFIED_SINCE};
use reqwest::{redirect, RequestBuilder, Response, StatusCode};
use servlet_core::{InstallListWire, InstallRequest, OAuthEnvelope, OAuthInfo, Scope};
use std::time::Duration;

/// Registry gateway speaking the registry's REST API
pub struct HttpRegistryGateway {
    client: reqwest::Client,
    base_url: String,
    session_id: Option<String>,
}

impl HttpRegistryGateway {
    /// Create a gateway for `base_url`
    pub fn new(
        base_url: impl Into<String>,
        session_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        // The registry answers an unchanged install list with 301; following
        // it would turn "not modified" into a second request.
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_id,
        })
    }

    /// Create a gateway from client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, GatewayError> {
        Self::new(
            config.base_url.clone(),
            config.session_id.clone(),
            config.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn installations_url(&self, scope: &Scope) -> String {
        let profile = scope.profile();
        format!(
            "{}/api/profiles/{}/{}/installations",
            self.base_url,
            profile.owner(),
            profile.name()
        )
    }

    fn cookie(&self) -> Result<String, GatewayError> {
        self.session_id
            .as_ref()
            .map(|id| format!("sessionId={}", id))
            .ok_or(GatewayError::MissingSession)
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, GatewayError> {
        let response = request.header(COOKIE, self.cookie()?).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RegistryGateway for HttpRegistryGateway {
    async fn list_installs(
        &self,
        scope: &Scope,
        token: Option<&RevalidationToken>,
    ) -> Result<InstallListing, GatewayError> {
        let url = self.installations_url(scope);
        tracing::info!(%scope, %url, "Listing installed servlets");

        let mut request = self.client.get(&url).header(COOKIE, self.cookie()?);
        if let Some(token) = token {
            request = request.header(IF_MODIFIED_SINCE, token.as_str());
        }
        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::NOT_MODIFIED {
            tracing::debug!(%scope, ?token, "Install list unchanged");
            return Ok(InstallListing::NotModified);
        }
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let token = response
            .headers()
            .get(DATE)
            .and_then(|value| value.to_str().ok())
            .map(RevalidationToken::new);
        let body: InstallListWire = response.json().await.map_err(|e| GatewayError::Decode {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        Ok(InstallListing::Modified {
            installs: body.installs,
            token,
        })
    }

    async fn fetch_content(&self, address: &str) -> Result<Vec<u8>, GatewayError> {
        let url = format!("{}/api/c/{}", self.base_url, address);
        tracing::info!(%address, "Fetching servlet content");
        let response = self.send(self.client.get(&url), &url).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn fetch_oauth(&self, scope: &Scope, servlet: &str) -> Result<OAuthInfo, GatewayError> {
        let url = format!("{}/{}/oauth", self.installations_url(scope), servlet);
        tracing::debug!(%scope, %servlet, "Fetching OAuth credentials");
        let response = self.send(self.client.get(&url), &url).await?;
        let envelope: OAuthEnvelope = response.json().await.map_err(|e| GatewayError::Decode {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        Ok(envelope.oauth_info)
    }

    async fn install(&self, scope: &Scope, request: &InstallRequest) -> Result<(), GatewayError> {
        let url = self.installations_url(scope);
        tracing::info!(%scope, servlet = %request.servlet_slug, "Installing servlet");
        self.send(self.client.post(&url).json(request), &url).await?;
        Ok(())
    }

    async fn uninstall(&self, scope: &Scope, servlet: &str) -> Result<(), GatewayError> {
        let url = format!("{}/{}", self.installations_url(scope), servlet);
        tracing::info!(%scope, %servlet, "Uninstalling servlet");
        self.send(self.client.delete(&url), &url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installations_url() {
        let gateway = HttpRegistryGateway::new(
            "https://registry.example.com/",
            Some("s".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        let scope = Scope::new(servlet_core::Slug::parse("~/default").unwrap());
        assert_eq!(
            gateway.installations_url(&scope),
            "https://registry.example.com/api/profiles/~/default/installations"
        );
    }

    #[tokio::test]
    async fn test_missing_session_fails_before_request() {
        let gateway =
            HttpRegistryGateway::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
        let err = gateway.fetch_content("abc").await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingSession));
    }
}
