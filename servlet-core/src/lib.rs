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


//! Servlet Core
//!
//! Data model shared by the servlet client: scopes, installed servlet
//! records, their tools, registry wire types and tool call results.

pub mod call;
pub mod error;
pub mod scope;
pub mod servlet;
pub mod wire;

pub use call::{CallResult, CallStatus, ContentBlock};
pub use error::{CoreError, CoreResult};
pub use scope::{IntoScope, Scope, Slug, CURRENT_USER, DEFAULT_PROFILE};
pub use servlet::{
    FilesystemPermissions, NetworkPermissions, Permissions, RequiredPermissions, ServletRecord,
    ServletSettings, ToolDescriptor,
};
pub use wire::{
    BindingWire, InstallListWire, InstallRequest, InstallWire, OAuthEnvelope, OAuthInfo,
    ServletMetaWire, ServletWire, ToolSchemaWire, ToolWire,
};
