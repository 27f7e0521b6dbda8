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


//! Client error types

use crate::gateway::GatewayError;
use crate::runtime::RuntimeError;
use servlet_core::CoreError;
use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client
///
/// Gateway and runtime failures pass through unchanged; this layer only adds
/// lookup, configuration and protocol errors of its own.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] GatewayError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Configuration error for servlet {servlet}: {reason}")]
    Configuration { servlet: String, reason: String },

    #[error("Protocol inconsistency for scope {scope}: {reason}")]
    ProtocolInconsistency { scope: String, reason: String },

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Malformed registry payload: {0}")]
    Wire(String),
}

impl From<CoreError> for ClientError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSlug(slug) => ClientError::InvalidScope(slug),
            CoreError::Configuration { servlet, reason } => {
                ClientError::Configuration { servlet, reason }
            }
            CoreError::Wire(reason) => ClientError::Wire(reason),
        }
    }
}
