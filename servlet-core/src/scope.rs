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


//! Profile slugs and cache scopes
//!
//! Every public entry point accepts anything implementing [`IntoScope`] and
//! normalizes it once. Caches and the gateway only ever see [`Scope`].

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Owner placeholder for the logged-in user
pub const CURRENT_USER: &str = "~";

/// Profile name used when none is configured
pub const DEFAULT_PROFILE: &str = "default";

/// `owner/name` identifier used for profiles and servlets
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug {
    owner: String,
    name: String,
}

impl Slug {
    /// Create a slug from its parts
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> CoreResult<Self> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() || name.is_empty() || owner.contains('/') || name.contains('/') {
            return Err(CoreError::InvalidSlug(format!("{}/{}", owner, name)));
        }
        Ok(Self { owner, name })
    }

    /// Parse `owner/name`, or a bare `name` owned by the current user
    pub fn parse(s: &str) -> CoreResult<Self> {
        let s = s.trim();
        match s.split_once('/') {
            Some((owner, name)) => Self::new(owner, name),
            None => Self::new(CURRENT_USER, s),
        }
        .map_err(|_| CoreError::InvalidSlug(s.to_string()))
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the owner is the `~` placeholder
    pub fn is_current_user(&self) -> bool {
        self.owner == CURRENT_USER
    }

    /// Replace the `~` placeholder with a concrete username
    pub fn with_owner(&self, username: &str) -> Self {
        if self.is_current_user() {
            Self {
                owner: username.to_string(),
                name: self.name.clone(),
            }
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for Slug {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Slug {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.to_string()
    }
}

/// Canonical cache scope: the profile whose install set is being viewed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope {
    profile: Slug,
}

impl Scope {
    pub fn new(profile: Slug) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &Slug {
        &self.profile
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self {
            profile: Slug {
                owner: CURRENT_USER.to_string(),
                name: DEFAULT_PROFILE.to_string(),
            },
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.profile.fmt(f)
    }
}

/// Conversion into a canonical [`Scope`]
pub trait IntoScope {
    fn into_scope(self) -> CoreResult<Scope>;
}

impl IntoScope for Scope {
    fn into_scope(self) -> CoreResult<Scope> {
        Ok(self)
    }
}

impl IntoScope for &Scope {
    fn into_scope(self) -> CoreResult<Scope> {
        Ok(self.clone())
    }
}

impl IntoScope for Slug {
    fn into_scope(self) -> CoreResult<Scope> {
        Ok(Scope::new(self))
    }
}

impl IntoScope for &Slug {
    fn into_scope(self) -> CoreResult<Scope> {
        Ok(Scope::new(self.clone()))
    }
}

impl IntoScope for &str {
    fn into_scope(self) -> CoreResult<Scope> {
        Slug::parse(self).map(Scope::new)
    }
}

impl IntoScope for String {
    fn into_scope(self) -> CoreResult<Scope> {
        self.as_str().into_scope()
    }
}

impl IntoScope for &String {
    fn into_scope(self) -> CoreResult<Scope> {
        self.as_str().into_scope()
    }
}
