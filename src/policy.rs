//! Provisioning policy: the users, group, spaces, grants and page the site
//! should end up with.
//!
//! Policies are TOML. The built-in default lives in `policy/default.toml`.

use anyhow::{Context, Result};
use confkit::{Operation, Preset};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_POLICY: &str = include_str!("../policy/default.toml");

/// Policy consistency problems.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("unknown audience '{0}' (expected admin, first-standard, other-standard, all-standard, group or user:<name>)")]
    UnknownAudience(String),

    #[error("duplicate user '{0}'")]
    DuplicateUser(String),

    #[error("duplicate space key '{0}'")]
    DuplicateSpace(String),

    #[error("group name is empty")]
    EmptyGroup,

    #[error("page targets space '{0}' which the policy does not define")]
    UnknownPageSpace(String),

    #[error("audience refers to unknown user '{0}'")]
    UnknownUser(String),

    #[error("space '{0}' has an empty key or name")]
    IncompleteSpace(String),
}

/// Who a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Audience {
    /// The first admin user: the account running the provisioning.
    Admin,
    /// First non-admin user.
    FirstStandard,
    /// Every non-admin user but the first.
    OtherStandard,
    /// Every non-admin user.
    AllStandard,
    /// The policy group.
    Group,
    /// One user by username.
    User(String),
}

impl FromStr for Audience {
    type Err = PolicyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "first-standard" => Ok(Self::FirstStandard),
            "other-standard" => Ok(Self::OtherStandard),
            "all-standard" => Ok(Self::AllStandard),
            "group" => Ok(Self::Group),
            other => match other.strip_prefix("user:") {
                Some(name) if !name.is_empty() => Ok(Self::User(name.to_string())),
                _ => Err(PolicyError::UnknownAudience(other.to_string())),
            },
        }
    }
}

impl TryFrom<String> for Audience {
    type Error = PolicyError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Audience> for String {
    fn from(audience: Audience) -> Self {
        audience.to_string()
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::FirstStandard => write!(f, "first-standard"),
            Self::OtherStandard => write!(f, "other-standard"),
            Self::AllStandard => write!(f, "all-standard"),
            Self::Group => write!(f, "group"),
            Self::User(name) => write!(f, "user:{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPolicy {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPolicy {
    pub name: String,
    #[serde(default)]
    pub members: Vec<Audience>,
}

/// Permissions for an audience on a space. `read(space)` is always implied;
/// `preset` and `operations` add to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRule {
    pub audience: Audience,
    #[serde(default)]
    pub preset: Option<Preset>,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl GrantRule {
    /// Operations beyond the read baseline, preset first.
    pub fn extra_operations(&self) -> Vec<Operation> {
        let mut ops = self.preset.map(|p| p.operations()).unwrap_or_default();
        for op in &self.operations {
            if !ops.contains(op) {
                ops.push(*op);
            }
        }
        ops
    }

    /// Short description, e.g. `write` or `read-only + create(page)`.
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self.preset.iter().map(ToString::to_string).collect();
        parts.extend(self.operations.iter().map(ToString::to_string));
        if parts.is_empty() {
            "read-only".to_string()
        } else {
            parts.join(" + ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpacePolicy {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub grants: Vec<GrantRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePolicy {
    pub space: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Besides the admin, who may read the page.
    #[serde(default)]
    pub restrict_read_to: Vec<Audience>,
}

/// Target state of the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub users: Vec<UserPolicy>,
    pub group: Option<GroupPolicy>,
    #[serde(default)]
    pub spaces: Vec<SpacePolicy>,
    pub page: Option<PagePolicy>,
}

impl Policy {
    /// The built-in policy.
    pub fn builtin() -> Result<Self> {
        Self::parse(DEFAULT_POLICY).context("Built-in policy is invalid")
    }

    /// Parse and validate TOML.
    pub fn parse(content: &str) -> Result<Self> {
        let policy: Self = toml::from_str(content).context("Invalid policy format")?;
        policy.validate()?;
        Ok(policy)
    }

    /// Load from a file, or the built-in policy when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::builtin();
        };
        let content =
            fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
        let policy = Self::parse(&content).with_context(|| format!("Invalid policy {}", path.display()))?;
        log::debug!("Loaded policy from {}", path.display());
        Ok(policy)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> std::result::Result<(), PolicyError> {
        let mut usernames = HashSet::new();
        for user in &self.users {
            if !usernames.insert(user.username.as_str()) {
                return Err(PolicyError::DuplicateUser(user.username.clone()));
            }
        }

        if let Some(group) = &self.group
            && group.name.trim().is_empty()
        {
            return Err(PolicyError::EmptyGroup);
        }

        let mut keys = HashSet::new();
        for space in &self.spaces {
            if space.key.trim().is_empty() || space.name.trim().is_empty() {
                return Err(PolicyError::IncompleteSpace(space.key.clone()));
            }
            if !keys.insert(space.key.as_str()) {
                return Err(PolicyError::DuplicateSpace(space.key.clone()));
            }
        }

        if let Some(page) = &self.page
            && !keys.contains(page.space.as_str())
        {
            return Err(PolicyError::UnknownPageSpace(page.space.clone()));
        }

        for audience in self.audiences() {
            if let Audience::User(name) = audience
                && !usernames.contains(name.as_str())
            {
                return Err(PolicyError::UnknownUser(name.clone()));
            }
        }
        Ok(())
    }

    fn audiences(&self) -> impl Iterator<Item = &Audience> {
        let members = self.group.iter().flat_map(|g| g.members.iter());
        let grants = self.spaces.iter().flat_map(|s| s.grants.iter().map(|g| &g.audience));
        let page = self.page.iter().flat_map(|p| p.restrict_read_to.iter());
        members.chain(grants).chain(page)
    }

    /// Look up a space by key.
    pub fn space(&self, key: &str) -> Option<&SpacePolicy> {
        self.spaces.iter().find(|s| s.key == key)
    }
}
