//! Core types for provisioning: subjects, operations, resource handles and
//! per-call outcomes.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

// =============================================================================
// Requests
// =============================================================================

/// HTTP verbs used against the REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    /// Upper-case verb as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials for the Confluence REST API.
///
/// Immutable once built; the token is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    base_url: String,
    email: String,
    api_token: String,
}

impl Credentials {
    /// Build credentials, rejecting empty fields.
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        api_token: impl Into<String>,
    ) -> crate::Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        let email = email.into().trim().to_string();
        let api_token = api_token.into().trim().to_string();

        for (name, value) in [
            ("base url", &base_url),
            ("email", &email),
            ("api token", &api_token),
        ] {
            if value.is_empty() {
                return Err(crate::Error::validation(format!("missing {name}")));
            }
        }

        Ok(Self {
            base_url,
            email,
            api_token,
        })
    }

    /// Configured site address, without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Principal the requests are made as.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    pub(crate) fn api_token(&self) -> &str {
        &self.api_token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Subjects and operations
// =============================================================================

/// An entity that can hold permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Subject {
    /// A user, identified by platform account id.
    User {
        #[serde(rename = "identifier")]
        account_id: String,
    },
    /// A group, identified by platform group id.
    Group {
        #[serde(rename = "identifier")]
        id: String,
    },
    /// Anonymous access.
    Anonymous,
}

impl Subject {
    /// User subject for an account id.
    pub fn user(account_id: impl Into<String>) -> Self {
        Self::User {
            account_id: account_id.into(),
        }
    }

    /// Group subject for a group id.
    pub fn group(id: impl Into<String>) -> Self {
        Self::Group { id: id.into() }
    }

    /// Wire value of the `type` field.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Group { .. } => "group",
            Self::Anonymous => "anonymous",
        }
    }

    /// Platform identifier, `None` for anonymous.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::User { account_id } => Some(account_id),
            Self::Group { id } => Some(id),
            Self::Anonymous => None,
        }
    }

    /// Reject subjects that carry an empty identifier.
    pub fn validate(&self) -> crate::Result<()> {
        match self.identifier() {
            Some(id) if id.trim().is_empty() => Err(crate::Error::validation(format!(
                "{} subject has an empty identifier",
                self.type_name()
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identifier() {
            Some(id) => write!(f, "{}:{}", self.type_name(), id),
            None => f.write_str(self.type_name()),
        }
    }
}

/// Permission capability keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKey {
    Read,
    Create,
    Delete,
    Export,
    Administer,
    RestrictContent,
    Archive,
}

/// What an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Space,
    Page,
    Blogpost,
    Comment,
    Attachment,
}

/// One grantable capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    pub key: OperationKey,
    pub target: Target,
}

impl Operation {
    /// Baseline operation every subject needs before any other grant.
    pub const READ_SPACE: Self = Self::new(OperationKey::Read, Target::Space);

    #[must_use]
    pub const fn new(key: OperationKey, target: Target) -> Self {
        Self { key, target }
    }

    /// Whether this is the read-space baseline.
    #[must_use]
    pub fn is_baseline(&self) -> bool {
        *self == Self::READ_SPACE
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = serde_json::to_value(self.key).ok();
        let target = serde_json::to_value(self.target).ok();
        match (key, target) {
            (Some(Value::String(k)), Some(Value::String(t))) => write!(f, "{k}({t})"),
            _ => write!(f, "{:?}({:?})", self.key, self.target),
        }
    }
}

// =============================================================================
// Resources
// =============================================================================

/// Kinds of resources the reconciler manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Group,
    Space,
    Content,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => write!(f, "group"),
            Self::Space => write!(f, "space"),
            Self::Content => write!(f, "content"),
        }
    }
}

/// Desired resource, with what is needed to create or find it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResourceSpec {
    Group {
        name: String,
    },
    Space {
        key: String,
        name: String,
        #[serde(default)]
        description: String,
    },
}

impl ResourceSpec {
    pub fn group(name: impl Into<String>) -> Self {
        Self::Group { name: name.into() }
    }

    pub fn space(key: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Space {
            key: key.into(),
            name: name.into(),
            description: description.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Group { .. } => ResourceKind::Group,
            Self::Space { .. } => ResourceKind::Space,
        }
    }

    /// Key for spaces, name for groups.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Group { name } => name,
            Self::Space { key, .. } => key,
        }
    }

    /// Display name used for name-based discovery.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Group { name } | Self::Space { name, .. } => name,
        }
    }

    /// JSON body for the create call.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Group { name } => json!({ "name": name }),
            Self::Space {
                key,
                name,
                description,
            } => json!({
                "key": key,
                "name": name,
                "description": { "value": description, "representation": "storage" },
            }),
        }
    }
}

/// How a handle came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Created,
    Adopted,
}

/// Stable reference to a remote resource, whichever path produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    /// Space key, group name or content title.
    pub key: String,
    /// Platform id, when the platform reported one.
    pub id: Option<String>,
    pub provenance: Provenance,
    /// Raw attributes from the platform.
    #[serde(default)]
    pub attributes: Value,
}

impl ResourceHandle {
    /// Build a handle from a platform object, falling back to `fallback_key`
    /// when the object carries no `key`/`name`.
    #[must_use]
    pub fn from_value(kind: ResourceKind, fallback_key: &str, provenance: Provenance, value: Value) -> Self {
        let key = string_field(&value, "key")
            .or_else(|| string_field(&value, "name"))
            .unwrap_or_else(|| fallback_key.to_string());
        let id = string_field(&value, "id");
        Self {
            kind,
            key,
            id,
            provenance,
            attributes: value,
        }
    }

    #[must_use]
    pub fn is_adopted(&self) -> bool {
        self.provenance == Provenance::Adopted
    }
}

/// Read a field that may be a string or a number.
pub(crate) fn string_field(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Effect of an idempotent mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    /// The call changed remote state.
    Applied,
    /// The desired state was already in place.
    AlreadyPresent,
}

/// Status of one grant or restriction call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Applied,
    AlreadyPresent,
    Failed { reason: String },
}

impl OutcomeStatus {
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Fold a call result: conflicts count as success.
    pub fn from_result<T>(result: &crate::Result<T>) -> Self {
        match result {
            Ok(_) => Self::Applied,
            Err(e) if e.is_conflict() => Self::AlreadyPresent,
            Err(e) => Self::Failed {
                reason: e.to_string(),
            },
        }
    }
}

impl From<Change> for OutcomeStatus {
    fn from(change: Change) -> Self {
        match change {
            Change::Applied => Self::Applied,
            Change::AlreadyPresent => Self::AlreadyPresent,
        }
    }
}

/// Result of one grant operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub operation: Operation,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl OperationOutcome {
    #[must_use]
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of one per-subject call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectOutcome {
    pub subject: Subject,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl SubjectOutcome {
    #[must_use]
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }
}
