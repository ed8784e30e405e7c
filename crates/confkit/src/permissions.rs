//! Space permission grants.
//!
//! [`GrantSequencer::grant`] always sends `read(space)` first and then every
//! other operation in its own request. Multi-operation bodies are avoided
//! because the platform answers some operation combinations with a server
//! error; one call per operation also gives per-operation outcomes.

use crate::backend::{Api, ApiRequest};
use crate::error::{Error, Result};
use crate::types::{Operation, OperationKey, OperationOutcome, OutcomeStatus, Subject, Target};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Body of the space permission endpoint.
///
/// Exactly one operation is sent as `operation: {...}`, more than one as
/// `operations: [...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionBody<'a> {
    subject: &'a Subject,
    operations: &'a [Operation],
}

impl<'a> PermissionBody<'a> {
    /// # Errors
    ///
    /// [`Error::Validation`] for an empty operation list or a subject with
    /// an empty identifier.
    pub fn new(subject: &'a Subject, operations: &'a [Operation]) -> Result<Self> {
        if operations.is_empty() {
            return Err(Error::validation("operations must be a non-empty list"));
        }
        subject.validate()?;
        Ok(Self { subject, operations })
    }
}

impl Serialize for PermissionBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("subject", self.subject)?;
        match self.operations {
            [single] => map.serialize_entry("operation", single)?,
            many => map.serialize_entry("operations", many)?,
        }
        map.end()
    }
}

/// Send one permission request for `operations`.
///
/// # Errors
///
/// [`Error::Validation`] without any request for empty `operations` or an
/// empty space key; otherwise whatever the backend returns.
pub fn add_space_permission(
    api: &dyn Api,
    space_key: &str,
    subject: &Subject,
    operations: &[Operation],
) -> Result<serde_json::Value> {
    if space_key.trim().is_empty() {
        return Err(Error::validation("space key is empty"));
    }
    let body = PermissionBody::new(subject, operations)?;
    let request = ApiRequest::post(&format!("space/{space_key}/permission")).json(serde_json::to_value(body)?);
    api.execute(&request)
}

/// Operations in the order they are sent: `read(space)` first, then the
/// rest in caller order without repeating the baseline.
#[must_use]
pub fn planned_operations(extra: &[Operation]) -> Vec<Operation> {
    let mut plan = Vec::with_capacity(extra.len() + 1);
    plan.push(Operation::READ_SPACE);
    for op in extra {
        if !plan.contains(op) {
            plan.push(*op);
        }
    }
    plan
}

/// Named operation sets layered on top of the read baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// `administer(space)`.
    SpaceAdmin,
    /// Only the read baseline.
    ReadOnly,
    /// Create pages, blog posts, comments, attachments; delete pages.
    Write,
}

impl Preset {
    /// Operations beyond the read baseline.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        match self {
            Self::SpaceAdmin => vec![Operation::new(OperationKey::Administer, Target::Space)],
            Self::ReadOnly => Vec::new(),
            Self::Write => vec![
                Operation::new(OperationKey::Create, Target::Page),
                Operation::new(OperationKey::Create, Target::Blogpost),
                Operation::new(OperationKey::Create, Target::Comment),
                Operation::new(OperationKey::Create, Target::Attachment),
                Operation::new(OperationKey::Delete, Target::Page),
            ],
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpaceAdmin => "space-admin",
            Self::ReadOnly => "read-only",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "space-admin" | "admin" => Ok(Self::SpaceAdmin),
            "read-only" | "read" => Ok(Self::ReadOnly),
            "write" => Ok(Self::Write),
            other => Err(Error::validation(format!("unknown permission preset '{other}'"))),
        }
    }
}

/// Outcomes of one [`GrantSequencer::grant`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantOutcome {
    pub space_key: String,
    pub subject: Subject,
    pub outcomes: Vec<OperationOutcome>,
}

impl GrantOutcome {
    /// Operations that ended granted or already present.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.ok()).count()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.succeeded() == self.total()
    }

    /// Failed operations with reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&Operation, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.status.reason().map(|r| (&o.operation, r)))
    }
}

/// Applies grants one operation per request, read first.
pub struct GrantSequencer<'a> {
    api: &'a dyn Api,
}

impl<'a> GrantSequencer<'a> {
    pub fn new(api: &'a dyn Api) -> Self {
        Self { api }
    }

    /// Grant `read(space)` plus `extra` to `subject` on `space_key`.
    ///
    /// Conflicts count as success. A failing operation is recorded and the
    /// remaining ones are still sent.
    ///
    /// # Errors
    ///
    /// Only [`Error::Validation`], before any request, for an empty space
    /// key or an unresolved subject.
    pub fn grant(&self, space_key: &str, subject: &Subject, extra: &[Operation]) -> Result<GrantOutcome> {
        if space_key.trim().is_empty() {
            return Err(Error::validation("space key is empty"));
        }
        subject.validate()?;

        let outcomes = planned_operations(extra)
            .into_iter()
            .map(|operation| {
                let result = add_space_permission(self.api, space_key, subject, std::slice::from_ref(&operation));
                let status = OutcomeStatus::from_result(&result);
                match &status {
                    OutcomeStatus::Applied => log::info!("granted {operation} to {subject} on {space_key}"),
                    OutcomeStatus::AlreadyPresent => {
                        log::info!("{operation} already granted to {subject} on {space_key}");
                    }
                    OutcomeStatus::Failed { reason } => {
                        log::warn!("failed to grant {operation} to {subject} on {space_key}: {reason}");
                    }
                }
                OperationOutcome { operation, status }
            })
            .collect();

        Ok(GrantOutcome {
            space_key: space_key.to_string(),
            subject: subject.clone(),
            outcomes,
        })
    }

    /// Grant a named preset.
    pub fn grant_preset(&self, space_key: &str, subject: &Subject, preset: Preset) -> Result<GrantOutcome> {
        self.grant(space_key, subject, &preset.operations())
    }

    /// `administer(space)` after read.
    pub fn grant_space_admin(&self, space_key: &str, subject: &Subject) -> Result<GrantOutcome> {
        self.grant_preset(space_key, subject, Preset::SpaceAdmin)
    }

    /// Read only.
    pub fn grant_read_only(&self, space_key: &str, subject: &Subject) -> Result<GrantOutcome> {
        self.grant_preset(space_key, subject, Preset::ReadOnly)
    }

    /// Content creation rights after read.
    pub fn grant_write(&self, space_key: &str, subject: &Subject) -> Result<GrantOutcome> {
        self.grant_preset(space_key, subject, Preset::Write)
    }
}
