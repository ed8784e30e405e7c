//! What a provisioning run did, step by step.

use confkit::{Error, GrantOutcome, OutcomeStatus, ResourceHandle};
use serde::Serialize;
use std::fmt;

/// Workflow stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Users,
    Group,
    Spaces,
    Permissions,
    Content,
}

impl Stage {
    pub const ALL: [Self; 5] = [Self::Users, Self::Group, Self::Spaces, Self::Permissions, Self::Content];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Users => "Users",
            Self::Group => "Group",
            Self::Spaces => "Spaces",
            Self::Permissions => "Space permissions",
            Self::Content => "Content",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepResult {
    /// A new resource was created.
    Created,
    /// An existing resource was taken over.
    Adopted,
    /// A membership, grant or restriction was added.
    Applied,
    /// The desired state was already in place.
    AlreadyPresent,
    /// Not attempted.
    Skipped { reason: String },
    Failed { reason: String },
}

impl StepResult {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped { reason: reason.into() }
    }

    pub fn failed(reason: impl fmt::Display) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }

    /// Failure from a platform error, with what to do about it.
    pub fn from_error(err: &Error) -> Self {
        Self::Failed {
            reason: format!("{err} ({})", err.category().advice()),
        }
    }

    /// Created or adopted, from a reconciled handle.
    pub fn from_handle(handle: &ResourceHandle) -> Self {
        if handle.is_adopted() { Self::Adopted } else { Self::Created }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl From<&OutcomeStatus> for StepResult {
    fn from(status: &OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Applied => Self::Applied,
            OutcomeStatus::AlreadyPresent => Self::AlreadyPresent,
            OutcomeStatus::Failed { reason } => Self::Failed { reason: reason.clone() },
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Adopted => write!(f, "adopted"),
            Self::Applied => write!(f, "applied"),
            Self::AlreadyPresent => write!(f, "already present"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub stage: Stage,
    pub target: String,
    #[serde(flatten)]
    pub result: StepResult,
}

/// One grant rule applied to one subject on one space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantRecord {
    pub label: String,
    pub rule: String,
    pub outcome: GrantOutcome,
}

/// Step counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionSummary {
    pub created: usize,
    pub adopted: usize,
    pub applied: usize,
    pub already_present: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ProvisionSummary {
    pub fn add_result(&mut self, result: &StepResult) {
        match result {
            StepResult::Created => self.created += 1,
            StepResult::Adopted => self.adopted += 1,
            StepResult::Applied => self.applied += 1,
            StepResult::AlreadyPresent => self.already_present += 1,
            StepResult::Skipped { .. } => self.skipped += 1,
            StepResult::Failed { .. } => self.failed += 1,
        }
    }

    /// Steps that changed the site.
    pub fn total_changes(&self) -> usize {
        self.created + self.applied
    }

    pub fn total(&self) -> usize {
        self.created + self.adopted + self.applied + self.already_present + self.skipped + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Full record of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvisionReport {
    pub steps: Vec<StepRecord>,
    pub grants: Vec<GrantRecord>,
    /// Users resolved to accounts.
    pub users: usize,
    pub group: Option<String>,
    /// Keys of spaces created or adopted.
    pub spaces: Vec<String>,
    /// Titles of pages created or adopted.
    pub content: Vec<String>,
}

impl ProvisionReport {
    pub fn record(&mut self, stage: Stage, target: impl Into<String>, result: StepResult) -> &StepRecord {
        self.steps.push(StepRecord {
            stage,
            target: target.into(),
            result,
        });
        &self.steps[self.steps.len() - 1]
    }

    pub fn summary(&self) -> ProvisionSummary {
        let mut summary = ProvisionSummary::default();
        for step in &self.steps {
            summary.add_result(&step.result);
        }
        summary
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| s.result.is_failure())
    }

    pub fn stage(&self, stage: Stage) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(move |s| s.stage == stage)
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}
