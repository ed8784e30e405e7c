//! Content-level read/update restrictions.
//!
//! Setting a restriction is idempotent on the platform, so there is no
//! conflict fallback here. Callers must put the acting administrator first
//! in the subject list or they lock themselves out of the page; see
//! [`restriction_subjects`].

use crate::backend::{Api, ApiRequest};
use crate::error::{Error, Result};
use crate::types::{OutcomeStatus, Subject, SubjectOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

/// Operations a restriction can limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionOperation {
    Read,
    Update,
}

impl RestrictionOperation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for RestrictionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestrictionOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            other => Err(Error::validation(format!("restriction operation must be read or update, got '{other}'"))),
        }
    }
}

/// Subject list with `acting` first and duplicates removed.
#[must_use]
pub fn restriction_subjects(acting: &Subject, others: &[Subject]) -> Vec<Subject> {
    let mut subjects = vec![acting.clone()];
    for subject in others {
        if !subjects.contains(subject) {
            subjects.push(subject.clone());
        }
    }
    subjects
}

/// Applies restrictions subject by subject.
pub struct RestrictionApplier<'a> {
    api: &'a dyn Api,
    pause: Duration,
}

impl<'a> RestrictionApplier<'a> {
    pub fn new(api: &'a dyn Api) -> Self {
        Self {
            api,
            pause: Duration::ZERO,
        }
    }

    /// Wait this long between two subjects.
    #[must_use]
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Restrict `operation` on `content_id` to `subjects`, in order.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for an empty content id; per-subject failures
    /// are reported in the returned outcomes.
    pub fn restrict_content(
        &self,
        content_id: &str,
        operation: RestrictionOperation,
        subjects: &[Subject],
    ) -> Result<Vec<SubjectOutcome>> {
        if content_id.trim().is_empty() {
            return Err(Error::validation("content id is empty"));
        }

        let mut outcomes = Vec::with_capacity(subjects.len());
        for (idx, subject) in subjects.iter().enumerate() {
            if idx > 0 && !self.pause.is_zero() {
                thread::sleep(self.pause);
            }

            let result = self.restrict_one(content_id, operation, subject);
            let status = match &result {
                Ok(()) => OutcomeStatus::Applied,
                Err(e) => OutcomeStatus::Failed { reason: e.to_string() },
            };
            match &status {
                OutcomeStatus::Failed { reason } => {
                    log::warn!("failed to restrict {operation} on content {content_id} for {subject}: {reason}");
                }
                _ => log::info!("restricted {operation} on content {content_id} to {subject}"),
            }
            outcomes.push(SubjectOutcome {
                subject: subject.clone(),
                status,
            });
        }
        Ok(outcomes)
    }

    fn restrict_one(&self, content_id: &str, operation: RestrictionOperation, subject: &Subject) -> Result<()> {
        subject.validate()?;
        let base = format!("content/{content_id}/restriction/byOperation/{operation}");
        let request = match subject {
            Subject::User { account_id } => ApiRequest::put(&format!("{base}/user")).query("accountId", account_id.as_str()),
            Subject::Group { id } => ApiRequest::put(&format!("{base}/byGroupId/{id}")),
            Subject::Anonymous => {
                return Err(Error::validation("content restrictions need a user or group"));
            }
        };
        self.api.execute(&request).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockApi, MockReply};
    use crate::types::Method;

    const RESTRICT_USER: &str = "/rest/api/content/42/restriction/byOperation/read/user";

    #[test]
    fn test_restrict_users_in_order() {
        let mock = MockApi::new();
        let subjects = [Subject::user("admin"), Subject::user("user1")];

        let outcomes = RestrictionApplier::new(&mock)
            .restrict_content("42", RestrictionOperation::Read, &subjects)
            .unwrap();

        assert!(outcomes.iter().all(SubjectOutcome::ok));
        let requests = mock.requests_to(Method::Put, RESTRICT_USER);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].query_value("accountId"), Some("admin"));
        assert_eq!(requests[1].query_value("accountId"), Some("user1"));
        assert!(requests[0].body.is_none());
    }

    #[test]
    fn test_group_restriction_path() {
        let mock = MockApi::new();
        RestrictionApplier::new(&mock)
            .restrict_content("42", RestrictionOperation::Update, &[Subject::group("g-1")])
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests[0].method, Method::Put);
        assert_eq!(
            requests[0].endpoint,
            "/rest/api/content/42/restriction/byOperation/update/byGroupId/g-1"
        );
    }

    #[test]
    fn test_failure_isolated_per_subject() {
        let mock = MockApi::new();
        mock.on_match(
            Method::Put,
            RESTRICT_USER,
            |r| r.query_value("accountId") == Some("bad"),
            MockReply::status(404, "user not found"),
        );
        let subjects = [Subject::user("admin"), Subject::user("bad"), Subject::Anonymous, Subject::user("ok")];

        let outcomes = RestrictionApplier::new(&mock)
            .restrict_content("42", RestrictionOperation::Read, &subjects)
            .unwrap();

        let ok: Vec<bool> = outcomes.iter().map(SubjectOutcome::ok).collect();
        assert_eq!(ok, vec![true, false, false, true]);
        // Anonymous never reaches the platform.
        assert_eq!(mock.requests().len(), 3);
    }

    #[test]
    fn test_empty_content_id_rejected() {
        let mock = MockApi::new();
        let err = RestrictionApplier::new(&mock)
            .restrict_content("", RestrictionOperation::Read, &[Subject::user("a")])
            .unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Validation);
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_restriction_subjects_acting_first() {
        let admin = Subject::user("admin");
        let subjects = restriction_subjects(&admin, &[Subject::user("u1"), admin.clone(), Subject::user("u1")]);
        assert_eq!(subjects, vec![admin, Subject::user("u1")]);
    }

    #[test]
    fn test_restriction_operation_parse() {
        assert_eq!("read".parse::<RestrictionOperation>().unwrap(), RestrictionOperation::Read);
        assert_eq!("update".parse::<RestrictionOperation>().unwrap(), RestrictionOperation::Update);
        assert!("delete".parse::<RestrictionOperation>().is_err());
    }
}
