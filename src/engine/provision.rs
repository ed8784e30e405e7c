//! The provisioning workflow.
//!
//! Stages run in a fixed order (users, group, spaces, permissions, content)
//! and each records one step per attempted call. A failed step never aborts
//! the run; later stages skip only what depends on the failed resource.

use super::progress::Progress;
use super::report::{GrantRecord, ProvisionReport, Stage, StepResult};
use crate::directory::UserDirectory;
use crate::policy::{Audience, GroupPolicy, PagePolicy, Policy, SpacePolicy};
use confkit::{
    Api, GrantSequencer, OperationKey, OutcomeStatus, PageSpec, Reconciler, ResourceHandle, ResourceSpec, RestrictionApplier,
    RestrictionOperation, Subject, create_or_adopt_page, restriction_subjects,
};
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

/// Pause after each group membership call.
pub const MEMBERSHIP_PAUSE: Duration = Duration::from_millis(500);

/// Pause after each space reconciliation.
pub const SPACE_PAUSE: Duration = Duration::from_millis(500);

/// Pause between two content restrictions.
pub const RESTRICTION_PAUSE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionOptions {
    pub membership_pause: Duration,
    pub space_pause: Duration,
    pub restriction_pause: Duration,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            membership_pause: MEMBERSHIP_PAUSE,
            space_pause: SPACE_PAUSE,
            restriction_pause: RESTRICTION_PAUSE,
        }
    }
}

impl ProvisionOptions {
    pub fn no_pause() -> Self {
        Self {
            membership_pause: Duration::ZERO,
            space_pause: Duration::ZERO,
            restriction_pause: Duration::ZERO,
        }
    }
}

/// A subject with the name shown in reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grantee {
    pub subject: Subject,
    pub label: String,
}

/// Resolve an audience to subjects.
///
/// `Err` carries the reason an audience that must name someone came out
/// empty. `other-standard` may legitimately be empty.
pub fn grantees(
    users: &UserDirectory,
    audience: &Audience,
    group: Option<&ResourceHandle>,
) -> Result<Vec<Grantee>, String> {
    if *audience == Audience::Group {
        let Some(handle) = group else {
            return Err("group unavailable".to_string());
        };
        let Some(id) = handle.id.as_deref() else {
            return Err(format!("group '{}' has no id", handle.key));
        };
        return Ok(vec![Grantee {
            subject: Subject::group(id),
            label: format!("group {}", handle.key),
        }]);
    }

    let resolved: Vec<Grantee> = users
        .audience(audience)
        .into_iter()
        .map(|u| Grantee {
            subject: u.subject(),
            label: u.label().to_string(),
        })
        .collect();

    if resolved.is_empty() {
        match audience {
            Audience::Admin => return Err("no admin user mapped".to_string()),
            Audience::FirstStandard | Audience::AllStandard => {
                return Err("no standard user mapped".to_string());
            }
            Audience::User(name) => return Err(format!("user '{name}' not mapped")),
            Audience::OtherStandard | Audience::Group => {}
        }
    }
    Ok(resolved)
}

struct Run<'p> {
    report: ProvisionReport,
    progress: &'p mut dyn Progress,
}

impl Run<'_> {
    fn stage<T>(&mut self, stage: Stage, f: impl FnOnce(&mut Self) -> T) -> T {
        log::debug!("stage: {stage}");
        self.progress.on_stage_start(stage);
        let out = f(self);
        self.progress.on_stage_complete(stage);
        out
    }

    fn record(&mut self, stage: Stage, target: impl Into<String>, result: StepResult) {
        let step = self.report.record(stage, target, result);
        self.progress.on_step(step);
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

/// Drives one provisioning run against a site.
pub struct Provisioner<'a> {
    api: &'a dyn Api,
    policy: &'a Policy,
    users: &'a UserDirectory,
    options: ProvisionOptions,
}

impl<'a> Provisioner<'a> {
    pub fn new(api: &'a dyn Api, policy: &'a Policy, users: &'a UserDirectory) -> Self {
        Self {
            api,
            policy,
            users,
            options: ProvisionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ProvisionOptions) -> Self {
        self.options = options;
        self
    }

    /// Run every stage and return what happened.
    pub fn run(&self, progress: &mut dyn Progress) -> ProvisionReport {
        let mut run = Run {
            report: ProvisionReport::default(),
            progress,
        };

        run.stage(Stage::Users, |run| self.users_stage(run));
        let group = run.stage(Stage::Group, |run| self.group_stage(run));
        let spaces = run.stage(Stage::Spaces, |run| self.spaces_stage(run));
        run.stage(Stage::Permissions, |run| {
            self.permissions_stage(run, &spaces, group.as_ref());
        });
        run.stage(Stage::Content, |run| self.content_stage(run, &spaces, group.as_ref()));

        run.report
    }

    fn users_stage(&self, run: &mut Run<'_>) {
        for user in self.users.users() {
            let target = format!("{} ({})", user.label(), user.account_id);
            run.record(Stage::Users, target, StepResult::AlreadyPresent);
        }
        for user in self.users.missing() {
            run.record(Stage::Users, &user.email, StepResult::skipped("no account id in mapping"));
        }
        run.report.users = self.users.users().len();
    }

    fn group_stage(&self, run: &mut Run<'_>) -> Option<ResourceHandle> {
        let group = self.policy.group.as_ref()?;
        run.report.group = Some(group.name.clone());

        let reconciler = Reconciler::new(self.api);
        let handle = match reconciler.create_or_adopt(&ResourceSpec::group(&group.name)) {
            Ok(handle) => {
                run.record(Stage::Group, format!("group {}", group.name), StepResult::from_handle(&handle));
                handle
            }
            Err(e) => {
                run.record(Stage::Group, format!("group {}", group.name), StepResult::from_error(&e));
                for member in self.members(group) {
                    run.record(
                        Stage::Group,
                        format!("{} in {}", member.label, group.name),
                        StepResult::skipped("group unavailable"),
                    );
                }
                return None;
            }
        };

        for member in self.members(group) {
            let target = format!("{} in {}", member.label, group.name);
            let result = match reconciler.add_member(&handle, &member.subject) {
                Ok(change) => StepResult::from(&OutcomeStatus::from(change)),
                Err(e) => StepResult::from_error(&e),
            };
            run.record(Stage::Group, target, result);
            pause(self.options.membership_pause);
        }
        Some(handle)
    }

    /// Users named by the group's member audiences, deduplicated.
    fn members(&self, group: &GroupPolicy) -> Vec<Grantee> {
        let mut members: Vec<Grantee> = Vec::new();
        for audience in &group.members {
            if *audience == Audience::Group {
                continue;
            }
            for grantee in grantees(self.users, audience, None).unwrap_or_default() {
                if !members.contains(&grantee) {
                    members.push(grantee);
                }
            }
        }
        members
    }

    fn spaces_stage(&self, run: &mut Run<'_>) -> HashMap<String, ResourceHandle> {
        let reconciler = Reconciler::new(self.api);
        let mut handles = HashMap::new();
        for space in &self.policy.spaces {
            let spec = ResourceSpec::space(&space.key, &space.name, &space.description);
            match reconciler.create_or_adopt(&spec) {
                Ok(handle) => {
                    run.record(Stage::Spaces, format!("space {}", space.key), StepResult::from_handle(&handle));
                    run.report.spaces.push(handle.key.clone());
                    handles.insert(space.key.clone(), handle);
                }
                Err(e) => run.record(Stage::Spaces, format!("space {}", space.key), StepResult::from_error(&e)),
            }
            pause(self.options.space_pause);
        }
        handles
    }

    fn permissions_stage(
        &self,
        run: &mut Run<'_>,
        spaces: &HashMap<String, ResourceHandle>,
        group: Option<&ResourceHandle>,
    ) {
        let sequencer = GrantSequencer::new(self.api);
        for space in &self.policy.spaces {
            for rule in &space.grants {
                let rule_target = format!("{} {} ({})", space.key, rule.audience, rule.describe());
                let Some(handle) = spaces.get(&space.key) else {
                    run.record(Stage::Permissions, rule_target, StepResult::skipped("space unavailable"));
                    continue;
                };
                let targets = match grantees(self.users, &rule.audience, group) {
                    Ok(targets) => targets,
                    Err(reason) => {
                        run.record(Stage::Permissions, rule_target, StepResult::skipped(reason));
                        continue;
                    }
                };

                let extra = rule.extra_operations();
                for grantee in targets {
                    match sequencer.grant(&handle.key, &grantee.subject, &extra) {
                        Ok(outcome) => {
                            for op in &outcome.outcomes {
                                let target = format!("{} {} {}", handle.key, grantee.label, op.operation);
                                run.record(Stage::Permissions, target, StepResult::from(&op.status));
                            }
                            run.report.grants.push(GrantRecord {
                                label: grantee.label,
                                rule: rule.describe(),
                                outcome,
                            });
                        }
                        Err(e) => {
                            let target = format!("{} {} ({})", handle.key, grantee.label, rule.describe());
                            run.record(Stage::Permissions, target, StepResult::from_error(&e));
                        }
                    }
                }
            }
        }
        self.check_space_admins(spaces);
    }

    /// Warn about spaces whose grants name no administrator.
    fn check_space_admins(&self, spaces: &HashMap<String, ResourceHandle>) {
        let administers = |space: &SpacePolicy| {
            space
                .grants
                .iter()
                .any(|g| g.extra_operations().iter().any(|op| op.key == OperationKey::Administer))
        };
        for space in &self.policy.spaces {
            if spaces.contains_key(&space.key) && !space.grants.is_empty() && !administers(space) {
                log::info!("space {} has no administer grant; existing administrators are left as they are", space.key);
            }
        }
    }

    fn content_stage(
        &self,
        run: &mut Run<'_>,
        spaces: &HashMap<String, ResourceHandle>,
        group: Option<&ResourceHandle>,
    ) {
        let Some(page) = &self.policy.page else {
            return;
        };
        let page_target = format!("page '{}'", page.title);
        let Some(space) = spaces.get(&page.space) else {
            run.record(
                Stage::Content,
                page_target,
                StepResult::skipped(format!("space {} unavailable", page.space)),
            );
            return;
        };

        let mut spec = PageSpec::new(&space.key, &page.title, &page.body);
        if let Some(parent) = &page.parent_id {
            spec = spec.parent(parent);
        }
        let handle = match create_or_adopt_page(self.api, &spec) {
            Ok(handle) => {
                run.record(Stage::Content, &page_target, StepResult::from_handle(&handle));
                run.report.content.push(page.title.clone());
                handle
            }
            Err(e) => {
                run.record(Stage::Content, page_target, StepResult::from_error(&e));
                return;
            }
        };

        self.restrict_page(run, page, &handle, group);
    }

    fn restrict_page(&self, run: &mut Run<'_>, page: &PagePolicy, handle: &ResourceHandle, group: Option<&ResourceHandle>) {
        if page.restrict_read_to.is_empty() {
            return;
        }
        let restriction_target = format!("read restriction on '{}'", page.title);

        // The acting admin must stay on the list or the page locks us out.
        let Some(admin) = self.users.admin() else {
            run.record(
                Stage::Content,
                restriction_target,
                StepResult::skipped("no admin user mapped; restricting would lock the caller out"),
            );
            return;
        };

        let mut others: Vec<Grantee> = Vec::new();
        for audience in &page.restrict_read_to {
            match grantees(self.users, audience, group) {
                Ok(resolved) => others.extend(resolved),
                Err(reason) => {
                    run.record(
                        Stage::Content,
                        format!("{restriction_target} for {audience}"),
                        StepResult::skipped(reason),
                    );
                }
            }
        }
        let admin_subject = admin.subject();
        if others.iter().all(|g| g.subject == admin_subject) {
            run.record(
                Stage::Content,
                restriction_target,
                StepResult::skipped("no subject besides the admin resolved"),
            );
            return;
        }

        let Some(content_id) = handle.id.as_deref() else {
            run.record(Stage::Content, restriction_target, StepResult::failed("page has no id"));
            return;
        };

        let mut labels: HashMap<Subject, String> = HashMap::new();
        labels.insert(admin_subject.clone(), admin.label().to_string());
        for grantee in &others {
            labels.entry(grantee.subject.clone()).or_insert_with(|| grantee.label.clone());
        }
        let other_subjects: Vec<Subject> = others.into_iter().map(|g| g.subject).collect();
        let ordered = restriction_subjects(&admin_subject, &other_subjects);

        let applier = RestrictionApplier::new(self.api).with_pause(self.options.restriction_pause);
        match applier.restrict_content(content_id, RestrictionOperation::Read, &ordered) {
            Ok(outcomes) => {
                for outcome in outcomes {
                    let label = labels
                        .get(&outcome.subject)
                        .cloned()
                        .unwrap_or_else(|| outcome.subject.to_string());
                    run.record(
                        Stage::Content,
                        format!("{restriction_target} for {label}"),
                        StepResult::from(&outcome.status),
                    );
                }
            }
            Err(e) => run.record(Stage::Content, restriction_target, StepResult::from_error(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::UserMapping;
    use crate::engine::progress::RecordingProgress;
    use confkit::{Method, MockApi, MockReply};
    use serde_json::{Value, json};

    const CONFLICT: &str = r#"{"statusCode":409,"message":"com.atlassian.confluence.api.service.exceptions.ConflictException: already exists"}"#;
    const PERMISSION_EXISTS: &str = r#"{"statusCode":400,"message":"com.atlassian.confluence.api.service.exceptions.BadRequestException: Permission already exists."}"#;

    fn mapping(entries: &[(&str, &str)]) -> UserMapping {
        entries.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    fn three_users() -> UserMapping {
        mapping(&[
            ("admin@example.com", "acc-admin"),
            ("user1@example.com", "acc-1"),
            ("user2@example.com", "acc-2"),
        ])
    }

    fn op_key(request: &confkit::ApiRequest) -> String {
        let body = request.body.as_ref().unwrap();
        let op = body.get("operation").unwrap();
        format!("{}({})", op["key"].as_str().unwrap(), op["target"].as_str().unwrap())
    }

    fn account(request: &confkit::ApiRequest) -> String {
        request.body.as_ref().unwrap()["subject"]["identifier"]
            .as_str()
            .unwrap()
            .to_string()
    }

    fn run(mock: &MockApi, policy: &Policy, users: &UserDirectory) -> (ProvisionReport, RecordingProgress) {
        let mut progress = RecordingProgress::default();
        let report = Provisioner::new(mock, policy, users)
            .with_options(ProvisionOptions::no_pause())
            .run(&mut progress);
        (report, progress)
    }

    #[test]
    fn test_example_scenario() {
        let policy = Policy::parse(
            r#"
            [[users]]
            username = "admin"
            email = "admin@example.com"
            admin = true
            [[users]]
            username = "user1"
            email = "user1@example.com"
            [[users]]
            username = "user2"
            email = "user2@example.com"

            [[spaces]]
            key = "COLLAB"
            name = "Collaborative Workspace"
            [[spaces.grants]]
            audience = "first-standard"
            preset = "space-admin"
            [[spaces.grants]]
            audience = "other-standard"
            operations = [{ key = "create", target = "page" }]
            "#,
        )
        .unwrap();
        let users = UserDirectory::resolve(&policy.users, &three_users());

        let mock = MockApi::new();
        mock.on(Method::Post, "space", MockReply::status(409, CONFLICT));
        mock.on(
            Method::Get,
            "space",
            MockReply::json(json!({"results": [{"key": "COLLAB", "id": 98305, "name": "Collaborative Workspace"}]})),
        );
        mock.on_match(
            Method::Post,
            "space/COLLAB/permission",
            |r| {
                r.body.as_ref().is_some_and(|b| {
                    b["subject"]["identifier"] == "acc-2" && b["operation"]["key"] == "read"
                })
            },
            MockReply::status(400, PERMISSION_EXISTS),
        );

        let (report, _) = run(&mock, &policy, &users);

        assert_eq!(report.spaces, ["COLLAB"]);
        let space_step = report.stage(Stage::Spaces).next().unwrap();
        assert_eq!(space_step.result, StepResult::Adopted);

        assert_eq!(report.grants.len(), 2);
        let first = &report.grants[0];
        assert_eq!(first.label, "user1@example.com");
        assert_eq!((first.outcome.succeeded(), first.outcome.total()), (2, 2));
        let second = &report.grants[1];
        assert_eq!(second.label, "user2@example.com");
        assert_eq!((second.outcome.succeeded(), second.outcome.total()), (2, 2));
        assert_eq!(second.outcome.outcomes[0].status, OutcomeStatus::AlreadyPresent);

        let sent: Vec<(String, String)> = mock
            .requests_to(Method::Post, "space/COLLAB/permission")
            .iter()
            .map(|r| (account(r), op_key(r)))
            .collect();
        assert_eq!(
            sent,
            [
                ("acc-1".to_string(), "read(space)".to_string()),
                ("acc-1".to_string(), "administer(space)".to_string()),
                ("acc-2".to_string(), "read(space)".to_string()),
                ("acc-2".to_string(), "create(page)".to_string()),
            ]
        );
        assert!(report.is_success());
    }

    fn builtin_mock() -> MockApi {
        let mock = MockApi::new();
        mock.on(
            Method::Post,
            "group",
            MockReply::json(json!({"type": "group", "name": "standard-users", "id": "g-1"})),
        );
        mock.on_match(
            Method::Post,
            "space",
            |r| r.body.as_ref().is_some_and(|b| b["key"] == "COLLAB"),
            MockReply::json(json!({"key": "COLLAB", "id": 1})),
        );
        mock.on_match(
            Method::Post,
            "space",
            |r| r.body.as_ref().is_some_and(|b| b["key"] == "RESTRICT"),
            MockReply::json(json!({"key": "RESTRICT", "id": 2})),
        );
        mock.on(
            Method::Post,
            "content",
            MockReply::json(json!({"id": "65537", "title": "Project Kickoff: Collaboration Page"})),
        );
        mock
    }

    #[test]
    fn test_builtin_policy_full_run() {
        let policy = Policy::builtin().unwrap();
        let users = UserDirectory::resolve(&policy.users, &three_users());
        let mock = builtin_mock();

        let (report, progress) = run(&mock, &policy, &users);

        assert!(report.is_success(), "failures: {:?}", report.failures().collect::<Vec<_>>());
        assert_eq!(progress.stages, Stage::ALL);
        assert_eq!(progress.completed, Stage::ALL);
        assert_eq!(progress.steps.len(), report.steps.len());

        assert_eq!(report.users, 3);
        assert_eq!(report.stage(Stage::Users).filter(|s| matches!(s.result, StepResult::Skipped { .. })).count(), 2);

        // Two standard users join the group.
        let joins = mock.requests_to(Method::Post, "group/userByGroupId");
        assert_eq!(joins.len(), 2);
        assert!(joins.iter().all(|r| r.query_value("groupId") == Some("g-1")));

        // COLLAB: user1 admin (2 ops), user2 write (6 ops).
        // RESTRICT: admin (2 ops), user1 and user2 read (1 op each).
        assert_eq!(mock.requests_to(Method::Post, "space/COLLAB/permission").len(), 8);
        assert_eq!(mock.requests_to(Method::Post, "space/RESTRICT/permission").len(), 4);
        assert_eq!(report.grants.len(), 5);
        assert!(report.grants.iter().all(|g| g.outcome.is_complete()));

        assert_eq!(report.content, ["Project Kickoff: Collaboration Page"]);
        assert_eq!(report.summary().failed, 0);
    }

    #[test]
    fn test_restriction_puts_admin_first() {
        let policy = Policy::builtin().unwrap();
        let users = UserDirectory::resolve(&policy.users, &three_users());
        let mock = builtin_mock();

        run(&mock, &policy, &users);

        let puts: Vec<_> = mock
            .requests()
            .into_iter()
            .filter(|r| r.method == Method::Put)
            .collect();
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].endpoint, "/rest/api/content/65537/restriction/byOperation/read/user");
        assert_eq!(puts[0].query_value("accountId"), Some("acc-admin"));
        assert_eq!(puts[1].query_value("accountId"), Some("acc-1"));
    }

    #[test]
    fn test_restrictions_skipped_without_admin() {
        let policy = Policy::builtin().unwrap();
        let users = UserDirectory::resolve(
            &policy.users,
            &mapping(&[("user1@example.com", "acc-1"), ("user2@example.com", "acc-2")]),
        );
        let mock = builtin_mock();

        let (report, _) = run(&mock, &policy, &users);

        assert!(mock.requests().iter().all(|r| r.method != Method::Put));
        let skipped = report
            .stage(Stage::Content)
            .find(|s| s.target.starts_with("read restriction"))
            .unwrap();
        assert!(matches!(&skipped.result, StepResult::Skipped { reason } if reason.contains("lock")));

        // RESTRICT admin grant is skipped, read-only grants still go out.
        let restrict = mock.requests_to(Method::Post, "space/RESTRICT/permission");
        assert_eq!(restrict.len(), 2);
        assert!(report.is_success());
    }

    #[test]
    fn test_failed_space_skips_dependents() {
        let policy = Policy::builtin().unwrap();
        let users = UserDirectory::resolve(&policy.users, &three_users());
        let mock = builtin_mock();
        mock.on_match(
            Method::Post,
            "space",
            |r| r.body.as_ref().is_some_and(|b| b["key"] == "COLLAB"),
            MockReply::status(500, "boom"),
        );

        let (report, _) = run(&mock, &policy, &users);

        assert!(!report.is_success());
        assert_eq!(report.spaces, ["RESTRICT"]);
        assert!(mock.requests_to(Method::Post, "space/COLLAB/permission").is_empty());
        assert_eq!(mock.requests_to(Method::Post, "space/RESTRICT/permission").len(), 4);
        assert!(mock.requests_to(Method::Post, "content").is_empty());

        let page = report.stage(Stage::Content).next().unwrap();
        assert!(matches!(page.result, StepResult::Skipped { .. }));
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let policy = Policy::builtin().unwrap();
        let users = UserDirectory::resolve(&policy.users, &three_users());

        let mock = MockApi::new();
        mock.on(Method::Post, "group", MockReply::status(409, CONFLICT));
        mock.on(
            Method::Get,
            "group/picker",
            MockReply::json(json!({"results": [{"type": "group", "name": "standard-users", "id": "g-1"}]})),
        );
        mock.on(Method::Post, "group/userByGroupId", MockReply::status(409, CONFLICT));
        mock.on(Method::Post, "space", MockReply::status(409, CONFLICT));
        mock.on(
            Method::Get,
            "space",
            MockReply::json(json!({"results": [{"key": "COLLAB", "id": 1}, {"key": "RESTRICT", "id": 2}]})),
        );
        mock.on(Method::Post, "space/COLLAB/permission", MockReply::status(400, PERMISSION_EXISTS));
        mock.on(Method::Post, "space/RESTRICT/permission", MockReply::status(400, PERMISSION_EXISTS));
        mock.on(Method::Post, "content", MockReply::status(400, r#"{"message":"A page with this title already exists"}"#));
        mock.on(
            Method::Get,
            "content",
            MockReply::json(json!({"results": [{"id": "65537", "title": "Project Kickoff: Collaboration Page"}]})),
        );

        let (report, _) = run(&mock, &policy, &users);

        assert!(report.is_success(), "failures: {:?}", report.failures().collect::<Vec<_>>());
        let summary = report.summary();
        assert_eq!(summary.created, 0);
        assert_eq!(summary.adopted, 4);
        assert!(report.grants.iter().all(|g| g.outcome.is_complete()));
        assert!(
            report
                .stage(Stage::Permissions)
                .all(|s| s.result == StepResult::AlreadyPresent)
        );
    }

    #[test]
    fn test_group_audience_grant() {
        let policy = Policy::parse(
            r#"
            [group]
            name = "devs"
            [[spaces]]
            key = "DOCS"
            name = "Docs"
            [[spaces.grants]]
            audience = "group"
            preset = "read-only"
            "#,
        )
        .unwrap();
        let users = UserDirectory::default();
        let mock = MockApi::new();
        mock.on(Method::Post, "group", MockReply::json(json!({"name": "devs", "id": "g-9"})));
        mock.on(Method::Post, "space", MockReply::json(json!({"key": "DOCS"})));

        let (report, _) = run(&mock, &policy, &users);

        let grants = mock.requests_to(Method::Post, "space/DOCS/permission");
        assert_eq!(grants.len(), 1);
        let body: &Value = grants[0].body.as_ref().unwrap();
        assert_eq!(body["subject"], json!({"type": "group", "identifier": "g-9"}));
        assert_eq!(report.grants[0].label, "group devs");
    }

    #[test]
    fn test_grantees_reasons() {
        let policy = Policy::builtin().unwrap();
        let users = UserDirectory::resolve(&policy.users, &mapping(&[("user1@example.com", "acc-1")]));

        assert_eq!(grantees(&users, &Audience::Admin, None).unwrap_err(), "no admin user mapped");
        assert!(grantees(&users, &Audience::OtherStandard, None).unwrap().is_empty());
        assert_eq!(grantees(&users, &Audience::Group, None).unwrap_err(), "group unavailable");
        assert_eq!(
            grantees(&users, &Audience::User("user3".into()), None).unwrap_err(),
            "user 'user3' not mapped"
        );
        let first = grantees(&users, &Audience::FirstStandard, None).unwrap();
        assert_eq!(first[0].subject, Subject::user("acc-1"));
    }
}
