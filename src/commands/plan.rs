use anyhow::Result;
use colored::Colorize;
use confkit::{Operation, Provenance, ResourceHandle, ResourceKind, planned_operations, restriction_subjects};
use serde_json::Value;

use crate::Context;
use crate::cli::SourceArgs;
use crate::directory::{MappedUser, UserDirectory};
use crate::engine::grantees;
use crate::policy::Policy;
use crate::ui;

/// Requests for one subject on one space, in send order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedGrant {
    pub space: String,
    pub label: String,
    pub operations: Vec<Operation>,
}

pub fn run(ctx: &Context, source: &SourceArgs) -> Result<()> {
    let policy = source.policy()?;
    let users = match source.mapping()? {
        Some(mapping) => UserDirectory::resolve(&policy.users, &mapping),
        None => {
            ui::warn(&format!(
                "{} not found; planning with stand-in account ids",
                source.mapping_path().display()
            ));
            UserDirectory::placeholder(&policy.users)
        }
    };

    ui::header("Provisioning plan");
    print_users(&users);

    if let Some(group) = &policy.group {
        ui::section(&format!("Group {}", group.name));
        ui::dim("create, or adopt the existing group");
        for member in group_members(&policy, &users) {
            println!("  + {member}");
        }
    }

    let grants = planned_grants(&policy, &users);
    for space in &policy.spaces {
        ui::section(&format!("Space {} ({})", space.key, space.name));
        ui::dim("create, or adopt by key then name");
        for grant in grants.iter().filter(|g| g.space == space.key) {
            let ops: Vec<String> = grant.operations.iter().map(ToString::to_string).collect();
            println!("  {} {}", grant.label.bold(), ops.join(" → "));
        }
    }

    if let Some(page) = &policy.page {
        let space = policy.space(&page.space).map_or(page.space.as_str(), |s| s.name.as_str());
        ui::section(&format!("Page '{}' in {space}", page.title));
        let order = planned_restrictions(&policy, &users);
        if order.is_empty() {
            ui::dim("no read restrictions");
        } else {
            ui::kv("read restricted to", &order.join(" → "));
        }
    }

    if ctx.verbose > 0 {
        println!();
        ui::dim("Every operation is sent as its own request; duplicates count as success.");
    }
    Ok(())
}

fn print_users(users: &UserDirectory) {
    ui::section("Users");
    for user in users.users() {
        let role = if user.is_admin { "admin".yellow().to_string() } else { String::new() };
        println!("  {} {} {}", user_line(user), user.account_id.dimmed(), role);
    }
    for user in users.missing() {
        ui::warn(&format!("{} has no account id and is left out", user.email));
    }
}

fn user_line(user: &MappedUser) -> String {
    if user.display_name.is_empty() {
        user.label().to_string()
    } else {
        format!("{} ({})", user.label(), user.display_name)
    }
}

fn group_members(policy: &Policy, users: &UserDirectory) -> Vec<String> {
    let Some(group) = &policy.group else {
        return Vec::new();
    };
    let mut members = Vec::new();
    for audience in &group.members {
        for grantee in grantees(users, audience, None).unwrap_or_default() {
            if !members.contains(&grantee.label) {
                members.push(grantee.label);
            }
        }
    }
    members
}

/// Stand-in for the group the run would create.
fn planned_group(policy: &Policy) -> Option<ResourceHandle> {
    policy.group.as_ref().map(|g| ResourceHandle {
        kind: ResourceKind::Group,
        key: g.name.clone(),
        id: Some(format!("<{}>", g.name)),
        provenance: Provenance::Created,
        attributes: Value::Null,
    })
}

/// Every grant the run would send, policy order.
pub fn planned_grants(policy: &Policy, users: &UserDirectory) -> Vec<PlannedGrant> {
    let group = planned_group(policy);
    let mut plan = Vec::new();
    for space in &policy.spaces {
        for rule in &space.grants {
            let operations = planned_operations(&rule.extra_operations());
            for grantee in grantees(users, &rule.audience, group.as_ref()).unwrap_or_default() {
                plan.push(PlannedGrant {
                    space: space.key.clone(),
                    label: grantee.label,
                    operations: operations.clone(),
                });
            }
        }
    }
    plan
}

/// Labels of the page's read restrictions, in send order. Empty when the
/// page is unrestricted or no admin is mapped.
pub fn planned_restrictions(policy: &Policy, users: &UserDirectory) -> Vec<String> {
    let Some(page) = &policy.page else {
        return Vec::new();
    };
    let Some(admin) = users.admin() else {
        return Vec::new();
    };
    if page.restrict_read_to.is_empty() {
        return Vec::new();
    }

    let group = planned_group(policy);
    let others: Vec<_> = page
        .restrict_read_to
        .iter()
        .flat_map(|a| grantees(users, a, group.as_ref()).unwrap_or_default())
        .collect();
    let subjects: Vec<_> = others.iter().map(|g| g.subject.clone()).collect();

    restriction_subjects(&admin.subject(), &subjects)
        .into_iter()
        .map(|subject| {
            others
                .iter()
                .find(|g| g.subject == subject)
                .map_or_else(|| admin.label().to_string(), |g| g.label.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use confkit::{OperationKey, Target};

    #[test]
    fn test_planned_grants_builtin() {
        let policy = Policy::builtin().unwrap();
        let users = UserDirectory::placeholder(&policy.users);
        let plan = planned_grants(&policy, &users);

        // COLLAB: user1 admin, users 2-4 write. RESTRICT: admin, users 1-4 read.
        assert_eq!(plan.iter().filter(|g| g.space == "COLLAB").count(), 4);
        assert_eq!(plan.iter().filter(|g| g.space == "RESTRICT").count(), 5);
        assert!(plan.iter().all(|g| g.operations[0] == Operation::READ_SPACE));

        let admin = &plan[0];
        assert_eq!(admin.label, "user1@example.com");
        assert_eq!(
            admin.operations,
            [Operation::READ_SPACE, Operation::new(OperationKey::Administer, Target::Space)]
        );
        assert_eq!(plan[1].operations.len(), 6);
    }

    #[test]
    fn test_planned_restrictions_admin_first() {
        let policy = Policy::builtin().unwrap();
        let users = UserDirectory::placeholder(&policy.users);
        assert_eq!(
            planned_restrictions(&policy, &users),
            ["admin@example.com", "user1@example.com"]
        );
    }

    #[test]
    fn test_planned_restrictions_without_admin() {
        let policy = Policy::builtin().unwrap();
        let standard: Vec<_> = policy.users.iter().filter(|u| !u.admin).cloned().collect();
        let users = UserDirectory::placeholder(&standard);
        assert!(planned_restrictions(&policy, &users).is_empty());
    }

    #[test]
    fn test_user_line_shows_display_name() {
        let policy = Policy::builtin().unwrap();
        let users = UserDirectory::placeholder(&policy.users);
        let admin = users.admin().unwrap();
        assert_eq!(user_line(admin), "admin@example.com (Administrator User)");

        let mut unnamed = admin.clone();
        unnamed.display_name.clear();
        assert_eq!(user_line(&unnamed), "admin@example.com");
    }

    #[test]
    fn test_group_members() {
        let policy = Policy::builtin().unwrap();
        let users = UserDirectory::placeholder(&policy.users);
        assert_eq!(group_members(&policy, &users).len(), 4);
    }
}
