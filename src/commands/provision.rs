use anyhow::{Result, bail};
use colored::Colorize;
use confkit::Api;

use crate::Context;
use crate::cli::{ConnectionArgs, ProvisionArgs};
use crate::directory::UserDirectory;
use crate::engine::{ConsoleProgress, ProvisionOptions, ProvisionReport, Provisioner};
use crate::policy::Policy;
use crate::ui;

pub fn run(ctx: &Context, connection: &ConnectionArgs, args: &ProvisionArgs) -> Result<()> {
    let (policy, users) = args.source.load()?;
    let api = connection.client()?;
    if !ctx.quiet {
        ui::header("Provisioning");
        ui::kv("Site", api.api_root());
    }
    execute(ctx, &api, &policy, &users, args).map(|_| ())
}

/// Run the workflow against `api`, print the outcome and apply `--strict`.
///
/// Users missing from the mapping never stop the run; whatever depends on
/// them is skipped and reported.
pub fn execute(
    ctx: &Context,
    api: &dyn Api,
    policy: &Policy,
    users: &UserDirectory,
    args: &ProvisionArgs,
) -> Result<ProvisionReport> {
    if !ctx.quiet {
        ui::kv("Users", &format!("{} mapped, {} missing", users.users().len(), users.missing().len()));
        if users.is_empty() {
            ui::warn(&format!(
                "No policy user is mapped in {}; only the group and spaces will be reconciled",
                args.source.mapping_path().display()
            ));
        } else if users.admin().is_none() {
            ui::warn("No admin user mapped; admin grants and page restrictions will be skipped");
        }
    }

    let options = if args.no_pause {
        ProvisionOptions::no_pause()
    } else {
        ProvisionOptions::default()
    };
    let mut progress = ConsoleProgress::new(ctx.quiet);
    let report = Provisioner::new(api, policy, users)
        .with_options(options)
        .run(&mut progress);

    if !ctx.quiet {
        print_summary(&report);
    }

    let failed = report.failures().count();
    if failed > 0 {
        if args.strict {
            bail!("{failed} step(s) failed");
        }
        ui::warn(&format!("{failed} step(s) failed; rerun once the cause is fixed"));
    }
    Ok(report)
}

fn print_summary(report: &ProvisionReport) {
    ui::header("Summary");
    ui::kv("Users loaded", &report.users.to_string());
    ui::kv("Group", report.group.as_deref().unwrap_or("-"));
    ui::kv("Spaces", &list(&report.spaces));
    ui::kv("Content", &list(&report.content));

    if !report.grants.is_empty() {
        ui::section("Grants");
        for grant in &report.grants {
            println!(
                "  {} {} {} ({})",
                grant.outcome.space_key.bold(),
                grant.label,
                ui::ratio(grant.outcome.succeeded(), grant.outcome.total()),
                grant.rule.dimmed()
            );
        }
    }

    let summary = report.summary();
    println!();
    ui::kv(
        "Steps",
        &format!("{} ({} changed the site)", summary.total(), summary.total_changes()),
    );
    println!(
        "  {} created, {} adopted, {} applied, {} already present, {} skipped, {} failed",
        summary.created.to_string().green(),
        summary.adopted.to_string().cyan(),
        summary.applied.to_string().green(),
        summary.already_present,
        summary.skipped.to_string().yellow(),
        summary.failed.to_string().red()
    );

    if !summary.is_success() {
        ui::section("Failures");
        for step in report.failures() {
            ui::error(&format!("[{}] {}: {}", step.stage, step.target, step.result));
        }
    }

    ui::dim("Permissions outside the policy are left unchanged.");
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SourceArgs;
    use crate::directory::UserMapping;
    use confkit::{Method, MockApi, MockReply};
    use serde_json::json;
    use std::path::PathBuf;

    fn args(strict: bool) -> ProvisionArgs {
        ProvisionArgs {
            source: SourceArgs {
                policy: None,
                mapping: PathBuf::from("user_account_mapping.json"),
            },
            no_pause: true,
            strict,
        }
    }

    const QUIET: Context = Context { verbose: 0, quiet: true };

    #[test]
    fn test_spaces_only_policy_runs_without_users() {
        let policy = Policy::parse(
            r#"
            [[spaces]]
            key = "DOCS"
            name = "Docs"
            "#,
        )
        .unwrap();
        let users = UserDirectory::resolve(&policy.users, &UserMapping::new());
        assert!(users.is_empty());

        let mock = MockApi::new();
        mock.on(Method::Post, "space", MockReply::json(json!({"key": "DOCS", "id": 7})));

        let report = execute(&QUIET, &mock, &policy, &users, &args(true)).unwrap();

        assert_eq!(report.users, 0);
        assert_eq!(report.spaces, ["DOCS"]);
        assert_eq!(mock.requests_to(Method::Post, "space").len(), 1);
        assert!(report.is_success());
    }

    #[test]
    fn test_unmapped_users_are_skipped_not_fatal() {
        let policy = Policy::builtin().unwrap();
        let users = UserDirectory::resolve(&policy.users, &UserMapping::new());

        let mock = MockApi::new();
        mock.on(Method::Post, "group", MockReply::json(json!({"name": "standard-users", "id": "g-1"})));
        mock.on(Method::Post, "space", MockReply::json(json!({"key": "COLLAB"})));

        let report = execute(&QUIET, &mock, &policy, &users, &args(false)).unwrap();

        assert_eq!(report.users, 0);
        assert_eq!(report.spaces.len(), 2);
        assert!(mock.requests_to(Method::Post, "group/userByGroupId").is_empty());
        assert!(mock.requests_to(Method::Post, "space/COLLAB/permission").is_empty());
    }

    #[test]
    fn test_strict_fails_on_failed_step() {
        let policy = Policy::parse(
            r#"
            [[spaces]]
            key = "DOCS"
            name = "Docs"
            "#,
        )
        .unwrap();
        let users = UserDirectory::default();
        let mock = MockApi::new();
        mock.on(Method::Post, "space", MockReply::status(500, "boom"));

        assert!(execute(&QUIET, &mock, &policy, &users, &args(true)).is_err());
        assert!(execute(&QUIET, &mock, &policy, &users, &args(false)).is_ok());
    }
}
