use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::Context;
use crate::cli::{MappingCommand, SourceArgs};
use crate::config::expand_path;
use crate::directory;
use crate::policy::Policy;
use crate::ui;

pub fn run(ctx: &Context, cmd: &MappingCommand) -> Result<()> {
    match cmd {
        MappingCommand::Template { policy } => template(policy.as_deref()),
        MappingCommand::Check(source) => check(ctx, source),
    }
}

/// Print a JSON skeleton; stdout stays machine-readable.
fn template(policy: Option<&Path>) -> Result<()> {
    let path = policy.map(expand_path);
    let policy = Policy::load(path.as_deref())?;
    println!("{}", directory::mapping_template(&policy.users)?);
    Ok(())
}

fn check(ctx: &Context, source: &SourceArgs) -> Result<()> {
    let (policy, users) = source.load()?;

    if !ctx.quiet {
        ui::header("User mapping");
        ui::kv("File", &source.mapping_path().display().to_string());
    }
    for user in users.users() {
        let role = if user.is_admin { " (admin)" } else { "" };
        ui::success(&format!("{}{role} → {}", user.label(), user.account_id.dimmed()));
    }
    for user in users.missing() {
        ui::warn(&format!("{} ({}) has no account id", user.email, user.username));
    }

    println!();
    let resolved = users.users().len();
    let total = policy.users.len();
    ui::kv("Resolved", &ui::ratio(resolved, total));
    if users.admin().is_none() && policy.users.iter().any(|u| u.admin) {
        ui::warn("No admin is mapped; restrictions would lock the caller out and are skipped");
    }
    if !users.missing().is_empty() {
        ui::dim("Missing users are left out of provisioning.");
    }
    Ok(())
}
