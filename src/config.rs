use crate::cli::{ConnectionArgs, SourceArgs};
use crate::directory::{self, UserDirectory, UserMapping};
use crate::policy::Policy;
use anyhow::{Context, Result, bail};
use confkit::Credentials;
use confkit::backend::http::HttpApi;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw).unwrap_or(std::borrow::Cow::Borrowed(raw.as_ref()));
    PathBuf::from(expanded.as_ref())
}

impl ConnectionArgs {
    /// Credentials from flags or environment.
    pub fn credentials(&self) -> Result<Credentials> {
        let mut missing = Vec::new();
        if blank(self.url.as_deref()) {
            missing.push("--url / CONFLUENCE_URL");
        }
        if blank(self.email.as_deref()) {
            missing.push("--email / CONFLUENCE_EMAIL");
        }
        if blank(self.api_token.as_deref()) {
            missing.push("--api-token / CONFLUENCE_API_TOKEN");
        }
        if !missing.is_empty() {
            bail!("Missing connection settings: {}", missing.join(", "));
        }

        Credentials::new(
            self.url.as_deref().unwrap_or_default(),
            self.email.as_deref().unwrap_or_default(),
            self.api_token.as_deref().unwrap_or_default(),
        )
        .context("Invalid connection settings")
    }

    /// An HTTP client for the configured site.
    pub fn client(&self) -> Result<HttpApi> {
        let credentials = self.credentials()?;
        log::info!("Connecting to {} as {}", credentials.base_url(), credentials.email());
        Ok(HttpApi::with_timeout(credentials, Duration::from_secs(self.timeout)))
    }
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

impl SourceArgs {
    pub fn policy(&self) -> Result<Policy> {
        let path = self.policy.as_deref().map(expand_path);
        Policy::load(path.as_deref())
    }

    pub fn mapping_path(&self) -> PathBuf {
        expand_path(&self.mapping)
    }

    /// The mapping, or `None` when the file does not exist.
    pub fn mapping(&self) -> Result<Option<UserMapping>> {
        let path = self.mapping_path();
        if !path.exists() {
            return Ok(None);
        }
        directory::load_mapping(&path).map(Some)
    }

    /// Policy and resolved users. A missing mapping file is an error.
    pub fn load(&self) -> Result<(Policy, UserDirectory)> {
        let policy = self.policy()?;
        let Some(mapping) = self.mapping()? else {
            bail!(
                "{} not found; create it with `confseed mapping template`",
                self.mapping_path().display()
            );
        };
        let users = UserDirectory::resolve(&policy.users, &mapping);
        Ok((policy, users))
    }
}
