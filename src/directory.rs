//! Policy users joined with the account-id mapping.
//!
//! The platform has no API for creating users, so every user must already
//! exist and be listed in the mapping file as `email or username -> accountId`.
//! Users without an entry are reported and left out of the run.

use crate::policy::{Audience, UserPolicy};
use anyhow::{Context, Result};
use confkit::Subject;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Mapping file contents.
pub type UserMapping = BTreeMap<String, String>;

/// Load a mapping file. Entries with an empty account id are dropped.
pub fn load_mapping(path: &Path) -> Result<UserMapping> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let raw: UserMapping = serde_json::from_str(&content)
        .with_context(|| format!("{} must be a JSON object of string to string", path.display()))?;
    let mapping: UserMapping = raw
        .into_iter()
        .filter(|(_, account)| !account.trim().is_empty())
        .collect();
    log::debug!("Loaded {} mapping entries from {}", mapping.len(), path.display());
    Ok(mapping)
}

/// JSON skeleton listing every policy user by email.
pub fn mapping_template(users: &[UserPolicy]) -> Result<String> {
    let template: UserMapping = users
        .iter()
        .map(|u| (u.email.clone(), "<accountId>".to_string()))
        .collect();
    Ok(serde_json::to_string_pretty(&template)?)
}

/// A policy user with a platform account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedUser {
    pub username: String,
    pub account_id: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
}

impl MappedUser {
    pub fn subject(&self) -> Subject {
        Subject::user(&self.account_id)
    }

    /// Email when present, username otherwise.
    pub fn label(&self) -> &str {
        if self.email.is_empty() { &self.username } else { &self.email }
    }
}

/// Resolved users, in policy order.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Vec<MappedUser>,
    missing: Vec<UserPolicy>,
}

impl UserDirectory {
    /// Join policy users with the mapping, by email first then username.
    pub fn resolve(users: &[UserPolicy], mapping: &UserMapping) -> Self {
        let mut directory = Self::default();
        for user in users {
            let account = mapping
                .get(&user.email)
                .or_else(|| mapping.get(&user.username));
            match account {
                Some(account_id) => directory.users.push(MappedUser {
                    username: user.username.clone(),
                    account_id: account_id.clone(),
                    email: user.email.clone(),
                    display_name: user.display_name.clone(),
                    is_admin: user.admin,
                }),
                None => {
                    log::warn!("No account id mapped for {}", user.email);
                    directory.missing.push(user.clone());
                }
            }
        }
        directory
    }

    /// Every user resolved to a stand-in account id, for offline planning.
    pub fn placeholder(users: &[UserPolicy]) -> Self {
        let mapping = users
            .iter()
            .map(|u| (u.email.clone(), format!("<{}>", u.username)))
            .collect();
        Self::resolve(users, &mapping)
    }

    pub fn users(&self) -> &[MappedUser] {
        &self.users
    }

    pub fn missing(&self) -> &[UserPolicy] {
        &self.missing
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// The first admin: the account the run acts as.
    pub fn admin(&self) -> Option<&MappedUser> {
        self.users.iter().find(|u| u.is_admin)
    }

    pub fn standard(&self) -> impl Iterator<Item = &MappedUser> {
        self.users.iter().filter(|u| !u.is_admin)
    }

    pub fn by_username(&self, username: &str) -> Option<&MappedUser> {
        self.users.iter().find(|u| u.username == username)
    }

    /// Users an audience names. `Group` expands to nothing here; callers
    /// handle it as a group subject.
    pub fn audience(&self, audience: &Audience) -> Vec<&MappedUser> {
        match audience {
            Audience::Admin => self.admin().into_iter().collect(),
            Audience::FirstStandard => self.standard().take(1).collect(),
            Audience::OtherStandard => self.standard().skip(1).collect(),
            Audience::AllStandard => self.standard().collect(),
            Audience::Group => Vec::new(),
            Audience::User(name) => self.by_username(name).into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;

    fn users() -> Vec<UserPolicy> {
        Policy::builtin().unwrap().users
    }

    fn full_mapping() -> UserMapping {
        [
            ("admin@example.com", "acc-admin"),
            ("user1@example.com", "acc-1"),
            ("user2@example.com", "acc-2"),
            ("user3@example.com", "acc-3"),
            ("user4@example.com", "acc-4"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_resolve_full_mapping() {
        let dir = UserDirectory::resolve(&users(), &full_mapping());
        assert_eq!(dir.users().len(), 5);
        assert!(dir.missing().is_empty());
        assert_eq!(dir.admin().unwrap().account_id, "acc-admin");
        assert_eq!(dir.standard().count(), 4);
    }

    #[test]
    fn test_partial_mapping_loads_what_it_can() {
        let mut mapping = full_mapping();
        mapping.remove("user3@example.com");
        mapping.remove("user4@example.com");

        let dir = UserDirectory::resolve(&users(), &mapping);
        assert_eq!(dir.users().len(), 3);
        let missing: Vec<_> = dir.missing().iter().map(|u| u.username.as_str()).collect();
        assert_eq!(missing, ["user3", "user4"]);
    }

    #[test]
    fn test_resolve_by_username() {
        let mapping: UserMapping = [("user2".to_string(), "acc-2".to_string())].into();
        let dir = UserDirectory::resolve(&users(), &mapping);
        assert_eq!(dir.users().len(), 1);
        assert_eq!(dir.users()[0].email, "user2@example.com");
    }

    #[test]
    fn test_audiences() {
        let dir = UserDirectory::resolve(&users(), &full_mapping());
        let ids = |a: Audience| -> Vec<String> {
            dir.audience(&a).iter().map(|u| u.account_id.clone()).collect()
        };
        assert_eq!(ids(Audience::Admin), ["acc-admin"]);
        assert_eq!(ids(Audience::FirstStandard), ["acc-1"]);
        assert_eq!(ids(Audience::OtherStandard), ["acc-2", "acc-3", "acc-4"]);
        assert_eq!(ids(Audience::AllStandard).len(), 4);
        assert!(ids(Audience::Group).is_empty());
        assert_eq!(ids(Audience::User("user3".into())), ["acc-3"]);
    }

    #[test]
    fn test_audiences_without_admin() {
        let mut mapping = full_mapping();
        mapping.remove("admin@example.com");
        let dir = UserDirectory::resolve(&users(), &mapping);
        assert!(dir.admin().is_none());
        assert!(dir.audience(&Audience::Admin).is_empty());
    }

    #[test]
    fn test_load_mapping_drops_empty_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("map.json");
        fs::write(&path, r#"{"a@x.io": "acc-a", "b@x.io": ""}"#).unwrap();

        let mapping = load_mapping(&path).unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping["a@x.io"], "acc-a");
    }

    #[test]
    fn test_load_mapping_rejects_non_object() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("map.json");
        fs::write(&path, r#"["acc-a"]"#).unwrap();
        assert!(load_mapping(&path).is_err());
    }

    #[test]
    fn test_mapping_template() {
        let template = mapping_template(&users()).unwrap();
        let parsed: UserMapping = serde_json::from_str(&template).unwrap();
        assert_eq!(parsed.len(), 5);
        assert_eq!(parsed["user1@example.com"], "<accountId>");
    }

    #[test]
    fn test_placeholder_resolves_everyone() {
        let dir = UserDirectory::placeholder(&users());
        assert!(dir.missing().is_empty());
        assert_eq!(dir.by_username("user1").unwrap().account_id, "<user1>");
    }
}
