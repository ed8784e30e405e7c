//! Create-or-adopt reconciliation for groups and spaces.
//!
//! Each resource goes through
//! `create -> (created | conflict -> discover -> (found | not found))`,
//! and both successful branches produce the same [`ResourceHandle`] shape.

use crate::backend::{Api, ApiRequest};
use crate::error::{Error, Result};
use crate::types::{Change, Provenance, ResourceHandle, ResourceKind, ResourceSpec, Subject, string_field};
use serde_json::{Value, json};

/// Page size for space discovery.
pub const SPACE_LIST_LIMIT: u32 = 200;

/// Page size for group search.
pub const GROUP_SEARCH_LIMIT: u32 = 50;

/// Creates resources or adopts existing ones.
pub struct Reconciler<'a> {
    api: &'a dyn Api,
}

impl<'a> Reconciler<'a> {
    pub fn new(api: &'a dyn Api) -> Self {
        Self { api }
    }

    /// Create the resource, or find the existing one when creation collides.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceNotFound`] when creation reported a possible
    /// duplicate but discovery found nothing; any non-duplicate create
    /// failure is returned as is.
    pub fn create_or_adopt(&self, spec: &ResourceSpec) -> Result<ResourceHandle> {
        let create = ApiRequest::post(create_path(spec.kind())).json(spec.payload());

        match self.api.execute(&create) {
            Ok(value) => {
                log::info!("{} '{}' created", spec.kind(), spec.key());
                Ok(ResourceHandle::from_value(spec.kind(), spec.key(), Provenance::Created, value))
            }
            Err(e) if e.may_already_exist() => {
                log::info!("{} '{}' not created ({}), looking for an existing one", spec.kind(), spec.key(), e.category());
                log::debug!("create failure: {e}");
                self.discover(spec)?
                    .ok_or_else(|| Error::not_found(spec.kind(), spec.key()))
            }
            Err(e) => Err(e),
        }
    }

    fn discover(&self, spec: &ResourceSpec) -> Result<Option<ResourceHandle>> {
        match spec {
            ResourceSpec::Group { name } => Ok(self.find_group(name).map(|group| {
                let mut handle = ResourceHandle::from_value(ResourceKind::Group, name, Provenance::Adopted, group);
                handle.key.clone_from(name);
                handle.id = group_id(&handle.attributes);
                handle
            })),
            ResourceSpec::Space { key, name, .. } => Ok(self
                .find_space(key, name)?
                .map(|space| ResourceHandle::from_value(ResourceKind::Space, key, Provenance::Adopted, space))),
        }
    }

    /// Search the space listing: exact key first, then case-insensitive name.
    pub fn find_space(&self, key: &str, name: &str) -> Result<Option<Value>> {
        let listing = self
            .api
            .execute(&ApiRequest::get("space").query("limit", SPACE_LIST_LIMIT.to_string()))?;
        let results = results(&listing);

        let by_key = results
            .iter()
            .find(|s| s.get("key").and_then(Value::as_str) == Some(key));
        let found = by_key.or_else(|| {
            results.iter().find(|s| {
                s.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| n.eq_ignore_ascii_case(name))
            })
        });
        Ok(found.cloned())
    }

    /// Fetch one space by key.
    pub fn get_space(&self, key: &str) -> Result<ResourceHandle> {
        let value = self.api.execute(&ApiRequest::get(&format!("space/{key}")))?;
        Ok(ResourceHandle::from_value(ResourceKind::Space, key, Provenance::Adopted, value))
    }

    /// Look a group up by exact name.
    ///
    /// Tries the group picker first, then the direct by-name endpoint.
    /// Lookup failures are logged and count as "not found".
    pub fn find_group(&self, name: &str) -> Option<Value> {
        let picker = ApiRequest::get("group/picker")
            .query("query", name)
            .query("limit", GROUP_SEARCH_LIMIT.to_string());
        match self.api.execute(&picker) {
            Ok(value) => {
                if let Some(group) = results(&value)
                    .iter()
                    .find(|g| g.get("name").and_then(Value::as_str) == Some(name))
                {
                    return Some(group.clone());
                }
            }
            Err(e) => log::debug!("group picker lookup for '{name}' failed: {e}"),
        }

        match self.api.execute(&ApiRequest::get("group").query("groupname", name)) {
            Ok(value) if value.get("name").and_then(Value::as_str) == Some(name) => Some(value),
            Ok(_) => None,
            Err(e) => {
                log::debug!("direct group lookup for '{name}' failed: {e}");
                None
            }
        }
    }

    /// Group id for a name, see [`Reconciler::find_group`].
    pub fn find_group_id(&self, name: &str) -> Option<String> {
        self.find_group(name).and_then(|g| group_id(&g))
    }

    /// Add a user to a group.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for non-user subjects, [`Error::ResourceNotFound`]
    /// when the group id cannot be resolved.
    pub fn add_member(&self, group: &ResourceHandle, subject: &Subject) -> Result<Change> {
        let Subject::User { account_id } = subject else {
            return Err(Error::validation(format!("only users can join groups, got {subject}")));
        };
        subject.validate()?;

        let group_id = match &group.id {
            Some(id) => id.clone(),
            None => self
                .find_group_id(&group.key)
                .ok_or_else(|| Error::not_found(ResourceKind::Group, &group.key))?,
        };

        let request = ApiRequest::post("group/userByGroupId")
            .query("groupId", group_id)
            .json(json!({ "accountId": account_id }));

        match self.api.execute(&request) {
            Ok(_) => Ok(Change::Applied),
            Err(e) if e.is_conflict() => Ok(Change::AlreadyPresent),
            Err(e) => Err(e),
        }
    }

    /// Resolve a group by name, then add the user.
    pub fn add_member_by_name(&self, group_name: &str, subject: &Subject) -> Result<Change> {
        let id = self
            .find_group_id(group_name)
            .ok_or_else(|| Error::not_found(ResourceKind::Group, group_name))?;
        let handle = ResourceHandle {
            kind: ResourceKind::Group,
            key: group_name.to_string(),
            id: Some(id),
            provenance: Provenance::Adopted,
            attributes: Value::Null,
        };
        self.add_member(&handle, subject)
    }
}

fn create_path(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Group => "group",
        ResourceKind::Space => "space",
        ResourceKind::Content => "content",
    }
}

/// `id`, else `key`, else `name`.
fn group_id(group: &Value) -> Option<String> {
    string_field(group, "id")
        .or_else(|| string_field(group, "key"))
        .or_else(|| string_field(group, "name"))
}

fn results(value: &Value) -> &[Value] {
    value
        .get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}
