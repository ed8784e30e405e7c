//! Page creation and content lookup.

use crate::backend::{Api, ApiRequest};
use crate::error::{Error, Result};
use crate::types::{Provenance, ResourceHandle, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A page to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    pub space_key: String,
    pub title: String,
    /// Storage-format (XHTML) body.
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl PageSpec {
    pub fn new(space_key: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            space_key: space_key.into(),
            title: title.into(),
            body: body.into(),
            parent_id: None,
        }
    }

    /// Nest the page under `parent_id`.
    #[must_use]
    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// JSON body for `POST /rest/api/content`.
    #[must_use]
    pub fn payload(&self) -> Value {
        let mut payload = json!({
            "type": "page",
            "title": self.title,
            "space": { "key": self.space_key },
            "body": {
                "storage": { "value": self.body, "representation": "storage" },
            },
        });
        if let Some(parent) = self.parent_id.as_deref().filter(|p| !p.is_empty()) {
            payload["ancestors"] = json!([{ "id": parent }]);
        }
        payload
    }
}

/// Create a page.
///
/// # Errors
///
/// [`Error::Validation`] for an empty space key or title;
/// [`Error::InvalidResponse`] if the platform answered without an id.
pub fn create_page(api: &dyn Api, page: &PageSpec) -> Result<ResourceHandle> {
    if page.space_key.trim().is_empty() || page.title.trim().is_empty() {
        return Err(Error::validation("page needs a space key and a title"));
    }

    let value = api.execute(&ApiRequest::post("content").json(page.payload()))?;
    let mut handle = ResourceHandle::from_value(ResourceKind::Content, &page.title, Provenance::Created, value);
    // Content objects carry `title`, not `key`.
    handle.key.clone_from(&page.title);
    if handle.id.is_none() {
        return Err(Error::InvalidResponse(format!("created page '{}' has no id", page.title)));
    }
    Ok(handle)
}

/// Create a page, or adopt the page with the same title in the same space
/// when creation reports a duplicate.
///
/// # Errors
///
/// [`Error::ResourceNotFound`] when a duplicate was reported but no page
/// with that title exists; other failures are returned as is.
pub fn create_or_adopt_page(api: &dyn Api, page: &PageSpec) -> Result<ResourceHandle> {
    match create_page(api, page) {
        Ok(handle) => Ok(handle),
        Err(e) if e.may_already_exist() => {
            log::info!("page '{}' not created ({}), looking for an existing one", page.title, e.category());
            log::debug!("create failure: {e}");
            let found = find_page(api, &page.space_key, &page.title)?
                .ok_or_else(|| Error::not_found(ResourceKind::Content, &page.title))?;
            let mut handle = ResourceHandle::from_value(ResourceKind::Content, &page.title, Provenance::Adopted, found);
            handle.key.clone_from(&page.title);
            Ok(handle)
        }
        Err(e) => Err(e),
    }
}

/// Look a page up by exact title within a space.
pub fn find_page(api: &dyn Api, space_key: &str, title: &str) -> Result<Option<Value>> {
    let listing = api.execute(
        &ApiRequest::get("content")
            .query("type", "page")
            .query("spaceKey", space_key)
            .query("title", title),
    )?;
    let found = listing
        .get("results")
        .and_then(Value::as_array)
        .and_then(|pages| {
            pages
                .iter()
                .find(|p| p.get("title").and_then(Value::as_str) == Some(title))
        })
        .cloned();
    Ok(found)
}

/// Fetch content by id.
pub fn get_content(api: &dyn Api, content_id: &str) -> Result<Value> {
    api.execute(&ApiRequest::get(&format!("content/{content_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockApi, MockReply};
    use crate::types::Method;

    #[test]
    fn test_page_payload() {
        let page = PageSpec::new("COLLAB", "Kickoff", "<p>hi</p>");
        assert_eq!(
            page.payload(),
            json!({
                "type": "page",
                "title": "Kickoff",
                "space": {"key": "COLLAB"},
                "body": {"storage": {"value": "<p>hi</p>", "representation": "storage"}},
            })
        );
    }

    #[test]
    fn test_page_payload_with_parent() {
        let page = PageSpec::new("COLLAB", "Child", "").parent("123");
        assert_eq!(page.payload()["ancestors"], json!([{"id": "123"}]));
    }

    #[test]
    fn test_create_page() {
        let mock = MockApi::new();
        mock.on(Method::Post, "content", MockReply::json(json!({"id": "65537", "title": "Kickoff"})));

        let handle = create_page(&mock, &PageSpec::new("COLLAB", "Kickoff", "x")).unwrap();
        assert_eq!(handle.id.as_deref(), Some("65537"));
        assert_eq!(handle.key, "Kickoff");
        assert_eq!(handle.kind, ResourceKind::Content);
    }

    #[test]
    fn test_create_page_without_id_is_error() {
        let mock = MockApi::new();
        let err = create_page(&mock, &PageSpec::new("COLLAB", "Kickoff", "x")).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_create_page_validation() {
        let mock = MockApi::new();
        assert!(create_page(&mock, &PageSpec::new("", "T", "x")).is_err());
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_create_or_adopt_page_adopts_duplicate() {
        let mock = MockApi::new();
        mock.on(
            Method::Post,
            "content",
            MockReply::status(400, r#"{"statusCode":400,"message":"A page with this title already exists"}"#),
        );
        mock.on(
            Method::Get,
            "content",
            MockReply::json(json!({"results": [{"id": "77", "title": "Kickoff"}]})),
        );

        let handle = create_or_adopt_page(&mock, &PageSpec::new("COLLAB", "Kickoff", "x")).unwrap();
        assert!(handle.is_adopted());
        assert_eq!(handle.id.as_deref(), Some("77"));

        let lookup = &mock.requests_to(Method::Get, "content")[0];
        assert_eq!(lookup.query_value("spaceKey"), Some("COLLAB"));
        assert_eq!(lookup.query_value("title"), Some("Kickoff"));
    }

    #[test]
    fn test_create_or_adopt_page_not_found() {
        let mock = MockApi::new();
        mock.on(Method::Post, "content", MockReply::status(409, "{}"));
        mock.on(Method::Get, "content", MockReply::json(json!({"results": []})));

        let err = create_or_adopt_page(&mock, &PageSpec::new("COLLAB", "Kickoff", "x")).unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
    }

    #[test]
    fn test_create_or_adopt_page_keeps_other_errors() {
        let mock = MockApi::new();
        mock.on(Method::Post, "content", MockReply::status(403, "{}"));

        let err = create_or_adopt_page(&mock, &PageSpec::new("COLLAB", "Kickoff", "x")).unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(mock.requests_to(Method::Get, "content").is_empty());
    }

    #[test]
    fn test_get_content() {
        let mock = MockApi::new();
        mock.on(Method::Get, "content/42", MockReply::json(json!({"id": "42"})));
        assert_eq!(get_content(&mock, "42").unwrap()["id"], "42");
    }
}
