//! Request execution against the Confluence REST API.
//!
//! This module provides the [`Api`] trait, the request value every
//! component builds, and two implementations: [`http::HttpApi`] for the
//! real platform and [`MockApi`] for tests.
//!
//! # Testing
//!
//! ```
//! use confkit::backend::{Api, ApiRequest, MockApi, MockReply};
//! use confkit::Method;
//! use serde_json::json;
//!
//! let mock = MockApi::new();
//! mock.on(Method::Post, "/rest/api/group", MockReply::status(409, "Group already exists"));
//!
//! let err = mock.execute(&ApiRequest::post("group").json(json!({"name": "devs"}))).unwrap_err();
//! assert!(err.is_conflict());
//! assert_eq!(mock.requests().len(), 1);
//! ```

pub mod http;

use crate::endpoint;
use crate::error::{Error, Result};
use crate::types::Method;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Executes one request and returns the parsed body.
///
/// Implementations never retry; a non-2xx status becomes
/// [`Error::Request`] carrying the raw body, an empty body becomes `{}`.
pub trait Api: Send + Sync {
    fn execute(&self, request: &ApiRequest) -> Result<Value>;
}

impl<T: Api + ?Sized> Api for &T {
    fn execute(&self, request: &ApiRequest) -> Result<Value> {
        (**self).execute(request)
    }
}

/// One REST call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Canonical `/rest/api/...` path.
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Build a request; the path is normalized immediately.
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            endpoint: endpoint::normalize_path(path),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::Put, path)
    }

    /// Append a query parameter (encoded by the transport).
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a query parameter.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Empty JSON object, returned for empty response bodies.
#[must_use]
pub fn empty_body() -> Value {
    Value::Object(Map::new())
}

// =============================================================================
// Mock backend
// =============================================================================

/// Scripted reply for [`MockApi`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 2xx with this body.
    Json(Value),
    /// Non-2xx status with a raw body.
    Status { status: u16, body: String },
    /// No response at all.
    Transport { message: String },
}

impl MockReply {
    #[must_use]
    pub fn ok() -> Self {
        Self::Json(empty_body())
    }

    #[must_use]
    pub fn json(value: Value) -> Self {
        Self::Json(value)
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

type Matcher = Box<dyn Fn(&ApiRequest) -> bool + Send + Sync>;

struct Route {
    method: Method,
    endpoint: String,
    matcher: Option<Matcher>,
    replies: VecDeque<MockReply>,
}

impl Route {
    fn matches(&self, request: &ApiRequest) -> bool {
        self.method == request.method
            && self.endpoint == request.endpoint
            && self.matcher.as_ref().is_none_or(|m| m(request))
    }

    /// Replies are consumed in order; the last one repeats.
    fn next_reply(&mut self) -> MockReply {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap_or_else(MockReply::ok)
        } else {
            self.replies.front().cloned().unwrap_or_else(MockReply::ok)
        }
    }
}

/// In-memory backend that records requests and replays scripted replies.
///
/// Routes are checked most-recent first; unmatched requests succeed with `{}`.
#[derive(Default)]
pub struct MockApi {
    routes: Mutex<Vec<Route>>,
    log: Mutex<Vec<ApiRequest>>,
}

impl MockApi {
    /// Create a new mock where every request succeeds with `{}`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `method path` with `reply`.
    pub fn on(&self, method: Method, path: &str, reply: MockReply) -> &Self {
        self.on_sequence(method, path, vec![reply])
    }

    /// Reply to successive `method path` calls with `replies` in order.
    pub fn on_sequence(&self, method: Method, path: &str, replies: Vec<MockReply>) -> &Self {
        self.push_route(method, path, None, replies)
    }

    /// Reply to `method path` calls accepted by `matcher`.
    pub fn on_match<F>(&self, method: Method, path: &str, matcher: F, reply: MockReply) -> &Self
    where
        F: Fn(&ApiRequest) -> bool + Send + Sync + 'static,
    {
        self.push_route(method, path, Some(Box::new(matcher)), vec![reply])
    }

    fn push_route(&self, method: Method, path: &str, matcher: Option<Matcher>, replies: Vec<MockReply>) -> &Self {
        lock(&self.routes).push(Route {
            method,
            endpoint: endpoint::normalize_path(path),
            matcher,
            replies: replies.into(),
        });
        self
    }

    /// All requests executed so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.log).clone()
    }

    /// Requests for one method and path.
    #[must_use]
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        let endpoint = endpoint::normalize_path(path);
        lock(&self.log)
            .iter()
            .filter(|r| r.method == method && r.endpoint == endpoint)
            .cloned()
            .collect()
    }

    /// Forget recorded requests, keeping routes.
    pub fn clear_requests(&self) {
        lock(&self.log).clear();
    }
}

impl Api for MockApi {
    fn execute(&self, request: &ApiRequest) -> Result<Value> {
        lock(&self.log).push(request.clone());

        let reply = lock(&self.routes)
            .iter_mut()
            .rev()
            .find(|route| route.matches(request))
            .map_or_else(MockReply::ok, Route::next_reply);

        let url = format!("mock://{}", request.endpoint);
        match reply {
            MockReply::Json(value) => Ok(value),
            MockReply::Status { status, body } => Err(Error::request(request.method, url, status, body)),
            MockReply::Transport { message } => Err(Error::Transport {
                method: request.method,
                url,
                message,
                timed_out: false,
            }),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
