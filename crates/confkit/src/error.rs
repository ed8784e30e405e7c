//! Error types for Confluence provisioning.
//!
//! Failures are kept structured (status code, raw body, parsed platform
//! error) so that higher layers classify them through [`ErrorCategory`]
//! instead of searching free-text messages.

use crate::types::{Method, ResourceKind};
use serde::Deserialize;
use std::fmt;

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a failure.
///
/// The mapping from HTTP status to category is a small explicit table,
/// see [`Error::category`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The resource or permission already exists.
    Conflict,
    /// The addressed resource does not exist.
    NotFound,
    /// The platform throttled the request.
    RateLimited,
    /// Credentials rejected or insufficient.
    Unauthorized,
    /// Network failure or timeout, no HTTP status.
    Transport,
    /// Caller input rejected before any request was sent.
    Validation,
    /// Anything else.
    Other,
}

impl ErrorCategory {
    /// Whether the failure means the desired state is already in place.
    #[must_use]
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::Conflict)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Conflict => "Already exists",
            Self::NotFound => "Not found",
            Self::RateLimited => "Rate limited",
            Self::Unauthorized => "Not authorized",
            Self::Transport => "Network connectivity issue",
            Self::Validation => "Invalid input",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Conflict => "No action needed - the resource is already in place",
            Self::NotFound => "Check that the space, group or content exists",
            Self::RateLimited => "Wait a moment and run the provisioning again",
            Self::Unauthorized => "Check CONFLUENCE_EMAIL and CONFLUENCE_API_TOKEN",
            Self::Transport => "Check CONFLUENCE_URL and your network connection",
            Self::Validation => "Fix the input and run again",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Platform error payload parsed out of a non-2xx response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiErrorDetail {
    /// `statusCode` reported inside the body, if any.
    pub status_code: Option<u16>,
    /// Human-readable message.
    pub message: String,
    /// Machine-readable code, taken from the exception class that prefixes
    /// Confluence messages (`...BadRequestException: text` -> `BadRequestException`).
    pub code: Option<String>,
}

/// Exception codes the platform uses for duplicates.
const CONFLICT_CODES: &[&str] = &["ConflictException", "AlreadyExistsException"];

/// Duplicate markers recognized in 400 messages. The platform reports
/// "Permission already exists" and "A space already exists with key X"
/// as plain 400 Bad Request without a dedicated code.
const ALREADY_EXISTS_MARKERS: &[&str] = &["already exists", "already a member"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawErrorBody {
    status_code: Option<u16>,
    message: Option<String>,
    error_message: Option<String>,
    #[serde(default)]
    error_messages: Vec<String>,
}

impl ApiErrorDetail {
    /// Parse a response body. Returns `None` when the body is not a JSON
    /// error object.
    #[must_use]
    pub fn parse(body: &str) -> Option<Self> {
        let raw: RawErrorBody = serde_json::from_str(body).ok()?;
        let message = raw
            .message
            .or(raw.error_message)
            .or_else(|| raw.error_messages.into_iter().next())
            .unwrap_or_default();

        if message.is_empty() && raw.status_code.is_none() {
            return None;
        }

        let code = exception_code(&message);
        Some(Self {
            status_code: raw.status_code,
            message,
            code,
        })
    }

    /// Whether the detail signals a duplicate.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        if let Some(code) = &self.code
            && CONFLICT_CODES.contains(&code.as_str())
        {
            return true;
        }
        let lowered = self.message.to_lowercase();
        ALREADY_EXISTS_MARKERS.iter().any(|m| lowered.contains(m))
    }
}

/// Extract `FooException` from `com.atlassian.x.FooException: text`.
fn exception_code(message: &str) -> Option<String> {
    let (head, _) = message.split_once(':')?;
    if head.contains(char::is_whitespace) || !head.contains('.') {
        return None;
    }
    let name = head.rsplit('.').next()?;
    (!name.is_empty()).then(|| name.to_string())
}

/// Errors that can occur while provisioning.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No HTTP response: connection failure, DNS, timeout.
    #[error("API request failed: {method} {url} -> {message}")]
    Transport {
        /// HTTP verb.
        method: Method,
        /// Canonical URL.
        url: String,
        /// Underlying error message.
        message: String,
        /// Whether the per-call timeout expired.
        timed_out: bool,
    },

    /// The platform answered with a non-2xx status.
    #[error("API request failed: {method} {url} -> HTTP {status}: {body}")]
    Request {
        /// HTTP verb.
        method: Method,
        /// Canonical URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
        /// Parsed platform error, when the body carried one.
        detail: Option<ApiErrorDetail>,
    },

    /// A resource could neither be created nor discovered.
    #[error("{kind} '{key}' not found")]
    ResourceNotFound {
        /// Kind of the missing resource.
        kind: ResourceKind,
        /// Requested key or name.
        key: String,
    },

    /// Caller input rejected before any request was issued.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Response body could not be interpreted.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Create a request error, parsing the platform detail from the body.
    pub fn request(method: Method, url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let detail = ApiErrorDetail::parse(&body);
        Self::Request {
            method,
            url: url.into(),
            status,
            body,
            detail,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error for a resource.
    pub fn not_found(kind: ResourceKind, key: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            kind,
            key: key.into(),
        }
    }

    /// HTTP status, when the platform answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify this error.
    ///
    /// | status | condition                          | category       |
    /// |--------|------------------------------------|----------------|
    /// | 409    |                                    | `Conflict`     |
    /// | 400    | parsed detail says already exists  | `Conflict`     |
    /// | 404    |                                    | `NotFound`     |
    /// | 429    |                                    | `RateLimited`  |
    /// | 401/403|                                    | `Unauthorized` |
    /// | other  |                                    | `Other`        |
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transport { .. } => ErrorCategory::Transport,
            Error::Request { status, detail, .. } => match status {
                409 => ErrorCategory::Conflict,
                400 if detail.as_ref().is_some_and(ApiErrorDetail::is_already_exists) => {
                    ErrorCategory::Conflict
                }
                404 => ErrorCategory::NotFound,
                429 => ErrorCategory::RateLimited,
                401 | 403 => ErrorCategory::Unauthorized,
                _ => ErrorCategory::Other,
            },
            Error::ResourceNotFound { .. } => ErrorCategory::NotFound,
            Error::Validation(_) => ErrorCategory::Validation,
            Error::InvalidResponse(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error means the desired state already holds.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }

    /// Whether a failed create may have collided with an existing resource.
    ///
    /// True for definite conflicts and for unclassified 400 responses, which
    /// the platform also uses for some duplicates. A false positive here
    /// sends the reconciler into discovery, which then fails with
    /// [`Error::ResourceNotFound`] if nothing matches.
    #[must_use]
    pub fn may_already_exist(&self) -> bool {
        match self.category() {
            ErrorCategory::Conflict => true,
            ErrorCategory::Other => self.status() == Some(400),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
