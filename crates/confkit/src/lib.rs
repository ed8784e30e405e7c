//! # confkit
//!
//! Idempotent provisioning against the Confluence Cloud REST API.
//!
//! This crate provides:
//! - Endpoint normalization, whatever form the site address and paths take
//! - A blocking request executor with structured failures
//! - Create-or-adopt reconciliation for groups and spaces
//! - Space permission grants, read first and one operation per request
//! - Page creation and content restrictions applied subject by subject
//!
//! ## Example
//!
//! ```no_run
//! use confkit::backend::http::HttpApi;
//! use confkit::{Credentials, GrantSequencer, Reconciler, ResourceSpec, Subject};
//!
//! let creds = Credentials::new("https://acme.atlassian.net", "ops@acme.io", "token").unwrap();
//! let api = HttpApi::new(creds);
//!
//! let space = Reconciler::new(&api)
//!     .create_or_adopt(&ResourceSpec::space("COLLAB", "Collaborative Workspace", ""))
//!     .unwrap();
//!
//! let outcome = GrantSequencer::new(&api)
//!     .grant_write(&space.key, &Subject::user("5b10ac8d82e05b22cc7d4ef5"))
//!     .unwrap();
//! println!("{}/{} operations granted", outcome.succeeded(), outcome.total());
//! ```
//!
//! ## Failure model
//!
//! Every call returns a structured [`Error`]. Duplicates are recognized via
//! [`Error::category`] and folded into success where the operation is
//! idempotent; everything else surfaces per operation or per subject so
//! callers decide what a partial failure means.

pub mod backend;
pub mod content;
pub mod endpoint;
pub mod error;
pub mod permissions;
pub mod reconcile;
pub mod restrictions;
pub mod types;

pub use backend::{Api, ApiRequest, MockApi, MockReply};
pub use content::{PageSpec, create_or_adopt_page, create_page, find_page, get_content};
pub use error::{ApiErrorDetail, Error, ErrorCategory, Result};
pub use permissions::{GrantOutcome, GrantSequencer, Preset, add_space_permission, planned_operations};
pub use reconcile::Reconciler;
pub use restrictions::{RestrictionApplier, RestrictionOperation, restriction_subjects};
pub use types::{
    Change, Credentials, Method, Operation, OperationKey, OperationOutcome, OutcomeStatus, Provenance,
    ResourceHandle, ResourceKind, ResourceSpec, Subject, SubjectOutcome, Target,
};
