//! Provisioning engine for confseed
//!
//! The engine runs the policy against a site in stages:
//! 1. Users - Join policy users with the account mapping
//! 2. Group - Create or adopt the group, add members
//! 3. Spaces - Create or adopt each space
//! 4. Permissions - Grant read first, then the rule's operations
//! 5. Content - Create or adopt the page, restrict it admin first

pub mod progress;
pub mod provision;
pub mod report;

pub use progress::ConsoleProgress;
pub use provision::{ProvisionOptions, Provisioner, grantees};
pub use report::ProvisionReport;
