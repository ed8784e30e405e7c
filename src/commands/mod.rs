pub mod mapping;
pub mod plan;
pub mod provision;
