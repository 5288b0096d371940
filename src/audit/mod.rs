//! Dependency vulnerability auditing.
//!
//! The flow for one repository is
//! `detect -> adapters::collect -> TreeBuilder::finish -> matcher::annotate
//! -> scoring::aggregate -> report::assemble`, driven by
//! [`DependencyAuditor`]. Each stage is usable on its own.

pub mod adapters;
pub mod catalog;
pub mod detect;
pub mod matcher;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod tool;
pub mod tree;

pub use adapters::{AdapterError, Ingestion};
pub use catalog::{CatalogError, VulnerabilityCatalog};
pub use detect::{detect, Ecosystem};
pub use pipeline::DependencyAuditor;
pub use report::{AuditReport, AuditStats, CheckResult, CheckStatus};
pub use tool::{SystemToolRunner, ToolCommand, ToolError, ToolOutput, ToolRunner};
pub use tree::TreeBuilder;
