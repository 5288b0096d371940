pub mod audit;
pub mod config;
pub mod executor;
pub mod model;
pub mod telemetry;
pub mod traits;

// Re-export common types for convenience
pub use audit::{AuditReport, CheckResult, CheckStatus, DependencyAuditor, Ecosystem};
pub use config::{AuditorConfig, ConfigError};
pub use executor::*;
pub use model::*;
pub use traits::*;
