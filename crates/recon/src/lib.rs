//! `migcheck-recon`: cross-database migration reconciliation engine.
//!
//! Pure engine crate: queries two [`DataSource`]s through a narrow trait,
//! normalizes and compares what comes back, and folds the outcomes into a
//! [`ValidationReport`]. No CLI, no concrete database driver.

pub mod aggregate;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod index;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod source;
pub mod structural;

pub use config::ReconConfig;
pub use context::{CancelToken, RunContext};
pub use engine::{run, Engine, RunState};
pub use error::{ConfigError, ReconError, SourceError};
pub use model::{RawValue, Record};
pub use report::{Category, RuleStatus, ValidationReport, ValidationStatus};
pub use source::{DataSource, Params};
