//! sqldoc services layer
//!
//! This crate sits between the command line and the pipeline crates. It runs
//! one documentation run at a time as a background task.
//!
//! # Architecture
//!
//! ```text
//! CLI (sqldoc-cli)
//!     ↓
//! Service Layer (sqldoc-services) ← This crate
//!     ↓
//! Pipeline (sqldoc-catalog, sqldoc-render)
//!     ↓
//! Infrastructure (sqldoc-core, sqldoc-driver-mssql)
//! ```
//!
//! # Services
//!
//! - [`DocumentationService`] - starts, tracks and cancels documentation runs

mod documentation_service;
mod error;
mod run;

pub use documentation_service::DocumentationService;
pub use error::{ServiceError, ServiceResult};
pub use run::{
    RunHandle, RunOutcome, RunProgress, RunProgressCallback, RunReport, RunRequest,
};
