//! # Reports Core
//!
//! Core logic for the reports admin: HTML reports kept in a GitHub repository next to a JSON
//! index that lists them.
//!
//! This crate contains:
//! - [`config`]: the `.env`-style config file and the immutable client settings
//! - [`github`]: an authenticated GitHub client with retry, backoff and rate-limit waits, and a
//!   multi-file batch commit
//! - [`reports`]: report create/update/delete/get on top of the client
//!
//! **No API concerns**: HTTP servers and CLI parsing belong in `api-rest` and `reports-cli`.

pub mod config;
pub mod constants;
pub mod error;
pub mod github;
pub mod reports;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{AdminConfig, ConfigStore, ConfigUpdate, GitHubConfig};
pub use error::{ErrorKind, GitHubError, GitHubResult, ReportsError, ReportsResult};
pub use github::{GitHubClient, RetryPolicy};
pub use reports::{
    DeletedReport, IndexSnapshot, NewReport, Report, ReportMeta, ReportUpdate, ReportsIndex,
    ReportsManager,
};
pub use store::RepoStore;
