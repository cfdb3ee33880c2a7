//! Resolve, fetch, verify, build and install the `doot` executable.
//!
//! The entry point is [`Pipeline`]; every stage is also usable on its own.

pub mod builder;
pub mod catalog;
pub mod check;
pub mod completions;
pub mod config;
pub mod error;
pub mod installer;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod platform;
pub mod preflight;
pub mod process;

pub mod reporter;

pub use catalog::{Catalog, CatalogError};
pub use config::{InstallConfig, RetryPolicy};
pub use error::InstallError;
pub use paths::*;
pub use pipeline::{InstallOutcome, InstallPlan, InstallRequest, Pipeline};
pub use reporter::{NullReporter, Reporter};

/// User Agent string for artifact downloads
pub const USER_AGENT: &str = concat!("doot-install/", env!("CARGO_PKG_VERSION"));
