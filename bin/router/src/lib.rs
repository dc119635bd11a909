//! Command-line front end for waypoint workflows.
//!
//! Loads workflow definition documents, validates them, inspects stage
//! status, applies graph edits and answers routing requests.

pub mod commands;
pub mod config;
pub mod error;

pub use commands::{Output, RequestSource};
pub use config::RouterConfig;
pub use error::CliError;
