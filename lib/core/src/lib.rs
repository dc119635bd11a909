//! Core domain types and utilities for waypoint.
//!
//! This crate provides the identifier types and error handling foundation
//! shared by the workflow routing library and its front ends.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, RouteId, StageId, WorkflowId};
