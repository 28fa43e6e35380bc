//! Shared domain model for the production gap backend.
//!
//! Every other crate in the workspace speaks in these types: the equipment
//! graph, the threshold evaluator, the SQLite store and the HTTP layer.

pub mod error;
pub mod id;
pub mod types;

pub use error::{CoreError, Result};
