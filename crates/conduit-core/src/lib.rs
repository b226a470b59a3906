//! Core data model, error taxonomy and pricing shared by every conduit crate.

pub mod budget;
pub mod error;
pub mod external;
pub mod model;
pub mod pricing;
pub mod session;
pub mod stats;

pub use error::{ConduitError, Result};
pub use model::*;
