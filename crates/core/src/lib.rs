//! Shared domain types for Agent Farm.
//!
//! No I/O lives here: just the Architect/Builder/Utility/Annotation/Port
//! entities, their enums, and the error taxonomy that every other crate maps
//! its failures into. Keeping this dependency-free (besides serde/chrono)
//! means both the state store and the dashboard server can share one
//! definition of "what a builder is" without a cyclic dependency.

pub mod ids;
pub mod model;

pub use ids::*;
pub use model::*;
