//! Core types for the dwq query language.
//!
//! This crate provides foundational types used throughout the query
//! compiler and engine:
//! - Source spans and positions
//! - Constants and their rendering domains (literal and DWARF-symbolic)
//! - The error taxonomy shared by analysis and execution

pub mod constant;
pub mod domain;
pub mod error;
pub mod span;

// Re-export commonly used types at crate root
pub use constant::Constant;
pub use domain::{known_constant, Brevity, Domain};
pub use error::{QueryError, Result};
pub use span::{Pos, Span};
