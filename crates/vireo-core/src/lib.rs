//! # vireo-core
//!
//! Core types and error handling for the vireo stream resolver.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
