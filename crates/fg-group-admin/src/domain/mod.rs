//! # Domain Module
//!
//! Core types and pure logic for group administration. No I/O.

pub mod config;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod registry;
pub mod validator;
pub mod value_objects;

pub use config::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use registry::*;
pub use validator::*;
pub use value_objects::*;
