//! # Fleet Groups Benchmarks
//!
//! Fixtures and benchmark bodies; `benches/` wires them into criterion.

pub mod group_admin;
