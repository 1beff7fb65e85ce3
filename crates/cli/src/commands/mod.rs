//! CLI command implementations.

pub mod migrate;
pub mod orders;
pub mod track;
