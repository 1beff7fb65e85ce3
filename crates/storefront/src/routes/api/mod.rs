//! Machine-facing API endpoints.

pub mod orders;
pub mod tracking;
