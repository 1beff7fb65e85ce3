//! Session-held shopper state.

pub mod session;

pub use session::session_keys;
