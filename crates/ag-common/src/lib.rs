//! AuthGate Common
//!
//! Shared utilities used by every AuthGate service crate.

pub mod logging;
