//! Shared plumbing for CMS services and tools.
//!
//! Holds the pieces every binary needs at startup (tracing, env config)
//! and small serialization helpers. No domain types live here.

pub mod config;
pub mod serde;
pub mod tracing;
