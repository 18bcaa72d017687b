//! Shared utilities for Bramble.
//!
//! Cross-cutting concerns used by the other Bramble crates: the unified
//! error type, content hashing for spec identities, filesystem lookup
//! helpers, and styled status lines for the command-line front end.

pub mod errors;
pub mod fs;
pub mod hash;
pub mod progress;
