//! Core data types for Bramble.
//!
//! This crate defines everything the resolver consumes: parsed versions and
//! version constraints, typed build variants, guard predicates and the text
//! syntax they are written in, recipes and their TOML encoding, the `Spec`
//! node type, the resolution configuration object, and the recipe
//! repository interface.
//!
//! This crate is intentionally free of async code and of any resolution
//! logic.

pub mod config;
pub mod error;
pub mod guard;
pub mod recipe;
pub mod repository;
pub mod spec;
pub mod syntax;
pub mod variant;
pub mod version;
