//! Dependency resolution engine: constraint propagation over guarded edges,
//! chronological backtracking over version choices, cycle detection, and
//! structured conflict explanations.

pub mod cache;
pub mod conflict;
pub mod graph;
pub mod prefetch;
pub mod resolver;

pub use conflict::{Conflict, ConflictKind, ConflictReport, ResolveError};
pub use graph::ResolvedGraph;
pub use resolver::{resolve, Resolver};
