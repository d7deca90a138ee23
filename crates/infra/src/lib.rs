//! Cadenza infrastructure: host-graph implementations backing the core's
//! collaborator traits.

pub mod graph;
