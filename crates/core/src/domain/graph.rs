//! Host audio graph boundary
//!
//! The core never touches sample buffers; it decides parameters and wiring
//! for nodes that live in a host audio graph. These traits are that
//! boundary. `set_connections` takes the full desired topology and must be
//! idempotent, so callers can re-state the wiring without tracking which
//! edges already exist.

use crate::domain::filter::FilterStage;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by a host graph implementation
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown filter node: {0}")]
    UnknownFilterNode(FilterNodeId),

    #[error("unknown gain node: {0}")]
    UnknownGainNode(GainNodeId),

    #[error("graph backend failure: {0}")]
    Backend(String),
}

/// Handle to a live filter instance in the host graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterNodeId(u64);

impl FilterNodeId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FilterNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter#{}", self.0)
    }
}

/// Handle to a live gain instance in the host graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GainNodeId(u64);

impl GainNodeId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GainNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gain#{}", self.0)
    }
}

/// One endpoint of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// The external pre-chain endpoint (signal source).
    Source,
    /// The external post-chain endpoint (output sink).
    Sink,
    Filter(FilterNodeId),
    Gain(GainNodeId),
}

/// A directed connection between two ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: Port,
    pub to: Port,
}

impl Edge {
    pub fn new(from: Port, to: Port) -> Self {
        Self { from, to }
    }
}

/// Node lifecycle and wiring operations on the host graph
pub trait AudioGraph {
    /// Instantiate a filter node configured from `stage`.
    fn create_filter(&mut self, stage: &FilterStage) -> Result<FilterNodeId>;

    /// Push new parameters to an existing filter node without rewiring.
    fn update_filter(&mut self, id: FilterNodeId, stage: &FilterStage) -> Result<()>;

    /// Release a filter node. Unknown ids are ignored.
    fn release_filter(&mut self, id: FilterNodeId);

    /// Instantiate a gain node at unity gain.
    fn create_gain(&mut self) -> Result<GainNodeId>;

    /// Set the linear gain of an existing gain node.
    fn set_gain(&mut self, id: GainNodeId, gain: f64) -> Result<()>;

    /// Release a gain node. Unknown ids are ignored.
    fn release_gain(&mut self, id: GainNodeId);

    /// Replace the graph wiring with exactly `edges`.
    ///
    /// Idempotent: restating the current topology is always safe.
    fn set_connections(&mut self, edges: &[Edge]) -> Result<()>;
}

/// Per-tick level feed from the host's analysis nodes
pub trait AnalysisTap {
    /// Fill `out` with one normalized amplitude in `[0, 1]` per channel.
    /// Channels beyond what the analyzer provides are set to 0.
    fn levels(&mut self, out: &mut [f64]);
}
