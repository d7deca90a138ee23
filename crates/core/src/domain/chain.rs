//! Live filter chain management
//!
//! The [`ChainManager`] keeps one live filter node per stage of the active
//! profile's chain, in signal order, and owns the wiring between the host's
//! pre and post endpoints. Structural edits rebuild the chain; parameter
//! edits take the cheap in-place path so dragging a node never rewires
//! anything.

use crate::domain::filter::{FilterStage, StageChange};
use crate::domain::graph::{AudioGraph, Edge, FilterNodeId, GraphError, Port};
use thiserror::Error;
use tracing::{debug, trace};

pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Debug, Error)]
pub enum ChainError {
    /// Recoverable: the caller's stage index no longer matches the chain.
    #[error("stage index {index} out of range ({len} stages)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Owns the live filter nodes mirroring a profile's stage list
#[derive(Debug)]
pub struct ChainManager {
    nodes: Vec<FilterNodeId>,
    sample_rate: f64,
}

impl ChainManager {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            nodes: Vec::new(),
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[FilterNodeId] {
        &self.nodes
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Discard the live chain and instantiate it afresh from `chain`.
    ///
    /// The endpoints are never left dangling: an empty chain wires the
    /// source straight to the sink, and any failure releases every node
    /// created so far and restores the bypass wiring before the error is
    /// returned.
    pub fn rebuild(
        &mut self,
        chain: &[FilterStage],
        graph: &mut impl AudioGraph,
    ) -> Result<()> {
        for node in self.nodes.drain(..) {
            graph.release_filter(node);
        }

        let mut created = Vec::with_capacity(chain.len());
        for stage in chain {
            match graph.create_filter(&stage.clamped(self.sample_rate)) {
                Ok(id) => created.push(id),
                Err(e) => {
                    Self::abort_rebuild(created, graph);
                    return Err(e.into());
                }
            }
        }

        let edges = Self::serial_edges(&created);
        if let Err(e) = graph.set_connections(&edges) {
            Self::abort_rebuild(created, graph);
            return Err(e.into());
        }

        debug!(stages = created.len(), "filter chain rebuilt");
        self.nodes = created;
        Ok(())
    }

    fn abort_rebuild(created: Vec<FilterNodeId>, graph: &mut impl AudioGraph) {
        for id in created {
            graph.release_filter(id);
        }
        let bypass = [Edge::new(Port::Source, Port::Sink)];
        let _ = graph.set_connections(&bypass);
    }

    /// Serial wiring source -> s0 -> .. -> sn -> sink, or an explicit
    /// source -> sink bypass for an empty chain.
    fn serial_edges(nodes: &[FilterNodeId]) -> Vec<Edge> {
        let Some((&first, rest)) = nodes.split_first() else {
            return vec![Edge::new(Port::Source, Port::Sink)];
        };

        let mut edges = Vec::with_capacity(nodes.len() + 1);
        edges.push(Edge::new(Port::Source, Port::Filter(first)));
        let mut prev = first;
        for &next in rest {
            edges.push(Edge::new(Port::Filter(prev), Port::Filter(next)));
            prev = next;
        }
        edges.push(Edge::new(Port::Filter(prev), Port::Sink));
        edges
    }

    /// Append a stage to `chain` and rebuild the live instances.
    pub fn insert(
        &mut self,
        chain: &mut Vec<FilterStage>,
        stage: FilterStage,
        graph: &mut impl AudioGraph,
    ) -> Result<()> {
        chain.push(stage.clamped(self.sample_rate));
        self.rebuild(chain, graph)
    }

    /// Remove the stage at `index` and rebuild the live instances.
    pub fn remove(
        &mut self,
        chain: &mut Vec<FilterStage>,
        index: usize,
        graph: &mut impl AudioGraph,
    ) -> Result<()> {
        if index >= chain.len() {
            return Err(ChainError::IndexOutOfRange {
                index,
                len: chain.len(),
            });
        }
        chain.remove(index);
        self.rebuild(chain, graph)
    }

    /// Apply a parameter change to both the profile record and the live
    /// node, without rewiring.
    pub fn mutate(
        &mut self,
        chain: &mut [FilterStage],
        index: usize,
        change: StageChange,
        graph: &mut impl AudioGraph,
    ) -> Result<()> {
        let len = chain.len();
        let stage = chain
            .get_mut(index)
            .ok_or(ChainError::IndexOutOfRange { index, len })?;

        change.apply(stage);
        stage.clamp_to(self.sample_rate);
        graph.update_filter(self.nodes[index], stage)?;
        trace!(index, ?change, "stage mutated in place");
        Ok(())
    }

    /// Release every live node and disconnect the endpoints.
    ///
    /// Called synchronously on profile switch and session teardown so no
    /// stale instance stays connected to the signal path.
    pub fn teardown(&mut self, graph: &mut impl AudioGraph) {
        for node in self.nodes.drain(..) {
            graph.release_filter(node);
        }
        let _ = graph.set_connections(&[]);
        debug!("filter chain released");
    }
}
