//! Software host graph
//!
//! A control-rate stand-in for a native audio graph: it keeps the node
//! registry, the desired topology and a host-fed level frame, but moves no
//! samples. The core drives it exactly like it would drive a real backend,
//! which makes it the reference implementation for integration tests and
//! the CLI.

use cadenza_core::domain::filter::{BiquadCoeffs, FilterStage};
use cadenza_core::domain::graph::{
    AnalysisTap, AudioGraph, Edge, FilterNodeId, GainNodeId, GraphError, Port, Result,
};
use std::collections::HashMap;
use tracing::{debug, trace};

/// In-memory audio graph
#[derive(Debug)]
pub struct SoftwareGraph {
    sample_rate: f64,
    filters: HashMap<FilterNodeId, FilterStage>,
    gains: HashMap<GainNodeId, f64>,
    edges: Vec<Edge>,
    level_frame: Vec<f64>,
    next_id: u64,
}

impl SoftwareGraph {
    pub fn new(sample_rate: f64, channel_count: usize) -> Self {
        Self {
            sample_rate,
            filters: HashMap::new(),
            gains: HashMap::new(),
            edges: Vec::new(),
            level_frame: vec![0.0; channel_count],
            next_id: 0,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Current desired topology, as last set by the core.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Whether the wiring is the explicit source-to-sink bypass.
    pub fn is_bypassed(&self) -> bool {
        self.edges == [Edge::new(Port::Source, Port::Sink)]
    }

    pub fn filter(&self, id: FilterNodeId) -> Option<&FilterStage> {
        self.filters.get(&id)
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn gain(&self, id: GainNodeId) -> Option<f64> {
        self.gains.get(&id).copied()
    }

    pub fn gain_count(&self) -> usize {
        self.gains.len()
    }

    /// All live gain values, in no particular order.
    pub fn gain_values(&self) -> Vec<f64> {
        self.gains.values().copied().collect()
    }

    /// Store the analysis frame the next tick will read.
    ///
    /// A real backend would fill this from its analyser nodes; here the
    /// host supplies it. Missing channels read as silence.
    pub fn feed_levels(&mut self, levels: &[f64]) {
        for (slot, &level) in self.level_frame.iter_mut().zip(levels) {
            *slot = level;
        }
        for slot in self.level_frame.iter_mut().skip(levels.len()) {
            *slot = 0.0;
        }
    }

    /// Magnitude response of one live node, matching the core's analytic
    /// evaluation of the same stage.
    pub fn magnitude_at(&self, id: FilterNodeId, frequency_hz: f64) -> Result<f64> {
        let stage = self
            .filters
            .get(&id)
            .ok_or(GraphError::UnknownFilterNode(id))?;
        Ok(BiquadCoeffs::for_stage(stage, self.sample_rate)
            .magnitude_at(frequency_hz, self.sample_rate))
    }

    fn fresh_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl AudioGraph for SoftwareGraph {
    fn create_filter(&mut self, stage: &FilterStage) -> Result<FilterNodeId> {
        let id = FilterNodeId::new(self.fresh_id());
        self.filters.insert(id, *stage);
        trace!(%id, kind = %stage.kind, "filter node created");
        Ok(id)
    }

    fn update_filter(&mut self, id: FilterNodeId, stage: &FilterStage) -> Result<()> {
        match self.filters.get_mut(&id) {
            Some(slot) => {
                *slot = *stage;
                Ok(())
            }
            None => Err(GraphError::UnknownFilterNode(id)),
        }
    }

    fn release_filter(&mut self, id: FilterNodeId) {
        if self.filters.remove(&id).is_some() {
            trace!(%id, "filter node released");
        }
    }

    fn create_gain(&mut self) -> Result<GainNodeId> {
        let id = GainNodeId::new(self.fresh_id());
        self.gains.insert(id, 1.0);
        trace!(%id, "gain node created");
        Ok(id)
    }

    fn set_gain(&mut self, id: GainNodeId, gain: f64) -> Result<()> {
        match self.gains.get_mut(&id) {
            Some(slot) => {
                *slot = gain;
                Ok(())
            }
            None => Err(GraphError::UnknownGainNode(id)),
        }
    }

    fn release_gain(&mut self, id: GainNodeId) {
        if self.gains.remove(&id).is_some() {
            trace!(%id, "gain node released");
        }
    }

    fn set_connections(&mut self, edges: &[Edge]) -> Result<()> {
        for edge in edges {
            for port in [edge.from, edge.to] {
                match port {
                    Port::Filter(id) if !self.filters.contains_key(&id) => {
                        return Err(GraphError::UnknownFilterNode(id));
                    }
                    Port::Gain(id) if !self.gains.contains_key(&id) => {
                        return Err(GraphError::UnknownGainNode(id));
                    }
                    _ => {}
                }
            }
        }
        self.edges = edges.to_vec();
        debug!(edges = self.edges.len(), "topology replaced");
        Ok(())
    }
}

impl AnalysisTap for SoftwareGraph {
    fn levels(&mut self, out: &mut [f64]) {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.level_frame.get(i).copied().unwrap_or(0.0);
        }
    }
}
