//! Mixer channel state and effective-gain resolution
//!
//! This module decides what linear gain each channel actually plays at,
//! given its own gain plus the mute and solo flags across the strip. The
//! [`MixerRouter`] owns the live gain nodes on the host graph and pushes
//! freshly resolved gains after every mutation; resolution itself is a pure
//! function so it can be tested without a graph.

use crate::domain::graph::{AudioGraph, GainNodeId, GraphError};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Number of mixer channels, master included.
pub const CHANNEL_COUNT: usize = 7;

/// Index of the master channel. It ignores solo state entirely.
pub const MASTER_INDEX: usize = 6;

/// Per-channel mixer state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub index: usize,
    /// Linear gain factor applied before mute/solo resolution.
    pub gain: f64,
    pub muted: bool,
    pub solo: bool,
}

impl ChannelState {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            gain: 1.0,
            muted: false,
            solo: false,
        }
    }

    pub fn is_master(&self) -> bool {
        self.index == MASTER_INDEX
    }
}

/// Resolve the effective playback gain of every channel.
///
/// When any regular channel is soloed, regular channels outside the solo
/// set are forced to 0. The master channel only follows its own mute and
/// gain. Mute always wins over gain.
pub fn resolve_effective_gain(channels: &[ChannelState]) -> Vec<f64> {
    let any_solo = channels.iter().any(|c| !c.is_master() && c.solo);

    channels
        .iter()
        .map(|c| {
            if !c.is_master() && any_solo && !c.solo {
                0.0
            } else if c.muted {
                0.0
            } else {
                c.gain
            }
        })
        .collect()
}

/// Set the solo flag on one channel.
///
/// Enabling solo clears the flag on every other regular channel, so solo
/// stays exclusive among non-master channels (last write wins). The master
/// channel cannot be soloed; asking for it is a no-op.
pub fn set_solo(channels: &mut [ChannelState], index: usize, solo: bool) {
    if index == MASTER_INDEX {
        debug!("ignoring solo request on master channel");
        return;
    }
    if solo {
        for c in channels.iter_mut() {
            if c.index != index && !c.is_master() {
                c.solo = false;
            }
        }
    }
    if let Some(c) = channels.get_mut(index) {
        c.solo = solo;
        trace!(channel = index, solo, "solo changed");
    }
}

/// Owns one live gain node per channel and keeps them in sync
#[derive(Debug, Default)]
pub struct MixerRouter {
    gains: Vec<GainNodeId>,
}

impl MixerRouter {
    /// Create a gain node per channel on the host graph.
    pub fn bind(
        channel_count: usize,
        graph: &mut impl AudioGraph,
    ) -> Result<Self, GraphError> {
        let mut gains = Vec::with_capacity(channel_count);
        for _ in 0..channel_count {
            match graph.create_gain() {
                Ok(id) => gains.push(id),
                Err(e) => {
                    for id in gains {
                        graph.release_gain(id);
                    }
                    return Err(e);
                }
            }
        }
        debug!(channels = channel_count, "mixer gain nodes bound");
        Ok(Self { gains })
    }

    pub fn gain_nodes(&self) -> &[GainNodeId] {
        &self.gains
    }

    /// Recompute effective gains and push them to the host gain nodes.
    pub fn apply(
        &self,
        channels: &[ChannelState],
        graph: &mut impl AudioGraph,
    ) -> Result<(), GraphError> {
        let resolved = resolve_effective_gain(channels);
        for (node, gain) in self.gains.iter().zip(resolved) {
            graph.set_gain(*node, gain)?;
        }
        Ok(())
    }

    /// Release every gain node. Used on profile switch and shutdown.
    pub fn teardown(&mut self, graph: &mut impl AudioGraph) {
        for id in self.gains.drain(..) {
            graph.release_gain(id);
        }
        debug!("mixer gain nodes released");
    }
}
