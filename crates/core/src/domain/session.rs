//! Active editing session
//!
//! A [`Session`] is the explicit context for everything that happens while
//! a profile is live: it owns a detached copy of the profile, the live
//! chain and gain nodes on the host graph, and the meter bank. An external
//! UI layer drives it through plain methods; there are no listeners and no
//! ambient globals. Dropping or swapping the session releases every live
//! node synchronously.

use crate::domain::chain::{ChainError, ChainManager};
use crate::domain::filter::{FilterStage, StageChange};
use crate::domain::graph::{AnalysisTap, AudioGraph, GraphError};
use crate::domain::meter::{PeakIndicator, PeakMeter};
use crate::domain::mixer::{self, MixerRouter};
use crate::domain::profile::Profile;
use crate::domain::response;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Recoverable: the caller's channel index does not exist.
    #[error("channel index {0} out of range")]
    UnknownChannel(usize),
}

/// Live editing state for one active profile
pub struct Session<G> {
    profile: Profile,
    sample_rate: f64,
    chain: ChainManager,
    router: MixerRouter,
    meter: PeakMeter,
    meter_span_units: u32,
    graph: G,
    level_scratch: Vec<f64>,
}

impl<G: AudioGraph + AnalysisTap> Session<G> {
    /// Bring a profile live on the host graph.
    ///
    /// Builds the filter chain (or the explicit bypass), binds one gain
    /// node per channel and pushes the initial resolved gains.
    pub fn start(
        mut profile: Profile,
        sample_rate: f64,
        meter_span_units: u32,
        mut graph: G,
        now: Instant,
    ) -> Result<Self> {
        profile.normalize();

        let mut chain = ChainManager::new(sample_rate);
        chain.rebuild(&profile.filter_chain, &mut graph)?;

        let router = match MixerRouter::bind(profile.channels.len(), &mut graph) {
            Ok(router) => router,
            Err(e) => {
                chain.teardown(&mut graph);
                return Err(e.into());
            }
        };
        router.apply(&profile.channels, &mut graph)?;

        let meter = PeakMeter::new(profile.channels.len(), meter_span_units, now);
        let level_scratch = vec![0.0; profile.channels.len()];

        info!(profile = profile.id, stages = chain.len(), "session started");
        Ok(Self {
            profile,
            sample_rate,
            chain,
            router,
            meter,
            meter_span_units,
            graph,
            level_scratch,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    // ------------------------------------------------------------------
    // Stage commands
    // ------------------------------------------------------------------

    /// Append a stage to the chain and rewire.
    pub fn add_stage(&mut self, stage: FilterStage) -> Result<()> {
        self.chain
            .insert(&mut self.profile.filter_chain, stage, &mut self.graph)?;
        Ok(())
    }

    /// Remove the stage at `index` and rewire. Out-of-range indices are
    /// reported and change nothing.
    pub fn remove_stage(&mut self, index: usize) -> Result<()> {
        self.chain
            .remove(&mut self.profile.filter_chain, index, &mut self.graph)
            .map_err(|e| {
                warn!(index, error = %e, "remove_stage rejected");
                e
            })?;
        Ok(())
    }

    /// Update one parameter of a live stage without rewiring.
    pub fn mutate_stage(&mut self, index: usize, change: StageChange) -> Result<()> {
        self.chain
            .mutate(
                &mut self.profile.filter_chain,
                index,
                change,
                &mut self.graph,
            )
            .map_err(|e| {
                warn!(index, error = %e, "mutate_stage rejected");
                e
            })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Channel commands
    // ------------------------------------------------------------------

    /// Set a channel's linear gain and push the resolved gains.
    pub fn set_channel_gain(&mut self, index: usize, gain: f64) -> Result<()> {
        let channel = self
            .profile
            .channels
            .get_mut(index)
            .ok_or(SessionError::UnknownChannel(index))?;
        channel.gain = gain.max(0.0);
        self.router.apply(&self.profile.channels, &mut self.graph)?;
        Ok(())
    }

    /// Flip a channel's mute flag; returns the new state.
    pub fn toggle_mute(&mut self, index: usize) -> Result<bool> {
        let channel = self
            .profile
            .channels
            .get_mut(index)
            .ok_or(SessionError::UnknownChannel(index))?;
        channel.muted = !channel.muted;
        let muted = channel.muted;
        debug!(channel = index, muted, "mute toggled");

        self.router.apply(&self.profile.channels, &mut self.graph)?;
        Ok(muted)
    }

    /// Flip a channel's solo flag; enabling it steals solo from every
    /// other regular channel. Returns the new state.
    pub fn toggle_solo(&mut self, index: usize) -> Result<bool> {
        if index >= self.profile.channels.len() {
            return Err(SessionError::UnknownChannel(index));
        }
        let solo = !self.profile.channels[index].solo;
        mixer::set_solo(&mut self.profile.channels, index, solo);

        self.router.apply(&self.profile.channels, &mut self.graph)?;
        Ok(self.profile.channels[index].solo)
    }

    // ------------------------------------------------------------------
    // Render tick and queries
    // ------------------------------------------------------------------

    /// Pull fresh analysis levels and advance the meters.
    pub fn tick(&mut self, now: Instant) {
        self.graph.levels(&mut self.level_scratch);
        self.meter.tick(&self.level_scratch, now);
    }

    /// The chain's aggregate response curve, in dB per sampled frequency.
    pub fn response(&self, sample_count: usize) -> Vec<f64> {
        response::compute_response(&self.profile.filter_chain, self.sample_rate, sample_count)
    }

    /// Aggregate dB of the chain at a single frequency.
    pub fn response_at(&self, frequency_hz: f64) -> f64 {
        response::response_at(&self.profile.filter_chain, frequency_hz, self.sample_rate)
    }

    /// Resolved playback gain per channel.
    pub fn effective_gains(&self) -> Vec<f64> {
        mixer::resolve_effective_gain(&self.profile.channels)
    }

    /// Peak marker for a channel at `now`.
    pub fn meter(&self, channel: usize, now: Instant) -> Option<PeakIndicator> {
        self.meter.indicator(channel, now)
    }

    /// Continuous level of a channel as of the last tick.
    pub fn level(&self, channel: usize) -> Option<f64> {
        self.meter.level(channel)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Replace the active profile, returning the previous one for the
    /// caller to commit. All live nodes of the old profile are released
    /// before the new chain is built.
    pub fn swap_profile(&mut self, mut profile: Profile, now: Instant) -> Result<Profile> {
        self.chain.teardown(&mut self.graph);
        self.router.teardown(&mut self.graph);

        profile.normalize();
        self.chain
            .rebuild(&profile.filter_chain, &mut self.graph)?;
        self.router = MixerRouter::bind(profile.channels.len(), &mut self.graph)?;
        self.router.apply(&profile.channels, &mut self.graph)?;

        self.meter = PeakMeter::new(profile.channels.len(), self.meter_span_units, now);
        self.level_scratch = vec![0.0; profile.channels.len()];

        let previous = std::mem::replace(&mut self.profile, profile);
        info!(from = previous.id, to = self.profile.id, "profile swapped");
        Ok(previous)
    }

    /// Tear down all live nodes and hand back the edited profile.
    pub fn into_profile(mut self) -> Profile {
        self.chain.teardown(&mut self.graph);
        self.router.teardown(&mut self.graph);
        info!(profile = self.profile.id, "session ended");
        self.profile
    }
}
