//! Peak-hold level metering
//!
//! Each channel gets one normalized level sample per render tick. The
//! meter quantizes it into LED units, latches the highest recent value,
//! and fades the latched peak out over a fixed window. All timing flows
//! through the `now` passed by the caller, so the render loop stays the
//! single clock and tests can step time explicitly.

use std::time::{Duration, Instant};
use tracing::trace;

/// Default LED count over the full meter travel.
pub const DEFAULT_SPAN_UNITS: u32 = 20;

/// How long a latched peak survives after being set.
const PEAK_HOLD: Duration = Duration::from_millis(1000);

/// When the fade-out begins within the hold window.
const FADE_START: Duration = Duration::from_millis(650);

const FADE_LEN_SECS: f64 = 0.350;

/// What the renderer draws for one channel's peak marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakIndicator {
    /// Height of the marker in LED units; 0 means nothing to draw.
    pub units: u32,
    /// 1.0 until the fade starts, then linearly down to 0.
    pub opacity: f64,
}

impl PeakIndicator {
    const NONE: Self = Self {
        units: 0,
        opacity: 0.0,
    };
}

#[derive(Debug, Clone, Copy)]
struct MeterChannel {
    level: f64,
    peak_units: u32,
    peak_at: Instant,
}

/// Peak-hold meter bank, one slot per mixer channel
#[derive(Debug)]
pub struct PeakMeter {
    span_units: u32,
    channels: Vec<MeterChannel>,
}

impl PeakMeter {
    pub fn new(channel_count: usize, span_units: u32, now: Instant) -> Self {
        let channels = vec![
            MeterChannel {
                level: 0.0,
                peak_units: 0,
                peak_at: now,
            };
            channel_count
        ];
        Self {
            span_units,
            channels,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Feed one level sample per channel and advance peak state.
    ///
    /// A higher quantized level re-latches the peak at `now`; a latched
    /// peak older than the hold window resets to 0.
    pub fn tick(&mut self, levels: &[f64], now: Instant) {
        for (slot, &raw) in self.channels.iter_mut().zip(levels) {
            let level = raw.clamp(0.0, 1.0);
            slot.level = level;

            let height = (level * self.span_units as f64).ceil() as u32;
            if slot.peak_units == 0 || height > slot.peak_units {
                slot.peak_units = height;
                slot.peak_at = now;
            } else if now.saturating_duration_since(slot.peak_at) >= PEAK_HOLD {
                trace!(units = slot.peak_units, "peak expired");
                slot.peak_units = 0;
                slot.peak_at = now;
            }
        }
    }

    /// Continuous level of a channel as of the last tick.
    pub fn level(&self, channel: usize) -> Option<f64> {
        self.channels.get(channel).map(|c| c.level)
    }

    /// Peak marker for a channel at `now`.
    ///
    /// Pure in `(peak_units, peak_at, now)`: calling this never mutates
    /// meter state, even past the hold window.
    pub fn indicator(&self, channel: usize, now: Instant) -> Option<PeakIndicator> {
        let slot = self.channels.get(channel)?;
        if slot.peak_units == 0 {
            return Some(PeakIndicator::NONE);
        }

        let dt = now.saturating_duration_since(slot.peak_at);
        if dt >= PEAK_HOLD {
            return Some(PeakIndicator::NONE);
        }

        let opacity = if dt < FADE_START {
            1.0
        } else {
            1.0 - (dt - FADE_START).as_secs_f64() / FADE_LEN_SECS
        };
        Some(PeakIndicator {
            units: slot.peak_units,
            opacity,
        })
    }
}
