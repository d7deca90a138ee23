//! Aggregate frequency-response synthesis for the plotted curve
//!
//! Stages in a chain are cascaded, so their decibel contributions add. The
//! synthesizer samples the axis logarithmically from 20 Hz up to nyquist
//! and sums per-stage magnitudes converted to dB. A stage magnitude of 0
//! contributes -inf, and the sum propagates it; the curve renderer decides
//! how to draw that, not this module.

use crate::domain::curve::FREQ_MIN;
use crate::domain::filter::{BiquadCoeffs, FilterStage};

/// Per-stage magnitude evaluation
///
/// The default is the analytic biquad transfer function; a host can plug in
/// its own DSP node measurement instead, as long as the two agree within
/// floating tolerance.
pub trait StageEvaluator {
    fn magnitude(&self, stage: &FilterStage, frequency_hz: f64, sample_rate: f64) -> f64;
}

/// Evaluates stages through [`BiquadCoeffs`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticEvaluator;

impl StageEvaluator for AnalyticEvaluator {
    fn magnitude(&self, stage: &FilterStage, frequency_hz: f64, sample_rate: f64) -> f64 {
        BiquadCoeffs::for_stage(stage, sample_rate).magnitude_at(frequency_hz, sample_rate)
    }
}

/// Frequency of response sample `i` out of `sample_count`.
pub fn sample_frequency(i: usize, sample_count: usize, sample_rate: f64) -> f64 {
    let nyquist = sample_rate / 2.0;
    let step = (nyquist / FREQ_MIN).log10() / sample_count as f64;
    10.0_f64
        .powf(i as f64 * step + FREQ_MIN.log10())
        .min(nyquist)
}

/// Synthesize the chain's aggregate response as `sample_count` dB values.
///
/// Pure: the chain is read, never mutated. An empty chain yields a flat
/// 0 dB line.
pub fn compute_response(
    chain: &[FilterStage],
    sample_rate: f64,
    sample_count: usize,
) -> Vec<f64> {
    compute_response_with(&AnalyticEvaluator, chain, sample_rate, sample_count)
}

/// Same as [`compute_response`] with a caller-supplied evaluator.
pub fn compute_response_with(
    evaluator: &dyn StageEvaluator,
    chain: &[FilterStage],
    sample_rate: f64,
    sample_count: usize,
) -> Vec<f64> {
    (0..sample_count)
        .map(|i| {
            let freq = sample_frequency(i, sample_count, sample_rate);
            aggregate_db(evaluator, chain, freq, sample_rate)
        })
        .collect()
}

/// Aggregate dB of the whole chain at a single frequency.
///
/// Used for markers drawn at each stage's center frequency.
pub fn response_at(chain: &[FilterStage], frequency_hz: f64, sample_rate: f64) -> f64 {
    aggregate_db(&AnalyticEvaluator, chain, frequency_hz, sample_rate)
}

fn aggregate_db(
    evaluator: &dyn StageEvaluator,
    chain: &[FilterStage],
    frequency_hz: f64,
    sample_rate: f64,
) -> f64 {
    chain
        .iter()
        .map(|stage| 20.0 * evaluator.magnitude(stage, frequency_hz, sample_rate).log10())
        .sum()
}
