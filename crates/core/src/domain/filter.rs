//! Parametric filter stages and their transfer functions
//!
//! A [`FilterStage`] is the pure parameter record for one equalizer band.
//! [`BiquadCoeffs`] derives the corresponding second-order section and can
//! evaluate its magnitude response analytically, which is what the response
//! synthesizer plots. Actual sample processing happens in the host audio
//! graph, never here.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Smallest admissible Q. Values at or below zero would blow up the
/// resonance term, so stages are clamped before coefficients are derived.
pub const MIN_Q: f64 = 1e-4;

/// Filter band topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
    Lowshelf,
    Highshelf,
    Peaking,
    Notch,
}

impl FilterKind {
    /// Whether `gain_db` participates in this topology.
    pub fn uses_gain(self) -> bool {
        matches!(
            self,
            FilterKind::Lowshelf | FilterKind::Highshelf | FilterKind::Peaking
        )
    }

    /// Whether `q` participates in this topology.
    pub fn uses_q(self) -> bool {
        matches!(
            self,
            FilterKind::Lowpass
                | FilterKind::Highpass
                | FilterKind::Bandpass
                | FilterKind::Peaking
                | FilterKind::Notch
        )
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterKind::Lowpass => "lowpass",
            FilterKind::Highpass => "highpass",
            FilterKind::Bandpass => "bandpass",
            FilterKind::Lowshelf => "lowshelf",
            FilterKind::Highshelf => "highshelf",
            FilterKind::Peaking => "peaking",
            FilterKind::Notch => "notch",
        };
        write!(f, "{}", name)
    }
}

/// Parameter record for one stage of the equalizer chain
///
/// `gain_db` is only meaningful for shelf and peaking stages, `q` only for
/// the resonant topologies; the other field is carried but ignored so a
/// stage keeps its settings when the user switches its kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStage {
    pub kind: FilterKind,
    pub frequency_hz: f64,
    pub gain_db: f64,
    pub q: f64,
}

impl FilterStage {
    pub fn new(kind: FilterKind, frequency_hz: f64) -> Self {
        Self {
            kind,
            frequency_hz,
            gain_db: 0.0,
            q: 1.0,
        }
    }

    /// Clamp parameters to the representable range for `sample_rate`.
    ///
    /// Invariant: `frequency_hz` stays within `[0, nyquist]` and `q` stays
    /// strictly positive.
    pub fn clamp_to(&mut self, sample_rate: f64) {
        let nyquist = sample_rate / 2.0;
        self.frequency_hz = self.frequency_hz.clamp(0.0, nyquist);
        self.q = self.q.max(MIN_Q);
    }

    pub fn clamped(mut self, sample_rate: f64) -> Self {
        self.clamp_to(sample_rate);
        self
    }
}

impl Default for FilterStage {
    fn default() -> Self {
        Self::new(FilterKind::Peaking, 1000.0)
    }
}

/// A single in-place parameter update for a stage
///
/// Carried through the cheap mutate path so drag and scroll interactions
/// never trigger a chain rewire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageChange {
    Kind(FilterKind),
    Frequency(f64),
    Gain(f64),
    Q(f64),
}

impl StageChange {
    pub fn apply(self, stage: &mut FilterStage) {
        match self {
            StageChange::Kind(kind) => stage.kind = kind,
            StageChange::Frequency(hz) => stage.frequency_hz = hz,
            StageChange::Gain(db) => stage.gain_db = db,
            StageChange::Q(q) => stage.q = q,
        }
    }
}

/// Normalized biquad coefficients (a0 folded into the others)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// Derive coefficients for a stage at the given sample rate.
    ///
    /// The stage is clamped first so the trigonometric terms stay in range.
    #[must_use]
    pub fn for_stage(stage: &FilterStage, sample_rate: f64) -> Self {
        let stage = stage.clamped(sample_rate);
        let w0 = 2.0 * PI * stage.frequency_hz / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * stage.q);

        match stage.kind {
            FilterKind::Lowpass => {
                let b1 = 1.0 - cos_w0;
                Self::normalized(
                    b1 / 2.0,
                    b1,
                    b1 / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_w0,
                    1.0 - alpha,
                )
            }
            FilterKind::Highpass => {
                let b1 = -(1.0 + cos_w0);
                Self::normalized(
                    -b1 / 2.0,
                    b1,
                    -b1 / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_w0,
                    1.0 - alpha,
                )
            }
            FilterKind::Bandpass => Self::normalized(
                alpha,
                0.0,
                -alpha,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::Notch => Self::normalized(
                1.0,
                -2.0 * cos_w0,
                1.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::Peaking => {
                let a = 10.0_f64.powf(stage.gain_db / 40.0);
                Self::normalized(
                    1.0 + alpha * a,
                    -2.0 * cos_w0,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_w0,
                    1.0 - alpha / a,
                )
            }
            FilterKind::Lowshelf => {
                let a = 10.0_f64.powf(stage.gain_db / 40.0);
                let beta = 2.0 * a.sqrt() * alpha;
                Self::normalized(
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + beta),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - beta),
                    (a + 1.0) + (a - 1.0) * cos_w0 + beta,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - beta,
                )
            }
            FilterKind::Highshelf => {
                let a = 10.0_f64.powf(stage.gain_db / 40.0);
                let beta = 2.0 * a.sqrt() * alpha;
                Self::normalized(
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + beta),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - beta),
                    (a + 1.0) - (a - 1.0) * cos_w0 + beta,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - beta,
                )
            }
        }
    }

    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Linear magnitude of the transfer function at `frequency_hz`.
    ///
    /// Evaluates H(z) on the unit circle at z = e^(jw). A true zero of the
    /// section yields magnitude 0, which the caller turns into -inf dB.
    pub fn magnitude_at(&self, frequency_hz: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency_hz / sample_rate;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let num = Complex64::new(self.b0, 0.0) + z1 * self.b1 + z2 * self.b2;
        let den = Complex64::new(1.0, 0.0) + z1 * self.a1 + z2 * self.a2;
        (num / den).norm()
    }
}
