//! Position-to-value mappings for the control surface
//!
//! Two axes share the same shape of math. The frequency axis is a plain
//! logarithmic interpolation between 20 Hz and nyquist. The volume axis is
//! a symmetric-log curve between -50 dB and +10 dB: it compresses the
//! extremes and stretches the travel around 0 dB, so small audible moves
//! near unity gain get a usably large share of the fader throw. A ratio of
//! 1 is a hard mute and maps to -inf dB.

/// Lowest frequency on the plotted axis, in Hz.
pub const FREQ_MIN: f64 = 20.0;

/// Bottom of the finite volume range, in dB. Anything at or below this
/// renders at the end of the fader travel.
pub const DB_MIN: f64 = -50.0;

/// Top of the volume range, in dB.
pub const DB_MAX: f64 = 10.0;

/// Curvature constant of the symmetric-log mapping.
const SYM_LOG_C: f64 = 40.0 / std::f64::consts::LN_10;

/// Map a normalized position on the frequency axis to Hz.
///
/// `ratio_to_frequency(0.0) == FREQ_MIN` and `ratio_to_frequency(1.0)` is
/// nyquist; the result is clamped to `[0, nyquist]`.
pub fn ratio_to_frequency(ratio: f64, sample_rate: f64) -> f64 {
    let nyquist = sample_rate / 2.0;
    let hz = 10.0_f64.powf(ratio * (nyquist / FREQ_MIN).log10() + FREQ_MIN.log10());
    hz.clamp(0.0, nyquist)
}

fn sym_log(x: f64) -> f64 {
    x.signum() * ((x / SYM_LOG_C).abs() + 1.0).log10()
}

fn sym_log_inv(y: f64) -> f64 {
    y.signum() * SYM_LOG_C * (10.0_f64.powf(y.abs()) - 1.0)
}

fn axis_span() -> (f64, f64) {
    (sym_log(DB_MAX), sym_log(DB_MIN))
}

/// Map a gain in dB to a normalized fader position in `[0, 1]`.
///
/// Position 0 is +10 dB, position 1 is -50 dB; `-inf` (full attenuation)
/// also lands at 1.
pub fn db_to_ratio(db: f64) -> f64 {
    let (max_y, min_y) = axis_span();
    ((max_y - sym_log(db)) / (max_y - min_y)).clamp(0.0, 1.0)
}

/// Map a normalized fader position back to a gain in dB.
///
/// A position at or past the end of the travel is a hard mute and returns
/// `-inf`; everything else clamps into `[DB_MIN, DB_MAX]`.
pub fn ratio_to_db(ratio: f64) -> f64 {
    if ratio >= 1.0 {
        return f64::NEG_INFINITY;
    }
    let (max_y, min_y) = axis_span();
    sym_log_inv(max_y - ratio * (max_y - min_y)).clamp(DB_MIN, DB_MAX)
}

/// Convert decibels to a linear gain factor. `-inf` maps to 0.
pub fn db_to_gain(db: f64) -> f64 {
    if db == f64::NEG_INFINITY {
        0.0
    } else {
        10.0_f64.powf(db / 20.0)
    }
}

/// Convert a linear gain factor to decibels. 0 maps to `-inf`.
pub fn gain_to_db(gain: f64) -> f64 {
    if gain <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * gain.log10()
    }
}
