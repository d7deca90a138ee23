//! Example plotting an equalizer chain's response curve as ASCII art
//!
//! Run with: cargo run --package cadenza-core --example response_demo

use cadenza_core::domain::filter::{FilterKind, FilterStage};
use cadenza_core::domain::response::{compute_response, sample_frequency};

const SAMPLE_RATE: f64 = 44100.0;
const POINTS: usize = 64;
const ROWS: i32 = 13;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("cadenza_core=debug,info")
        .init();

    let chain = vec![
        FilterStage {
            kind: FilterKind::Lowshelf,
            frequency_hz: 150.0,
            gain_db: 4.0,
            q: std::f64::consts::FRAC_1_SQRT_2,
        },
        FilterStage {
            kind: FilterKind::Peaking,
            frequency_hz: 1000.0,
            gain_db: -6.0,
            q: 1.2,
        },
        FilterStage {
            kind: FilterKind::Highshelf,
            frequency_hz: 6000.0,
            gain_db: 3.0,
            q: std::f64::consts::FRAC_1_SQRT_2,
        },
    ];

    println!("Chain:");
    for (i, stage) in chain.iter().enumerate() {
        println!(
            "  {}: {} @ {:.0} Hz, {:+.1} dB, Q {:.2}",
            i, stage.kind, stage.frequency_hz, stage.gain_db, stage.q
        );
    }

    let response = compute_response(&chain, SAMPLE_RATE, POINTS);

    // One column per sample, one row per dB from +6 down to -6.
    println!("\nAggregate response, 20 Hz .. nyquist:");
    for row in (-ROWS / 2..=ROWS / 2).rev() {
        let db_line = row as f64;
        let mut line = String::with_capacity(POINTS);
        for &db in &response {
            let cell = if (db - db_line).abs() < 0.5 {
                '*'
            } else if row == 0 {
                '-'
            } else {
                ' '
            };
            line.push(cell);
        }
        println!("{:+3} | {}", row, line);
    }

    let marks = [0, POINTS / 2, POINTS - 1];
    for i in marks {
        println!(
            "      column {:2} = {:.0} Hz",
            i,
            sample_frequency(i, POINTS, SAMPLE_RATE)
        );
    }
}
