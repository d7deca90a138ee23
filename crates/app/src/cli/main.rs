//! Cadenza CLI Application
//!
//! Loads the configuration and saved profiles, brings the active profile
//! live on the software graph, and runs the control-rate render loop for a
//! short demonstration window.

use anyhow::Context;
use cadenza_core::domain::config::ConfigManager;
use cadenza_core::domain::curve::{db_to_gain, ratio_to_db};
use cadenza_core::domain::filter::{FilterKind, FilterStage};
use cadenza_core::domain::profile::ProfileStore;
use cadenza_core::domain::session::Session;
use cadenza_core::domain::store::{
    ProfilePersistence, ProfileRepository, ProfileWatcher, StoreSnapshot, WriteScheduler,
};
use cadenza_infra::graph::SoftwareGraph;
use clap::Parser;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "cadenza")]
#[command(about = "An equalizer and mixer control surface", long_about = None)]
struct Cli {
    /// Configuration directory (defaults to the platform config dir)
    #[arg(short, long)]
    config_dir: Option<std::path::PathBuf>,

    /// How many render ticks the demo loop runs
    #[arg(short, long, default_value_t = 90)]
    ticks: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    tracing::info!("🎚 Cadenza starting...");

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => ConfigManager::default_config_dir().context("no usable config directory")?,
    };
    let manager = ConfigManager::new(config_dir);
    let config = manager.load().await;

    // Profiles: disk state seeds the store, memory stays authoritative.
    let repository = Arc::new(ProfileRepository::new(config.profile_path.clone()));
    let (profiles, last_active) = repository.load().await?;
    let mut store = ProfileStore::from_parts(profiles, last_active);
    let scheduler = WriteScheduler::new(
        repository.clone(),
        Duration::from_millis(config.write_quiescence_ms),
    );

    // Surface out-of-process rewrites of the profile file while we run.
    let watcher = ProfileWatcher::new(config.profile_path.clone()).await?;
    let mut profile_changes = watcher.subscribe();
    tokio::spawn(async move {
        while let Ok(path) = profile_changes.recv().await {
            tracing::info!(path = %path.display(), "profile file changed on disk");
        }
    });

    let active = store.activate(store.active_id())?;
    tracing::info!(
        profile = active.id,
        label = %active.label,
        stages = active.filter_chain.len(),
        "activating profile"
    );

    let sample_rate = f64::from(config.sample_rate);
    let graph = SoftwareGraph::new(sample_rate, active.channels.len());
    let mut session = Session::start(
        active,
        sample_rate,
        config.meter_span_units,
        graph,
        Instant::now(),
    )?;

    // Seed an empty profile with a gentle smile curve so the demo has
    // something to plot.
    if session.profile().filter_chain.is_empty() {
        let mut low = FilterStage::new(FilterKind::Lowshelf, 150.0);
        low.gain_db = 3.0;
        let mut high = FilterStage::new(FilterKind::Highshelf, 6000.0);
        high.gain_db = 2.0;
        session.add_stage(low)?;
        session.add_stage(high)?;
        session.set_channel_gain(0, db_to_gain(ratio_to_db(0.25)))?;
    }

    let response = session.response(config.response_points);
    let (min_db, max_db) = response
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &db| {
            (lo.min(db), hi.max(db))
        });
    tracing::info!(
        points = response.len(),
        "response curve spans {min_db:.2}..{max_db:.2} dB"
    );

    let mut interval =
        tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(config.tick_hz)));
    for tick in 0..cli.ticks {
        interval.tick().await;
        let now = Instant::now();

        // A real host fills the analyser from its audio thread; the demo
        // feeds a decaying pulse per channel instead.
        let phase = f64::from(tick % 30) / 30.0;
        let levels: Vec<f64> = (0..session.profile().channels.len())
            .map(|ch| ((1.0 - phase) * (1.0 - ch as f64 * 0.1)).max(0.0))
            .collect();
        session.graph_mut().feed_levels(&levels);
        session.tick(now);

        if tick % 30 == 0 {
            let gains = session.effective_gains();
            let peaks: Vec<u32> = (0..gains.len())
                .filter_map(|ch| session.meter(ch, now).map(|p| p.units))
                .collect();
            tracing::info!(?gains, ?peaks, "render tick");
        }
    }

    // Commit the session's edits and let the debounced writer flush once.
    let edited = session.into_profile();
    store.commit(&edited)?;
    scheduler.mark_dirty(StoreSnapshot {
        profiles: store.profiles().to_vec(),
        active_id: store.active_id(),
    });
    tokio::time::sleep(Duration::from_millis(config.write_quiescence_ms + 100)).await;

    tracing::info!("🎚 Cadenza done");
    Ok(())
}
