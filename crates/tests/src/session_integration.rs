//! Integration tests for the control surface
//!
//! These tests run the full path from the profile store through a live
//! session on the software graph: chain rewiring, gain resolution, peak
//! metering and the persistence layer around it all.

use cadenza_core::domain::curve::{db_to_gain, db_to_ratio, ratio_to_db, ratio_to_frequency};
use cadenza_core::domain::filter::{FilterKind, FilterStage, StageChange};
use cadenza_core::domain::graph::Port;
use cadenza_core::domain::mixer::MASTER_INDEX;
use cadenza_core::domain::profile::{Profile, ProfileStore};
use cadenza_core::domain::session::Session;
use cadenza_core::domain::store::{
    PersistError, ProfilePersistence, ProfileRepository, StoreSnapshot, WriteScheduler,
};
use cadenza_infra::graph::SoftwareGraph;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SAMPLE_RATE: f64 = 44100.0;
const SPAN_UNITS: u32 = 20;

fn start_session(profile: Profile) -> Session<SoftwareGraph> {
    let graph = SoftwareGraph::new(SAMPLE_RATE, 7);
    Session::start(profile, SAMPLE_RATE, SPAN_UNITS, graph, Instant::now()).unwrap()
}

fn peaking(frequency_hz: f64, gain_db: f64) -> FilterStage {
    FilterStage {
        kind: FilterKind::Peaking,
        frequency_hz,
        gain_db,
        q: 1.0,
    }
}

// ============================================================================
// CHAIN AND RESPONSE
// ============================================================================

#[test]
fn test_fresh_profile_bypasses_and_plots_flat() {
    let session = start_session(Profile::new(1, "Flat"));

    assert!(session.graph().is_bypassed());

    let response = session.response(256);
    assert_eq!(response.len(), 256);
    assert!(response.iter().all(|&db| db == 0.0));
}

#[test]
fn test_adding_stages_rewires_serially() {
    let mut session = start_session(Profile::new(1, "Chain"));

    session.add_stage(peaking(200.0, 3.0)).unwrap();
    session.add_stage(peaking(2000.0, -3.0)).unwrap();

    let edges = session.graph().edges().to_vec();
    assert_eq!(edges.len(), 3, "two stages need three serial edges");
    assert!(matches!(edges[0].from, Port::Source));
    assert!(matches!(edges[2].to, Port::Sink));
    assert_eq!(session.graph().filter_count(), 2);
}

#[test]
fn test_removing_last_stage_restores_bypass() {
    let mut session = start_session(Profile::new(1, "Chain"));
    session.add_stage(peaking(500.0, 2.0)).unwrap();

    session.remove_stage(0).unwrap();

    assert!(session.graph().is_bypassed());
    assert_eq!(session.graph().filter_count(), 0);
}

#[test]
fn test_cascade_response_adds_in_decibels() {
    let mut session = start_session(Profile::new(1, "Boost"));
    session.add_stage(peaking(1000.0, 3.0)).unwrap();
    session.add_stage(peaking(1000.0, 3.0)).unwrap();

    let db = session.response_at(1000.0);
    assert!((db - 6.0).abs() < 1e-9, "expected +6 dB, got {db}");
}

#[test]
fn test_mutation_tracks_graph_without_rewire() {
    let mut session = start_session(Profile::new(1, "Drag"));
    session.add_stage(peaking(440.0, 0.0)).unwrap();
    let wiring = session.graph().edges().to_vec();

    // A burst of drag updates, like a pointer moving across the canvas.
    for step in 1..=20 {
        let freq = 440.0 + f64::from(step) * 100.0;
        session
            .mutate_stage(0, StageChange::Frequency(freq))
            .unwrap();
    }
    session.mutate_stage(0, StageChange::Gain(4.0)).unwrap();

    assert_eq!(session.graph().edges(), &wiring[..], "no rewire on drag");
    assert_eq!(session.profile().filter_chain[0].frequency_hz, 2440.0);

    let nodes = session.graph().filter_count();
    assert_eq!(nodes, 1, "mutation must not grow the node set");
}

#[test]
fn test_node_placement_from_pointer_ratio() {
    let mut session = start_session(Profile::new(1, "Place"));

    // A click at mid-travel creates a stage at the mapped frequency.
    let freq = ratio_to_frequency(0.5, SAMPLE_RATE);
    session
        .add_stage(FilterStage::new(FilterKind::Peaking, freq))
        .unwrap();

    let placed = session.profile().filter_chain[0].frequency_hz;
    assert!((placed - (20.0_f64 * 22050.0).sqrt()).abs() < 1e-6);
}

// ============================================================================
// MIXER RESOLUTION
// ============================================================================

#[test]
fn test_solo_resolution_through_the_graph() {
    let mut session = start_session(Profile::new(1, "Solo"));
    session.toggle_solo(1).unwrap();

    let gains = session.effective_gains();
    assert_eq!(gains[0], 0.0);
    assert_eq!(gains[1], 1.0);
    assert_eq!(gains[MASTER_INDEX], 1.0);

    // The graph's gain nodes saw the same numbers.
    let mut pushed = session.graph().gain_values();
    let mut expected = gains.clone();
    pushed.sort_by(f64::total_cmp);
    expected.sort_by(f64::total_cmp);
    assert_eq!(pushed, expected);
}

#[test]
fn test_solo_exclusivity_last_write_wins() {
    let mut session = start_session(Profile::new(1, "Solo"));

    session.toggle_solo(0).unwrap();
    session.toggle_solo(3).unwrap();

    let channels = &session.profile().channels;
    assert!(!channels[0].solo, "first solo must be stolen by the second");
    assert!(channels[3].solo);
}

#[test]
fn test_fader_position_drives_channel_gain() {
    let mut session = start_session(Profile::new(1, "Fader"));

    // Fader dragged to the very bottom: hard mute by position.
    let db = ratio_to_db(1.0);
    assert_eq!(db, f64::NEG_INFINITY);
    session.set_channel_gain(2, db_to_gain(db)).unwrap();
    assert_eq!(session.effective_gains()[2], 0.0);

    // Mid-travel maps back near -11 dB and round-trips.
    let db = ratio_to_db(0.5);
    session.set_channel_gain(2, db_to_gain(db)).unwrap();
    assert!((db_to_ratio(db) - 0.5).abs() < 1e-9);
    assert!(session.effective_gains()[2] > 0.0);
}

// ============================================================================
// METERING
// ============================================================================

#[test]
fn test_peak_hold_lifecycle_over_ticks() {
    let mut session = start_session(Profile::new(1, "Meter"));
    let t0 = Instant::now();

    session.graph_mut().feed_levels(&[0.5, 0.0]);
    session.tick(t0);

    let peak = session.meter(0, t0).unwrap();
    assert_eq!(peak.units, 10);
    assert_eq!(peak.opacity, 1.0);

    // Quieter signal keeps the latched peak, fading after 650 ms.
    session.graph_mut().feed_levels(&[0.1]);
    session.tick(t0 + Duration::from_millis(700));
    let peak = session.meter(0, t0 + Duration::from_millis(700)).unwrap();
    assert_eq!(peak.units, 10);
    assert!((peak.opacity - (1.0 - 50.0 / 350.0)).abs() < 1e-9);

    // Past the hold window the tick reclaims the peak.
    session.tick(t0 + Duration::from_millis(1100));
    let peak = session.meter(0, t0 + Duration::from_millis(1100)).unwrap();
    assert_eq!(peak.units, 0);
}

#[test]
fn test_meter_levels_follow_analysis_feed() {
    let mut session = start_session(Profile::new(1, "Levels"));
    let now = Instant::now();

    session.graph_mut().feed_levels(&[0.25, 0.75, 1.0]);
    session.tick(now);

    assert_eq!(session.level(0), Some(0.25));
    assert_eq!(session.level(1), Some(0.75));
    assert_eq!(session.level(2), Some(1.0));
    assert_eq!(session.level(5), Some(0.0), "unfed channels read silent");
}

// ============================================================================
// PROFILE LIFECYCLE END TO END
// ============================================================================

#[test]
fn test_edit_commit_switch_cycle() {
    let mut store = ProfileStore::new();
    let second = store.create();

    let active = store.activate(1).unwrap();
    let mut session = start_session(active);
    session.add_stage(peaking(800.0, -2.0)).unwrap();

    // Edits are invisible in the store until the swap commits them.
    assert!(store.get(1).unwrap().filter_chain.is_empty());

    let next = store.activate(second).unwrap();
    let edited = session.swap_profile(next, Instant::now()).unwrap();
    store.commit(&edited).unwrap();

    assert_eq!(store.get(1).unwrap().filter_chain.len(), 1);
    assert_eq!(session.profile().id, second);
    assert!(session.graph().is_bypassed());
    assert_eq!(
        session.graph().gain_count(),
        7,
        "old gain nodes must be gone, new strip bound"
    );
}

#[test]
fn test_store_never_runs_dry() {
    let mut store = ProfileStore::new();
    store.delete(1).unwrap();

    assert_eq!(store.len(), 1);
    let refill = &store.profiles()[0];
    assert!(refill.filter_chain.is_empty());
    assert_eq!(store.active_id(), refill.id);
}

#[test]
fn test_import_export_cycle_between_stores() {
    let mut source = ProfileStore::new();
    let mut active = source.activate(1).unwrap();
    active.filter_chain.push(peaking(315.0, 4.5));
    source.commit(&active).unwrap();
    source.rename(1, "Road EQ").unwrap();

    let document = source.export();

    let mut target = ProfileStore::new();
    let ids = target.import(&document).unwrap();
    assert_eq!(ids.len(), 1);

    let imported = target.get(ids[0]).unwrap();
    assert_eq!(imported.label, "Road EQ");
    assert_eq!(imported.filter_chain.len(), 1);
    assert_eq!(imported.channels.len(), 7);
}

#[test]
fn test_import_failure_leaves_target_untouched() {
    let mut source = ProfileStore::new();
    let mut document = source.export();
    document.kind = "notAProfile".to_string();

    let mut target = ProfileStore::new();
    let before = target.profiles().to_vec();
    assert!(target.import(&document).is_err());
    assert_eq!(target.profiles(), &before[..]);
}

// ============================================================================
// PERSISTENCE
// ============================================================================

#[tokio::test]
async fn test_repository_round_trip_preserves_sessions_work() {
    let dir = tempfile::TempDir::new().unwrap();
    let repository = ProfileRepository::new(dir.path().join("profiles.json"));

    let mut store = ProfileStore::new();
    let active = store.activate(1).unwrap();
    let mut session = start_session(active);
    session.add_stage(peaking(120.0, 2.0)).unwrap();
    session.toggle_mute(4).unwrap();
    store.commit(&session.into_profile()).unwrap();

    repository
        .save(store.profiles(), store.active_id())
        .await
        .unwrap();

    let (profiles, last_active) = repository.load().await.unwrap();
    let restored = ProfileStore::from_parts(profiles, last_active);

    assert_eq!(restored.active_id(), 1);
    let profile = restored.get(1).unwrap();
    assert_eq!(profile.filter_chain.len(), 1);
    assert!(profile.channels[4].muted);
}

/// Persistence stub that counts saves.
struct CountingStore {
    saves: AtomicUsize,
}

#[async_trait]
impl ProfilePersistence for CountingStore {
    async fn load(&self) -> Result<(Vec<Profile>, Option<u32>), PersistError> {
        Ok((Vec::new(), None))
    }

    async fn save(&self, _profiles: &[Profile], _active_id: u32) -> Result<(), PersistError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_scheduler_coalesces_an_edit_burst_into_one_save() {
    let persistence = Arc::new(CountingStore {
        saves: AtomicUsize::new(0),
    });
    let scheduler = WriteScheduler::new(persistence.clone(), Duration::from_millis(30));

    let store = ProfileStore::new();
    for _ in 0..20 {
        scheduler.mark_dirty(StoreSnapshot {
            profiles: store.profiles().to_vec(),
            active_id: store.active_id(),
        });
    }

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(persistence.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_scheduler_saves_again_after_quiet_period() {
    let persistence = Arc::new(CountingStore {
        saves: AtomicUsize::new(0),
    });
    let scheduler = WriteScheduler::new(persistence.clone(), Duration::from_millis(20));

    let store = ProfileStore::new();
    let snapshot = || StoreSnapshot {
        profiles: store.profiles().to_vec(),
        active_id: store.active_id(),
    };

    scheduler.mark_dirty(snapshot());
    tokio::time::sleep(Duration::from_millis(80)).await;
    scheduler.mark_dirty(snapshot());
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(persistence.saves.load(Ordering::SeqCst), 2);
}
