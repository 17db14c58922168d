//! THE MOST IMPORTANT TEST IN THE PROJECT.
//!
//! Two engines, same parameters, same seed.
//! They must produce bit-identical trajectories and event logs.
//! Any divergence is a blocker: do not merge until fixed.

use mitosim_core::{
    config::{InitialCondition, MeasureSet, ParameterSet},
    engine::SimEngine,
    event::EventLogEntry,
    store::SimStore,
    trajectory::TrajectoryRecord,
};

fn run(seed: u64, span: u64) -> TrajectoryRecord {
    let mut params = ParameterSet::default_params();
    params.set("seed", seed as f64).expect("seed");
    params.set("span", span as f64).expect("span");
    params.set("N", 4.0).expect("N");
    let mut engine = SimEngine::new(&params, &MeasureSet::default_measures(), InitialCondition::Random, false)
        .expect("build engine");
    engine.run().expect("run");
    engine.into_record()
}

fn event_payloads(record: &TrajectoryRecord) -> Vec<String> {
    record
        .events
        .iter()
        .map(|e| EventLogEntry::new("det", e).expect("serialize").payload)
        .collect()
}

#[test]
fn same_seed_produces_identical_trajectories() {
    const SEED: u64 = 0x00BE_EFCA_FE12;
    const SPAN: u64 = 600;

    let a = run(SEED, SPAN);
    let b = run(SEED, SPAN);

    assert_eq!(a.snapshots.len(), b.snapshots.len());
    for (i, (sa, sb)) in a.snapshots.iter().zip(&b.snapshots).enumerate() {
        let bits_a: Vec<u64> = sa.positions.iter().map(|x| x.to_bits()).collect();
        let bits_b: Vec<u64> = sb.positions.iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits_a, bits_b, "Positions diverged at step {i}");
        assert_eq!(sa.links, sb.links, "Link states diverged at step {i}");
    }
    assert_eq!(a, b);
}

#[test]
fn same_seed_produces_identical_event_logs() {
    let log_a = event_payloads(&run(7, 400));
    let log_b = event_payloads(&run(7, 400));

    assert_eq!(
        log_a.len(), log_b.len(),
        "Event log lengths differ: {} vs {}",
        log_a.len(), log_b.len()
    );
    for (i, (a, b)) in log_a.iter().zip(log_b.iter()).enumerate() {
        assert_eq!(a, b, "Event log diverged at entry {i}:\n  A: {a}\n  B: {b}");
    }
}

#[test]
fn stored_event_logs_match_across_runs() {
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store.save_trajectory("det-a", &run(11, 300)).expect("save a");
    store.save_trajectory("det-b", &run(11, 300)).expect("save b");

    for step in 0..=300 {
        let a: Vec<String> = store.events_for_step("det-a", step).expect("read a")
            .into_iter().map(|e| e.payload).collect();
        let b: Vec<String> = store.events_for_step("det-b", step).expect("read b")
            .into_iter().map(|e| e.payload).collect();
        assert_eq!(a, b, "Stored events diverged at step {step}");
    }
    assert_eq!(store.event_count("det-a").unwrap(), store.event_count("det-b").unwrap());
}

#[test]
fn different_seeds_produce_different_trajectories() {
    let a = run(42, 200);
    let b = run(99, 200);

    // Thermal noise alone must make the final positions differ.
    let last_a = a.final_state().expect("state a");
    let last_b = b.final_state().expect("state b");
    assert_ne!(last_a.positions, last_b.positions, "Different seeds produced identical runs: seed is not being used");
}
