//! End-to-end runs checked against the model's structural guarantees.

use mitosim_core::{
    config::{InitialCondition, MeasureSet, ParameterSet},
    engine::SimEngine,
    event::SimEvent,
    snapshot::Phase,
    trajectory::TrajectoryRecord,
};

const SCENARIO_SEED: u64 = 2024;

fn params(overrides: &[(&str, f64)]) -> ParameterSet {
    let mut p = ParameterSet::default_params();
    for (name, value) in overrides {
        p.set(name, *value).unwrap_or_else(|e| panic!("set {name}: {e}"));
    }
    p
}

fn run(overrides: &[(&str, f64)], initial: InitialCondition) -> TrajectoryRecord {
    let mut engine = SimEngine::new(&params(overrides), &MeasureSet::default_measures(), initial, false)
        .expect("build engine");
    engine.run().expect("run");
    engine.into_record()
}

/// Four chromosomes, 2000 steps of 10 s, random start.
fn scenario() -> TrajectoryRecord {
    run(
        &[("dt", 10.0), ("span", 2000.0), ("N", 4.0), ("seed", SCENARIO_SEED as f64)],
        InitialCondition::Random,
    )
}

#[test]
fn scenario_reaches_anaphase_within_the_run() {
    let record = scenario();
    assert_eq!(record.len(), 2000);
    assert_eq!(record.snapshots.len(), 2001);

    let onset = record.metadata.anaphase_onset.expect("anaphase onset");
    assert!(onset > 0 && onset < 2000, "onset at step {onset}");
    assert_eq!(record.final_phase(), Phase::Anaphase);
    assert!(record.metadata.anaphase_delay.expect("delay") >= 0.0);
    assert!(record.metadata.merotelic_at_onset.is_some());

    let onsets = record
        .events
        .iter()
        .filter(|e| matches!(e, SimEvent::AnaphaseOnset { .. }))
        .count();
    assert_eq!(onsets, 1, "anaphase onset must happen exactly once");
}

#[test]
fn onset_follows_a_full_window_of_biorientation() {
    let record = scenario();
    let onset = record.metadata.anaphase_onset.expect("anaphase onset") as usize;
    let window = (50.0_f64 / 10.0).round() as usize;

    for (i, state) in record.snapshots.iter().enumerate() {
        let expected = if i < onset { Phase::Metaphase } else { Phase::Anaphase };
        assert_eq!(state.phase, expected, "wrong phase at step {i}");
    }
    assert!(onset >= window);
    for state in &record.snapshots[onset - window..=onset] {
        assert_eq!(state.biorientation_fraction(), 1.0, "step {} not bioriented", state.step);
    }
    // Nothing earlier qualified.
    for end in window..onset {
        let held = record.snapshots[end - window..=end]
            .iter()
            .all(|s| s.biorientation_fraction() >= 1.0);
        assert!(!held, "checkpoint held through step {end} but onset came at {onset}");
    }
}

#[test]
fn link_count_is_constant_and_twice_the_kinetochores() {
    let record = scenario();
    let topology = &record.topology;
    assert_eq!(topology.link_count(), 2 * topology.kinetochore_count());
    assert_eq!(topology.body_count(), 2 + topology.kinetochore_count());
    for state in &record.snapshots {
        assert_eq!(state.links.len(), topology.link_count());
        assert_eq!(state.link_ages.len(), topology.link_count());
        assert_eq!(state.positions.len(), topology.body_count());
    }
}

#[test]
fn time_is_monotonic_and_exact() {
    let record = run(&[("dt", 2.5), ("span", 40.0)], InitialCondition::Amphitelic);
    let times = record.times();
    assert_eq!(times[0], 0.0);
    for (i, pair) in times.windows(2).enumerate() {
        assert!(pair[1] > pair[0], "time went backwards at step {}", i + 1);
    }
    for (i, state) in record.snapshots.iter().enumerate() {
        assert_eq!(state.step, i as u64);
        assert_eq!(state.time, i as f64 * 2.5);
    }
}

#[test]
fn zero_span_keeps_only_the_initial_state() {
    let record = run(&[("span", 0.0)], InitialCondition::Random);
    assert!(record.is_empty());
    assert_eq!(record.snapshots.len(), 1);
    assert_eq!(record.metadata.anaphase_onset, None);
    assert!(matches!(record.events.last(), Some(SimEvent::RunCompleted { step: 0, .. })));
}

#[test]
fn bioriented_start_without_noise_goes_to_anaphase_after_min_duration() {
    let record = run(
        &[("kBT", 0.0), ("k_a", 0.0), ("k_d0", 0.0), ("span", 100.0)],
        InitialCondition::Amphitelic,
    );
    // Satisfied from step 0, so onset is exactly min_duration / dt later.
    assert_eq!(record.metadata.anaphase_onset, Some(50));
    assert_eq!(record.metadata.merotelic_at_onset, Some(0));
}

#[test]
fn anaphase_separates_sisters_and_moves_them_poleward() {
    let record = run(
        &[("k_a", 0.0), ("k_d0", 0.0), ("span", 400.0), ("N", 2.0)],
        InitialCondition::Amphitelic,
    );
    let onset = record.metadata.anaphase_onset.expect("onset") as usize;
    let at_onset = &record.snapshots[onset];
    let last = record.final_state().expect("final");
    for c in 0..2 {
        assert!(
            last.sister_distance(c) > at_onset.sister_distance(c) + 0.2,
            "chromosome {c} did not separate"
        );
    }
}

#[test]
fn disabled_checkpoint_starts_anaphase_at_t_a() {
    let record = run(&[("sac", 0.0), ("t_A", 120.0), ("span", 300.0)], InitialCondition::Null);
    assert_eq!(record.metadata.anaphase_onset, Some(120));
    assert_eq!(record.metadata.anaphase_delay, Some(0.0));
}

#[test]
fn syntelic_start_never_satisfies_a_frozen_checkpoint() {
    // No turnover: the error can never be corrected.
    let record = run(&[("k_a", 0.0), ("k_d0", 0.0), ("span", 200.0)], InitialCondition::Syntelic);
    assert_eq!(record.metadata.anaphase_onset, None);
    assert_eq!(record.final_phase(), Phase::Metaphase);
}
