//! Saving and loading trajectory records.

use mitosim_core::{
    config::{InitialCondition, MeasureSet, ParameterSet},
    engine::SimEngine,
    error::SimError,
    store::SimStore,
    trajectory::{Ablation, TrajectoryRecord},
};

fn store() -> SimStore {
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

fn record(seed: u64, ablation: Option<Ablation>) -> TrajectoryRecord {
    let mut params = ParameterSet::default_params();
    params.set("seed", seed as f64).unwrap();
    params.set("span", 120.0).unwrap();
    params.set("N", 2.0).unwrap();
    params.set("min_duration", 10.0).unwrap();
    let mut engine = SimEngine::new(&params, &MeasureSet::default_measures(), InitialCondition::Amphitelic, false)
        .expect("build engine");
    if let Some(a) = ablation {
        engine = engine.with_ablation(a).expect("ablation");
    }
    engine.run().expect("run");
    engine.into_record()
}

#[test]
fn in_memory_round_trip_is_exact() {
    let store = store();
    let original = record(5, Some(Ablation { step: 60, position: 0.3 }));
    store.save_trajectory("rt-1", &original).expect("save");

    let loaded = store.load_trajectory("rt-1").expect("load");
    assert_eq!(loaded.metadata, original.metadata);
    assert_eq!(loaded.snapshots, original.snapshots);
    assert_eq!(loaded.events, original.events);
    assert_eq!(loaded, original);
}

#[test]
fn file_round_trip_survives_reopening() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("runs.db");
    let path = path.to_str().expect("utf-8 path");
    let original = record(8, None);

    {
        let store = SimStore::open(path).expect("open");
        store.migrate().expect("migrate");
        store.save_trajectory("rt-file", &original).expect("save");
    }

    let store = SimStore::open(path).expect("reopen");
    store.migrate().expect("migrations are idempotent");
    assert_eq!(store.load_trajectory("rt-file").expect("load"), original);

    let again = store.reopen().expect("second connection");
    let runs = again.list_runs().expect("list");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, "rt-file");
    assert_eq!(runs[0].seed, 8);
    assert_eq!(runs[0].n_chromosomes, 2);
    assert_eq!(runs[0].anaphase_onset, original.metadata.anaphase_onset);
}

#[test]
fn missing_run_is_reported() {
    let store = store();
    assert!(matches!(
        store.load_trajectory("nope"),
        Err(SimError::RunNotFound { run_id }) if run_id == "nope"
    ));
}

#[test]
fn run_ids_are_unique() {
    let store = store();
    let r = record(1, None);
    store.save_trajectory("dup", &r).expect("first save");
    assert!(matches!(store.save_trajectory("dup", &r), Err(SimError::Database(_))));
    // The failed save left the first copy intact.
    assert_eq!(store.load_trajectory("dup").expect("load"), r);
}

#[test]
fn partial_records_can_be_saved() {
    let mut params = ParameterSet::default_params();
    params.set("span", 100.0).unwrap();
    let mut engine = SimEngine::new(&params, &MeasureSet::default_measures(), InitialCondition::Random, false)
        .expect("build engine");
    engine
        .advance(30, &mitosim_core::progress::ProgressReporter::new())
        .expect("advance");

    let store = store();
    store.save_trajectory("partial", engine.record()).expect("save");
    let loaded = store.load_trajectory("partial").expect("load");
    assert_eq!(loaded.len(), 30);
    assert_eq!(&loaded, engine.record());
}

#[test]
fn aborted_runs_keep_a_loadable_record() {
    let mut params = ParameterSet::default_params();
    params.set("span", 10.0).unwrap();
    params.set("kBT", 1e308).unwrap();
    let mut engine = SimEngine::new(&params, &MeasureSet::default_measures(), InitialCondition::Amphitelic, false)
        .expect("build engine");
    assert!(matches!(engine.run(), Err(SimError::NonFiniteState { step: 1, .. })));
    assert!(matches!(engine.run(), Err(SimError::RunAborted { step: 1 })));

    let store = store();
    store.save_trajectory("aborted", engine.record()).expect("save");
    let loaded = store.load_trajectory("aborted").expect("load");
    assert!(loaded.is_empty());
    assert_eq!(&loaded, engine.record());
}
