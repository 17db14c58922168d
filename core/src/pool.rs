//! Batches of independent runs.
//!
//! Each run of a pool gets its own seed, derived from the master seed
//! and its index, so a pool is reproducible run by run whatever the
//! thread count. Runs are parallel; steps within a run never are.

use crate::{
    config::{InitialCondition, MeasureSet, ParameterSet},
    engine::SimEngine,
    error::SimResult,
    progress::ProgressReporter,
    rng::SimRng,
    snapshot::Phase,
    trajectory::TrajectoryRecord,
};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Seeds are stored as f64 parameters; keep them exactly representable.
const SEED_MASK: u64 = (1 << 53) - 1;

pub fn pool_seed(master_seed: u64, index: usize) -> u64 {
    SimRng::derive_seed(master_seed, index as u64) & SEED_MASK
}

/// Run `size` simulations from the same parameters with derived seeds.
/// Records come back in index order.
pub fn run_pool(
    params:   &ParameterSet,
    measures: &MeasureSet,
    initial:  InitialCondition,
    size:     usize,
    progress: &ProgressReporter,
) -> SimResult<Vec<TrajectoryRecord>> {
    let master_seed = params.get("seed")? as u64;
    let done = AtomicUsize::new(0);
    log::info!("Running a pool of {size} simulations from master seed {master_seed}");

    let records = (0..size)
        .into_par_iter()
        .map(|index| {
            let mut run_params = params.clone();
            run_params.set("seed", pool_seed(master_seed, index) as f64)?;
            let mut engine = SimEngine::new(&run_params, measures, initial, false)?;
            engine.run()?;
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report(finished as f64 / size as f64);
            Ok(engine.into_record())
        })
        .collect::<SimResult<Vec<_>>>()?;

    Ok(records)
}

/// Aggregate outcome of a pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSummary {
    pub size:                 usize,
    pub reached_anaphase:     usize,
    pub mean_onset_time:      Option<f64>,
    pub mean_delay:           Option<f64>,
    pub mean_merotelic:       Option<f64>,
    /// Mean bioriented fraction of the last snapshot of each run.
    pub mean_final_biorientation: f64,
}

impl PoolSummary {
    pub fn from_records(records: &[TrajectoryRecord]) -> Self {
        let mean = |values: Vec<f64>| {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };
        let onsets: Vec<&TrajectoryRecord> = records
            .iter()
            .filter(|r| r.metadata.final_phase == Phase::Anaphase)
            .collect();
        let onset_times = onsets
            .iter()
            .filter_map(|r| r.metadata.anaphase_onset.map(|s| s as f64 * r.metadata.dt))
            .collect();
        let delays = onsets.iter().filter_map(|r| r.metadata.anaphase_delay).collect();
        let merotelic = onsets
            .iter()
            .filter_map(|r| r.metadata.merotelic_at_onset.map(|m| m as f64))
            .collect();
        let final_bio: Vec<f64> = records
            .iter()
            .filter_map(|r| r.final_state().map(|s| s.biorientation_fraction()))
            .collect();

        Self {
            size:                 records.len(),
            reached_anaphase:     onsets.len(),
            mean_onset_time:      mean(onset_times),
            mean_delay:           mean(delays),
            mean_merotelic:       mean(merotelic),
            mean_final_biorientation: mean(final_bio).unwrap_or(0.0),
        }
    }
}
