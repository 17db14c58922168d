//! The record of one run: every snapshot, the event log, and the
//! metadata needed to interpret them. Also the derived observables.

use crate::{
    attachment::{ChromosomeAttachment, LinkState},
    config::{InitialCondition, MeasureSet, ParameterSet},
    event::SimEvent,
    snapshot::{Phase, SimulationState},
    topology::SpindleTopology,
    types::{PoleSide, Sister, Step},
};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A laser cut of every microtubule crossing `position` at `step`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Ablation {
    pub step:     Step,
    pub position: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    pub seed:               u64,
    pub initial_condition:  InitialCondition,
    pub dt:                 f64,
    pub span:               Step,
    pub anaphase_onset:     Option<Step>,
    pub anaphase_delay:     Option<f64>,
    pub merotelic_at_onset: Option<usize>,
    pub ablation:           Option<Ablation>,
    pub final_phase:        Phase,
}

/// Correct and erroneous link counts of one kinetochore, per snapshot.
/// Monotelic links count as neither.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KinetochoreHistory {
    pub correct:   Vec<usize>,
    pub erroneous: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrajectoryRecord {
    pub metadata:  RunMetadata,
    pub params:    ParameterSet,
    pub measures:  MeasureSet,
    pub topology:  SpindleTopology,
    /// Initial state, then one state per step.
    pub snapshots: Vec<SimulationState>,
    pub events:    Vec<SimEvent>,
}

impl TrajectoryRecord {
    /// Number of steps recorded; the initial snapshot is not a step.
    pub fn len(&self) -> usize {
        self.snapshots.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn initial_state(&self) -> Option<&SimulationState> {
        self.snapshots.first()
    }

    pub fn final_state(&self) -> Option<&SimulationState> {
        self.snapshots.last()
    }

    pub fn final_phase(&self) -> Phase {
        self.final_state().map(|s| s.phase).unwrap_or(Phase::Metaphase)
    }

    pub fn times(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.time).collect()
    }

    /// Position of one body (topology index) over the run.
    pub fn position_series(&self, body: usize) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.positions[body]).collect()
    }

    pub fn spindle_length_series(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.spindle_length()).collect()
    }

    pub fn sister_distance_series(&self, chromosome: usize) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.sister_distance(chromosome)).collect()
    }

    pub fn biorientation_series(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.biorientation_fraction()).collect()
    }

    /// Fraction of attached links that are correct at snapshot `index`.
    pub fn correct_fraction(&self, index: usize) -> f64 {
        let state = &self.snapshots[index];
        let attached = state.links.iter().filter(|l| l.is_attached()).count();
        if attached == 0 {
            return 0.0;
        }
        state.count_links(LinkState::Correct) as f64 / attached as f64
    }

    pub fn kinetochore_history(&self, chromosome: usize, sister: Sister) -> KinetochoreHistory {
        let mut history = KinetochoreHistory::default();
        for state in &self.snapshots {
            let (mut correct, mut erroneous) = (0, 0);
            for pole in PoleSide::BOTH {
                match state.link(chromosome, sister, pole) {
                    LinkState::Correct => correct += 1,
                    LinkState::Incorrect | LinkState::Merotelic => erroneous += 1,
                    LinkState::Unattached | LinkState::Monotelic => {}
                }
            }
            history.correct.push(correct);
            history.erroneous.push(erroneous);
        }
        history
    }

    pub fn chromosome_attachment(&self, index: usize, chromosome: usize) -> ChromosomeAttachment {
        self.snapshots[index].chromosome_attachment(chromosome)
    }

    /// Number of chromosomes in each attachment class at snapshot `index`.
    pub fn attachment_counts(&self, index: usize) -> Vec<(ChromosomeAttachment, usize)> {
        let state = &self.snapshots[index];
        ChromosomeAttachment::ALL
            .iter()
            .map(|&kind| {
                let n = (0..state.n_chromosomes())
                    .filter(|&c| state.chromosome_attachment(c) == kind)
                    .count();
                (kind, n)
            })
            .collect()
    }

    /// Time after anaphase onset at which a kinetochore first comes within
    /// `distance` of the single pole it is attached to.
    pub fn time_of_arrival(&self, chromosome: usize, sister: Sister, distance: f64) -> Option<f64> {
        let onset = self.metadata.anaphase_onset? as usize;
        let onset_time = self.snapshots.get(onset)?.time;
        self.snapshots.iter().skip(onset).find_map(|state| {
            let bound: Vec<PoleSide> = PoleSide::BOTH
                .into_iter()
                .filter(|&p| state.is_bound(chromosome, sister, p))
                .collect();
            match bound.as_slice() {
                [pole] if (state.kinetochore(chromosome, sister) - state.pole(*pole)).abs() <= distance => {
                    Some(state.time - onset_time)
                }
                _ => None,
            }
        })
    }

    /// Plain-text summary of one snapshot.
    pub fn report(&self, index: usize) -> String {
        let mut out = String::new();
        let Some(state) = self.snapshots.get(index) else {
            let _ = writeln!(out, "No snapshot {index} (run has {} steps)", self.len());
            return out;
        };
        let _ = writeln!(out, "Step {} / t = {:.2} s / {}", state.step, state.time, state.phase.name());
        let _ = writeln!(
            out,
            "Spindle: left {:.3} um, right {:.3} um, length {:.3} um{}",
            state.pole(PoleSide::Left),
            state.pole(PoleSide::Right),
            state.spindle_length(),
            if state.ablated { " (ablated)" } else { "" }
        );
        let _ = writeln!(out, "Bioriented: {:.0}%", 100.0 * state.biorientation_fraction());
        for chromosome in 0..state.n_chromosomes() {
            let _ = writeln!(
                out,
                "  chromosome {chromosome}: {:<10} A {:+.3}  B {:+.3}  d {:.3} um",
                state.chromosome_attachment(chromosome).name(),
                state.kinetochore(chromosome, Sister::A),
                state.kinetochore(chromosome, Sister::B),
                state.sister_distance(chromosome),
            );
        }
        let counts: Vec<String> = LinkState::ALL
            .iter()
            .map(|&s| format!("{} {}", s.name(), state.count_links(s)))
            .collect();
        let _ = writeln!(out, "Links: {}", counts.join(", "));
        if let (Some(step), Some(delay)) = (self.metadata.anaphase_onset, self.metadata.anaphase_delay) {
            let _ = writeln!(out, "Anaphase onset at step {step} (delay {delay:.2} s)");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{classify, flatten};

    fn record() -> TrajectoryRecord {
        let flags_at = |i: u64| {
            if i < 2 {
                [[true, false], [true, false]]
            } else {
                [[true, false], [false, true]]
            }
        };
        let snapshots = (0..5u64)
            .map(|i| SimulationState {
                step: i,
                time: i as f64 * 2.0,
                positions: vec![-1.0, 1.0, -0.1 - 0.2 * i as f64, 0.1],
                links: flatten(&[classify(&flags_at(i))]),
                link_ages: vec![0; 4],
                phase: if i >= 3 { Phase::Anaphase } else { Phase::Metaphase },
                ablated: false,
                checkpoint_since: None,
            })
            .collect();
        TrajectoryRecord {
            metadata: RunMetadata {
                seed: 1,
                initial_condition: InitialCondition::Syntelic,
                dt: 2.0,
                span: 4,
                anaphase_onset: Some(3),
                anaphase_delay: Some(6.0),
                merotelic_at_onset: Some(0),
                ablation: None,
                final_phase: Phase::Anaphase,
            },
            params: ParameterSet::default_params(),
            measures: MeasureSet::default_measures(),
            topology: SpindleTopology::new(1, 400.0, 40.0),
            snapshots,
            events: Vec::new(),
        }
    }

    #[test]
    fn length_counts_steps_not_snapshots() {
        let r = record();
        assert_eq!(r.len(), 4);
        assert_eq!(r.times(), vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(r.final_phase(), Phase::Anaphase);
    }

    #[test]
    fn history_separates_correct_from_erroneous() {
        let r = record();
        let b = r.kinetochore_history(0, Sister::B);
        assert_eq!(b.erroneous, vec![1, 1, 0, 0, 0]);
        assert_eq!(b.correct, vec![0, 0, 1, 1, 1]);
        assert_eq!(r.chromosome_attachment(0, 0), ChromosomeAttachment::Syntelic);
        assert_eq!(r.correct_fraction(4), 1.0);
    }

    #[test]
    fn lone_sister_is_not_counted_as_correct() {
        let mut r = record();
        // Sister A bound to the far pole, sister B unattached.
        r.snapshots[4].links = flatten(&[classify(&[[false, true], [false, false]])]);
        assert_eq!(r.correct_fraction(4), 0.0);
        let a = r.kinetochore_history(0, Sister::A);
        assert_eq!((a.correct[4], a.erroneous[4]), (0, 0));
        assert_eq!(r.chromosome_attachment(4, 0), ChromosomeAttachment::Monotelic);
    }

    #[test]
    fn arrival_is_measured_from_onset() {
        let r = record();
        // Sister A is at -0.7 at step 3 and -0.9 at step 4; left pole at -1.
        assert_eq!(r.time_of_arrival(0, Sister::A, 0.15), Some(2.0));
        assert_eq!(r.time_of_arrival(0, Sister::A, 0.01), None);
    }

    #[test]
    fn report_names_phase_and_classes() {
        let text = record().report(4);
        assert!(text.contains("anaphase"));
        assert!(text.contains("amphitelic"));
        assert!(text.contains("Anaphase onset at step 3"));
        assert!(record().report(99).contains("No snapshot 99"));
    }
}
