//! Spindle assembly checkpoint.
//!
//! The checkpoint is satisfied by a snapshot whose bioriented fraction
//! reaches `checkpoint_satisfaction`. Anaphase starts on the first step
//! where it has stayed satisfied on every snapshot for `min_duration`
//! seconds and the time is at least `t_A`. With `sac = 0` the checkpoint
//! is always satisfied and only `t_A` gates the onset.
//!
//! Metaphase -> anaphase is one-directional.

use crate::{
    attachment::LinkState,
    config::ModelParams,
    event::SimEvent,
    snapshot::{Phase, SimulationState},
};

#[derive(Debug, Clone)]
pub struct CheckpointMonitor {
    dt:           f64,
    enabled:      bool,
    satisfaction: f64,
    min_duration: f64,
    t_a:          f64,
}

impl CheckpointMonitor {
    pub fn new(params: &ModelParams) -> Self {
        Self {
            dt:           params.dt,
            enabled:      params.sac,
            satisfaction: params.checkpoint_satisfaction,
            min_duration: params.min_duration,
            t_a:          params.t_a,
        }
    }

    pub fn is_satisfied(&self, state: &SimulationState) -> bool {
        !self.enabled || state.biorientation_fraction() >= self.satisfaction
    }

    /// Seed the satisfaction window from the initial state. The initial
    /// state itself never starts anaphase.
    pub fn init(&self, state: &mut SimulationState) -> Vec<SimEvent> {
        if self.is_satisfied(state) {
            state.checkpoint_since = Some(state.step);
            vec![SimEvent::CheckpointSatisfied { step: state.step }]
        } else {
            state.checkpoint_since = None;
            Vec::new()
        }
    }

    /// Update the satisfaction window of a freshly integrated state and
    /// switch it to anaphase when the conditions hold.
    pub fn evaluate(&self, next: &mut SimulationState) -> Vec<SimEvent> {
        let mut events = Vec::new();
        if next.phase == Phase::Anaphase {
            return events;
        }

        if !self.is_satisfied(next) {
            if next.checkpoint_since.take().is_some() {
                events.push(SimEvent::CheckpointLost { step: next.step });
            }
            return events;
        }

        let since = match next.checkpoint_since {
            Some(since) => since,
            None => {
                next.checkpoint_since = Some(next.step);
                events.push(SimEvent::CheckpointSatisfied { step: next.step });
                next.step
            }
        };

        let eps = 1e-9 * self.dt;
        let held = (next.step - since) as f64 * self.dt;
        let waited_long_enough = !self.enabled || held + eps >= self.min_duration;
        if next.step >= 1 && waited_long_enough && next.time + eps >= self.t_a {
            next.phase = Phase::Anaphase;
            events.push(SimEvent::AnaphaseOnset {
                step:      next.step,
                time:      next.time,
                delay:     next.time - self.t_a,
                merotelic: next.count_links(LinkState::Merotelic),
            });
        }
        events
    }
}
