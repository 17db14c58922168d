//! Simulation clock. Owns the step counter and the run length.

use crate::types::Step;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub current_step: Step,
    pub span:         Step,
    pub dt:           f64,
}

impl SimClock {
    pub fn new(span: Step, dt: f64) -> Self {
        Self { current_step: 0, span, dt }
    }

    /// Advance one step. Returns the new step number.
    /// Panics past the end of the run; callers must check `finished()`.
    pub fn advance(&mut self) -> Step {
        assert!(!self.finished(), "advance() called on a finished clock");
        self.current_step += 1;
        self.current_step
    }

    /// Simulated time of a step. Computed from the index, never
    /// accumulated, so it is exact and monotonic.
    pub fn time_of(&self, step: Step) -> f64 {
        step as f64 * self.dt
    }

    pub fn time(&self) -> f64 {
        self.time_of(self.current_step)
    }

    pub fn finished(&self) -> bool {
        self.current_step >= self.span
    }

    pub fn remaining(&self) -> Step {
        self.span - self.current_step
    }

    /// Fraction of the run done, in [0, 1]. An empty run is complete.
    pub fn progress(&self) -> f64 {
        if self.span == 0 {
            return 1.0;
        }
        self.current_step as f64 / self.span as f64
    }
}
